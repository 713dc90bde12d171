//! Google Sheets v4 read client.
//!
//! Fetches `GET {base}/v4/spreadsheets/{id}/values/'{tab}'` with a bearer
//! token obtained from the credential file named in the [`SheetTarget`].
//! One request per sync, no retry and no client-side timeout: a transient
//! network failure surfaces as an error and fails the run.

use async_trait::async_trait;
use serde::Deserialize;

use crate::credentials::{Credentials, ensure_success};
use crate::{SheetError, SheetTarget, Worksheet, WorksheetSource};

/// Production endpoint of the Sheets API.
pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

/// Response body of `spreadsheets.values.get`.
///
/// `values` is omitted entirely when the range is empty.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// [`WorksheetSource`] backed by the Google Sheets REST API.
#[derive(Debug, Clone)]
pub struct GoogleSheetsClient {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleSheetsClient {
    /// Creates a client pointed at the production Sheets endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::Http`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, SheetError> {
        let client = reqwest::Client::builder()
            .user_agent("sheet-sync/1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_owned(),
        })
    }

    /// Points the client at a different API host (used by tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        base_url.trim_end_matches('/').clone_into(&mut self.base_url);
        self
    }

    /// Builds the `values.get` URL for a tab, quoting the tab title so
    /// titles with spaces or punctuation form a valid A1 range.
    fn values_url(&self, spreadsheet_id: &str, worksheet: &str) -> Result<reqwest::Url, SheetError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| SheetError::InvalidUrl(format!("{}: {e}", self.base_url)))?;

        let range = format!("'{}'", worksheet.replace('\'', "''"));

        url.path_segments_mut()
            .map_err(|()| SheetError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", range.as_str()]);

        Ok(url)
    }
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl WorksheetSource for GoogleSheetsClient {
    fn name(&self) -> &str {
        "google_sheets"
    }

    async fn fetch(&self, target: &SheetTarget) -> Result<Worksheet, SheetError> {
        let credentials = Credentials::from_file(&target.credentials_file)?;
        let token = credentials.access_token(&self.client).await?;

        let url = self.values_url(&target.spreadsheet_id, &target.worksheet)?;
        log::debug!("Fetching worksheet {:?} from {url}", target.worksheet);

        let response = self
            .client
            .get(url)
            .query(&[("majorDimension", "ROWS")])
            .bearer_auth(token)
            .send()
            .await?;
        let body: ValueRange = ensure_success(response).await?.json().await?;

        let values: Vec<Vec<String>> = body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();

        log::info!(
            "Read {} row(s) from worksheet {:?}",
            values.len(),
            target.worksheet
        );

        Ok(Worksheet::new(&target.worksheet, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_authorized_user(token_uri: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("sheet_sync_creds_{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            serde_json::json!({
                "type": "authorized_user",
                "client_id": "id",
                "client_secret": "secret",
                "refresh_token": "refresh",
                "token_uri": token_uri,
            })
            .to_string(),
        )
        .unwrap();
        path
    }

    #[test]
    fn builds_quoted_values_url() {
        let client = GoogleSheetsClient::new()
            .unwrap()
            .with_base_url("https://example.test/");
        let url = client.values_url("abc123", "RECORDING").unwrap();

        assert!(url.as_str().starts_with("https://example.test/v4/spreadsheets/abc123/values/"));
        assert!(url.as_str().contains("RECORDING"));
    }

    #[test]
    fn stringifies_non_text_cells() {
        assert_eq!(cell_text(serde_json::json!("62,50%")), "62,50%");
        assert_eq!(cell_text(serde_json::json!(40)), "40");
        assert_eq!(cell_text(serde_json::Value::Null), "");
        assert_eq!(cell_text(serde_json::json!(true)), "true");
    }

    #[tokio::test]
    async fn fetches_worksheet_values() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "ya29.test"}"#)
            .create_async()
            .await;
        let values = server
            .mock(
                "GET",
                mockito::Matcher::Regex(r"^/v4/spreadsheets/sheet-1/values/.*RECORDING.*$".to_owned()),
            )
            .match_query(mockito::Matcher::Any)
            .match_header("authorization", "Bearer ya29.test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "range": "RECORDING!A1:G3",
                    "majorDimension": "ROWS",
                    "values": [["course", "subject"], ["Math", "Algebra"], ["Physics", 7]]
                }"#,
            )
            .create_async()
            .await;

        let creds = write_authorized_user(&format!("{}/token", server.url()));
        let client = GoogleSheetsClient::new().unwrap().with_base_url(&server.url());
        let target = SheetTarget {
            spreadsheet_id: "sheet-1".to_owned(),
            worksheet: "RECORDING".to_owned(),
            credentials_file: creds.clone(),
        };

        let sheet = client.fetch(&target).await.unwrap();
        values.assert_async().await;

        assert_eq!(sheet.title, "RECORDING");
        assert_eq!(sheet.values.len(), 3);
        assert_eq!(sheet.values[2][1], "7");

        let _ = std::fs::remove_file(creds);
    }

    #[tokio::test]
    async fn empty_range_yields_no_rows() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token": "t"}"#)
            .create_async()
            .await;
        server
            .mock("GET", mockito::Matcher::Regex(r"^/v4/.*$".to_owned()))
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"range": "RECORDING!A1:Z1000", "majorDimension": "ROWS"}"#)
            .create_async()
            .await;

        let creds = write_authorized_user(&format!("{}/token", server.url()));
        let client = GoogleSheetsClient::new().unwrap().with_base_url(&server.url());
        let target = SheetTarget {
            spreadsheet_id: "sheet-1".to_owned(),
            worksheet: "RECORDING".to_owned(),
            credentials_file: creds.clone(),
        };

        let sheet = client.fetch(&target).await.unwrap();
        assert!(sheet.values.is_empty());

        let _ = std::fs::remove_file(creds);
    }

    #[tokio::test]
    async fn missing_credentials_file_is_io_error() {
        let client = GoogleSheetsClient::new().unwrap();
        let target = SheetTarget {
            spreadsheet_id: "sheet-1".to_owned(),
            worksheet: "RECORDING".to_owned(),
            credentials_file: std::env::temp_dir().join("sheet_sync_no_such_creds.json"),
        };

        assert!(matches!(client.fetch(&target).await, Err(SheetError::Io(_))));
    }
}

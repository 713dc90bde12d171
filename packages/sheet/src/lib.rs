#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Read side of the spreadsheet service.
//!
//! The sync job only ever needs one thing from the spreadsheet service: the
//! cell values of a named tab. [`WorksheetSource`] is that boundary, and
//! [`google::GoogleSheetsClient`] implements it against the Google Sheets
//! v4 REST API using a credential file.
//!
//! This crate has no awareness of the staging schema. It returns raw text
//! cells; callers normalize them however they like.

pub mod credentials;
pub mod google;

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;

/// Errors that can occur while reading a worksheet.
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    /// An HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("Sheets API returned {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated for logging.
        body: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading the credential file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Signing the service-account assertion failed.
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Which worksheet to read and how to authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetTarget {
    /// Spreadsheet identifier (the long id in the sheet URL).
    pub spreadsheet_id: String,
    /// Tab title, e.g. `RECORDING`.
    pub worksheet: String,
    /// Path of the service-account or authorized-user JSON file.
    pub credentials_file: PathBuf,
}

/// One data row keyed by lower-cased header name.
pub type SheetRecord = BTreeMap<String, String>;

/// The raw cell grid of a worksheet.
///
/// The first row is the header. Rows may be shorter than the header when
/// their trailing cells are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Worksheet {
    /// Tab title the values were read from.
    pub title: String,
    /// Cell text, row-major.
    pub values: Vec<Vec<String>>,
}

impl Worksheet {
    /// Creates a worksheet from a title and its row-major cell text.
    #[must_use]
    pub fn new(title: &str, values: Vec<Vec<String>>) -> Self {
        Self {
            title: title.to_owned(),
            values,
        }
    }

    /// Returns the normalized header row (trimmed, lower-cased).
    #[must_use]
    pub fn headers(&self) -> Vec<String> {
        self.values
            .first()
            .map(|row| row.iter().map(|h| h.trim().to_lowercase()).collect())
            .unwrap_or_default()
    }

    /// Returns every data row as a record keyed by normalized header.
    ///
    /// Blank header cells are ignored. Cells missing from short rows are
    /// filled with empty strings, and every value is trimmed.
    #[must_use]
    pub fn records(&self) -> Vec<SheetRecord> {
        let headers = self.headers();

        self.values
            .iter()
            .skip(1)
            .map(|row| {
                headers
                    .iter()
                    .enumerate()
                    .filter(|(_, header)| !header.is_empty())
                    .map(|(i, header)| {
                        let value = row.get(i).map_or("", |cell| cell.trim());
                        (header.clone(), value.to_owned())
                    })
                    .collect()
            })
            .collect()
    }
}

/// Anything that can hand back the cells of a worksheet.
#[async_trait]
pub trait WorksheetSource: Send + Sync {
    /// Returns a short name for log lines (e.g. `"google_sheets"`).
    fn name(&self) -> &str;

    /// Reads every populated row of `target`.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError`] if authentication, the request, or decoding
    /// the response fails.
    async fn fetch(&self, target: &SheetTarget) -> Result<Worksheet, SheetError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|c| (*c).to_string()).collect())
            .collect()
    }

    #[test]
    fn headers_are_trimmed_and_lowercased() {
        let sheet = Worksheet::new("RECORDING", grid(&[&[" Course ", "SUBJECT"]]));
        assert_eq!(sheet.headers(), vec!["course", "subject"]);
    }

    #[test]
    fn records_pad_short_rows() {
        let sheet = Worksheet::new(
            "RECORDING",
            grid(&[&["course", "subject", "percentage"], &["Math", " Algebra "]]),
        );

        let records = sheet.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["subject"], "Algebra");
        assert_eq!(records[0]["percentage"], "");
    }

    #[test]
    fn blank_headers_are_dropped() {
        let sheet = Worksheet::new("RECORDING", grid(&[&["course", "", "subject"], &["a", "x", "b"]]));

        let records = sheet.records();
        assert_eq!(records[0].len(), 2);
        assert!(!records[0].contains_key(""));
    }

    #[test]
    fn empty_and_header_only_sheets_have_no_records() {
        assert!(Worksheet::default().records().is_empty());
        assert!(Worksheet::default().headers().is_empty());

        let header_only = Worksheet::new("RECORDING", grid(&[&["course"]]));
        assert!(header_only.records().is_empty());
    }

    #[test]
    fn interior_empty_rows_are_kept() {
        let sheet = Worksheet::new("RECORDING", grid(&[&["course"], &[], &["Math"]]));

        let records = sheet.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["course"], "");
    }
}

//! Settings resolution.
//!
//! Every logical parameter has an ordered list of setting names, newest
//! first, followed by the legacy aliases older deployments still set. The
//! first non-blank value wins.

use std::collections::BTreeMap;
use std::path::PathBuf;

use sheet_sync_sheet::SheetTarget;

use crate::SyncError;

/// Setting names for the spreadsheet identifier.
pub const SHEET_ID_SETTINGS: &[&str] = &["GOOGLE_SHEET_ID", "SHEET_ID"];

/// Setting names for the credential file path.
pub const CREDENTIALS_FILE_SETTINGS: &[&str] = &[
    "GOOGLE_CREDENTIALS_FILE",
    "GOOGLE_SA_FILE",
    "GOOGLE_APPLICATION_CREDENTIALS",
];

/// Setting names for the worksheet tab title.
pub const WORKSHEET_SETTINGS: &[&str] = &["GOOGLE_SHEET_TAB", "SHEET_TAB"];

/// Setting names for the sync database file.
pub const DATABASE_SETTINGS: &[&str] = &["SHEET_SYNC_DATABASE"];

/// Tab read when no worksheet setting is present.
pub const DEFAULT_WORKSHEET: &str = "RECORDING";

/// A source of named settings.
pub trait Settings {
    /// Returns the raw value of `name`, if set.
    fn get(&self, name: &str) -> Option<String>;
}

/// Reads settings from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSettings;

impl Settings for EnvSettings {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl Settings for BTreeMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        BTreeMap::get(self, name).cloned()
    }
}

/// Returns the first non-blank value among `candidates`, trimmed.
#[must_use]
pub fn resolve(settings: &dyn Settings, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|name| {
        settings
            .get(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    })
}

/// Connection parameters for one invocation of the sync job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Spreadsheet identifier, if configured.
    pub spreadsheet_id: Option<String>,
    /// Credential file path, if configured.
    pub credentials_file: Option<PathBuf>,
    /// Worksheet tab title.
    pub worksheet: String,
    /// Path of the `DuckDB` file holding runs and staging rows.
    pub database_path: PathBuf,
}

impl SyncConfig {
    /// Resolves every parameter from `settings`.
    ///
    /// Required parameters stay `None` when unset; [`Self::sheet_target`]
    /// reports them so the failure lands in the run record.
    #[must_use]
    pub fn from_settings(settings: &dyn Settings) -> Self {
        Self {
            spreadsheet_id: resolve(settings, SHEET_ID_SETTINGS),
            credentials_file: resolve(settings, CREDENTIALS_FILE_SETTINGS).map(PathBuf::from),
            worksheet: resolve(settings, WORKSHEET_SETTINGS)
                .unwrap_or_else(|| DEFAULT_WORKSHEET.to_owned()),
            database_path: resolve(settings, DATABASE_SETTINGS)
                .map_or_else(sheet_sync_database::paths::sync_db_path, PathBuf::from),
        }
    }

    /// Resolves every parameter from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_settings(&EnvSettings)
    }

    /// Returns the worksheet to read.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MissingConfiguration`] if the spreadsheet id or
    /// credential path is unset.
    pub fn sheet_target(&self) -> Result<SheetTarget, SyncError> {
        let spreadsheet_id =
            self.spreadsheet_id
                .clone()
                .ok_or(SyncError::MissingConfiguration {
                    parameter: "spreadsheet id",
                    candidates: SHEET_ID_SETTINGS,
                })?;
        let credentials_file =
            self.credentials_file
                .clone()
                .ok_or(SyncError::MissingConfiguration {
                    parameter: "credentials file",
                    candidates: CREDENTIALS_FILE_SETTINGS,
                })?;

        Ok(SheetTarget {
            spreadsheet_id,
            worksheet: self.worksheet.clone(),
            credentials_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn first_candidate_wins() {
        let s = settings(&[("GOOGLE_SHEET_ID", "new"), ("SHEET_ID", "legacy")]);
        assert_eq!(resolve(&s, SHEET_ID_SETTINGS).as_deref(), Some("new"));
    }

    #[test]
    fn falls_back_to_legacy_alias() {
        let s = settings(&[("GOOGLE_APPLICATION_CREDENTIALS", "/etc/sa.json")]);
        assert_eq!(
            resolve(&s, CREDENTIALS_FILE_SETTINGS).as_deref(),
            Some("/etc/sa.json")
        );
    }

    #[test]
    fn blank_values_are_unset() {
        let s = settings(&[("GOOGLE_SHEET_ID", "  "), ("SHEET_ID", "legacy")]);
        assert_eq!(resolve(&s, SHEET_ID_SETTINGS).as_deref(), Some("legacy"));

        let empty = settings(&[("GOOGLE_SHEET_ID", "")]);
        assert_eq!(resolve(&empty, SHEET_ID_SETTINGS), None);
    }

    #[test]
    fn config_applies_defaults() {
        let config = SyncConfig::from_settings(&settings(&[]));
        assert_eq!(config.worksheet, DEFAULT_WORKSHEET);
        assert_eq!(
            config.database_path,
            sheet_sync_database::paths::sync_db_path()
        );
        assert!(config.spreadsheet_id.is_none());
    }

    #[test]
    fn sheet_target_reports_missing_parameter() {
        let config = SyncConfig::from_settings(&settings(&[("SHEET_ID", "abc")]));
        let err = config.sheet_target().unwrap_err();
        assert!(matches!(
            err,
            SyncError::MissingConfiguration {
                parameter: "credentials file",
                ..
            }
        ));
        assert!(err.to_string().contains("GOOGLE_SA_FILE"));
    }

    #[test]
    fn sheet_target_uses_resolved_values() {
        let config = SyncConfig::from_settings(&settings(&[
            ("SHEET_ID", "abc"),
            ("GOOGLE_SA_FILE", "/secrets/sa.json"),
            ("SHEET_TAB", "Gravações"),
        ]));

        let target = config.sheet_target().unwrap();
        assert_eq!(target.spreadsheet_id, "abc");
        assert_eq!(target.worksheet, "Gravações");
        assert_eq!(target.credentials_file, PathBuf::from("/secrets/sa.json"));
    }
}

//! Explorer configuration.
//!
//! Every field has a default, so a config file only needs the keys it changes:
//!
//! ```json
//! { "tableName": "users", "maxRows": 50, "flatten": true }
//! ```

use jsonsql_core::{InferOptions, DEFAULT_SAMPLE_SIZE, DEFAULT_TABLE_NAME};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

pub const DEFAULT_MAX_ROWS: usize = 1000;
pub const DEFAULT_QUERY: &str = "SELECT * FROM data LIMIT 10";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ExplorerConfig {
    pub table_name: String,
    /// Rows returned per query; `0` disables the cap.
    pub max_rows: usize,
    /// Flatten nested objects into dot-path columns before querying.
    pub flatten: bool,
    pub initial_query: String,
    pub sample_size: usize,
    pub detect_dates: bool,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            max_rows: DEFAULT_MAX_ROWS,
            flatten: false,
            initial_query: DEFAULT_QUERY.to_string(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            detect_dates: false,
        }
    }
}

impl ExplorerConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table_name.trim().is_empty() {
            return Err(ConfigError::Invalid("tableName must not be empty".to_string()));
        }
        if self.sample_size == 0 {
            return Err(ConfigError::Invalid("sampleSize must be positive".to_string()));
        }
        Ok(())
    }

    pub fn infer_options(&self) -> InferOptions {
        InferOptions {
            sample_size: Some(self.sample_size),
            detect_dates: self.detect_dates,
        }
    }

    /// The row cap as passed to execution (`None` when disabled).
    pub fn row_cap(&self) -> Option<usize> {
        (self.max_rows > 0).then_some(self.max_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ExplorerConfig::default();
        assert_eq!(config.table_name, "data");
        assert_eq!(config.max_rows, 1000);
        assert!(!config.flatten);
        assert_eq!(config.initial_query, "SELECT * FROM data LIMIT 10");
        assert_eq!(config.infer_options(), InferOptions::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "tableName": "users", "flatten": true, "maxRows": 0 }}"#).expect("write");

        let config = ExplorerConfig::from_json_file(file.path()).expect("load");
        assert_eq!(config.table_name, "users");
        assert!(config.flatten);
        assert_eq!(config.row_cap(), None);
        assert_eq!(config.sample_size, 100);
    }

    #[test]
    fn test_rejects_unknown_keys_and_bad_values() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "tablename": "users" }}"#).expect("write");
        assert!(matches!(
            ExplorerConfig::from_json_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));

        let config = ExplorerConfig {
            table_name: "  ".to_string(),
            ..ExplorerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = ExplorerConfig {
            sample_size: 0,
            ..ExplorerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ExplorerConfig::from_json_file(Path::new("/definitely/not/here.json"))
            .expect_err("missing");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

//! Sync session configuration.
//!
//! A [`SyncConfig`] can be built in code, loaded from YAML, or assembled from
//! CLI flags. All fields have defaults, so a YAML file only needs the keys it
//! overrides:
//!
//! ```yaml
//! page_size: 50
//! poll_interval_ms: 250
//! fields:
//!   key: name
//!   change_marker: updatedAt
//! change_predicate:
//!   type: contains
//!   field: owner
//!   needle: t
//! start_from: "2024-01-01T00:00:00Z,GE"
//! ```

pub mod duration;

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use checkpoint::Watermark;
use serde::{Deserialize, Serialize};
use sync_core::{FieldNames, Predicate};

use crate::SyncError;

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Records per batch in the bootstrap sync
    pub page_size: usize,

    /// Delay between delta passes
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,

    /// Filter applied to every source query
    pub change_predicate: Predicate,

    pub fields: FieldNames,

    /// Seed watermark; when set the bootstrap sync is skipped
    #[serde(with = "cli_watermark")]
    pub start_from: Option<Watermark>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            change_predicate: Predicate::All,
            fields: FieldNames::default(),
            start_from: None,
        }
    }
}

impl SyncConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: SyncConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.page_size == 0 {
            return Err(SyncError::invalid_config("page_size must be positive"));
        }
        if self.poll_interval.is_zero() {
            return Err(SyncError::invalid_config("poll_interval must be positive"));
        }
        if self.fields.key.is_empty() || self.fields.change_marker.is_empty() {
            return Err(SyncError::invalid_config(
                "key and change marker field names must not be empty",
            ));
        }
        if self.fields.key == self.fields.change_marker {
            return Err(SyncError::invalid_config(format!(
                "key and change marker must be different fields (both are '{}')",
                self.fields.key
            )));
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod cli_watermark {
    use checkpoint::{Checkpoint, Watermark};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(w: &Option<Watermark>, s: S) -> Result<S::Ok, S::Error> {
        match w {
            Some(w) => s.serialize_some(&w.to_cli_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Watermark>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|s| Watermark::from_cli_string(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.change_predicate, Predicate::All);
        assert_eq!(config.fields, FieldNames::default());
        assert!(config.start_from.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = SyncConfig::from_yaml(
            r#"
page_size: 2
poll_interval_ms: 250
change_predicate:
  type: contains
  field: owner
  needle: t
start_from: "2024-06-15T14:30:00Z,GE"
"#,
        )
        .unwrap();

        assert_eq!(config.page_size, 2);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.change_predicate, Predicate::contains("owner", "t"));
        assert_eq!(config.fields.key, "name");
        let start = config.start_from.unwrap();
        assert_eq!(start.last_key.as_deref(), Some("GE"));
    }

    #[test]
    fn test_from_yaml_rejects_zero_page_size() {
        let err = SyncConfig::from_yaml("page_size: 0").unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn test_validate_rejects_same_field_for_key_and_marker() {
        let config = SyncConfig {
            fields: FieldNames::new("id", "id"),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SyncError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = SyncConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "page_size: 7\nfields:\n  key: id").unwrap();

        let config = SyncConfig::from_file(file.path()).unwrap();
        assert_eq!(config.page_size, 7);
        assert_eq!(config.fields.key, "id");
        assert_eq!(config.fields.change_marker, "updatedAt");
    }

    #[test]
    fn test_from_file_missing_names_path() {
        let err = SyncConfig::from_file("/nonexistent/record-sync.yaml").unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/record-sync.yaml"));
    }
}

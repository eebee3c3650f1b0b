//! Watermark type and its CLI representation.

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sync_core::{FieldNames, Predicate, RecordIdentity};

use crate::Checkpoint;

/// Highest change position known to be fully applied, plus a tie-break key.
///
/// A watermark covers every record with `updated_at < position`, and every
/// record with `updated_at == position` whose key is `<= last_key`. Without a
/// `last_key` all records at `position` are covered. The origin watermark
/// (`position == None`) covers nothing.
///
/// # CLI Format
///
/// - `origin`
/// - `2024-01-01T00:00:00Z` (everything up to and including this instant)
/// - `2024-01-01T00:00:00Z,GE` (up to this instant, ties up to key `GE`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub position: Option<DateTime<Utc>>,
    pub last_key: Option<String>,
}

impl Watermark {
    /// Watermark that covers nothing.
    pub fn origin() -> Self {
        Self::default()
    }

    /// Watermark covering every record up to and including `position`.
    pub fn at(position: DateTime<Utc>) -> Self {
        Self {
            position: Some(position),
            last_key: None,
        }
    }

    /// Watermark ending exactly at the given record.
    pub fn at_identity(identity: &RecordIdentity) -> Self {
        Self {
            position: Some(identity.updated_at),
            last_key: Some(identity.key.clone()),
        }
    }

    pub fn is_origin(&self) -> bool {
        self.position.is_none()
    }

    /// Whether a record with this identity is already applied.
    pub fn covers(&self, identity: &RecordIdentity) -> bool {
        let Some(position) = self.position else {
            return false;
        };
        if identity.updated_at != position {
            return identity.updated_at < position;
        }
        match &self.last_key {
            Some(last_key) => identity.key.as_str() <= last_key.as_str(),
            None => true,
        }
    }

    /// Returns the later of `self` and the watermark ending at `identity`.
    ///
    /// Never moves backwards, so folding any sequence of identities through
    /// this yields a non-decreasing position.
    pub fn advanced_to(&self, identity: &RecordIdentity) -> Watermark {
        if self.covers(identity) {
            self.clone()
        } else {
            Self::at_identity(identity)
        }
    }

    /// Store predicate selecting records not yet covered by this watermark.
    pub fn changed_since(&self, fields: &FieldNames) -> Predicate {
        match self.position {
            None => Predicate::All,
            Some(position) => Predicate::ChangedSince {
                fields: fields.clone(),
                position,
                last_key: self.last_key.clone(),
            },
        }
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_cli_string())
    }
}

/// Shortest RFC 3339 form that keeps every digit of the position, so a
/// watermark survives a round trip through the CLI unchanged.
fn cli_position(position: &DateTime<Utc>) -> String {
    position.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl Checkpoint for Watermark {
    const KIND: &'static str = "watermark";

    fn to_cli_string(&self) -> String {
        match (&self.position, &self.last_key) {
            (None, _) => "origin".to_string(),
            (Some(position), None) => cli_position(position),
            (Some(position), Some(key)) => format!("{},{key}", cli_position(position)),
        }
    }

    fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "origin" {
            return Ok(Self::origin());
        }

        let (position, last_key) = match s.split_once(',') {
            Some((position, key)) if !key.is_empty() => (position, Some(key.to_string())),
            Some((position, _)) => (position, None),
            None => (s, None),
        };

        let position = DateTime::parse_from_rfc3339(position)
            .with_context(|| format!("Invalid watermark position '{position}'"))?
            .with_timezone(&Utc);

        Ok(Self {
            position: Some(position),
            last_key,
        })
    }
}

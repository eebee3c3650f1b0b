//! Record filters evaluated by record stores.
//!
//! Predicates are plain data so they can be loaded from YAML configuration
//! and pushed down to a store without closures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{format_marker, FieldNames, Record};

/// A filter over records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// Matches every record
    #[default]
    All,

    /// Field equals the given JSON value
    Equals { field: String, value: Value },

    /// String field contains the given substring
    Contains { field: String, needle: String },

    /// Field is present and not null
    Exists { field: String },

    /// Record changed after a watermark position.
    ///
    /// Matches when the change marker is strictly greater than `position`, or
    /// equal to it with a natural key ordered after `last_key`. Records
    /// without a valid identity never match.
    ChangedSince {
        fields: FieldNames,
        position: DateTime<Utc>,
        last_key: Option<String>,
    },

    /// Every inner predicate matches
    And { all: Vec<Predicate> },

    /// At least one inner predicate matches
    Or { any: Vec<Predicate> },
}

impl Predicate {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::Contains {
            field: field.into(),
            needle: needle.into(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists {
            field: field.into(),
        }
    }

    /// Conjunction that treats `All` as the identity element.
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::All, p) | (p, Predicate::All) => p,
            (Predicate::And { mut all }, Predicate::And { all: rest }) => {
                all.extend(rest);
                Predicate::And { all }
            }
            (Predicate::And { mut all }, p) | (p, Predicate::And { mut all }) => {
                all.push(p);
                Predicate::And { all }
            }
            (a, b) => Predicate::And { all: vec![a, b] },
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Equals { field, value } => record.get(field) == Some(value),
            Predicate::Contains { field, needle } => match record.get(field) {
                Some(Value::String(s)) => s.contains(needle.as_str()),
                _ => false,
            },
            Predicate::Exists { field } => {
                matches!(record.get(field), Some(v) if !v.is_null())
            }
            Predicate::ChangedSince {
                fields,
                position,
                last_key,
            } => match record.identity(fields) {
                Ok(identity) if identity.updated_at > *position => true,
                Ok(identity) if identity.updated_at == *position => match last_key {
                    Some(last) => identity.key.as_str() > last.as_str(),
                    None => false,
                },
                _ => false,
            },
            Predicate::And { all } => all.iter().all(|p| p.matches(record)),
            Predicate::Or { any } => any.iter().any(|p| p.matches(record)),
        }
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::All => f.write_str("all"),
            Predicate::Equals { field, value } => write!(f, "{field} = {value}"),
            Predicate::Contains { field, needle } => write!(f, "{field} contains {needle:?}"),
            Predicate::Exists { field } => write!(f, "{field} exists"),
            Predicate::ChangedSince {
                fields,
                position,
                last_key,
            } => match last_key {
                Some(key) => write!(
                    f,
                    "({}, {}) > ({}, {key:?})",
                    fields.change_marker,
                    fields.key,
                    format_marker(position)
                ),
                None => write!(f, "{} > {}", fields.change_marker, format_marker(position)),
            },
            Predicate::And { all } => write_joined(f, all, " and "),
            Predicate::Or { any } => write_joined(f, any, " or "),
        }
    }
}

fn write_joined(
    f: &mut std::fmt::Formatter<'_>,
    predicates: &[Predicate],
    separator: &str,
) -> std::fmt::Result {
    f.write_str("(")?;
    for (i, p) in predicates.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{p}")?;
    }
    f.write_str(")")
}

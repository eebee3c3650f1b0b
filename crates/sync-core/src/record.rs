//! Record representation shared by stores, sinks and strategies.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::RecordError;

/// Names of the two mandatory record fields.
///
/// Source and target stores must agree on these; the natural key is used for
/// upsert matching and the change marker for delta detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    /// Field holding the natural key (default: `name`)
    pub key: String,
    /// Field holding the last-modified marker (default: `updatedAt`)
    pub change_marker: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            key: "name".to_string(),
            change_marker: "updatedAt".to_string(),
        }
    }
}

impl FieldNames {
    pub fn new(key: impl Into<String>, change_marker: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            change_marker: change_marker.into(),
        }
    }
}

/// Validated identity of a record.
///
/// Identities order by `(updated_at, key)`, which is the order the delta
/// strategy applies records in and the order watermarks advance along.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordIdentity {
    pub updated_at: DateTime<Utc>,
    pub key: String,
}

impl RecordIdentity {
    pub fn new(key: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            updated_at,
            key: key.into(),
        }
    }
}

impl std::fmt::Display for RecordIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.key, format_marker(&self.updated_at))
    }
}

/// An opaque mapping of field name to value.
///
/// Records are compared field by field; two records with the same natural key
/// but different content are different versions of the same logical entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Build a record from a JSON document, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(RecordError::NotAnObject(other.to_string())),
        }
    }

    /// Builder-style field assignment.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Extract the natural key.
    ///
    /// Strings are used verbatim, integers by their decimal rendering.
    pub fn key(&self, names: &FieldNames) -> Result<String, RecordError> {
        match self.fields.get(&names.key) {
            None | Some(Value::Null) => Err(RecordError::MissingField {
                field: names.key.clone(),
            }),
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
            Some(other) => Err(RecordError::InvalidKey {
                field: names.key.clone(),
                value: other.to_string(),
            }),
        }
    }

    /// Extract the change marker as a UTC timestamp.
    ///
    /// Accepts RFC 3339 strings and integer milliseconds since the epoch.
    pub fn updated_at(&self, names: &FieldNames) -> Result<DateTime<Utc>, RecordError> {
        let field = &names.change_marker;
        let invalid = |value: &Value| RecordError::InvalidChangeMarker {
            field: field.clone(),
            value: value.to_string(),
        };

        match self.fields.get(field) {
            None | Some(Value::Null) => Err(RecordError::MissingField {
                field: field.clone(),
            }),
            Some(value @ Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| invalid(value)),
            Some(value @ Value::Number(n)) => n
                .as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .ok_or_else(|| invalid(value)),
            Some(other) => Err(invalid(other)),
        }
    }

    /// Extract and validate both mandatory fields.
    pub fn identity(&self, names: &FieldNames) -> Result<RecordIdentity, RecordError> {
        Ok(RecordIdentity {
            key: self.key(names)?,
            updated_at: self.updated_at(names)?,
        })
    }

    /// Overwrite the change marker with an RFC 3339 rendering of `at`.
    pub fn set_updated_at(&mut self, names: &FieldNames, at: DateTime<Utc>) {
        self.fields
            .insert(names.change_marker.clone(), Value::String(format_marker(&at)));
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_fields(fields)
    }
}

/// Render a change marker the way records store it.
///
/// Microsecond precision keeps markers produced by a monotonic clock distinct.
pub fn format_marker(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

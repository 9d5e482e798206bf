use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Fields assigned by the backend, never accepted from client input
pub const SYSTEM_FIELDS: &[&str] = &["id", "created_at", "updated_at"];

/// Errors raised when client input tries to write backend-owned data
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("System field '{0}' cannot be set via API input")]
    SystemFieldNotAllowed(String),
}

/// Reject input that carries any backend-owned field
pub fn ensure_no_system_fields(values: &Map<String, Value>) -> Result<(), RecordError> {
    match values.keys().find(|k| SYSTEM_FIELDS.contains(&k.as_str())) {
        Some(field) => Err(RecordError::SystemFieldNotAllowed(field.clone())),
        None => Ok(()),
    }
}

/// One row of a managed entity.
///
/// `id` is opaque and assigned by the backend at creation. Entity-specific
/// columns live in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn flag(&self, field: &str) -> Option<bool> {
        self.fields.get(field).and_then(Value::as_bool)
    }

    /// Value of any column, system columns included, as the backend would compare it
    pub fn column(&self, column: &str) -> Value {
        match column {
            "id" => Value::String(self.id.clone()),
            "created_at" => timestamp_value(self.created_at),
            "updated_at" => timestamp_value(self.updated_at),
            other => self.fields.get(other).cloned().unwrap_or(Value::Null),
        }
    }
}

/// Fixed-width RFC 3339 so timestamps compare correctly as strings
fn timestamp_value(ts: Option<DateTime<Utc>>) -> Value {
    ts.map(|t| Value::String(t.to_rfc3339_opts(SecondsFormat::Micros, true)))
        .unwrap_or(Value::Null)
}

/// A window of a collection plus the size of the whole filtered collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    pub records: Vec<Record>,
    pub total_count: i64,
}

fn opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unsupported id value: {}", other))),
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    let Some(raw) = raw else { return Ok(None) };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    // Columns without a time zone come back as naive timestamps in UTC
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {}: {}", raw, e)))
}

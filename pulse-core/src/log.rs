use crate::error::ValidationError;
use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One structured event reported by an agent.
///
/// Stored as-is after ingestion and never mutated. The serialized form is
/// what the store journals, what list queries return, and what live
/// observers receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Globally unique; a second insert with the same key is rejected.
    #[serde(rename = "req_id")]
    pub idempotency_key: String,

    pub timestamp: DateTime<Utc>,

    /// HTTP-style status code.
    pub status: i64,

    /// Request duration as reported by the agent.
    #[serde(rename = "took", default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,

    pub path: String,

    pub method: String,

    /// Open attribute payload; any JSON value per key.
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
}

/// Ingest wire shape: every field lenient so validation can name what's missing.
#[derive(Debug, Default, Deserialize)]
struct WireLogRecord {
    #[serde(default)]
    req_id: Option<String>,
    #[serde(default)]
    timestamp: Value,
    #[serde(default)]
    status: i64,
    #[serde(default)]
    took: Option<i64>,
    #[serde(default)]
    path: String,
    #[serde(default)]
    method: String,
    #[serde(default)]
    data: Option<Map<String, Value>>,
}

impl LogRecord {
    /// Check the required fields, in wire order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.status == 0 {
            return Err(ValidationError::StatusRequired);
        }
        if self.path.is_empty() {
            return Err(ValidationError::PathRequired);
        }
        if self.method.is_empty() {
            return Err(ValidationError::MethodRequired);
        }
        Ok(())
    }

    /// Canonicalize one JSON object into a validated record.
    ///
    /// A blank or missing `req_id` is replaced with a fresh UUID before the
    /// required-field checks run.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let wire: WireLogRecord =
            serde_json::from_value(value).map_err(|_| ValidationError::InvalidJson)?;

        let timestamp =
            timestamp::normalize(&wire.timestamp)?.ok_or(ValidationError::TimestampRequired)?;

        let idempotency_key = match wire.req_id {
            Some(key) if !key.trim().is_empty() => key,
            _ => Uuid::new_v4().to_string(),
        };

        let record = LogRecord {
            idempotency_key,
            timestamp,
            status: wire.status,
            duration: wire.took,
            path: wire.path,
            method: wire.method,
            attributes: wire.data,
        };
        record.validate()?;
        Ok(record)
    }
}

/// Parse an ingest body holding either one record or an array of records.
///
/// All-or-nothing: the first invalid record rejects the whole batch.
pub fn parse_batch(body: &[u8]) -> Result<Vec<LogRecord>, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ValidationError::EmptyBody);
    }
    let value: Value = serde_json::from_slice(body).map_err(|_| ValidationError::InvalidJson)?;
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(ValidationError::EmptyArray);
            }
            items.into_iter().map(LogRecord::from_value).collect()
        }
        obj @ Value::Object(_) => Ok(vec![LogRecord::from_value(obj)?]),
        _ => Err(ValidationError::InvalidJson),
    }
}

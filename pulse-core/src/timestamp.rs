//! Wire timestamp coercion.
//!
//! Agents send timestamps as RFC 3339 strings, decimal numeric strings, or
//! JSON numbers, in either seconds or milliseconds since the epoch. The unit
//! is guessed from the magnitude:
//!
//! | magnitude `x`            | unit          |
//! |--------------------------|---------------|
//! | `x > 1e12`               | milliseconds  |
//! | `1e9 <= x <= 1e12`       | seconds       |
//! | otherwise                | milliseconds  |
//!
//! The same rule applies whether the number arrived as JSON or as a string.
//! Values below `1e9` stay milliseconds, so `5` is 1970-01-01T00:00:00.005Z.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde_json::Value;

const MILLIS_ABOVE: i64 = 1_000_000_000_000;
const SECONDS_FROM: i64 = 1_000_000_000;

/// Interpret an epoch number by magnitude. `None` when out of chrono's range.
pub fn from_epoch_guess(x: i64) -> Option<DateTime<Utc>> {
    if x > MILLIS_ABOVE {
        DateTime::from_timestamp_millis(x)
    } else if x >= SECONDS_FROM {
        DateTime::from_timestamp(x, 0)
    } else {
        DateTime::from_timestamp_millis(x)
    }
}

/// Normalize a raw wire timestamp.
///
/// `Ok(None)` means the field was absent or `null`; the caller decides
/// whether that is an error.
pub fn normalize(raw: &Value) -> Result<Option<DateTime<Utc>>, ValidationError> {
    match raw {
        Value::Null => Ok(None),
        Value::Number(n) => {
            let x = match n.as_i64() {
                Some(i) => i,
                // Fractional or u64-sized: truncate toward zero (saturating).
                None => n.as_f64().ok_or(ValidationError::InvalidTimestamp)? as i64,
            };
            from_epoch_guess(x)
                .map(Some)
                .ok_or(ValidationError::InvalidTimestamp)
        }
        Value::String(s) => parse_str(s).map(Some),
        _ => Err(ValidationError::InvalidTimestamp),
    }
}

fn parse_str(s: &str) -> Result<DateTime<Utc>, ValidationError> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    s.parse::<i64>()
        .ok()
        .and_then(from_epoch_guess)
        .ok_or(ValidationError::InvalidTimestamp)
}

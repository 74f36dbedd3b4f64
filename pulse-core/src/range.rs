//! Read-window normalization shared by every query endpoint.

use crate::error::{RangeError, RangeField};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

/// Widest window any query may cover.
pub const MAX_WINDOW_MS: i64 = 90 * 24 * 60 * 60 * 1000;

/// Largest page any query may request.
pub const MAX_LIMIT: i64 = 1024;

pub fn max_window() -> TimeDelta {
    TimeDelta::milliseconds(MAX_WINDOW_MS)
}

/// A validated, clamped read window. `from <= to` and `to - from <= 90d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// `None` means "unbounded"; callers pick their own default.
    pub limit: Option<u32>,
    pub skip: u64,
}

impl TimeRange {
    /// Page size, falling back to `default` when the client sent none.
    pub fn page_size(&self, default: u32) -> usize {
        self.limit.unwrap_or(default) as usize
    }
}

/// Normalize typed bounds against `now`.
pub fn normalize(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    limit: Option<i64>,
    skip: Option<i64>,
    now: DateTime<Utc>,
) -> Result<TimeRange, RangeError> {
    let to = to.unwrap_or(now);
    let from = match from {
        Some(from) => from,
        None => to
            .checked_sub_signed(max_window())
            .ok_or(RangeError::InvalidParameter(RangeField::To))?,
    };
    let limit = limit.map(|l| l.clamp(0, MAX_LIMIT) as u32);
    let skip = skip.map(|s| s.max(0) as u64).unwrap_or(0);

    if to < from {
        return Err(RangeError::InvalidRange);
    }
    if to - from > max_window() {
        return Err(RangeError::RangeTooLarge);
    }
    Ok(TimeRange {
        from,
        to,
        limit,
        skip,
    })
}

/// Raw query-string parameters. Bounds are epoch milliseconds.
///
/// Empty values are treated as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RangeParams {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub skip: Option<String>,
}

impl RangeParams {
    pub fn normalize(&self, now: DateTime<Utc>) -> Result<TimeRange, RangeError> {
        let from = parse_instant(self.from.as_deref(), RangeField::From)?;
        let to = parse_instant(self.to.as_deref(), RangeField::To)?;
        let limit = parse_int(self.limit.as_deref(), RangeField::Limit)?;
        let skip = parse_int(self.skip.as_deref(), RangeField::Skip)?;
        normalize(from, to, limit, skip, now)
    }
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_int(raw: Option<&str>, field: RangeField) -> Result<Option<i64>, RangeError> {
    present(raw)
        .map(|s| s.parse::<i64>().map_err(|_| RangeError::InvalidParameter(field)))
        .transpose()
}

fn parse_instant(
    raw: Option<&str>,
    field: RangeField,
) -> Result<Option<DateTime<Utc>>, RangeError> {
    parse_int(raw, field)?
        .map(|ms| DateTime::from_timestamp_millis(ms).ok_or(RangeError::InvalidParameter(field)))
        .transpose()
}

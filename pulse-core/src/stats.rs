use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status class derived from a numeric status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    Success,
    Redirect,
    ClientError,
    ServerError,
}

impl StatusClass {
    /// Classify a status. Codes outside `[200, 599]` are coerced to 0 and
    /// belong to no class.
    pub fn classify(status: i64) -> Option<Self> {
        match coerce(status) {
            200..=299 => Some(StatusClass::Success),
            300..=399 => Some(StatusClass::Redirect),
            400..=499 => Some(StatusClass::ClientError),
            500..=599 => Some(StatusClass::ServerError),
            _ => None,
        }
    }
}

fn coerce(status: i64) -> i64 {
    if (200..=599).contains(&status) { status } else { 0 }
}

/// Start of the UTC hour containing `t`.
pub fn bucket_start(t: DateTime<Utc>) -> DateTime<Utc> {
    t.duration_trunc(TimeDelta::hours(1)).unwrap_or(t)
}

/// Per-hour status-class counts.
///
/// Serialized as `{"date": <epoch ms>, "success", "redirect", "badRequest", "error"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBucket {
    #[serde(rename = "date", with = "chrono::serde::ts_milliseconds")]
    pub bucket_start: DateTime<Utc>,
    pub success: i64,
    pub redirect: i64,
    #[serde(rename = "badRequest")]
    pub client_error: i64,
    #[serde(rename = "error")]
    pub server_error: i64,
}

impl StatusBucket {
    pub fn empty(bucket_start: DateTime<Utc>) -> Self {
        Self {
            bucket_start,
            success: 0,
            redirect: 0,
            client_error: 0,
            server_error: 0,
        }
    }

    pub fn record(&mut self, status: i64) {
        match StatusClass::classify(status) {
            Some(StatusClass::Success) => self.success += 1,
            Some(StatusClass::Redirect) => self.redirect += 1,
            Some(StatusClass::ClientError) => self.client_error += 1,
            Some(StatusClass::ServerError) => self.server_error += 1,
            None => {}
        }
    }
}

/// Sparse hourly accumulator: only hours that saw a record get a bucket.
#[derive(Debug, Default)]
pub struct HourlyBuckets {
    buckets: BTreeMap<DateTime<Utc>, StatusBucket>,
}

impl HourlyBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, timestamp: DateTime<Utc>, status: i64) {
        let start = bucket_start(timestamp);
        self.buckets
            .entry(start)
            .or_insert_with(|| StatusBucket::empty(start))
            .record(status);
    }

    /// Buckets ascending by start.
    pub fn into_vec(self) -> Vec<StatusBucket> {
        self.buckets.into_values().collect()
    }
}

//! Read-side derivations: hourly status stats, rolling counts and the
//! speedtest trend.

use chrono::{DateTime, TimeDelta, Utc};
use pulse_core::error::StoreOp;
use pulse_core::log::LogRecord;
use pulse_core::range::TimeRange;
use pulse_core::{PulseError, SpeedtestSample, StatusBucket, StatusClass};
use pulse_store::Store;
use serde::Serialize;
use std::sync::Arc;

/// Trailing window used for every `last` figure.
pub fn trailing_day() -> TimeDelta {
    TimeDelta::hours(24)
}

/// Window the speedtest averages are computed over.
pub fn trailing_week() -> TimeDelta {
    TimeDelta::days(7)
}

/// `{total, last}` pair. `last` always covers the trailing 24 hours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowCount {
    pub total: i64,
    pub last: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LogCounts {
    pub all: WindowCount,
    pub errors: WindowCount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrendTotal {
    /// Every stored sample.
    pub sum: i64,
    /// Samples in the trailing day.
    pub trending: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrendMetric {
    pub avg: i64,
    pub last: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SpeedtestTrend {
    pub total: TrendTotal,
    pub download: TrendMetric,
    pub upload: TrendMetric,
    pub ping: TrendMetric,
}

#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn Store>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Newest-first page of logs.
    pub async fn list_logs(
        &self,
        range: &TimeRange,
        default_limit: u32,
    ) -> Result<Vec<LogRecord>, PulseError> {
        self.store
            .find_logs(range.from, range.to, Some(range.page_size(default_limit)), range.skip)
            .await
            .map_err(|e| PulseError::store(StoreOp::Query, e))
    }

    /// Newest-first page of speedtests. `skip` does not apply here.
    pub async fn list_speedtests(
        &self,
        range: &TimeRange,
        default_limit: u32,
    ) -> Result<Vec<SpeedtestSample>, PulseError> {
        self.store
            .find_speedtests(
                Some(range.from),
                Some(range.to),
                Some(range.page_size(default_limit)),
            )
            .await
            .map_err(|e| PulseError::store(StoreOp::Query, e))
    }

    /// Hourly status-class buckets over `[from, latest log in range]`.
    ///
    /// An empty window yields an empty sequence rather than an error.
    pub async fn stats(&self, range: &TimeRange) -> Result<Vec<StatusBucket>, PulseError> {
        let latest = self
            .store
            .latest_log_timestamp(range.from, range.to)
            .await
            .map_err(|e| PulseError::store(StoreOp::Query, e))?;
        let Some(effective_to) = latest else {
            return Ok(Vec::new());
        };
        self.store
            .aggregate_hourly_status(range.from, effective_to)
            .await
            .map_err(|e| PulseError::store(StoreOp::Query, e))
    }

    /// Totals over the requested window plus trailing-day figures.
    ///
    /// The requested `limit`/`skip` shape `all.total` only.
    pub async fn counts(
        &self,
        range: &TimeRange,
        now: DateTime<Utc>,
    ) -> Result<LogCounts, PulseError> {
        let count_err = |e| PulseError::store(StoreOp::Count, e);
        let day_ago = now - trailing_day();

        let all_total = self
            .store
            .count_logs(range.from, range.to, range.limit.map(u64::from), range.skip)
            .await
            .map_err(count_err)?;
        let all_last = self
            .store
            .count_logs(day_ago, now, None, 0)
            .await
            .map_err(count_err)?;
        let errors_total = self
            .store
            .count_logs_by_class(range.from, range.to, StatusClass::ServerError)
            .await
            .map_err(count_err)?;
        let errors_last = self
            .store
            .count_logs_by_class(day_ago, now, StatusClass::ServerError)
            .await
            .map_err(count_err)?;

        Ok(LogCounts {
            all: WindowCount {
                total: all_total,
                last: all_last,
            },
            errors: WindowCount {
                total: errors_total,
                last: errors_last,
            },
        })
    }

    /// Weekly averages and latest-of-day figures for speedtests.
    ///
    /// Averages use integer division; ping latency is truncated per sample
    /// before summing. With no samples every figure is zero.
    pub async fn trend(&self, now: DateTime<Utc>) -> Result<SpeedtestTrend, PulseError> {
        let week_ago = now - trailing_week();
        let day_ago = now - trailing_day();
        let query_err = |e| PulseError::store(StoreOp::Query, e);

        let sum = self
            .store
            .count_speedtests(None, None)
            .await
            .map_err(|e| PulseError::store(StoreOp::Count, e))?;
        let trending = self
            .store
            .count_speedtests(Some(day_ago), Some(now))
            .await
            .map_err(|e| PulseError::store(StoreOp::Count, e))?;

        let week = self
            .store
            .find_speedtests(Some(week_ago), Some(now), None)
            .await
            .map_err(query_err)?;
        let latest = self
            .store
            .latest_speedtest(Some(day_ago), Some(now))
            .await
            .map_err(query_err)?;

        // Sums run in i128: bandwidths are client-supplied and may sit at the
        // i64 edges. The mean of i64 values always fits back into an i64.
        let n = week.len() as i128;
        let avg = |total: i128| if n == 0 { 0 } else { (total / n) as i64 };
        let download_sum: i128 = week.iter().map(|s| i128::from(s.download.bandwidth)).sum();
        let upload_sum: i128 = week.iter().map(|s| i128::from(s.upload.bandwidth)).sum();
        let ping_sum: i128 = week.iter().map(|s| i128::from(s.ping.latency as i64)).sum();

        let (download_last, upload_last, ping_last) = latest
            .map(|s| (s.download.bandwidth, s.upload.bandwidth, s.ping.latency as i64))
            .unwrap_or_default();

        Ok(SpeedtestTrend {
            total: TrendTotal { sum, trending },
            download: TrendMetric {
                avg: avg(download_sum),
                last: download_last,
            },
            upload: TrendMetric {
                avg: avg(upload_sum),
                last: upload_last,
            },
            ping: TrendMetric {
                avg: avg(ping_sum),
                last: ping_last,
            },
        })
    }
}

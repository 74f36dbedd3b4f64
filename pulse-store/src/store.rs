use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_core::log::LogRecord;
use pulse_core::speedtest::SpeedtestSample;
use pulse_core::stats::{StatusBucket, StatusClass};
use pulse_core::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence capability required by the ingestion and query paths.
///
/// Log bounds are inclusive on both ends. Speedtest bounds are optional;
/// `None` leaves that side open. Sequences come back newest first.
///
/// Implementations enforce uniqueness of `req_id` on logs and `result.id`
/// on speedtests and report violations as [`StoreError::DuplicateKey`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a batch. A key already stored, or repeated inside the batch,
    /// fails the call with `DuplicateKey`.
    async fn insert_logs(&self, records: &[LogRecord]) -> StoreResult<()>;

    async fn find_logs(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: Option<usize>,
        skip: u64,
    ) -> StoreResult<Vec<LogRecord>>;

    /// Count with `skip`/`limit` applied the way a paged count does:
    /// `min(max(n - skip, 0), limit)`.
    async fn count_logs(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: Option<u64>,
        skip: u64,
    ) -> StoreResult<i64>;

    async fn count_logs_by_class(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        class: StatusClass,
    ) -> StoreResult<i64>;

    async fn latest_log_timestamp(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Option<DateTime<Utc>>>;

    /// Sparse hourly status-class buckets, ascending.
    async fn aggregate_hourly_status(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<StatusBucket>>;

    async fn insert_speedtest(&self, sample: &SpeedtestSample) -> StoreResult<()>;

    async fn find_speedtests(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<SpeedtestSample>>;

    async fn count_speedtests(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> StoreResult<i64>;

    async fn latest_speedtest(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> StoreResult<Option<SpeedtestSample>>;
}

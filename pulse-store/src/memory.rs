use crate::journal::{Journal, JournalFile};
use crate::store::{Store, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_core::log::LogRecord;
use pulse_core::speedtest::SpeedtestSample;
use pulse_core::stats::{HourlyBuckets, StatusBucket, StatusClass};
use pulse_core::StoreError;
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Rows ordered by timestamp; the sequence number keeps insertion order
/// among equal timestamps.
type RowKey = (DateTime<Utc>, u64);

/// One collection: time-ordered rows plus a uniqueness index.
struct Table<V> {
    rows: BTreeMap<RowKey, V>,
    keys: HashSet<String>,
    seq: u64,
}

impl<V> Table<V> {
    fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            keys: HashSet::new(),
            seq: 0,
        }
    }

    /// Fail if any key is already stored or appears twice in `keys`.
    fn check_unique<'k>(&self, keys: impl IntoIterator<Item = &'k str>) -> StoreResult<()> {
        let mut seen = HashSet::new();
        for key in keys {
            if self.keys.contains(key) || !seen.insert(key) {
                return Err(StoreError::DuplicateKey { key: key.to_string() });
            }
        }
        Ok(())
    }

    fn push(&mut self, key: String, timestamp: DateTime<Utc>, value: V) {
        self.keys.insert(key);
        self.rows.insert((timestamp, self.seq), value);
        self.seq += 1;
    }

    /// Rows with `from <= timestamp <= to`, oldest first. Open sides when `None`.
    fn span(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> impl DoubleEndedIterator<Item = &V> {
        let valid = match (from, to) {
            (Some(f), Some(t)) => f <= t,
            _ => true,
        };
        let lo = from.map_or(Bound::Unbounded, |f| Bound::Included((f, 0u64)));
        let hi = to.map_or(Bound::Unbounded, |t| Bound::Included((t, u64::MAX)));
        valid
            .then(|| self.rows.range((lo, hi)))
            .into_iter()
            .flatten()
            .map(|(_, v)| v)
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

/// In-memory store with an optional append-only journal for durability.
///
/// Each collection sits behind its own `RwLock`. Inserts hold the write
/// lock across the uniqueness check, the journal append, and the in-memory
/// commit, so a batch is either fully visible or not at all.
pub struct MemoryStore {
    logs: RwLock<Table<LogRecord>>,
    speedtests: RwLock<Table<SpeedtestSample>>,
    journal: Option<Journal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub logs: usize,
    pub speedtests: usize,
}

impl MemoryStore {
    /// Memory-only store; contents are lost on restart.
    pub fn new() -> Self {
        Self {
            logs: RwLock::new(Table::new()),
            speedtests: RwLock::new(Table::new()),
            journal: None,
        }
    }

    /// Durable store journaling into `dir`, restoring any previous contents.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        let journal = Journal::open(dir)?;

        let mut logs = Table::new();
        let mut skipped = 0usize;
        for record in journal.replay::<LogRecord>(JournalFile::Logs)? {
            if logs.check_unique([record.idempotency_key.as_str()]).is_err() {
                skipped += 1;
                continue;
            }
            logs.push(record.idempotency_key.clone(), record.timestamp, record);
        }

        let mut speedtests = Table::new();
        for sample in journal.replay::<SpeedtestSample>(JournalFile::Speedtests)? {
            if speedtests.check_unique([sample.result.id.as_str()]).is_err() {
                skipped += 1;
                continue;
            }
            speedtests.push(sample.result.id.clone(), sample.timestamp, sample);
        }

        if skipped > 0 {
            warn!(skipped, "store: duplicate rows in journal ignored");
        }
        info!(
            logs = logs.len(),
            speedtests = speedtests.len(),
            dir = %dir.display(),
            "store: journal replayed"
        );

        Ok(Self {
            logs: RwLock::new(logs),
            speedtests: RwLock::new(speedtests),
            journal: Some(journal),
        })
    }

    pub fn is_durable(&self) -> bool {
        self.journal.is_some()
    }

    pub async fn stats(&self) -> StoreStats {
        StoreStats {
            logs: self.logs.read().await.len(),
            speedtests: self.speedtests.read().await.len(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_logs(&self, records: &[LogRecord]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut table = self.logs.write().await;
        table.check_unique(records.iter().map(|r| r.idempotency_key.as_str()))?;
        if let Some(journal) = &self.journal {
            journal.append(JournalFile::Logs, records).await?;
        }
        for r in records {
            table.push(r.idempotency_key.clone(), r.timestamp, r.clone());
        }
        debug!(count = records.len(), "store: logs inserted");
        Ok(())
    }

    async fn find_logs(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: Option<usize>,
        skip: u64,
    ) -> StoreResult<Vec<LogRecord>> {
        let table = self.logs.read().await;
        let rows = table
            .span(Some(from), Some(to))
            .rev()
            .skip(skip as usize)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(rows)
    }

    async fn count_logs(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: Option<u64>,
        skip: u64,
    ) -> StoreResult<i64> {
        let table = self.logs.read().await;
        let n = (table.span(Some(from), Some(to)).count() as u64).saturating_sub(skip);
        let n = limit.map_or(n, |l| n.min(l));
        Ok(n as i64)
    }

    async fn count_logs_by_class(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        class: StatusClass,
    ) -> StoreResult<i64> {
        let table = self.logs.read().await;
        let n = table
            .span(Some(from), Some(to))
            .filter(|r| StatusClass::classify(r.status) == Some(class))
            .count();
        Ok(n as i64)
    }

    async fn latest_log_timestamp(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Option<DateTime<Utc>>> {
        let table = self.logs.read().await;
        Ok(table.span(Some(from), Some(to)).next_back().map(|r| r.timestamp))
    }

    async fn aggregate_hourly_status(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<StatusBucket>> {
        let table = self.logs.read().await;
        let mut acc = HourlyBuckets::new();
        for r in table.span(Some(from), Some(to)) {
            acc.add(r.timestamp, r.status);
        }
        Ok(acc.into_vec())
    }

    async fn insert_speedtest(&self, sample: &SpeedtestSample) -> StoreResult<()> {
        let mut table = self.speedtests.write().await;
        table.check_unique([sample.result.id.as_str()])?;
        if let Some(journal) = &self.journal {
            journal
                .append(JournalFile::Speedtests, std::slice::from_ref(sample))
                .await?;
        }
        table.push(sample.result.id.clone(), sample.timestamp, sample.clone());
        debug!(result_id = %sample.result.id, "store: speedtest inserted");
        Ok(())
    }

    async fn find_speedtests(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<SpeedtestSample>> {
        let table = self.speedtests.read().await;
        Ok(table
            .span(from, to)
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn count_speedtests(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> StoreResult<i64> {
        let table = self.speedtests.read().await;
        Ok(table.span(from, to).count() as i64)
    }

    async fn latest_speedtest(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> StoreResult<Option<SpeedtestSample>> {
        let table = self.speedtests.read().await;
        Ok(table.span(from, to).next_back().cloned())
    }
}

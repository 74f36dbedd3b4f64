use crate::broadcast::BroadcastRegistry;
use chrono::{DateTime, Utc};
use pulse_core::error::ConflictKind;
use pulse_core::log::{self, LogRecord};
use pulse_core::{PulseError, SpeedtestSample};
use pulse_store::Store;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Write path: validate, persist, then fan out.
///
/// Records are only broadcast after the store accepted the whole batch, and
/// a broadcast failure never turns an accepted ingest into an error.
#[derive(Clone)]
pub struct IngestPipeline {
    store: Arc<dyn Store>,
    registry: Arc<BroadcastRegistry>,
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn Store>, registry: Arc<BroadcastRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &Arc<BroadcastRegistry> {
        &self.registry
    }

    /// Accept one record or a batch. Returns the accepted records in the
    /// order they were stored and published.
    pub async fn ingest_logs(&self, body: &[u8]) -> Result<Vec<LogRecord>, PulseError> {
        let batch = log::parse_batch(body)?;

        if let Err(e) = self.store.insert_logs(&batch).await {
            if e.is_duplicate() {
                debug!(error = %e, records = batch.len(), "ingest: duplicate req_id");
            } else {
                error!(error = %e, records = batch.len(), "ingest: log insert failed");
            }
            return Err(PulseError::insert(ConflictKind::Log, e));
        }

        for record in &batch {
            self.fan_out(record).await;
        }
        debug!(records = batch.len(), "ingest: logs accepted");
        Ok(batch)
    }

    /// Accept one speedtest sample. `now` becomes its `receivedAt`.
    ///
    /// Speedtests are stored but not broadcast; the live stream carries logs
    /// only.
    pub async fn ingest_speedtest(
        &self,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<SpeedtestSample, PulseError> {
        let sample = SpeedtestSample::from_json(body, now)?;

        if let Err(e) = self.store.insert_speedtest(&sample).await {
            if e.is_duplicate() {
                debug!(error = %e, result_id = %sample.result.id, "ingest: duplicate result id");
            } else {
                error!(error = %e, result_id = %sample.result.id, "ingest: speedtest insert failed");
            }
            return Err(PulseError::insert(ConflictKind::Speedtest, e));
        }
        debug!(result_id = %sample.result.id, "ingest: speedtest accepted");
        Ok(sample)
    }

    async fn fan_out(&self, record: &LogRecord) {
        match self.registry.publish(record).await {
            Ok(report) if report.evicted > 0 => {
                debug!(
                    req_id = %record.idempotency_key,
                    delivered = report.delivered,
                    evicted = report.evicted,
                    "ingest: broadcast evicted observers"
                );
            }
            Ok(_) => {}
            Err(e) => warn!(req_id = %record.idempotency_key, error = %e, "ingest: broadcast failed"),
        }
    }
}

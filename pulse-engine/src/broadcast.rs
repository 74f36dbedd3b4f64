//! Live fan-out of accepted records to connected observers.
//!
//! The registry is an explicit object built once at startup and handed to
//! both the ingestion path and the stream endpoint. Membership lives behind a
//! single async mutex that is only held for set manipulation; network writes
//! always happen outside it, each bounded by the write deadline, so one slow
//! observer cannot stall ingestion or the other observers.

use async_trait::async_trait;
use futures_util::future::join_all;
use pulse_core::config::BroadcastConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identity of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(Uuid);

impl ObserverId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// `Connected -> Disconnected`; the second state is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverState {
    Connected,
    Disconnected,
}

/// A failed delivery to one observer. Never leaves the registry.
#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("observer closed")]
    Closed,

    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport: {0}")]
    Transport(String),

    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Duplex channel the registry writes to.
#[async_trait]
pub trait Observer: Send + Sync {
    fn id(&self) -> ObserverId;

    /// Deliver one message. The registry applies the write deadline.
    async fn send(&self, payload: &str) -> Result<(), BroadcastError>;

    /// Best-effort close; must be safe to call more than once.
    async fn close(&self);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub evicted: usize,
}

pub struct BroadcastRegistry {
    observers: Mutex<HashMap<ObserverId, Arc<dyn Observer>>>,
    shut_down: AtomicBool,
    write_timeout: Duration,
    close_timeout: Duration,
}

impl BroadcastRegistry {
    pub fn new(write_timeout: Duration, close_timeout: Duration) -> Self {
        Self {
            observers: Mutex::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
            write_timeout,
            close_timeout,
        }
    }

    pub fn from_config(config: &BroadcastConfig) -> Self {
        Self::new(
            Duration::from_millis(config.write_timeout_ms),
            Duration::from_millis(config.close_timeout_ms),
        )
    }

    /// Add an observer. Returns `false` when it was already present or the
    /// registry has shut down; in the latter case the observer is closed.
    pub async fn subscribe(&self, observer: Arc<dyn Observer>) -> bool {
        let id = observer.id();
        {
            let mut set = self.observers.lock().await;
            if !self.shut_down.load(Ordering::Acquire) {
                let fresh = !set.contains_key(&id);
                if fresh {
                    set.insert(id, observer);
                }
                debug!(observer = %id, fresh, observers = set.len(), "broadcast: subscribe");
                return fresh;
            }
        }
        debug!(observer = %id, "broadcast: subscribe after shutdown, closing");
        self.close_one(observer).await;
        false
    }

    /// Remove an observer. Removing an unknown id is a no-op.
    pub async fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut set = self.observers.lock().await;
        let removed = set.remove(&id).is_some();
        if removed {
            debug!(observer = %id, observers = set.len(), "broadcast: unsubscribe");
        }
        removed
    }

    /// Serialize `record` once and write it to every current observer.
    ///
    /// Observers whose write fails or misses the deadline are removed and
    /// closed; the rest are unaffected. Only an encoding failure is returned.
    pub async fn publish<T: Serialize + ?Sized>(
        &self,
        record: &T,
    ) -> Result<PublishReport, BroadcastError> {
        let snapshot: Vec<Arc<dyn Observer>> = {
            let set = self.observers.lock().await;
            if set.is_empty() {
                return Ok(PublishReport::default());
            }
            set.values().cloned().collect()
        };

        let payload = serde_json::to_string(record)?;
        let results = join_all(snapshot.iter().map(|o| self.deliver(o.as_ref(), &payload))).await;

        let total = snapshot.len();
        let failed: Vec<Arc<dyn Observer>> = snapshot
            .into_iter()
            .zip(results)
            .filter_map(|(o, r)| match r {
                Ok(()) => None,
                Err(e) => {
                    debug!(observer = %o.id(), error = %e, "broadcast: delivery failed");
                    Some(o)
                }
            })
            .collect();

        let mut report = PublishReport {
            delivered: total - failed.len(),
            evicted: 0,
        };
        if failed.is_empty() {
            return Ok(report);
        }

        {
            let mut set = self.observers.lock().await;
            for o in &failed {
                if set.remove(&o.id()).is_some() {
                    report.evicted += 1;
                }
            }
        }
        warn!(evicted = report.evicted, "broadcast: evicted failing observers");
        join_all(failed.into_iter().map(|o| self.close_one(o))).await;
        Ok(report)
    }

    /// Close every observer and clear the set. Later publishes are no-ops
    /// and later subscribers are closed immediately.
    pub async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        let drained: Vec<Arc<dyn Observer>> = {
            let mut set = self.observers.lock().await;
            set.drain().map(|(_, o)| o).collect()
        };
        info!(observers = drained.len(), "broadcast: shutting down");
        join_all(drained.into_iter().map(|o| self.close_one(o))).await;
    }

    pub async fn len(&self) -> usize {
        self.observers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn close_timeout(&self) -> Duration {
        self.close_timeout
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    async fn deliver(&self, observer: &dyn Observer, payload: &str) -> Result<(), BroadcastError> {
        match tokio::time::timeout(self.write_timeout, observer.send(payload)).await {
            Ok(result) => result,
            Err(_) => Err(BroadcastError::Timeout(self.write_timeout)),
        }
    }

    async fn close_one(&self, observer: Arc<dyn Observer>) {
        if tokio::time::timeout(self.close_timeout, observer.close()).await.is_err() {
            debug!(observer = %observer.id(), "broadcast: close timed out");
        }
    }
}

impl Default for BroadcastRegistry {
    fn default() -> Self {
        Self::from_config(&BroadcastConfig::default())
    }
}

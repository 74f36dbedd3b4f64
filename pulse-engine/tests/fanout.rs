//! Ingest-to-stream behaviour across the store and the registry.

use async_trait::async_trait;
use pulse_engine::broadcast::BroadcastError;
use pulse_engine::{BroadcastRegistry, IngestPipeline, Observer, ObserverId};
use pulse_store::MemoryStore;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct ChannelObserver {
    id: ObserverId,
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Observer for ChannelObserver {
    fn id(&self) -> ObserverId {
        self.id
    }

    async fn send(&self, payload: &str) -> Result<(), BroadcastError> {
        self.tx
            .send(payload.to_string())
            .map_err(|_| BroadcastError::Closed)
    }

    async fn close(&self) {}
}

fn setup() -> (IngestPipeline, Arc<BroadcastRegistry>) {
    let registry = Arc::new(BroadcastRegistry::new(
        Duration::from_millis(200),
        Duration::from_millis(200),
    ));
    let pipeline = IngestPipeline::new(Arc::new(MemoryStore::new()), registry.clone());
    (pipeline, registry)
}

async fn observe(registry: &BroadcastRegistry) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    registry
        .subscribe(Arc::new(ChannelObserver {
            id: ObserverId::new(),
            tx,
        }))
        .await;
    rx
}

fn req_id(payload: &str) -> String {
    let v: Value = serde_json::from_str(payload).unwrap();
    v["req_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn batch_is_published_in_submission_order() {
    let (pipeline, registry) = setup();
    let mut rx = observe(&registry).await;

    let body = br#"[
        {"req_id": "one",   "timestamp": 1700000003000, "status": 200, "path": "/", "method": "GET"},
        {"req_id": "two",   "timestamp": 1700000001000, "status": 500, "path": "/", "method": "GET"},
        {"req_id": "three", "timestamp": 1700000002000, "status": 301, "path": "/", "method": "GET"}
    ]"#;
    pipeline.ingest_logs(body).await.unwrap();

    let got: Vec<String> = vec![
        req_id(&rx.recv().await.unwrap()),
        req_id(&rx.recv().await.unwrap()),
        req_id(&rx.recv().await.unwrap()),
    ];
    assert_eq!(got, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn rejected_ingest_publishes_nothing() {
    let (pipeline, registry) = setup();
    let mut rx = observe(&registry).await;

    let first = br#"{"req_id": "k", "timestamp": 1700000000000, "status": 200, "path": "/", "method": "GET"}"#;
    pipeline.ingest_logs(first).await.unwrap();
    assert_eq!(req_id(&rx.recv().await.unwrap()), "k");

    // Same key again: conflict, and no second broadcast.
    assert!(pipeline.ingest_logs(first).await.is_err());
    // Invalid batch: nothing stored, nothing broadcast.
    assert!(pipeline
        .ingest_logs(br#"[{"timestamp": 1700000000000, "status": 200}]"#)
        .await
        .is_err());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn ingest_succeeds_when_every_observer_is_gone() {
    let (pipeline, registry) = setup();
    let rx = observe(&registry).await;
    drop(rx);

    let body = br#"{"timestamp": 1700000000000, "status": 204, "path": "/", "method": "DELETE"}"#;
    let accepted = pipeline.ingest_logs(body).await.unwrap();
    assert_eq!(accepted.len(), 1);
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn speedtests_are_not_streamed() {
    let (pipeline, registry) = setup();
    let mut rx = observe(&registry).await;

    let body = br#"{"timestamp": 1700000000, "result": {"id": "r1"}}"#;
    pipeline
        .ingest_speedtest(body, chrono::Utc::now())
        .await
        .unwrap();
    assert!(rx.try_recv().is_err());
}

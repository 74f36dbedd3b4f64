//! Live log stream over WebSocket.
//!
//! Each upgraded socket is registered as an [`Observer`]. Inbound frames are
//! read only to notice the peer going away; their contents are ignored.

use crate::server::AppState;
use async_trait::async_trait;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use pulse_engine::broadcast::{BroadcastError, ObserverState};
use pulse_engine::{Observer, ObserverId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub async fn stream(State(state): State<Arc<AppState>>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| serve_observer(state, socket))
}

async fn serve_observer(state: Arc<AppState>, socket: WebSocket) {
    let (sink, mut inbound) = socket.split();
    let observer = Arc::new(WsObserver::new(sink));
    let id = observer.id();

    if !state.registry.subscribe(observer.clone()).await {
        return;
    }
    state.metrics.observer_connected();
    info!(observer = %id, "stream: observer connected");

    while let Some(frame) = inbound.next().await {
        match frame {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(observer = %id, error = %e, "stream: read failed");
                break;
            }
        }
    }

    state.registry.unsubscribe(id).await;
    let _ = tokio::time::timeout(state.registry.close_timeout(), observer.close()).await;
    state.metrics.observer_disconnected();
    info!(observer = %id, "stream: observer disconnected");
}

/// Write half of one upgraded socket.
pub struct WsObserver {
    id: ObserverId,
    sink: Mutex<SplitSink<WebSocket, Message>>,
    closed: AtomicBool,
}

impl WsObserver {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            id: ObserverId::new(),
            sink: Mutex::new(sink),
            closed: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ObserverState {
        if self.closed.load(Ordering::Acquire) {
            ObserverState::Disconnected
        } else {
            ObserverState::Connected
        }
    }
}

#[async_trait]
impl Observer for WsObserver {
    fn id(&self) -> ObserverId {
        self.id
    }

    async fn send(&self, payload: &str) -> Result<(), BroadcastError> {
        if self.state() == ObserverState::Disconnected {
            return Err(BroadcastError::Closed);
        }
        self.sink
            .lock()
            .await
            .send(Message::Text(payload.to_owned().into()))
            .await
            .map_err(|e| BroadcastError::Transport(e.to_string()))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut sink = self.sink.lock().await;
        let _ = sink.send(Message::Close(None)).await;
        let _ = sink.close().await;
    }
}

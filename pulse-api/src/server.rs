use crate::auth::Authenticator;
use crate::handlers;
use crate::middleware::{access_log, envelope, require_auth};
use crate::ws;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use pulse_core::config::QueryConfig;
use pulse_engine::{Aggregator, BroadcastRegistry, IngestPipeline};
use pulse_observability::MetricsCollector;
use pulse_store::Store;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared state for every handler.
pub struct AppState {
    pub pipeline: IngestPipeline,
    pub aggregator: Aggregator,
    pub registry: Arc<BroadcastRegistry>,
    pub authenticator: Arc<dyn Authenticator>,
    pub metrics: Arc<MetricsCollector>,
    pub query: QueryConfig,
    pub metrics_path: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<BroadcastRegistry>,
        authenticator: Arc<dyn Authenticator>,
        metrics: Arc<MetricsCollector>,
        query: QueryConfig,
    ) -> Self {
        Self {
            pipeline: IngestPipeline::new(store.clone(), registry.clone()),
            aggregator: Aggregator::new(store),
            registry,
            authenticator,
            metrics,
            query,
            metrics_path: "/metrics".into(),
        }
    }

    pub fn with_metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = path.into();
        self
    }
}

/// Build the full router. Exposed separately from [`serve`] so tests can
/// drive it with `oneshot`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let auth = from_fn_with_state(state.clone(), require_auth);

    let public = Router::new()
        .route("/logs", post(handlers::logs::create_logs))
        .route("/speedtest", post(handlers::speedtest::create_speedtest))
        .route("/health", get(handlers::health::health_check));

    let protected = Router::new()
        .route("/logs", get(handlers::logs::list_logs))
        .route("/logs/stats", get(handlers::logs::log_stats))
        .route("/logs/count", get(handlers::logs::log_count))
        .route("/speedtest", get(handlers::speedtest::list_speedtests))
        .route("/speedtest/trending", get(handlers::speedtest::speedtest_trend))
        // Legacy spelling still used by deployed dashboards.
        .route("/speedtest/tranding", get(handlers::speedtest::speedtest_trend))
        .route("/auth/profile", get(handlers::auth::profile))
        .route_layer(auth.clone());

    // The stream is not enveloped: the upgrade response has no body.
    let stream = Router::new()
        .route("/ws/", get(ws::stream))
        .route("/ws", get(ws::stream))
        .route_layer(auth);

    let api = public
        .merge(protected)
        .layer(from_fn(envelope))
        .merge(stream);

    Router::new()
        .nest("/api", api)
        .route(&state.metrics_path, get(metrics_handler))
        .fallback(handlers::not_found)
        .layer(from_fn_with_state(state.clone(), access_log))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve<F>(addr: &str, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Starting Pulse API server");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Pulse API server stopped");
    Ok(())
}

/// Prometheus metrics endpoint handler.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

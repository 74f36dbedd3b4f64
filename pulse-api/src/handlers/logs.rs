use crate::error::ApiError;
use crate::server::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use bytes::Bytes;
use chrono::Utc;
use pulse_core::range::RangeParams;
use pulse_core::{LogRecord, StatusBucket};
use pulse_engine::LogCounts;
use std::sync::Arc;

/// Ingest one record or a batch.
pub async fn create_logs(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<bool>), ApiError> {
    match state.pipeline.ingest_logs(&body).await {
        Ok(accepted) => {
            state.metrics.record_ingested("log", accepted.len());
            Ok((StatusCode::CREATED, Json(true)))
        }
        Err(e) => {
            state.metrics.record_rejection("log", &e.tag());
            Err(e.into())
        }
    }
}

pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<LogRecord>>, ApiError> {
    let range = params.normalize(Utc::now())?;
    let items = state
        .aggregator
        .list_logs(&range, state.query.default_page_size)
        .await?;
    Ok(Json(items))
}

pub async fn log_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<StatusBucket>>, ApiError> {
    let range = params.normalize(Utc::now())?;
    Ok(Json(state.aggregator.stats(&range).await?))
}

pub async fn log_count(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Json<LogCounts>, ApiError> {
    let now = Utc::now();
    let range = params.normalize(now)?;
    Ok(Json(state.aggregator.counts(&range, now).await?))
}

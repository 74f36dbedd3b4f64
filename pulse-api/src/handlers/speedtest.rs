use crate::error::ApiError;
use crate::server::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use bytes::Bytes;
use chrono::Utc;
use pulse_core::SpeedtestSample;
use pulse_core::range::RangeParams;
use pulse_engine::SpeedtestTrend;
use std::sync::Arc;

pub async fn create_speedtest(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<bool>), ApiError> {
    match state.pipeline.ingest_speedtest(&body, Utc::now()).await {
        Ok(_) => {
            state.metrics.record_ingested("speedtest", 1);
            Ok((StatusCode::CREATED, Json(true)))
        }
        Err(e) => {
            state.metrics.record_rejection("speedtest", &e.tag());
            Err(e.into())
        }
    }
}

pub async fn list_speedtests(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<SpeedtestSample>>, ApiError> {
    let range = params.normalize(Utc::now())?;
    let items = state
        .aggregator
        .list_speedtests(&range, state.query.speedtest_page_size)
        .await?;
    Ok(Json(items))
}

pub async fn speedtest_trend(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SpeedtestTrend>, ApiError> {
    Ok(Json(state.aggregator.trend(Utc::now()).await?))
}

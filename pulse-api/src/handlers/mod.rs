pub mod auth;
pub mod health;
pub mod logs;
pub mod speedtest;

use axum::http::{StatusCode, Uri};
use axum::response::Json;
use serde_json::{Value, json};

pub async fn not_found(uri: Uri) -> (StatusCode, Json<Value>) {
    tracing::debug!(path = %uri.path(), "no route");
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "not_found", "path": uri.path() })),
    )
}

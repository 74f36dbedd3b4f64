use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use pulse_core::PulseError;
use serde_json::json;

/// HTTP face of [`PulseError`]: `{"error": <tag>, "field"?: <name>}`.
///
/// Store detail is logged, never returned.
#[derive(Debug)]
pub struct ApiError(pub PulseError);

impl<E: Into<PulseError>> From<E> for ApiError {
    fn from(e: E) -> Self {
        ApiError(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let mut body = json!({ "error": self.0.tag() });
        if let Some(field) = self.0.field() {
            body["field"] = json!(field);
        }
        (status, Json(body)).into_response()
    }
}

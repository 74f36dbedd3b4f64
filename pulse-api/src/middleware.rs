use crate::auth::{AuthError, extract_credential};
use crate::error::ApiError;
use crate::server::AppState;
use axum::body::{Body, to_bytes};
use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use http::HeaderValue;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use pulse_core::PulseError;
use pulse_observability::AccessLogEntry;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Reject requests without a valid credential; otherwise attach the
/// [`Identity`](crate::auth::Identity) as a request extension.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let verified = match extract_credential(request.headers()) {
        Some(token) => state.authenticator.authenticate(&token),
        None => Err(AuthError::NoToken),
    };
    match verified {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(path = %request.uri().path(), reason = e.tag(), "auth: rejected");
            ApiError(PulseError::Unauthorized(e.tag())).into_response()
        }
    }
}

/// Wrap the handler's JSON body as `{req_id, timestamp, status, data}`.
///
/// A body that is not JSON is carried as a string.
pub async fn envelope(request: Request, next: Next) -> Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let timestamp = chrono::Utc::now().timestamp();

    let response = next.run(request).await;
    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, req_id = %req_id, "envelope: failed to buffer body");
            Default::default()
        }
    };

    let data = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    parts.headers.remove(CONTENT_LENGTH);
    parts.headers.remove(CONTENT_TYPE);
    if let Ok(v) = HeaderValue::from_str(&req_id) {
        parts.headers.insert(REQUEST_ID_HEADER, v);
    }
    let wrapped = json!({
        "req_id": req_id,
        "timestamp": timestamp,
        "status": parts.status.as_u16(),
        "data": data,
    });
    (parts, Json(wrapped)).into_response()
}

/// One access-log line and one metrics sample per request.
pub async fn access_log(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_owned());

    let response = next.run(request).await;

    let elapsed = started.elapsed();
    let status = response.status().as_u16();
    let request_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    AccessLogEntry::new(
        request_id,
        method.as_str(),
        &path,
        status,
        elapsed.as_secs_f64() * 1000.0,
    )
    .emit();
    state.metrics.record_request(
        method.as_str(),
        route.as_deref().unwrap_or("unmatched"),
        status,
        elapsed.as_secs_f64(),
    );
    response
}

//! Integration tests for the HTTP surface.
//!
//! Uses `tower::ServiceExt::oneshot` to call handlers without binding a real
//! TCP port. Every test gets a fresh in-memory store.

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use pulse_api::auth::Claims;
use pulse_api::{AppState, JwtAuthenticator, build_router};
use pulse_core::config::QueryConfig;
use pulse_engine::BroadcastRegistry;
use pulse_observability::MetricsCollector;
use pulse_store::MemoryStore;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // .oneshot()

const SECRET: &str = "test-secret";

// ── Helpers ───────────────────────────────────────────────────

fn make_state() -> Arc<AppState> {
    let registry = Arc::new(BroadcastRegistry::new(
        Duration::from_millis(200),
        Duration::from_millis(200),
    ));
    Arc::new(AppState::new(
        Arc::new(MemoryStore::new()),
        registry,
        Arc::new(JwtAuthenticator::new(SECRET)),
        Arc::new(MetricsCollector::new(true).unwrap()),
        QueryConfig::default(),
    ))
}

fn token() -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        id: "64b7f0c2a1b2c3d4e5f60718".into(),
        email: "ops@example.net".into(),
        iat: Some(now),
        exp: now + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_req(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn authed_get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token()))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn log_body(req_id: &str, ts_ms: i64, status: i64) -> String {
    json!({
        "req_id": req_id,
        "timestamp": ts_ms,
        "status": status,
        "path": "/checkout",
        "method": "POST",
        "took": 12
    })
    .to_string()
}

// ── Envelope & routing ────────────────────────────────────────

#[tokio::test]
async fn health_is_enveloped_with_request_id() {
    let app = build_router(make_state());
    let resp = app.oneshot(get_req("/api/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let req_id = resp
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let j = body_json(resp).await;
    assert_eq!(j["req_id"], req_id);
    assert_eq!(j["status"], 200);
    assert!(j["timestamp"].is_i64());
    assert_eq!(j["data"]["status"], "ok");
    assert_eq!(j["data"]["observers"], 0);
}

#[tokio::test]
async fn unknown_route_is_plain_404() {
    let app = build_router(make_state());
    let resp = app.oneshot(get_req("/nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let j = body_json(resp).await;
    assert_eq!(j, json!({"error": "not_found", "path": "/nope"}));
}

// ── Log ingest ────────────────────────────────────────────────

#[tokio::test]
async fn post_log_returns_201_true() {
    let app = build_router(make_state());
    let now = Utc::now().timestamp_millis();
    let resp = app
        .oneshot(post_json("/api/logs", &log_body("r-1", now, 200)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let j = body_json(resp).await;
    assert_eq!(j["status"], 201);
    assert_eq!(j["data"], true);
}

#[tokio::test]
async fn post_log_rejects_malformed_and_empty_bodies() {
    let state = make_state();

    let resp = build_router(state.clone())
        .oneshot(post_json("/api/logs", "{not json"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["data"]["error"], "invalid_json");

    let resp = build_router(state.clone())
        .oneshot(post_json("/api/logs", ""))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["data"]["error"], "empty_body");

    let resp = build_router(state)
        .oneshot(post_json("/api/logs", "[]"))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["data"]["error"], "empty_array");
}

#[tokio::test]
async fn post_log_missing_path_names_field() {
    let app = build_router(make_state());
    let body = json!({"timestamp": 1_700_000_000_000i64, "status": 200, "method": "GET"});
    let resp = app
        .oneshot(post_json("/api/logs", &body.to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let j = body_json(resp).await;
    assert_eq!(j["data"]["error"], "path_required");
    assert_eq!(j["data"]["field"], "path");
}

#[tokio::test]
async fn duplicate_req_id_returns_409() {
    let state = make_state();
    let now = Utc::now().timestamp_millis();
    let body = log_body("dup", now, 200);

    let resp = build_router(state.clone())
        .oneshot(post_json("/api/logs", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = build_router(state)
        .oneshot(post_json("/api/logs", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(resp).await["data"]["error"], "duplicate_req_id");
}

// ── Auth ──────────────────────────────────────────────────────

#[tokio::test]
async fn protected_routes_require_token() {
    let state = make_state();

    let resp = build_router(state.clone())
        .oneshot(get_req("/api/logs"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["data"]["error"], "no_token");

    let req = Request::builder()
        .uri("/api/logs/count")
        .header(header::AUTHORIZATION, "Bearer not.a.jwt")
        .body(Body::empty())
        .unwrap();
    let resp = build_router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["data"]["error"], "invalid_token");
}

#[tokio::test]
async fn profile_accepts_cookie_credential() {
    let app = build_router(make_state());
    let req = Request::builder()
        .uri("/api/auth/profile")
        .header(header::COOKIE, format!("Authorization={}", token()))
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let j = body_json(resp).await;
    assert_eq!(j["data"]["email"], "ops@example.net");
}

#[tokio::test]
async fn stream_requires_token_and_is_not_enveloped() {
    let app = build_router(make_state());
    let resp = app.oneshot(get_req("/api/ws/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let j = body_json(resp).await;
    assert_eq!(j, json!({"error": "no_token"}));
}

// ── Queries ───────────────────────────────────────────────────

#[tokio::test]
async fn list_logs_returns_newest_first() {
    let state = make_state();
    let now = Utc::now().timestamp_millis();
    for (i, key) in ["a", "b", "c"].iter().enumerate() {
        let resp = build_router(state.clone())
            .oneshot(post_json("/api/logs", &log_body(key, now - 1000 * (3 - i as i64), 200)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let resp = build_router(state)
        .oneshot(authed_get("/api/logs?limit=2"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let j = body_json(resp).await;
    let items = j["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["req_id"], "c");
    assert_eq!(items[1]["req_id"], "b");
}

#[tokio::test]
async fn list_logs_rejects_bad_range_parameters() {
    let state = make_state();

    let resp = build_router(state.clone())
        .oneshot(authed_get("/api/logs?from=yesterday"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let j = body_json(resp).await;
    assert_eq!(j["data"]["error"], "invalid_from");
    assert_eq!(j["data"]["field"], "from");

    let resp = build_router(state.clone())
        .oneshot(authed_get("/api/logs?from=2000&to=1000"))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["data"]["error"], "invalid_range");

    let ninety_one_days_ms = 91i64 * 24 * 60 * 60 * 1000;
    let resp = build_router(state)
        .oneshot(authed_get(&format!("/api/logs?from=0&to={ninety_one_days_ms}")))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["data"]["error"], "range_too_large");
}

#[tokio::test]
async fn stats_and_counts_reflect_ingested_logs() {
    let state = make_state();
    let now = Utc::now().timestamp_millis();
    let batch = json!([
        {"req_id": "s1", "timestamp": now - 60_000, "status": 200, "path": "/", "method": "GET"},
        {"req_id": "s2", "timestamp": now - 60_000, "status": 404, "path": "/", "method": "GET"},
        {"req_id": "s3", "timestamp": now - 60_000, "status": 503, "path": "/", "method": "GET"}
    ]);
    let resp = build_router(state.clone())
        .oneshot(post_json("/api/logs", &batch.to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = build_router(state.clone())
        .oneshot(authed_get("/api/logs/stats"))
        .await
        .unwrap();
    let j = body_json(resp).await;
    let buckets = j["data"].as_array().unwrap();
    let totals = buckets.iter().fold((0, 0, 0), |acc, b| {
        (
            acc.0 + b["success"].as_i64().unwrap(),
            acc.1 + b["badRequest"].as_i64().unwrap(),
            acc.2 + b["error"].as_i64().unwrap(),
        )
    });
    assert_eq!(totals, (1, 1, 1));
    assert!(buckets[0]["date"].is_i64());

    let resp = build_router(state)
        .oneshot(authed_get("/api/logs/count"))
        .await
        .unwrap();
    let j = body_json(resp).await;
    assert_eq!(
        j["data"],
        json!({"all": {"total": 3, "last": 3}, "errors": {"total": 1, "last": 1}})
    );
}

// ── Speedtest ─────────────────────────────────────────────────

#[tokio::test]
async fn speedtest_ingest_list_and_trend() {
    let state = make_state();
    let sample = json!({
        "type": "result",
        "timestamp": Utc::now().to_rfc3339(),
        "ping": {"latency": 12.8},
        "download": {"bandwidth": 1000},
        "upload": {"bandwidth": 400},
        "result": {"id": "run-1"}
    });

    let resp = build_router(state.clone())
        .oneshot(post_json("/api/speedtest", &sample.to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = build_router(state.clone())
        .oneshot(post_json("/api/speedtest", &sample.to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(resp).await["data"]["error"], "duplicate_result_id");

    let resp = build_router(state.clone())
        .oneshot(authed_get("/api/speedtest"))
        .await
        .unwrap();
    let j = body_json(resp).await;
    let items = j["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0]["receivedAt"].is_string());

    for path in ["/api/speedtest/trending", "/api/speedtest/tranding"] {
        let resp = build_router(state.clone())
            .oneshot(authed_get(path))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let j = body_json(resp).await;
        assert_eq!(j["data"]["total"], json!({"sum": 1, "trending": 1}));
        assert_eq!(j["data"]["download"], json!({"avg": 1000, "last": 1000}));
        assert_eq!(j["data"]["ping"], json!({"avg": 12, "last": 12}));
    }
}

// ── Metrics ───────────────────────────────────────────────────

#[tokio::test]
async fn metrics_endpoint_exposes_request_counters() {
    let state = make_state();
    build_router(state.clone())
        .oneshot(get_req("/api/health"))
        .await
        .unwrap();

    let resp = build_router(state)
        .oneshot(get_req("/metrics"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("pulse_http_requests_total"));
}

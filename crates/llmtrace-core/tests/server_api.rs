//! Ingestion API tests driven through the router without a socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use tower::ServiceExt;

use llmtrace::server::{create_router, AppState, MemoryTraceStore};

const API_KEY: &str = "lt-server-test";

fn router() -> axum::Router {
    let state = AppState::new(Arc::new(MemoryTraceStore::new()), [API_KEY]);
    create_router(state)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("X-API-Key", API_KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn patch_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("PATCH")
        .uri(uri)
        .header("content-type", "application/json")
        .header("X-API-Key", API_KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("X-API-Key", API_KEY)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn trace_payload(trace_id: &str) -> serde_json::Value {
    serde_json::json!({
        "trace_id": trace_id,
        "model_name": "gpt-4",
        "model_provider": "ChatOpenAI",
        "status": "running",
        "input_data": {"messages": [{"type": "human", "content": "hi"}]},
        "output_data": {},
        "start_time": "2024-05-01T12:00:00Z",
        "tags": ["env:test"],
    })
}

#[tokio::test]
async fn health_is_open() {
    let response = router()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn ingest_requires_valid_api_key() {
    let app = router();

    let missing = Request::builder()
        .method("POST")
        .uri("/api/v1/ingest/trace")
        .header("content-type", "application/json")
        .body(Body::from(trace_payload("t-1").to_string()))
        .unwrap();
    let response = app.clone().oneshot(missing).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .method("POST")
        .uri("/api/v1/ingest/trace")
        .header("content-type", "application/json")
        .header("X-API-Key", "lt-wrong")
        .body(Body::from(trace_payload("t-1").to_string()))
        .unwrap();
    let response = app.oneshot(wrong).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn ingest_then_update_then_query() {
    let app = router();

    let response = app
        .clone()
        .oneshot(post_json("/api/v1/ingest/trace", trace_payload("t-1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["trace_id"], "t-1");

    let response = app
        .clone()
        .oneshot(patch_json(
            "/api/v1/ingest/trace/t-1",
            serde_json::json!({
                "status": "success",
                "total_tokens": 15,
                "end_time": "2024-05-01T12:00:02Z",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get("/api/v1/traces/t-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let trace = body_json(response).await;
    assert_eq!(trace["status"], "success");
    assert_eq!(trace["total_tokens"], 15);
    // Latency recomputed from the parsed end_time: 12:00:00Z -> 12:00:02Z.
    assert_eq!(trace["latency_ms"], 2000);
    // Fields absent from the update are untouched.
    assert_eq!(trace["model_name"], "gpt-4");
    assert_eq!(trace["tags"][0], "env:test");
}

#[tokio::test]
async fn update_of_unknown_trace_is_404() {
    let response = router()
        .oneshot(patch_json(
            "/api/v1/ingest/trace/nope",
            serde_json::json!({"status": "success"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn batch_ingest_persists_all_traces() {
    let app = router();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/ingest/batch",
            serde_json::json!({
                "traces": [trace_payload("t-1"), trace_payload("t-2")],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["ingested"], 2);

    let response = app.oneshot(get("/api/v1/traces?limit=10")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["total"], 2);
    // Newest first.
    assert_eq!(body["traces"][0]["trace_id"], "t-2");
}

#[tokio::test]
async fn unparsable_timestamps_do_not_reject_ingest() {
    let app = router();

    let mut payload = trace_payload("t-odd");
    payload["start_time"] = serde_json::json!("not a timestamp");
    payload["end_time"] = serde_json::json!("also wrong");

    let response = app
        .clone()
        .oneshot(post_json("/api/v1/ingest/trace", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.oneshot(get("/api/v1/traces/t-odd")).await.unwrap();
    let trace = body_json(response).await;
    // Unparsable end_time stays unset; latency untouched.
    assert!(trace["end_time"].is_null());
    assert_eq!(trace["latency_ms"], 0);
}

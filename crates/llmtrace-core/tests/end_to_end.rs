//! End-to-end delivery tests against a mock ingestion server.
//!
//! The SDK's sender uses a blocking HTTP client on its own thread, so
//! these tests drive it from plain test threads and keep a runtime
//! alive only for the mock server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use llmtrace::callback::{CallbackOptions, TraceCallback};
use llmtrace::client::TracerClient;
use llmtrace::config::{InitOptions, SdkConfig};
use llmtrace::models::{ChatMessage, Generation, LlmOutput};

fn start_mock_server(rt: &tokio::runtime::Runtime) -> MockServer {
    rt.block_on(async {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/ingest/trace"))
            .and(header("X-API-Key", "lt-e2e"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        Mock::given(method("PATCH"))
            .and(path_regex(r"^/api/v1/ingest/trace/.+$"))
            .and(header("X-API-Key", "lt-e2e"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        server
    })
}

fn wait_until_drained(client: &TracerClient) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while client.pending() > 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn success_output() -> LlmOutput {
    LlmOutput {
        generations: vec![Generation {
            text: "4".to_string(),
        }],
        llm_output: Some(serde_json::json!({
            "token_usage": {
                "prompt_tokens": 10,
                "completion_tokens": 5,
                "total_tokens": 15,
            }
        })),
    }
}

#[test]
fn full_call_reaches_server_over_the_wire() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = start_mock_server(&rt);

    let config = SdkConfig::resolve(
        InitOptions::new()
            .api_key("lt-e2e")
            .endpoint(server.uri())
            .flush_interval(0.05),
    )
    .unwrap();

    let client = Arc::new(TracerClient::new(config).unwrap());
    client.start();

    let callback = TraceCallback::new(client.clone(), CallbackOptions::default(), true);
    callback.on_chat_model_start(
        &serde_json::json!({"id": ["langchain", "ChatOpenAI"]}),
        &[ChatMessage::new("human", "what is 2+2?")],
        &serde_json::json!({"model": "gpt-4"}),
    );
    callback.on_llm_end(&success_output());

    wait_until_drained(&client);
    client.shutdown();

    let requests = rt
        .block_on(server.received_requests())
        .expect("request recording enabled");
    assert_eq!(requests.len(), 2);

    let create = &requests[0];
    assert_eq!(create.method.to_string(), "POST");
    let body: serde_json::Value = serde_json::from_slice(&create.body).unwrap();
    assert_eq!(body["status"], "running");
    assert_eq!(body["model_name"], "gpt-4");
    assert_eq!(body["trace_id"].as_str().unwrap(), callback.trace_id());

    let update = &requests[1];
    assert_eq!(update.method.to_string(), "PATCH");
    assert!(update
        .url
        .path()
        .ends_with(&format!("/api/v1/ingest/trace/{}", callback.trace_id())));
    let body: serde_json::Value = serde_json::from_slice(&update.body).unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["total_tokens"], 15);
    assert!(body["latency_ms"].as_i64().unwrap() >= 0);
    // Partial update: fields not being set must be absent entirely.
    assert!(body.get("error_message").is_none());
    assert!(body.get("tool_calls").is_none());
}

#[test]
fn shutdown_against_unreachable_endpoint_completes_and_empties_queue() {
    // Nothing listens on this port; every attempt fails fast.
    let config = SdkConfig::resolve(
        InitOptions::new()
            .api_key("lt-e2e")
            .endpoint("http://127.0.0.1:9")
            .flush_interval(0.05),
    )
    .unwrap();

    let client = TracerClient::new(config).unwrap();
    client.start();

    for i in 0..5 {
        client.send_trace(llmtrace::models::TraceRecord::new(
            format!("t{i}"),
            chrono::Utc::now(),
        ));
    }

    let start = Instant::now();
    client.shutdown();

    assert!(start.elapsed() < Duration::from_secs(10));
    assert_eq!(client.pending(), 0);
}

#[test]
fn global_sdk_lifecycle_delivers_context_tagged_traces() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = start_mock_server(&rt);

    llmtrace::init(
        InitOptions::new()
            .api_key("lt-e2e")
            .endpoint(server.uri())
            .flush_interval(0.05)
            .default_tags(["env:test"]),
    );
    assert!(llmtrace::is_initialized());

    // Re-init while active is rejected, not fatal.
    llmtrace::init(InitOptions::new().api_key("lt-other"));
    assert!(llmtrace::is_initialized());

    {
        let _ctx = llmtrace::trace_context()
            .user("user-42")
            .session("session-7")
            .enter();

        let callback = llmtrace::sdk::callback().expect("sdk initialized");
        assert!(callback.is_sampled());
        callback.on_chat_model_start(
            &serde_json::json!({"id": ["ChatOpenAI"]}),
            &[ChatMessage::new("human", "hi")],
            &serde_json::json!({"model": "gpt-4"}),
        );
        callback.on_llm_end(&success_output());
    }

    llmtrace::flush();
    llmtrace::shutdown();
    assert!(!llmtrace::is_initialized());

    let requests = rt
        .block_on(server.received_requests())
        .expect("request recording enabled");
    assert_eq!(requests.len(), 2);

    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["user_id"], "user-42");
    assert_eq!(body["session_id"], "session-7");
    assert_eq!(body["tags"][0], "env:test");
}

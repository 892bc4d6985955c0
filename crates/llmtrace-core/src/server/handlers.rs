//! Ingestion and query handlers

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::store::TraceStore;
use crate::assembly::parse_timestamp;
use crate::client::API_KEY_HEADER;
use crate::models::{ToolCallRecord, TraceRecord, TraceStatus, TraceUpdate};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Trace storage backend
    pub store: Arc<dyn TraceStore>,
    /// API keys accepted on the ingestion routes
    pub api_keys: Arc<HashSet<String>>,
}

impl AppState {
    /// Build state over a store and accepted API keys
    pub fn new(
        store: Arc<dyn TraceStore>,
        api_keys: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            store,
            api_keys: Arc::new(api_keys.into_iter().map(Into::into).collect()),
        }
    }
}

type HandlerError = (StatusCode, String);

fn require_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), HandlerError> {
    let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) else {
        return Err((StatusCode::UNAUTHORIZED, "Missing API key".to_string()));
    };
    if !state.api_keys.contains(key) {
        return Err((StatusCode::FORBIDDEN, "Invalid API key".to_string()));
    }
    Ok(())
}

fn internal(e: crate::error::Error) -> HandlerError {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always "ok"
    pub status: String,
    /// Crate version
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Trace ingestion request. Timestamps arrive as ISO-ish strings and are
/// parsed tolerantly; unparsable values fall back to now / unset.
#[derive(Debug, Deserialize)]
pub struct IngestTraceRequest {
    /// Client-generated trace id
    pub trace_id: String,
    /// Enclosing trace, if any
    #[serde(default)]
    pub parent_trace_id: Option<String>,
    /// Model name
    #[serde(default = "unknown")]
    pub model_name: String,
    /// Model provider
    #[serde(default = "unknown")]
    pub model_provider: String,
    /// Lifecycle status
    #[serde(default)]
    pub status: TraceStatus,
    /// Error string for failed calls
    #[serde(default)]
    pub error_message: Option<String>,
    /// Input payload
    #[serde(default)]
    pub input_data: serde_json::Value,
    /// Output payload
    #[serde(default)]
    pub output_data: serde_json::Value,
    /// Nested tool invocations
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
    /// Prompt tokens
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Completion tokens
    #[serde(default)]
    pub completion_tokens: u32,
    /// Total tokens
    #[serde(default)]
    pub total_tokens: u32,
    /// Call start timestamp
    #[serde(default)]
    pub start_time: Option<String>,
    /// Call end timestamp
    #[serde(default)]
    pub end_time: Option<String>,
    /// Trace metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Trace tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Session correlation identifier
    #[serde(default)]
    pub session_id: Option<String>,
    /// User correlation identifier
    #[serde(default)]
    pub user_id: Option<String>,
}

fn unknown() -> String {
    "unknown".to_string()
}

impl IngestTraceRequest {
    fn into_record(self) -> TraceRecord {
        let start_time = self
            .start_time
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);

        let mut record = TraceRecord::new(self.trace_id, start_time);
        record.parent_trace_id = self.parent_trace_id;
        record.model_name = self.model_name;
        record.model_provider = self.model_provider;
        record.status = self.status;
        record.error_message = self.error_message;
        record.input_data = self.input_data;
        record.output_data = self.output_data;
        record.tool_calls = self.tool_calls;
        record.prompt_tokens = self.prompt_tokens;
        record.completion_tokens = self.completion_tokens;
        record.total_tokens = self.total_tokens;
        record.metadata = self.metadata;
        record.tags = self.tags;
        record.session_id = self.session_id;
        record.user_id = self.user_id;

        if let Some(end) = self.end_time.as_deref().and_then(parse_timestamp) {
            record.end_time = Some(end);
            record.latency_ms = record.compute_latency();
        }

        record
    }
}

/// Ingestion acknowledgement
#[derive(Serialize)]
pub struct IngestResponse {
    /// Always "ok"
    pub status: String,
    /// Trace id the acknowledgement refers to
    pub trace_id: String,
}

/// Ingest a single trace from the SDK
pub async fn ingest_trace(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<IngestTraceRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), HandlerError> {
    require_api_key(&state, &headers)?;

    let record = req.into_record();
    let trace_id = record.trace_id.clone();
    state.store.insert(record).await.map_err(internal)?;

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            status: "ok".to_string(),
            trace_id,
        }),
    ))
}

/// Batch ingestion request
#[derive(Debug, Deserialize)]
pub struct IngestBatchRequest {
    /// Traces to ingest
    pub traces: Vec<IngestTraceRequest>,
}

/// Batch ingestion acknowledgement
#[derive(Serialize)]
pub struct IngestBatchResponse {
    /// Always "ok"
    pub status: String,
    /// Number of traces persisted
    pub ingested: usize,
}

/// Ingest multiple traces in one request
pub async fn ingest_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<IngestBatchRequest>,
) -> Result<(StatusCode, Json<IngestBatchResponse>), HandlerError> {
    require_api_key(&state, &headers)?;

    let mut ingested = 0;
    for trace in req.traces {
        state
            .store
            .insert(trace.into_record())
            .await
            .map_err(internal)?;
        ingested += 1;
    }

    Ok((
        StatusCode::CREATED,
        Json(IngestBatchResponse {
            status: "ok".to_string(),
            ingested,
        }),
    ))
}

/// Partial update request; `end_time` arrives as a string
#[derive(Debug, Deserialize)]
pub struct UpdateTraceRequest {
    /// New lifecycle status
    #[serde(default)]
    pub status: Option<TraceStatus>,
    /// Error string
    #[serde(default)]
    pub error_message: Option<String>,
    /// Output payload
    #[serde(default)]
    pub output_data: Option<serde_json::Value>,
    /// Full replacement tool call sequence
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    /// Prompt tokens
    #[serde(default)]
    pub prompt_tokens: Option<u32>,
    /// Completion tokens
    #[serde(default)]
    pub completion_tokens: Option<u32>,
    /// Total tokens
    #[serde(default)]
    pub total_tokens: Option<u32>,
    /// Call end timestamp
    #[serde(default)]
    pub end_time: Option<String>,
    /// Latency in milliseconds
    #[serde(default)]
    pub latency_ms: Option<i64>,
    /// Replacement metadata
    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    /// Replacement tags
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl UpdateTraceRequest {
    fn into_update(self) -> TraceUpdate {
        TraceUpdate {
            status: self.status,
            error_message: self.error_message,
            output_data: self.output_data,
            tool_calls: self.tool_calls,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
            end_time: self.end_time.as_deref().and_then(parse_timestamp),
            latency_ms: self.latency_ms,
            metadata: self.metadata,
            tags: self.tags,
        }
    }
}

/// Apply a partial update to an existing trace. An update for an
/// unknown trace id yields 404; the SDK drops it silently.
pub async fn update_trace(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(trace_id): Path<String>,
    Json(req): Json<UpdateTraceRequest>,
) -> Result<Json<IngestResponse>, HandlerError> {
    require_api_key(&state, &headers)?;

    let found = state
        .store
        .update(&trace_id, req.into_update())
        .await
        .map_err(internal)?;

    if !found {
        return Err((StatusCode::NOT_FOUND, "Trace not found".to_string()));
    }

    Ok(Json(IngestResponse {
        status: "ok".to_string(),
        trace_id,
    }))
}

/// Query parameters for listing traces
#[derive(Debug, Deserialize)]
pub struct ListTracesQuery {
    /// Maximum number of traces to return
    pub limit: Option<usize>,
}

/// List traces response
#[derive(Serialize)]
pub struct ListTracesResponse {
    /// Traces, newest first
    pub traces: Vec<TraceRecord>,
    /// Number of traces returned
    pub total: usize,
}

/// List recently ingested traces
pub async fn list_traces(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListTracesQuery>,
) -> Result<Json<ListTracesResponse>, HandlerError> {
    require_api_key(&state, &headers)?;

    let traces = state
        .store
        .list(query.limit.unwrap_or(100))
        .await
        .map_err(internal)?;
    let total = traces.len();

    Ok(Json(ListTracesResponse { traces, total }))
}

/// Fetch one trace by id
pub async fn get_trace(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(trace_id): Path<String>,
) -> Result<Json<TraceRecord>, HandlerError> {
    require_api_key(&state, &headers)?;

    let record = state
        .store
        .get(&trace_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Trace not found".to_string()))?;

    Ok(Json(record))
}

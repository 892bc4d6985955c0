//! Trace data model

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    /// Trace is still in progress
    #[default]
    Running,
    /// Trace completed successfully
    Success,
    /// Trace ended with an error
    Error,
}

impl TraceStatus {
    /// Whether this status is terminal (no further transitions allowed)
    pub fn is_terminal(self) -> bool {
        !matches!(self, TraceStatus::Running)
    }
}

/// Status of a nested tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    /// Tool call is still in progress
    #[default]
    Running,
    /// Tool call completed successfully
    Success,
    /// Tool call failed
    Error,
}

/// A trace represents one observed model invocation, end-to-end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Opaque unique identifier, generated client-side at call start
    pub trace_id: String,

    /// Optional back-reference to an enclosing trace (grouping only)
    #[serde(default)]
    pub parent_trace_id: Option<String>,

    /// Model name, "unknown" when not resolvable
    pub model_name: String,

    /// Model provider, "unknown" when not resolvable
    pub model_provider: String,

    /// Lifecycle status
    pub status: TraceStatus,

    /// Error string captured when the call failed
    #[serde(default)]
    pub error_message: Option<String>,

    /// Structured payload captured at call start
    pub input_data: serde_json::Value,

    /// Structured payload captured at completion
    pub output_data: serde_json::Value,

    /// Completed nested tool invocations, append-only, never reordered
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,

    /// Prompt token count, populated at completion
    #[serde(default)]
    pub prompt_tokens: u32,

    /// Completion token count, populated at completion
    #[serde(default)]
    pub completion_tokens: u32,

    /// Total token count, populated at completion
    #[serde(default)]
    pub total_tokens: u32,

    /// When the call started
    pub start_time: DateTime<Utc>,

    /// When the call ended (if completed)
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,

    /// End-to-end latency in milliseconds, never negative
    #[serde(default)]
    pub latency_ms: i64,

    /// Caller metadata merged with per-call context overrides
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Tags, insertion order preserved, duplicates suppressed
    #[serde(default)]
    pub tags: Vec<String>,

    /// Optional session correlation identifier
    #[serde(default)]
    pub session_id: Option<String>,

    /// Optional user correlation identifier
    #[serde(default)]
    pub user_id: Option<String>,
}

impl TraceRecord {
    /// Create a new in-progress trace record
    pub fn new(trace_id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            trace_id: trace_id.into(),
            parent_trace_id: None,
            model_name: "unknown".to_string(),
            model_provider: "unknown".to_string(),
            status: TraceStatus::Running,
            error_message: None,
            input_data: serde_json::json!({}),
            output_data: serde_json::json!({}),
            tool_calls: Vec::new(),
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            start_time,
            end_time: None,
            latency_ms: 0,
            metadata: HashMap::new(),
            tags: Vec::new(),
            session_id: None,
            user_id: None,
        }
    }

    /// Whether the trace has reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.status.is_terminal()
    }

    /// Latency between start and end in milliseconds, clamped to zero
    /// when clock skew would produce a negative value.
    pub fn compute_latency(&self) -> i64 {
        match self.end_time {
            Some(end) => (end - self.start_time).num_milliseconds().max(0),
            None => 0,
        }
    }
}

/// A completed or failed nested tool invocation within a trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Tool name
    pub name: String,

    /// Raw tool input
    pub input: String,

    /// Tool output on success
    #[serde(default)]
    pub output: Option<String>,

    /// Error string on failure
    #[serde(default)]
    pub error: Option<String>,

    /// Outcome of the tool call
    pub status: ToolCallStatus,

    /// When the tool call started
    pub start_time: DateTime<Utc>,

    /// When the tool call ended
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

/// Partial trace update. Absent fields must not overwrite existing
/// server-side values, so every field serializes only when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceUpdate {
    /// New lifecycle status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TraceStatus>,

    /// Error string for failed calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Output payload captured at completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_data: Option<serde_json::Value>,

    /// Full updated tool call sequence (last-writer-wins; the hook is
    /// the sole writer for a given trace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,

    /// Prompt token count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,

    /// Completion token count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u32>,

    /// Total token count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,

    /// When the call ended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// End-to-end latency in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<i64>,

    /// Replacement metadata map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,

    /// Replacement tag list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// A pending delivery action owned by the delivery queue until the
/// background sender dequeues it for one transmission attempt.
#[derive(Debug, Clone)]
pub enum DeliveryAction {
    /// Create a new trace on the server
    Send(Box<TraceRecord>),
    /// Apply a partial update to an existing trace
    Update {
        /// Target trace
        trace_id: String,
        /// Fields being updated
        update: Box<TraceUpdate>,
    },
}

impl DeliveryAction {
    /// The trace this action refers to
    pub fn trace_id(&self) -> &str {
        match self {
            DeliveryAction::Send(record) => &record.trace_id,
            DeliveryAction::Update { trace_id, .. } => trace_id,
        }
    }
}

/// A role-tagged message passed to a chat model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role ("system", "human", "ai", ...)
    pub role: String,
    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Create a message
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// One generated completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    /// Generated text
    pub text: String,
}

/// Raw result of a model call as observed by the hook
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmOutput {
    /// Generated completions
    #[serde(default)]
    pub generations: Vec<Generation>,

    /// Provider-specific output map; token usage lives under "token_usage"
    #[serde(default)]
    pub llm_output: Option<serde_json::Value>,
}

/// Token usage counters extracted from a raw usage mapping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Completion tokens
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

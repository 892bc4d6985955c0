//! Event capture hook
//!
//! Translates model call lifecycle events into trace records and queues
//! them on the tracer client. One callback instance observes exactly one
//! top-level call; the sampling decision for the whole call is made once
//! at construction, so an excluded call never emits partial events.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::assembly;
use crate::client::TracerClient;
use crate::models::{
    ChatMessage, LlmOutput, ToolCallRecord, ToolCallStatus, TraceRecord, TraceStatus, TraceUpdate,
};

/// Identity and correlation fields applied to the trace a callback
/// produces.
#[derive(Debug, Clone, Default)]
pub struct CallbackOptions {
    /// Explicit trace id; generated when absent
    pub trace_id: Option<String>,
    /// Enclosing trace, for display grouping only
    pub parent_trace_id: Option<String>,
    /// Session correlation identifier
    pub session_id: Option<String>,
    /// User correlation identifier
    pub user_id: Option<String>,
    /// Metadata attached to the trace
    pub metadata: HashMap<String, serde_json::Value>,
    /// Tags attached to the trace
    pub tags: Vec<String>,
}

struct CallState {
    start_time: Option<DateTime<Utc>>,
    tool_calls: Vec<ToolCallRecord>,
    pending_tools: HashMap<Uuid, PendingTool>,
    finished: bool,
}

struct PendingTool {
    name: String,
    input: String,
    start_time: DateTime<Utc>,
}

/// Callback hook observing one model call's lifecycle
pub struct TraceCallback {
    client: Arc<TracerClient>,
    trace_id: String,
    options: CallbackOptions,
    sampled: bool,
    state: Mutex<CallState>,
}

impl TraceCallback {
    /// Create a hook for one call. When `sampled` is false every event,
    /// including tool events, is ignored.
    pub fn new(client: Arc<TracerClient>, options: CallbackOptions, sampled: bool) -> Self {
        let trace_id = options
            .trace_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self {
            client,
            trace_id,
            options,
            sampled,
            state: Mutex::new(CallState {
                start_time: None,
                tool_calls: Vec::new(),
                pending_tools: HashMap::new(),
                finished: false,
            }),
        }
    }

    /// Trace id of the observed call
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Whether this call was selected for capture
    pub fn is_sampled(&self) -> bool {
        self.sampled
    }

    /// Handle chat model call start: build the initial running trace and
    /// queue it for delivery.
    pub fn on_chat_model_start(
        &self,
        serialized: &serde_json::Value,
        messages: &[ChatMessage],
        invocation_params: &serde_json::Value,
    ) {
        let input_data = serde_json::json!({
            "messages": assembly::serialize_messages(messages),
        });
        let model_name = resolve_model_name(invocation_params, serialized);
        self.begin_trace(model_name, resolve_provider(serialized), input_data);
    }

    /// Handle completion-style (non-chat) model call start.
    pub fn on_llm_start(&self, serialized: &serde_json::Value, prompts: &[String]) {
        let input_data = serde_json::json!({ "prompts": prompts });
        let model_name = resolve_model_name(&serde_json::Value::Null, serialized);
        self.begin_trace(model_name, resolve_provider(serialized), input_data);
    }

    fn begin_trace(&self, model_name: String, model_provider: String, input_data: serde_json::Value) {
        if !self.sampled {
            return;
        }

        let start_time = Utc::now();
        {
            let mut state = self.state.lock();
            state.start_time = Some(start_time);
        }

        let mut record = TraceRecord::new(self.trace_id.clone(), start_time);
        record.parent_trace_id = self.options.parent_trace_id.clone();
        record.model_name = model_name;
        record.model_provider = model_provider;
        record.input_data = input_data;
        record.metadata = self.options.metadata.clone();
        record.tags = self.options.tags.clone();
        record.session_id = self.options.session_id.clone();
        record.user_id = self.options.user_id.clone();

        debug!(trace_id = %self.trace_id, model = %record.model_name, "call started");
        self.client.send_trace(record);
    }

    /// Handle call success: extract output and token usage, compute
    /// latency, and queue the terminal update.
    pub fn on_llm_end(&self, output: &LlmOutput) {
        let Some(start_time) = self.take_terminal() else {
            return;
        };

        let end_time = Utc::now();
        let latency_ms = (end_time - start_time).num_milliseconds().max(0);

        let generations: Vec<serde_json::Value> = output
            .generations
            .iter()
            .map(|gen| serde_json::json!({ "text": gen.text }))
            .collect();
        let output_data = serde_json::json!({ "generations": generations });

        let usage = output
            .llm_output
            .as_ref()
            .and_then(|o| o.get("token_usage"))
            .map(assembly::extract_token_usage)
            .unwrap_or_default();

        let update = TraceUpdate {
            status: Some(TraceStatus::Success),
            output_data: Some(output_data),
            prompt_tokens: Some(usage.prompt_tokens),
            completion_tokens: Some(usage.completion_tokens),
            total_tokens: Some(usage.total_tokens),
            end_time: Some(end_time),
            latency_ms: Some(latency_ms),
            ..Default::default()
        };

        debug!(trace_id = %self.trace_id, latency_ms, "call succeeded");
        self.client.update_trace(&self.trace_id, update);
    }

    /// Handle call failure: capture the error string, compute latency,
    /// and queue the terminal update.
    pub fn on_llm_error(&self, error: &str) {
        let Some(start_time) = self.take_terminal() else {
            return;
        };

        let end_time = Utc::now();
        let latency_ms = (end_time - start_time).num_milliseconds().max(0);

        let update = TraceUpdate {
            status: Some(TraceStatus::Error),
            error_message: Some(error.to_string()),
            end_time: Some(end_time),
            latency_ms: Some(latency_ms),
            ..Default::default()
        };

        debug!(trace_id = %self.trace_id, latency_ms, "call failed");
        self.client.update_trace(&self.trace_id, update);
    }

    /// Claims the terminal transition. Returns `None` when the call was
    /// never started (benign, e.g. sampling excluded the start) or has
    /// already reached a terminal state (logged anomaly).
    fn take_terminal(&self) -> Option<DateTime<Utc>> {
        if !self.sampled {
            return None;
        }
        let mut state = self.state.lock();
        let start_time = state.start_time?;
        if state.finished {
            warn!(trace_id = %self.trace_id, "duplicate terminal event for trace, ignoring");
            return None;
        }
        state.finished = true;
        Some(start_time)
    }

    /// Handle nested tool invocation start. Tracked internally by the
    /// ephemeral `run_id` until the matching end or error arrives.
    pub fn on_tool_start(&self, run_id: Uuid, name: &str, input: &str) {
        if !self.sampled {
            return;
        }
        self.state.lock().pending_tools.insert(
            run_id,
            PendingTool {
                name: name.to_string(),
                input: input.to_string(),
                start_time: Utc::now(),
            },
        );
    }

    /// Handle nested tool completion: append the finished record to the
    /// trace's tool calls and queue an update with the full sequence.
    pub fn on_tool_end(&self, run_id: Uuid, output: &str) {
        self.finish_tool(run_id, Some(output.to_string()), None, ToolCallStatus::Success);
    }

    /// Handle nested tool failure.
    pub fn on_tool_error(&self, run_id: Uuid, error: &str) {
        self.finish_tool(run_id, None, Some(error.to_string()), ToolCallStatus::Error);
    }

    fn finish_tool(
        &self,
        run_id: Uuid,
        output: Option<String>,
        error: Option<String>,
        status: ToolCallStatus,
    ) {
        if !self.sampled {
            return;
        }

        let tool_calls = {
            let mut state = self.state.lock();
            // Absent entry means a duplicate or out-of-order event.
            let Some(pending) = state.pending_tools.remove(&run_id) else {
                return;
            };
            if state.start_time.is_none() {
                return;
            }

            state.tool_calls.push(ToolCallRecord {
                name: pending.name,
                input: pending.input,
                output,
                error,
                status,
                start_time: pending.start_time,
                end_time: Some(Utc::now()),
            });
            state.tool_calls.clone()
        };

        self.client.update_trace(
            &self.trace_id,
            TraceUpdate {
                tool_calls: Some(tool_calls),
                ..Default::default()
            },
        );
    }
}

/// Resolve the model name from a prioritized list of candidate fields:
/// explicit invocation parameter, then the serialized config, then
/// "unknown".
fn resolve_model_name(invocation_params: &serde_json::Value, serialized: &serde_json::Value) -> String {
    invocation_params
        .get("model")
        .or_else(|| invocation_params.get("model_name"))
        .or_else(|| serialized.get("kwargs").and_then(|k| k.get("model_name")))
        .or_else(|| serialized.get("kwargs").and_then(|k| k.get("model")))
        .and_then(serde_json::Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}

/// Provider is the last element of the serialized id path, when present.
fn resolve_provider(serialized: &serde_json::Value) -> String {
    serialized
        .get("id")
        .and_then(serde_json::Value::as_array)
        .and_then(|parts| parts.last())
        .and_then(serde_json::Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}

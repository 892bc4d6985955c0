//! Trace persistence
//!
//! The server talks to storage through the `TraceStore` trait. The
//! in-memory implementation backs tests and single-process deployments;
//! a relational store is a deployment concern behind the same trait.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::Result;
use crate::models::{TraceRecord, TraceUpdate};

/// Storage backend for ingested traces
#[async_trait]
pub trait TraceStore: Send + Sync {
    /// Insert a trace record
    async fn insert(&self, record: TraceRecord) -> Result<()>;

    /// Apply a partial update. Returns `false` when the trace does not
    /// exist (the caller maps this to 404; the SDK does not retry).
    async fn update(&self, trace_id: &str, update: TraceUpdate) -> Result<bool>;

    /// Fetch one trace
    async fn get(&self, trace_id: &str) -> Result<Option<TraceRecord>>;

    /// List the most recently ingested traces, newest first
    async fn list(&self, limit: usize) -> Result<Vec<TraceRecord>>;
}

/// In-memory trace store
#[derive(Default)]
pub struct MemoryTraceStore {
    traces: DashMap<String, TraceRecord>,
    // Ingestion order, for newest-first listing.
    order: Mutex<Vec<String>>,
}

impl MemoryTraceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored traces
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
}

#[async_trait]
impl TraceStore for MemoryTraceStore {
    async fn insert(&self, record: TraceRecord) -> Result<()> {
        let trace_id = record.trace_id.clone();
        if self.traces.insert(trace_id.clone(), record).is_none() {
            self.order.lock().push(trace_id);
        }
        Ok(())
    }

    async fn update(&self, trace_id: &str, update: TraceUpdate) -> Result<bool> {
        let Some(mut entry) = self.traces.get_mut(trace_id) else {
            return Ok(false);
        };
        apply_update(entry.value_mut(), update);
        Ok(true)
    }

    async fn get(&self, trace_id: &str) -> Result<Option<TraceRecord>> {
        Ok(self.traces.get(trace_id).map(|entry| entry.value().clone()))
    }

    async fn list(&self, limit: usize) -> Result<Vec<TraceRecord>> {
        let order = self.order.lock();
        Ok(order
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| self.traces.get(id).map(|entry| entry.value().clone()))
            .collect())
    }
}

/// Apply only the fields present in the update; absent fields never
/// overwrite stored values.
fn apply_update(record: &mut TraceRecord, update: TraceUpdate) {
    if let Some(status) = update.status {
        record.status = status;
    }
    if let Some(error_message) = update.error_message {
        record.error_message = Some(error_message);
    }
    if let Some(output_data) = update.output_data {
        record.output_data = output_data;
    }
    if let Some(tool_calls) = update.tool_calls {
        record.tool_calls = tool_calls;
    }
    if let Some(prompt_tokens) = update.prompt_tokens {
        record.prompt_tokens = prompt_tokens;
    }
    if let Some(completion_tokens) = update.completion_tokens {
        record.completion_tokens = completion_tokens;
    }
    if let Some(total_tokens) = update.total_tokens {
        record.total_tokens = total_tokens;
    }
    if let Some(end_time) = update.end_time {
        record.end_time = Some(end_time);
        record.latency_ms = record.compute_latency();
    }
    if let Some(latency_ms) = update.latency_ms {
        record.latency_ms = latency_ms.max(0);
    }
    if let Some(metadata) = update.metadata {
        record.metadata = metadata;
    }
    if let Some(tags) = update.tags {
        record.tags = tags;
    }
}

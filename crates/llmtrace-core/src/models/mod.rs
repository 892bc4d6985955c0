//! Data models for LLMTrace

mod trace;

pub use trace::{
    ChatMessage, DeliveryAction, Generation, LlmOutput, TokenUsage, ToolCallRecord,
    ToolCallStatus, TraceRecord, TraceStatus, TraceUpdate,
};

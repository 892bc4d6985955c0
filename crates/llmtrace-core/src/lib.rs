//! # LLMTrace
//!
//! Observability SDK and ingestion server for LLM application calls.
//!
//! The SDK captures model and tool invocations through an explicit callback
//! hook, assembles canonical trace records, and delivers them to the server
//! from a dedicated background worker so the instrumented call path never
//! blocks on telemetry I/O.
//!
//! ## Architecture
//!
//! - **Context**: thread-local, scope-guarded trace metadata (user, session, tags)
//! - **Callback**: per-call hook translating lifecycle events into trace records
//! - **Client**: unbounded delivery queue drained by a single sender thread
//! - **Server**: axum ingestion API with API-key auth and a pluggable store
//!
//! ## Quick start
//!
//! ```no_run
//! llmtrace::init(llmtrace::InitOptions::new().api_key("lt-xxx"));
//!
//! // ... instrumented calls via llmtrace::instrument::Traced ...
//!
//! llmtrace::shutdown();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod assembly;
pub mod callback;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod instrument;
pub mod models;
pub mod sdk;
pub mod server;

pub use config::{InitOptions, SdkConfig};
pub use context::{trace_context, TraceContext};
pub use error::{Error, Result};
pub use sdk::{flush, init, is_initialized, shutdown};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::callback::TraceCallback;
    pub use crate::client::TracerClient;
    pub use crate::config::{InitOptions, SdkConfig};
    pub use crate::context::trace_context;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
}

//! Ingestion server
//!
//! Accepts trace-create and trace-update payloads from the SDK,
//! authenticated by an opaque API key, and persists them through a
//! pluggable trace store.

mod handlers;
mod routes;
mod store;

pub use handlers::AppState;
pub use routes::create_router;
pub use store::{MemoryTraceStore, TraceStore};

//! SDK lifecycle
//!
//! Process-wide init/shutdown for the tracer client. The global handle is
//! the single composition point; everything else receives the client
//! explicitly (or builds callbacks through [`callback`]).

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::callback::{CallbackOptions, TraceCallback};
use crate::client::TracerClient;
use crate::config::{InitOptions, SdkConfig};
use crate::context;

static CLIENT: Mutex<Option<Arc<TracerClient>>> = Mutex::new(None);

/// Initialize the SDK. Call once at application startup.
///
/// A missing API key disables tracing with a warning; it is never fatal
/// to the host application. Re-initialization while already active is
/// rejected with a warning.
pub fn init(options: InitOptions) {
    let mut client_slot = CLIENT.lock();

    if client_slot.is_some() {
        warn!("LLMTrace SDK already initialized. Call shutdown() first to reinitialize.");
        return;
    }

    let Some(config) = SdkConfig::resolve(options) else {
        return;
    };

    let endpoint = config.endpoint.clone();
    let debug_mode = config.debug;

    let client = match TracerClient::new(config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!(error = %e, "Failed to construct tracer client. Tracing disabled.");
            return;
        }
    };

    client.start();
    *client_slot = Some(client);

    if debug_mode {
        debug!("LLMTrace SDK debug mode enabled");
    }
    info!(endpoint = %endpoint, "LLMTrace SDK initialized");
}

/// Shutdown the SDK and flush pending traces. Safe to call when not
/// initialized.
pub fn shutdown() {
    let client = CLIENT.lock().take();
    if let Some(client) = client {
        debug!("Shutting down LLMTrace SDK...");
        client.shutdown();
        info!("LLMTrace SDK shutdown complete");
    }
}

/// Whether the SDK is currently initialized
pub fn is_initialized() -> bool {
    CLIENT.lock().is_some()
}

/// Synchronously deliver every queued trace action
pub fn flush() {
    if let Some(client) = client() {
        client.flush();
    }
}

/// The active tracer client, if initialized
pub fn client() -> Option<Arc<TracerClient>> {
    CLIENT.lock().clone()
}

/// Build a callback hook for one top-level call, merging configured
/// defaults with the current context and rolling the per-call sampling
/// decision. Returns `None` when the SDK is not initialized or tracing
/// is disabled.
pub fn callback() -> Option<TraceCallback> {
    let client = client()?;
    let config = client.config();
    if !config.enabled {
        return None;
    }

    let sampled = roll_sample(config.sample_rate);
    Some(TraceCallback::new(
        client.clone(),
        callback_options(config),
        sampled,
    ))
}

/// Per-call sampling decision, independent per top-level call
fn roll_sample(rate: f64) -> bool {
    rate >= 1.0 || (rate > 0.0 && rand::random::<f64>() < rate)
}

/// Merge default tags/metadata with the current context. Context wins
/// on metadata key collisions; tags keep insertion order with defaults
/// first and duplicates suppressed.
fn callback_options(config: &SdkConfig) -> CallbackOptions {
    let ctx = context::snapshot();

    let mut metadata = config.default_metadata.clone();
    metadata.extend(ctx.metadata);

    let mut tags = config.default_tags.clone();
    for tag in ctx.tags {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    CallbackOptions {
        trace_id: ctx.trace_id,
        parent_trace_id: None,
        session_id: ctx.session_id,
        user_id: ctx.user_id,
        metadata,
        tags,
    }
}

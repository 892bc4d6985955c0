//! Call-scoped trace context
//!
//! Holds user id, session id, tags, and metadata for the current logical
//! task. Storage is thread-local: concurrent threads see independent
//! contexts, and nothing leaks across requests served on different threads.
//! Inheritance into spawned tasks is explicit via [`snapshot`] + [`scope`].

use std::cell::RefCell;
use std::collections::HashMap;

use uuid::Uuid;

thread_local! {
    static CONTEXT: RefCell<ContextData> = RefCell::new(ContextData::default());
}

/// The full per-task context state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextData {
    /// Current trace id, set by an active [`TraceContext`]
    pub trace_id: Option<String>,
    /// Session correlation identifier
    pub session_id: Option<String>,
    /// User correlation identifier
    pub user_id: Option<String>,
    /// Tags, insertion order preserved
    pub tags: Vec<String>,
    /// Metadata map
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Set the user id for the current context
pub fn set_user(user_id: impl Into<String>) {
    CONTEXT.with(|c| c.borrow_mut().user_id = Some(user_id.into()));
}

/// Get the current user id
pub fn get_user() -> Option<String> {
    CONTEXT.with(|c| c.borrow().user_id.clone())
}

/// Set the session id for the current context
pub fn set_session(session_id: impl Into<String>) {
    CONTEXT.with(|c| c.borrow_mut().session_id = Some(session_id.into()));
}

/// Get the current session id
pub fn get_session() -> Option<String> {
    CONTEXT.with(|c| c.borrow().session_id.clone())
}

/// Replace the tag list for the current context
pub fn set_tags(tags: impl IntoIterator<Item = impl Into<String>>) {
    let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
    CONTEXT.with(|c| c.borrow_mut().tags = tags);
}

/// Add a single tag, suppressing duplicates
pub fn add_tag(tag: impl Into<String>) {
    let tag = tag.into();
    CONTEXT.with(|c| {
        let mut ctx = c.borrow_mut();
        if !ctx.tags.contains(&tag) {
            ctx.tags.push(tag);
        }
    });
}

/// Get the current tag list
pub fn get_tags() -> Vec<String> {
    CONTEXT.with(|c| c.borrow().tags.clone())
}

/// Replace the metadata map for the current context
pub fn set_metadata(metadata: HashMap<String, serde_json::Value>) {
    CONTEXT.with(|c| c.borrow_mut().metadata = metadata);
}

/// Add a single metadata entry
pub fn add_metadata(key: impl Into<String>, value: serde_json::Value) {
    CONTEXT.with(|c| {
        c.borrow_mut().metadata.insert(key.into(), value);
    });
}

/// Get the current metadata map
pub fn get_metadata() -> HashMap<String, serde_json::Value> {
    CONTEXT.with(|c| c.borrow().metadata.clone())
}

/// Set the current trace id
pub fn set_trace_id(trace_id: impl Into<String>) {
    CONTEXT.with(|c| c.borrow_mut().trace_id = Some(trace_id.into()));
}

/// Get the current trace id, if a trace context is active
pub fn current_trace_id() -> Option<String> {
    CONTEXT.with(|c| c.borrow().trace_id.clone())
}

/// Clear every context field
pub fn clear() {
    CONTEXT.with(|c| *c.borrow_mut() = ContextData::default());
}

/// Capture the full current context. Pass the snapshot to a spawned
/// thread or task and install it with [`scope`] to inherit the parent's
/// context at spawn time; later mutations do not cross back.
pub fn snapshot() -> ContextData {
    CONTEXT.with(|c| c.borrow().clone())
}

/// Run `f` with `ctx` installed as the current context, restoring the
/// prior context afterwards on every exit path.
pub fn scope<R>(ctx: ContextData, f: impl FnOnce() -> R) -> R {
    let _guard = SavedContext::install(ctx);
    f()
}

/// Saves the current context on construction and restores it on drop.
struct SavedContext {
    saved: Option<ContextData>,
}

impl SavedContext {
    fn install(new: ContextData) -> Self {
        let saved = CONTEXT.with(|c| std::mem::replace(&mut *c.borrow_mut(), new));
        Self { saved: Some(saved) }
    }
}

impl Drop for SavedContext {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            CONTEXT.with(|c| *c.borrow_mut() = saved);
        }
    }
}

/// Begin building a scoped trace context
pub fn trace_context() -> TraceContextBuilder {
    TraceContextBuilder::default()
}

/// Builder for [`TraceContext`] overrides
#[derive(Debug, Default)]
pub struct TraceContextBuilder {
    trace_id: Option<String>,
    user_id: Option<String>,
    session_id: Option<String>,
    tags: Option<Vec<String>>,
    metadata: Option<HashMap<String, serde_json::Value>>,
}

impl TraceContextBuilder {
    /// Use an explicit trace id instead of generating one
    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Override the user id inside the scope
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Override the session id inside the scope
    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Override the tag list inside the scope
    pub fn tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Override the metadata map inside the scope
    pub fn metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Activate the overrides. The returned guard restores the exact
    /// prior state when dropped, including on panic unwind.
    pub fn enter(self) -> TraceContext {
        let saved = snapshot();
        let trace_id = self
            .trace_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        CONTEXT.with(|c| {
            let mut ctx = c.borrow_mut();
            ctx.trace_id = Some(trace_id.clone());
            if let Some(user_id) = self.user_id {
                ctx.user_id = Some(user_id);
            }
            if let Some(session_id) = self.session_id {
                ctx.session_id = Some(session_id);
            }
            if let Some(tags) = self.tags {
                ctx.tags = tags;
            }
            if let Some(metadata) = self.metadata {
                ctx.metadata = metadata;
            }
        });

        TraceContext { saved, trace_id }
    }
}

/// Guard for a scoped trace context. Nesting is supported arbitrarily
/// deep; each guard captures exactly the fields present before it and
/// restores exactly those on exit.
#[derive(Debug)]
pub struct TraceContext {
    saved: ContextData,
    trace_id: String,
}

impl TraceContext {
    /// The trace id active inside this scope
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }
}

impl Drop for TraceContext {
    fn drop(&mut self) {
        let saved = std::mem::take(&mut self.saved);
        CONTEXT.with(|c| *c.borrow_mut() = saved);
    }
}

//! Explicit instrumentation seam
//!
//! Instead of patching a third-party library's call surface, the model
//! type implements [`LanguageModel`] and opts into capture with the
//! [`Traceable`] marker; the application author wraps instances in
//! [`Traced`] at composition time. When tracing is disabled or the call
//! is not sampled, the wrapper is a plain passthrough.

use crate::models::{ChatMessage, LlmOutput};
use crate::sdk;

/// Capability marker for call sites that may be captured. Deciding this
/// at composition time replaces runtime attribute probing.
pub trait Traceable {
    /// Model name, when the implementation knows it
    fn model_name(&self) -> Option<&str> {
        None
    }

    /// Model provider, when the implementation knows it
    fn model_provider(&self) -> Option<&str> {
        None
    }
}

/// The explicit call surface the wrapper intercepts
pub trait LanguageModel {
    /// Error type produced by the model
    type Error: std::fmt::Display;

    /// Run one chat invocation
    fn invoke(&self, messages: &[ChatMessage]) -> Result<LlmOutput, Self::Error>;

    /// Serialized model configuration, consulted for model-name
    /// resolution (`kwargs.model_name`) and provider (`id` path)
    fn serialized(&self) -> serde_json::Value {
        serde_json::json!({})
    }

    /// Per-invocation parameters, highest priority for model-name
    /// resolution (`model`, `model_name`)
    fn invocation_params(&self) -> serde_json::Value {
        serde_json::json!({})
    }
}

/// Wrapper that reports call lifecycle events for the inner model
pub struct Traced<M> {
    inner: M,
}

impl<M> Traced<M>
where
    M: LanguageModel + Traceable,
{
    /// Wrap a model for tracing
    pub fn new(inner: M) -> Self {
        Self { inner }
    }

    /// Access the wrapped model
    pub fn inner(&self) -> &M {
        &self.inner
    }

    /// Unwrap the model
    pub fn into_inner(self) -> M {
        self.inner
    }

    /// Invoke the model, reporting start and outcome to the hook.
    /// Instrumentation failures never propagate; the inner result is
    /// returned unchanged.
    pub fn invoke(&self, messages: &[ChatMessage]) -> Result<LlmOutput, M::Error> {
        let Some(callback) = sdk::callback() else {
            return self.inner.invoke(messages);
        };

        callback.on_chat_model_start(
            &self.effective_serialized(),
            messages,
            &self.effective_params(),
        );

        match self.inner.invoke(messages) {
            Ok(output) => {
                callback.on_llm_end(&output);
                Ok(output)
            }
            Err(e) => {
                callback.on_llm_error(&e.to_string());
                Err(e)
            }
        }
    }

    /// Invoke the model once per input, one trace per call
    pub fn batch(&self, batches: &[Vec<ChatMessage>]) -> Vec<Result<LlmOutput, M::Error>> {
        batches.iter().map(|messages| self.invoke(messages)).collect()
    }

    fn effective_serialized(&self) -> serde_json::Value {
        let mut serialized = self.inner.serialized();
        if let (Some(provider), Some(obj)) =
            (self.inner.model_provider(), serialized.as_object_mut())
        {
            obj.entry("id")
                .or_insert_with(|| serde_json::json!([provider]));
        }
        serialized
    }

    fn effective_params(&self) -> serde_json::Value {
        let mut params = self.inner.invocation_params();
        if let (Some(name), Some(obj)) = (self.inner.model_name(), params.as_object_mut()) {
            obj.entry("model").or_insert_with(|| serde_json::json!(name));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Generation;

    struct FakeModel {
        fail: bool,
    }

    impl Traceable for FakeModel {
        fn model_name(&self) -> Option<&str> {
            Some("fake-1")
        }

        fn model_provider(&self) -> Option<&str> {
            Some("fakeco")
        }
    }

    impl LanguageModel for FakeModel {
        type Error = String;

        fn invoke(&self, _messages: &[ChatMessage]) -> Result<LlmOutput, Self::Error> {
            if self.fail {
                Err("model unavailable".to_string())
            } else {
                Ok(LlmOutput {
                    generations: vec![Generation {
                        text: "ok".to_string(),
                    }],
                    llm_output: None,
                })
            }
        }
    }

    #[test]
    fn uninitialized_sdk_is_a_passthrough() {
        // No init() in this process/test: callback() is None.
        let model = Traced::new(FakeModel { fail: false });
        let out = model
            .invoke(&[ChatMessage::new("human", "hi")])
            .unwrap();
        assert_eq!(out.generations[0].text, "ok");

        let err = Traced::new(FakeModel { fail: true })
            .invoke(&[ChatMessage::new("human", "hi")])
            .unwrap_err();
        assert_eq!(err, "model unavailable");
    }

    #[test]
    fn marker_fills_model_identity() {
        let traced = Traced::new(FakeModel { fail: false });
        assert_eq!(traced.effective_params()["model"], "fake-1");
        assert_eq!(traced.effective_serialized()["id"][0], "fakeco");
    }
}

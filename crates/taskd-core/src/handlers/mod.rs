//! Task kind handlers -- the pluggable business logic invoked by the
//! executor once a task reaches `running`.
//!
//! Shaped after the harness/registry split this codebase uses for agent
//! adapters: a small object-safe trait plus a name-keyed registry, so new
//! kinds can be registered without touching the executor.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{ErrorClass, TaskError};

pub mod ai_summarization;
pub mod batch_processing;
pub mod image_processing;
pub mod text_processing;

/// Business logic for one task kind.
///
/// Implementors are stateless: all information comes from the payload.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// The kind string this handler is registered under.
    fn kind(&self) -> &str;

    /// Run the handler against `payload`, returning a JSON result or a
    /// classified [`TaskError`].
    async fn handle(&self, payload: &Value) -> Result<Value, TaskError>;
}

/// Raise the classified error named by a payload's `fail_mode` field, if
/// present. Every handler calls this first; it exists purely to let tests
/// and demos deterministically drive the retry/breaker/DLQ machinery
/// without relying on randomness.
fn maybe_fail(payload: &Value) -> Result<(), TaskError> {
    let Some(mode) = payload.get("fail_mode").and_then(Value::as_str) else {
        return Ok(());
    };
    let (kind, class) = match mode {
        "connection_error" => ("ConnectionError", ErrorClass::TransientNetwork),
        "timeout_error" => ("TimeoutError", ErrorClass::TransientNetwork),
        "rate_limit_error" => ("RateLimitError", ErrorClass::RateLimit),
        "database_error" => ("DatabaseError", ErrorClass::TransientStorage),
        "validation_error" => ("ValidationError", ErrorClass::Validation),
        other => (other, ErrorClass::Unknown),
    };
    Err(TaskError::new(kind, format!("simulated {mode}"), class))
}

/// A collection of registered [`TaskHandler`]s, keyed by kind name.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four built-in demo handlers, registered under their kind names.
    pub fn with_builtin_handlers() -> Self {
        let mut registry = Self::new();
        registry.register(text_processing::TextProcessingHandler);
        registry.register(ai_summarization::AiSummarizationHandler);
        registry.register(batch_processing::BatchProcessingHandler);
        registry.register(image_processing::ImageProcessingHandler);
        registry
    }

    pub fn register(&mut self, handler: impl TaskHandler + 'static) -> Option<Box<dyn TaskHandler>> {
        let kind = handler.kind().to_string();
        self.handlers.insert(kind, Box::new(handler))
    }

    pub fn get(&self, kind: &str) -> Option<&dyn TaskHandler> {
        self.handlers.get(kind).map(|h| h.as_ref())
    }

    pub fn list(&self) -> Vec<&str> {
        self.handlers.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maybe_fail_maps_known_modes() {
        let payload = serde_json::json!({"fail_mode": "timeout_error"});
        let err = maybe_fail(&payload).unwrap_err();
        assert_eq!(err.kind, "TimeoutError");
        assert_eq!(err.class, ErrorClass::TransientNetwork);
    }

    #[test]
    fn maybe_fail_is_noop_without_the_field() {
        let payload = serde_json::json!({"text": "hello"});
        assert!(maybe_fail(&payload).is_ok());
    }

    #[test]
    fn registry_has_all_builtin_kinds() {
        let registry = HandlerRegistry::with_builtin_handlers();
        let mut kinds = registry.list();
        kinds.sort();
        assert_eq!(
            kinds,
            vec![
                "ai_summarization",
                "batch_processing",
                "image_processing",
                "text_processing",
            ]
        );
    }

    #[test]
    fn registry_get_missing_returns_none() {
        let registry = HandlerRegistry::new();
        assert!(registry.get("nonexistent").is_none());
    }
}

//! `ai_summarization`: a naive truncation-based stand-in for a real
//! summarization backend over a `{text: string}` payload.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{maybe_fail, TaskHandler};
use crate::error::TaskError;

const SUMMARY_MAX_CHARS: usize = 120;

pub struct AiSummarizationHandler;

#[async_trait]
impl TaskHandler for AiSummarizationHandler {
    fn kind(&self) -> &str {
        "ai_summarization"
    }

    async fn handle(&self, payload: &Value) -> Result<Value, TaskError> {
        maybe_fail(payload)?;

        let text = payload
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| TaskError::validation("payload missing required field `text`"))?;

        let summary: String = text.chars().take(SUMMARY_MAX_CHARS).collect();
        let truncated = text.chars().count() > SUMMARY_MAX_CHARS;

        Ok(json!({
            "summary": if truncated { format!("{summary}...") } else { summary },
            "original_length": text.chars().count(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn summarizes_short_text_verbatim() {
        let h = AiSummarizationHandler;
        let result = h.handle(&json!({"text": "a short document"})).await.unwrap();
        assert_eq!(result["summary"], "a short document");
        assert_eq!(result["original_length"], 16);
    }

    #[tokio::test]
    async fn truncates_long_text_with_ellipsis() {
        let h = AiSummarizationHandler;
        let long = "x".repeat(200);
        let result = h.handle(&json!({"text": long})).await.unwrap();
        let summary = result["summary"].as_str().unwrap();
        assert!(summary.ends_with("..."));
        assert_eq!(summary.len(), SUMMARY_MAX_CHARS + 3);
    }

    #[tokio::test]
    async fn fail_mode_raises_rate_limit_error() {
        let h = AiSummarizationHandler;
        let err = h
            .handle(&json!({"text": "x", "fail_mode": "rate_limit_error"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, "RateLimitError");
    }
}

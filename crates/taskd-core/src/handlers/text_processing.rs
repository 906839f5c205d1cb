//! `text_processing`: word/char counts over a `{text: string}` payload.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{maybe_fail, TaskHandler};
use crate::error::TaskError;

pub struct TextProcessingHandler;

#[async_trait]
impl TaskHandler for TextProcessingHandler {
    fn kind(&self) -> &str {
        "text_processing"
    }

    async fn handle(&self, payload: &Value) -> Result<Value, TaskError> {
        maybe_fail(payload)?;

        let text = payload
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| TaskError::validation("payload missing required field `text`"))?;

        Ok(json!({
            "word_count": text.split_whitespace().count(),
            "char_count": text.chars().count(),
            "processed_text": text.to_uppercase(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_words_and_chars() {
        let h = TextProcessingHandler;
        let result = h
            .handle(&json!({"text": "hello there world"}))
            .await
            .unwrap();
        assert_eq!(result["word_count"], 3);
        assert_eq!(result["processed_text"], "HELLO THERE WORLD");
    }

    #[tokio::test]
    async fn missing_text_is_a_validation_error() {
        let h = TextProcessingHandler;
        let err = h.handle(&json!({})).await.unwrap_err();
        assert_eq!(err.kind, "ValidationError");
    }

    #[tokio::test]
    async fn fail_mode_raises_the_requested_error() {
        let h = TextProcessingHandler;
        let err = h
            .handle(&json!({"text": "hi", "fail_mode": "connection_error"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, "ConnectionError");
    }
}

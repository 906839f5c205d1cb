//! `image_processing`: validates a `{width, height, format}` payload shape
//! and returns simulated dimensions/metadata.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{maybe_fail, TaskHandler};
use crate::error::TaskError;

const SUPPORTED_FORMATS: &[&str] = &["jpeg", "png", "webp"];

pub struct ImageProcessingHandler;

#[async_trait]
impl TaskHandler for ImageProcessingHandler {
    fn kind(&self) -> &str {
        "image_processing"
    }

    async fn handle(&self, payload: &Value) -> Result<Value, TaskError> {
        maybe_fail(payload)?;

        let width = payload
            .get("width")
            .and_then(Value::as_u64)
            .ok_or_else(|| TaskError::validation("payload missing required field `width`"))?;
        let height = payload
            .get("height")
            .and_then(Value::as_u64)
            .ok_or_else(|| TaskError::validation("payload missing required field `height`"))?;
        let format = payload
            .get("format")
            .and_then(Value::as_str)
            .ok_or_else(|| TaskError::validation("payload missing required field `format`"))?;

        if !SUPPORTED_FORMATS.contains(&format) {
            return Err(TaskError::validation(format!("unsupported format `{format}`")));
        }

        Ok(json!({
            "resized_width": width / 2,
            "resized_height": height / 2,
            "format": format,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn halves_dimensions() {
        let h = ImageProcessingHandler;
        let result = h
            .handle(&json!({"width": 800, "height": 600, "format": "png"}))
            .await
            .unwrap();
        assert_eq!(result["resized_width"], 400);
        assert_eq!(result["resized_height"], 300);
    }

    #[tokio::test]
    async fn unsupported_format_is_a_validation_error() {
        let h = ImageProcessingHandler;
        let err = h
            .handle(&json!({"width": 10, "height": 10, "format": "bmp"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, "ValidationError");
    }

    #[tokio::test]
    async fn fail_mode_raises_the_requested_error() {
        let h = ImageProcessingHandler;
        let err = h
            .handle(&json!({"width": 10, "height": 10, "format": "png", "fail_mode": "timeout_error"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, "TimeoutError");
    }
}

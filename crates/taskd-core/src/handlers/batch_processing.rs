//! `batch_processing`: a numeric reduction over a `{items: [number]}`
//! payload.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{maybe_fail, TaskHandler};
use crate::error::TaskError;

pub struct BatchProcessingHandler;

#[async_trait]
impl TaskHandler for BatchProcessingHandler {
    fn kind(&self) -> &str {
        "batch_processing"
    }

    async fn handle(&self, payload: &Value) -> Result<Value, TaskError> {
        maybe_fail(payload)?;

        let items = payload
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| TaskError::validation("payload missing required field `items`"))?;

        let mut sum = 0.0;
        for item in items {
            let n = item
                .as_f64()
                .ok_or_else(|| TaskError::validation("`items` must contain only numbers"))?;
            sum += n;
        }

        Ok(json!({
            "count": items.len(),
            "sum": sum,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sums_and_counts_items() {
        let h = BatchProcessingHandler;
        let result = h.handle(&json!({"items": [1, 2, 3.5]})).await.unwrap();
        assert_eq!(result["count"], 3);
        assert_eq!(result["sum"], 6.5);
    }

    #[tokio::test]
    async fn non_numeric_item_is_a_validation_error() {
        let h = BatchProcessingHandler;
        let err = h
            .handle(&json!({"items": [1, "two"]}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, "ValidationError");
    }

    #[tokio::test]
    async fn fail_mode_raises_database_error() {
        let h = BatchProcessingHandler;
        let err = h
            .handle(&json!({"items": [], "fail_mode": "database_error"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, "DatabaseError");
    }
}

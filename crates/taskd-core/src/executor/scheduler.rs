//! The executor's single retry timer wheel.
//!
//! Every scheduled retry is inserted into one `tokio_util::time::DelayQueue`
//! owned by a background task, rather than spawning a detached
//! `tokio::time::sleep` per retry (Redesign Flag, see §9 of the design
//! document). This bounds task fan-out and lets shutdown drain outstanding
//! retries deterministically instead of orphaning them.

use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::time::DelayQueue;

use crate::queue::Queue;

struct PendingRetry {
    task_id: i64,
    kind: String,
    payload: Value,
}

/// Handle for scheduling retries onto the background timer wheel.
///
/// Cloning is cheap; every clone shares the same background task via the
/// channel sender.
pub struct RetryScheduler {
    tx: mpsc::UnboundedSender<(PendingRetry, Duration)>,
}

impl RetryScheduler {
    /// Spawn the background timer-wheel task and return a handle to it.
    /// The background task exits once `cancel` fires and every pending
    /// retry already due has been drained.
    pub fn spawn(queue: Arc<dyn Queue>, cancel: CancellationToken) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(PendingRetry, Duration)>();

        tokio::spawn(async move {
            let mut wheel: DelayQueue<PendingRetry> = DelayQueue::new();

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        // Drain every retry already due before exiting;
                        // anything further out is simply dropped -- it will
                        // be rediscovered via the persisted `retrying`
                        // status on the next worker start, since the task
                        // store (not the wheel) is the durable source of
                        // truth for retry state.
                        while let Some(Some(expired)) = wheel.next().now_or_never() {
                            let entry = expired.into_inner();
                            if let Err(err) = queue.enqueue(entry.task_id, &entry.kind, &entry.payload).await {
                                tracing::error!(task_id = entry.task_id, error = %err, "failed to re-enqueue retry during shutdown drain");
                            }
                        }
                        break;
                    }

                    maybe_entry = rx.recv() => {
                        match maybe_entry {
                            Some((entry, delay)) => {
                                wheel.insert(entry, delay);
                            }
                            None => break,
                        }
                    }

                    Some(expired) = wheel.next(), if !wheel.is_empty() => {
                        let entry = expired.into_inner();
                        if let Err(err) = queue.enqueue(entry.task_id, &entry.kind, &entry.payload).await {
                            tracing::error!(task_id = entry.task_id, error = %err, "failed to re-enqueue due retry");
                        }
                    }
                }
            }
        });

        Self { tx }
    }

    /// Schedule `task_id` to be re-enqueued after `delay_seconds`.
    pub fn schedule(&self, task_id: i64, kind: String, payload: Value, delay_seconds: u64) {
        let entry = PendingRetry { task_id, kind, payload };
        if self
            .tx
            .send((entry, Duration::from_secs(delay_seconds)))
            .is_err()
        {
            tracing::error!(task_id, "retry scheduler task has shut down, dropping scheduled retry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::memory::MemoryQueue;

    #[tokio::test]
    async fn scheduled_retry_is_reenqueued_after_delay() {
        let queue: Arc<dyn Queue> = Arc::new(MemoryQueue::new());
        let cancel = CancellationToken::new();
        let scheduler = RetryScheduler::spawn(queue.clone(), cancel.clone());

        scheduler.schedule(1, "text_processing".into(), serde_json::json!({}), 0);

        // Give the background task a chance to process the zero-delay entry.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.size().await.unwrap(), 1);

        cancel.cancel();
    }
}

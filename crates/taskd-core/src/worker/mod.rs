//! Worker Loop (C7): the pop-execute loop, one per process, cooperating
//! with any number of peer workers against the same queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::executor::Executor;
use crate::queue::Queue;

/// Tunables for a worker process.
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// Maximum number of cooperative jobs running at once (K).
    pub concurrency: usize,
    /// Lease duration handed to the queue on each pop.
    pub lease_ttl_seconds: i64,
    /// How long to sleep when the queue is empty.
    pub poll_interval: Duration,
    /// How long to wait for in-flight jobs to finish on shutdown before
    /// giving up and exiting anyway.
    pub shutdown_grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            lease_ttl_seconds: 300,
            poll_interval: Duration::from_millis(100),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Run the worker loop until `cancel` fires, then drain in-flight jobs
/// within `config.shutdown_grace` before returning.
///
/// Multiple workers (processes or tasks) may call this concurrently against
/// the same `queue`/`executor`; they are stateless peers.
pub async fn run_worker(
    executor: Arc<Executor>,
    queue: Arc<dyn Queue>,
    config: WorkerConfig,
    cancel: CancellationToken,
) {
    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<()>();
    let mut in_flight: usize = 0;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                // At capacity: wait for either a slot to free up or shutdown.
                tokio::select! {
                    _ = done_rx.recv() => { in_flight -= 1; continue; }
                    _ = cancel.cancelled() => break,
                }
            }
        };

        match queue.pop(config.lease_ttl_seconds).await {
            Ok(Some(envelope)) => {
                in_flight += 1;
                let executor = Arc::clone(&executor);
                let done_tx = done_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = executor.execute(envelope).await {
                        tracing::error!(error = %err, "uncaught error from executor, containing and continuing");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                    drop(permit);
                    let _ = done_tx.send(());
                });
            }
            Ok(None) => {
                drop(permit);
                tokio::select! {
                    _ = tokio::time::sleep(config.poll_interval) => {}
                    _ = cancel.cancelled() => {}
                    _ = done_rx.recv() => { in_flight -= 1; }
                }
            }
            Err(err) => {
                drop(permit);
                tracing::error!(error = %err, "failed to pop from queue, containing and continuing");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    tracing::info!(in_flight, "shutdown requested, draining in-flight jobs");
    let deadline = tokio::time::Instant::now() + config.shutdown_grace;
    while in_flight > 0 {
        match tokio::time::timeout_at(deadline, done_rx.recv()).await {
            Ok(Some(())) => in_flight -= 1,
            _ => break,
        }
    }
    if in_flight > 0 {
        tracing::warn!(in_flight, "shutdown grace window expired with jobs still running");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::InMemoryBreakerRegistry;
    use crate::dlq::Dlq;
    use crate::executor::RetryScheduler;
    use crate::handlers::HandlerRegistry;
    use crate::queue::memory::MemoryQueue;
    use crate::retry::{RetryConfig, RetryPolicy};

    fn build_executor(pool: sqlx::PgPool, queue: Arc<dyn Queue>) -> Arc<Executor> {
        let breakers: Arc<dyn crate::breaker::CircuitBreakerRegistry> =
            Arc::new(InMemoryBreakerRegistry::default());
        let scheduler = Arc::new(RetryScheduler::spawn(queue.clone(), CancellationToken::new()));
        Arc::new(Executor::new(
            pool.clone(),
            queue,
            breakers.clone(),
            RetryPolicy::new(RetryConfig::default(), breakers),
            Dlq::new(pool),
            Arc::new(HandlerRegistry::with_builtin_handlers()),
            scheduler,
        ))
    }

    #[tokio::test]
    async fn worker_exits_promptly_when_cancelled_with_empty_queue() {
        let queue: Arc<dyn Queue> = Arc::new(MemoryQueue::new());
        let pool = sqlx::PgPool::connect_lazy("postgresql://localhost/taskd").unwrap();
        let executor = build_executor(pool, queue.clone());
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        let handle = tokio::spawn(run_worker(
            executor,
            queue,
            WorkerConfig {
                poll_interval: Duration::from_secs(5),
                ..Default::default()
            },
            cancel_clone,
        ));

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should exit promptly on cancellation")
            .unwrap();
    }
}

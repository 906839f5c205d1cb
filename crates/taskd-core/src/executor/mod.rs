//! Task Executor (C6): coordinates one job's full lifecycle, and owns the
//! single retry timer wheel shared by every scheduled retry.

mod scheduler;

pub use scheduler::RetryScheduler;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use taskd_db::models::{Task, TaskStatus};
use taskd_db::queries::tasks as task_db;

use crate::breaker::CircuitBreakerRegistry;
use crate::dlq::Dlq;
use crate::error::{ErrorClass, TaskError};
use crate::handlers::HandlerRegistry;
use crate::queue::{Envelope, Queue};
use crate::retry::{RetryDecision, RetryPolicy};

/// Snapshot of the executor's process-local counters.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ExecutionStats {
    pub total_executed: u64,
    pub successful: u64,
    pub failed: u64,
    pub retried: u64,
    pub success_rate: Option<f64>,
    pub failure_rate: Option<f64>,
    pub retry_rate: Option<f64>,
}

#[derive(Default)]
struct Counters {
    total_executed: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ExecutionStats {
        let total = self.total_executed.load(Ordering::Relaxed);
        let successful = self.successful.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let retried = self.retried.load(Ordering::Relaxed);
        let rate = |n: u64| (total > 0).then(|| (n as f64 / total as f64) * 100.0);
        ExecutionStats {
            total_executed: total,
            successful,
            failed,
            retried,
            success_rate: rate(successful),
            failure_rate: rate(failed),
            retry_rate: rate(retried),
        }
    }
}

/// Coordinates a single job's lifecycle per the spec's per-envelope state
/// machine. One `Executor` is shared (via `Arc`) across every worker task
/// in a process.
pub struct Executor {
    pool: sqlx::PgPool,
    queue: Arc<dyn Queue>,
    breakers: Arc<dyn CircuitBreakerRegistry>,
    retry_policy: RetryPolicy,
    dlq: Dlq,
    handlers: Arc<HandlerRegistry>,
    scheduler: Arc<RetryScheduler>,
    counters: Counters,
}

impl Executor {
    pub fn new(
        pool: sqlx::PgPool,
        queue: Arc<dyn Queue>,
        breakers: Arc<dyn CircuitBreakerRegistry>,
        retry_policy: RetryPolicy,
        dlq: Dlq,
        handlers: Arc<HandlerRegistry>,
        scheduler: Arc<RetryScheduler>,
    ) -> Self {
        Self {
            pool,
            queue,
            breakers,
            retry_policy,
            dlq,
            handlers,
            scheduler,
            counters: Counters::default(),
        }
    }

    pub fn stats(&self) -> ExecutionStats {
        self.counters.snapshot()
    }

    /// Run one envelope to a terminal outcome for this attempt (success,
    /// scheduled retry, or dead-letter). Never returns an `Err` for a
    /// handler-level failure; only for infrastructure failures (DB/queue
    /// errors), which the caller (worker loop) should log and contain.
    #[tracing::instrument(skip(self, envelope), fields(task_id = envelope.task_id, kind = %envelope.kind))]
    pub async fn execute(&self, envelope: Envelope) -> anyhow::Result<()> {
        self.counters.total_executed.fetch_add(1, Ordering::Relaxed);

        let Some(task) = task_db::get(&self.pool, envelope.task_id).await? else {
            tracing::warn!("task not found for envelope, dropping");
            self.queue.ack(envelope.task_id).await?;
            return Ok(());
        };

        if task.status.is_terminal() {
            tracing::debug!(status = %task.status, "duplicate delivery of terminal task, acking without re-execution");
            self.queue.ack(envelope.task_id).await?;
            return Ok(());
        }

        let from_status = task.status;
        task_db::transition(
            &self.pool,
            task.id,
            from_status,
            TaskStatus::Running,
            Some(Utc::now()),
            None,
            None,
            None,
            None,
        )
        .await?;

        let outcome = match self.handlers.get(&task.kind) {
            Some(handler) => handler.handle(&task.payload).await,
            None => Err(TaskError::validation(format!("unknown task kind `{}`", task.kind))),
        };

        match outcome {
            Ok(result) => self.on_success(&task, result).await,
            Err(error) => self.on_failure(&task, error).await,
        }
    }

    async fn on_success(&self, task: &Task, result: serde_json::Value) -> anyhow::Result<()> {
        let affected = task_db::transition(
            &self.pool,
            task.id,
            TaskStatus::Running,
            TaskStatus::Completed,
            None,
            Some(Utc::now()),
            Some(result),
            None,
            None,
        )
        .await?;

        if affected == 0 {
            // Another actor already finalized this task; treat as a
            // successful dispatch rather than a double-record.
            tracing::warn!("task already finalized by another actor, skipping breaker record");
            self.queue.ack(task.id).await?;
            return Ok(());
        }

        self.breakers.record_success(&task.kind);
        self.queue.ack(task.id).await?;
        self.counters.successful.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn on_failure(&self, task: &Task, error: TaskError) -> anyhow::Result<()> {
        self.breakers.record_failure(&task.kind);

        let decision = self.retry_policy.should_retry(task, &error);
        match decision {
            RetryDecision::Retry { delay_seconds } => {
                let affected = task_db::bump_retry(&self.pool, task.id).await?;
                if affected == 0 {
                    tracing::warn!("bump_retry found task already finalized, dead-lettering instead");
                    return self.finalize_failed(task, &error).await;
                }
                self.scheduler
                    .schedule(task.id, task.kind.clone(), task.payload.clone(), delay_seconds);
                self.queue.ack(task.id).await?;
                self.counters.retried.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            RetryDecision::GiveUp => self.finalize_failed(task, &error).await,
        }
    }

    async fn finalize_failed(&self, task: &Task, error: &TaskError) -> anyhow::Result<()> {
        let affected = task_db::transition(
            &self.pool,
            task.id,
            TaskStatus::Running,
            TaskStatus::Failed,
            None,
            Some(Utc::now()),
            None,
            Some(&error.message),
            Some(&error.kind),
        )
        .await?;

        if affected > 0 {
            if let Some(failed_task) = task_db::get(&self.pool, task.id).await? {
                self.dlq.add(&failed_task).await?;
            }
        }

        self.queue.ack(task.id).await?;
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Test-only affordance: record a synthetic failure for `kind` through
    /// the breaker registry without touching any task (§4.8 "simulate
    /// failure").
    pub fn simulate_failure(&self, kind: &str) {
        self.breakers.record_failure(kind);
    }
}

/// Error class used for a handler that raised during payload decoding (the
/// "unknown kind" branch never reaches a handler at all).
pub const DECODE_ERROR_CLASS: ErrorClass = ErrorClass::Validation;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::InMemoryBreakerRegistry;
    use crate::queue::memory::MemoryQueue;
    use crate::retry::RetryConfig;

    fn handlers() -> Arc<HandlerRegistry> {
        Arc::new(HandlerRegistry::with_builtin_handlers())
    }

    fn scheduler(queue: Arc<dyn Queue>) -> Arc<RetryScheduler> {
        Arc::new(RetryScheduler::spawn(queue, tokio_util::sync::CancellationToken::new()))
    }

    // Executor construction is exercised fully by the Postgres-backed
    // integration tests in `tests/executor_test.rs`, since every branch
    // touches `task_db`. This module only covers the pure counter math.
    #[test]
    fn execution_stats_derive_rates_only_once_nonzero() {
        let counters = Counters::default();
        let empty = counters.snapshot();
        assert_eq!(empty.success_rate, None);

        counters.total_executed.fetch_add(4, Ordering::Relaxed);
        counters.successful.fetch_add(3, Ordering::Relaxed);
        counters.failed.fetch_add(1, Ordering::Relaxed);
        let stats = counters.snapshot();
        assert_eq!(stats.success_rate, Some(75.0));
        assert_eq!(stats.failure_rate, Some(25.0));
        assert_eq!(stats.retry_rate, Some(0.0));
    }

    #[tokio::test]
    async fn simulate_failure_trips_breaker_without_touching_a_task() {
        let breakers: Arc<dyn CircuitBreakerRegistry> = Arc::new(InMemoryBreakerRegistry::new(
            crate::breaker::BreakerConfig {
                failure_threshold: 1,
                recovery_timeout_seconds: 60,
            },
        ));
        let queue: Arc<dyn Queue> = Arc::new(MemoryQueue::new());
        let pool = sqlx::PgPool::connect_lazy("postgresql://localhost/taskd").unwrap();
        let executor = Executor::new(
            pool.clone(),
            queue.clone(),
            breakers.clone(),
            RetryPolicy::new(RetryConfig::default(), breakers.clone()),
            Dlq::new(pool),
            handlers(),
            scheduler(queue),
        );
        executor.simulate_failure("text_processing");
        assert!(!breakers.allow("text_processing"));
    }
}

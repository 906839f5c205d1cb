//! Control Surface (C8): transport-agnostic administrative operations over
//! a [`Runtime`]. Both the CLI and the HTTP adapter call these functions
//! directly; neither re-implements the logic.

use serde::Serialize;
use taskd_db::models::{BreakerState, DlqEntry, Task};
use taskd_db::queries::tasks as task_db;

use crate::breaker::BreakerRecord;
use crate::error::TaskError;
use crate::executor::ExecutionStats;
use crate::runtime::Runtime;

#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub size: i64,
    pub in_flight: i64,
    pub total_pending: i64,
}

pub async fn queue_stats(rt: &Runtime) -> anyhow::Result<QueueStats> {
    let size = rt.queue.size().await?;
    let in_flight = rt.queue.in_flight_count().await?;
    Ok(QueueStats {
        size,
        in_flight,
        total_pending: size + in_flight,
    })
}

/// Reclaim every stale (expired-lease) envelope. Returns the number
/// reclaimed.
pub async fn queue_cleanup(rt: &Runtime) -> anyhow::Result<u64> {
    rt.queue.reclaim_stale().await
}

pub fn breakers_list(rt: &Runtime) -> Vec<BreakerRecord> {
    rt.breakers.list()
}

pub fn breaker_reset(rt: &Runtime, kind: &str) {
    rt.breakers.reset(kind);
}

pub async fn dlq_list(rt: &Runtime, kind: Option<&str>) -> anyhow::Result<Vec<DlqEntry>> {
    rt.dlq.list(kind).await
}

/// Requeue a dead-lettered task. Returns `None` if no matching entry
/// existed.
pub async fn dlq_requeue(rt: &Runtime, task_id: i64) -> anyhow::Result<Option<Task>> {
    rt.dlq.requeue(task_id).await
}

pub async fn dlq_purge(rt: &Runtime, kind: Option<&str>, older_than_hours: i64) -> anyhow::Result<u64> {
    rt.dlq.purge(kind, older_than_hours).await
}

pub fn execution_stats(rt: &Runtime) -> ExecutionStats {
    rt.executor.stats()
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub execution: ExecutionStats,
    pub breakers: Vec<BreakerRecord>,
    pub dlq_size: usize,
}

pub async fn stats(rt: &Runtime) -> anyhow::Result<Stats> {
    Ok(Stats {
        execution: execution_stats(rt),
        breakers: breakers_list(rt),
        dlq_size: dlq_list(rt, None).await?.len(),
    })
}

/// Test/demo affordance (§4.8): record a synthetic failure for `kind`
/// through the breaker registry without touching any task.
pub fn simulate_failure(rt: &Runtime, kind: &str) {
    rt.executor.simulate_failure(kind);
}

/// Submit a new task, enqueueing it for pickup by a worker.
///
/// Rejects `kind` before it ever reaches the store if no handler is
/// registered for it (§4.1/§6: unrecognized kind is a validation failure,
/// not a storage failure).
pub async fn submit(rt: &Runtime, kind: &str, payload: serde_json::Value, max_retries: i32) -> anyhow::Result<Task> {
    if rt.handlers.get(kind).is_none() {
        return Err(TaskError::validation(format!("unrecognized task kind `{kind}`")).into());
    }

    let task = task_db::create(&rt.pool, kind, payload, max_retries).await?;
    rt.queue.enqueue(task.id, &task.kind, &task.payload).await?;
    Ok(task)
}

pub async fn get_task(rt: &Runtime, id: i64) -> anyhow::Result<Option<Task>> {
    task_db::get(&rt.pool, id).await
}

pub async fn list_tasks(rt: &Runtime, limit: i64, offset: i64) -> anyhow::Result<Vec<Task>> {
    task_db::list(&rt.pool, limit, offset).await
}

/// Convenience accessor used by CLI/HTTP response serialization; breaker
/// records already carry a `state`, but callers sometimes just want the
/// one-word string.
pub fn breaker_state_label(record: &BreakerRecord) -> &'static str {
    match record.state {
        BreakerState::Closed => "closed",
        BreakerState::Open => "open",
        BreakerState::HalfOpen => "half_open",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use crate::runtime::RuntimeConfig;

    #[tokio::test]
    async fn submit_rejects_unrecognized_kind_before_touching_the_store() {
        let pool = sqlx::PgPool::connect_lazy("postgresql://localhost/taskd").unwrap();
        let rt = Runtime::from_pool(pool, RuntimeConfig::default());

        let err = submit(&rt, "not_a_real_kind", serde_json::json!({}), 3)
            .await
            .unwrap_err();
        let task_err = err.downcast_ref::<TaskError>().expect("expected a TaskError");
        assert_eq!(task_err.class, ErrorClass::Validation);
    }
}

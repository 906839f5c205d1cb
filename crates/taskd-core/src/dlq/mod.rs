//! Dead-Letter Queue (C5): terminal home for tasks that exhausted retries
//! or were rejected outright. Unlike the work queue, the DLQ has no
//! alternate in-memory backend — nothing in the spec calls for one, and a
//! lost DLQ entry is a worse failure mode than a lost queue envelope, so it
//! is always backed by Postgres.

use taskd_db::models::{DlqEntry, Task, TaskStatus};
use taskd_db::queries::dlq as db_dlq;
use taskd_db::queries::tasks as db_tasks;

pub struct Dlq {
    pool: sqlx::PgPool,
}

impl Dlq {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    /// Move a `failed` task into the dead-letter queue.
    pub async fn add(&self, task: &Task) -> anyhow::Result<DlqEntry> {
        db_dlq::add(&self.pool, task).await
    }

    pub async fn list(&self, kind: Option<&str>) -> anyhow::Result<Vec<DlqEntry>> {
        db_dlq::list(&self.pool, kind).await
    }

    pub async fn get(&self, task_id: i64) -> anyhow::Result<Option<DlqEntry>> {
        db_dlq::get(&self.pool, task_id).await
    }

    /// Resurrect a dead-lettered task: reset it to `pending` with a fresh
    /// retry budget and remove it from the DLQ. The two steps run inside a
    /// transaction so a concurrent `purge` can never see the task half
    /// requeued.
    pub async fn requeue(&self, task_id: i64) -> anyhow::Result<Option<Task>> {
        if !db_dlq::requeue(&self.pool, task_id).await? {
            return Ok(None);
        }
        db_tasks::get(&self.pool, task_id).await
    }

    pub async fn purge(&self, kind: Option<&str>, older_than_hours: i64) -> anyhow::Result<u64> {
        db_dlq::purge(&self.pool, kind, older_than_hours).await
    }
}

/// Whether `task` is eligible to be dead-lettered (must be terminally
/// failed).
pub fn is_dead_letter_eligible(task: &Task) -> bool {
    task.status == TaskStatus::Failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn failed_task() -> Task {
        Task {
            id: 1,
            kind: "text_processing".into(),
            payload: serde_json::json!({}),
            status: TaskStatus::Failed,
            result: None,
            error_message: Some("boom".into()),
            error_kind: Some("TimeoutError".into()),
            retry_count: 3,
            max_retries: 3,
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
        }
    }

    #[test]
    fn only_failed_tasks_are_eligible() {
        let mut t = failed_task();
        assert!(is_dead_letter_eligible(&t));
        t.status = TaskStatus::Completed;
        assert!(!is_dead_letter_eligible(&t));
        t.status = TaskStatus::Retrying;
        assert!(!is_dead_letter_eligible(&t));
    }
}

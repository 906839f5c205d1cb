//! Database query functions for the `tasks` table: the task store's sole
//! point of contact with Postgres.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{Task, TaskStatus, RECOGNIZED_TASK_KINDS};

/// Insert a new task row in `pending` status. Returns the inserted task with
/// server-generated defaults (id, created_at).
///
/// Fails if `kind` is outside [`RECOGNIZED_TASK_KINDS`].
pub async fn create(
    pool: &PgPool,
    kind: &str,
    payload: serde_json::Value,
    max_retries: i32,
) -> Result<Task> {
    if !RECOGNIZED_TASK_KINDS.contains(&kind) {
        anyhow::bail!("unrecognized task kind `{kind}`");
    }

    let task = sqlx::query_as::<_, Task>(
        "INSERT INTO tasks (kind, payload, status, retry_count, max_retries) \
         VALUES ($1, $2, 'pending', 0, $3) \
         RETURNING *",
    )
    .bind(kind)
    .bind(payload)
    .bind(max_retries)
    .fetch_one(pool)
    .await
    .context("failed to insert task")?;

    Ok(task)
}

/// Fetch a single task by ID.
pub async fn get(pool: &PgPool, id: i64) -> Result<Option<Task>> {
    let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch task")?;

    Ok(task)
}

/// Paginated snapshot of tasks ordered by id ascending. No freshness
/// guarantee is made across pages.
pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Task>> {
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks ORDER BY id ASC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("failed to list tasks")?;

    Ok(tasks)
}

/// Atomically transition a task from one status to another, applying the
/// timestamp rules of I1/I2/I4 (`started_at` set once on entry to `running`,
/// `completed_at` set on entry to a terminal status).
///
/// Uses optimistic locking: the UPDATE's WHERE clause includes
/// `status = $from`, so the row is only updated if the current status
/// matches the expected `from` value. Returns the number of rows affected
/// (0 means the status did not match, i.e. another actor already moved it).
#[allow(clippy::too_many_arguments)]
pub async fn transition(
    pool: &PgPool,
    id: i64,
    from: TaskStatus,
    to: TaskStatus,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<serde_json::Value>,
    error_message: Option<&str>,
    error_kind: Option<&str>,
) -> Result<u64> {
    let clear_errors = matches!(to, TaskStatus::Completed);
    let outcome = sqlx::query(
        "UPDATE tasks \
         SET status = $1, \
             started_at = COALESCE(started_at, $2), \
             completed_at = COALESCE($3, completed_at), \
             result = COALESCE($4, result), \
             error_message = CASE WHEN $7 THEN NULL ELSE COALESCE($5, error_message) END, \
             error_kind = CASE WHEN $7 THEN NULL ELSE COALESCE($6, error_kind) END \
         WHERE id = $8 AND status = $9",
    )
    .bind(to)
    .bind(started_at)
    .bind(completed_at)
    .bind(result)
    .bind(error_message)
    .bind(error_kind)
    .bind(clear_errors)
    .bind(id)
    .bind(from)
    .execute(pool)
    .await
    .context("failed to transition task status")?;

    Ok(outcome.rows_affected())
}

/// Atomically increment `retry_count` and set status to `retrying`.
/// Fails (returns 0 rows affected) if `retry_count = max_retries` or the
/// task is not currently `running`.
pub async fn bump_retry(pool: &PgPool, id: i64) -> Result<u64> {
    let outcome = sqlx::query(
        "UPDATE tasks \
         SET status = 'retrying', retry_count = retry_count + 1 \
         WHERE id = $1 AND status = 'running' AND retry_count < max_retries",
    )
    .bind(id)
    .execute(pool)
    .await
    .context("failed to bump retry count")?;

    Ok(outcome.rows_affected())
}

/// Reset a task to `pending` with `retry_count = 0`, used by a DLQ requeue.
pub async fn reset_for_requeue(pool: &PgPool, id: i64) -> Result<u64> {
    let outcome = sqlx::query(
        "UPDATE tasks \
         SET status = 'pending', retry_count = 0, error_message = NULL, error_kind = NULL, \
             started_at = NULL, completed_at = NULL \
         WHERE id = $1 AND status = 'failed'",
    )
    .bind(id)
    .execute(pool)
    .await
    .context("failed to reset task for requeue")?;

    Ok(outcome.rows_affected())
}

#[cfg(test)]
mod tests {
    // Covered by the Postgres-backed integration tests in `tests/`; pure
    // SQL strings have no meaningful unit-test surface without a live
    // database.
}

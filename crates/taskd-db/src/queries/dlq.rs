//! Database query functions for the `dlq_entries` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{DlqEntry, Task};

/// Insert a dead-letter snapshot of a terminally failed task.
pub async fn add(pool: &PgPool, task: &Task) -> Result<DlqEntry> {
    let entry = sqlx::query_as::<_, DlqEntry>(
        "INSERT INTO dlq_entries \
            (task_id, kind, payload, error_message, error_kind, retry_count, max_retries, created_at, failed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW()) \
         ON CONFLICT (task_id) DO UPDATE SET \
            error_message = EXCLUDED.error_message, \
            error_kind = EXCLUDED.error_kind, \
            retry_count = EXCLUDED.retry_count, \
            failed_at = NOW() \
         RETURNING *",
    )
    .bind(task.id)
    .bind(&task.kind)
    .bind(&task.payload)
    .bind(&task.error_message)
    .bind(&task.error_kind)
    .bind(task.retry_count)
    .bind(task.max_retries)
    .bind(task.created_at)
    .fetch_one(pool)
    .await
    .context("failed to insert dlq entry")?;

    Ok(entry)
}

/// List DLQ entries, optionally filtered by kind. Order is unspecified by
/// the spec; this implementation returns newest-failed first.
pub async fn list(pool: &PgPool, kind: Option<&str>) -> Result<Vec<DlqEntry>> {
    let entries = match kind {
        Some(k) => {
            sqlx::query_as::<_, DlqEntry>(
                "SELECT * FROM dlq_entries WHERE kind = $1 ORDER BY failed_at DESC",
            )
            .bind(k)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, DlqEntry>("SELECT * FROM dlq_entries ORDER BY failed_at DESC")
                .fetch_all(pool)
                .await
        }
    }
    .context("failed to list dlq entries")?;

    Ok(entries)
}

/// Fetch a single DLQ entry by task id.
pub async fn get(pool: &PgPool, task_id: i64) -> Result<Option<DlqEntry>> {
    let entry = sqlx::query_as::<_, DlqEntry>("SELECT * FROM dlq_entries WHERE task_id = $1")
        .bind(task_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch dlq entry")?;

    Ok(entry)
}

/// Remove a DLQ entry by task id. Returns `true` if a row was removed.
pub async fn remove(pool: &PgPool, task_id: i64) -> Result<bool> {
    let outcome = sqlx::query("DELETE FROM dlq_entries WHERE task_id = $1")
        .bind(task_id)
        .execute(pool)
        .await
        .context("failed to remove dlq entry")?;

    Ok(outcome.rows_affected() > 0)
}

/// Resurrect a dead-lettered task: remove its DLQ entry and reset the task
/// row to `pending` with a fresh retry budget, in one transaction. Returns
/// `false` if there was no DLQ entry (or no matching `failed` task) to
/// requeue.
pub async fn requeue(pool: &PgPool, task_id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("failed to begin requeue transaction")?;

    let removed = sqlx::query("DELETE FROM dlq_entries WHERE task_id = $1")
        .bind(task_id)
        .execute(&mut *tx)
        .await
        .context("failed to remove dlq entry")?
        .rows_affected();
    if removed == 0 {
        tx.rollback().await.ok();
        return Ok(false);
    }

    let reset = sqlx::query(
        "UPDATE tasks \
         SET status = 'pending', retry_count = 0, error_message = NULL, error_kind = NULL, \
             started_at = NULL, completed_at = NULL \
         WHERE id = $1 AND status = 'failed'",
    )
    .bind(task_id)
    .execute(&mut *tx)
    .await
    .context("failed to reset task for requeue")?
    .rows_affected();
    if reset == 0 {
        tx.rollback().await.ok();
        return Ok(false);
    }

    tx.commit().await.context("failed to commit requeue transaction")?;
    Ok(true)
}

/// Remove entries older than `older_than_hours`, optionally filtered by
/// kind. Returns the number of entries removed.
pub async fn purge(pool: &PgPool, kind: Option<&str>, older_than_hours: i64) -> Result<u64> {
    let cutoff: DateTime<Utc> = Utc::now() - chrono::Duration::hours(older_than_hours);

    let outcome = match kind {
        Some(k) => {
            sqlx::query("DELETE FROM dlq_entries WHERE failed_at < $1 AND kind = $2")
                .bind(cutoff)
                .bind(k)
                .execute(pool)
                .await
        }
        None => {
            sqlx::query("DELETE FROM dlq_entries WHERE failed_at < $1")
                .bind(cutoff)
                .execute(pool)
                .await
        }
    }
    .context("failed to purge dlq entries")?;

    Ok(outcome.rows_affected())
}

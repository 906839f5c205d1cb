//! Database query functions backing the Postgres-backed [`Queue`]
//! implementation: a durable FIFO (`queue_envelopes`) plus a lease table
//! (`in_flight`) tracking envelopes a worker has popped but not yet acked.
//!
//! [`Queue`]: ../../taskd_core/queue/trait.Queue.html

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// A queue envelope as read back from storage.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EnvelopeRow {
    pub task_id: i64,
    pub kind: String,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
}

/// Append an envelope to the tail of the queue.
pub async fn enqueue(
    pool: &PgPool,
    task_id: i64,
    kind: &str,
    payload: &serde_json::Value,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO queue_envelopes (task_id, kind, payload, enqueued_at) \
         VALUES ($1, $2, $3, NOW()) \
         ON CONFLICT (task_id) DO UPDATE SET \
            kind = EXCLUDED.kind, payload = EXCLUDED.payload, enqueued_at = EXCLUDED.enqueued_at",
    )
    .bind(task_id)
    .bind(kind)
    .bind(payload)
    .execute(pool)
    .await
    .context("failed to enqueue envelope")?;

    Ok(())
}

/// Pop the oldest ready envelope, registering it as in-flight with a lease
/// that expires after `lease_ttl_seconds`. Returns `None` if the queue is
/// empty.
///
/// Implemented as a single transaction using `FOR UPDATE SKIP LOCKED` so
/// concurrent workers never race on the same row.
pub async fn pop(pool: &PgPool, lease_ttl_seconds: i64) -> Result<Option<EnvelopeRow>> {
    let mut tx = pool.begin().await.context("failed to begin pop transaction")?;

    let row: Option<EnvelopeRow> = sqlx::query_as(
        "SELECT task_id, kind, payload, enqueued_at FROM queue_envelopes \
         ORDER BY id ASC LIMIT 1 FOR UPDATE SKIP LOCKED",
    )
    .fetch_optional(&mut *tx)
    .await
    .context("failed to select next envelope")?;

    let Some(envelope) = row else {
        tx.commit().await.ok();
        return Ok(None);
    };

    sqlx::query("DELETE FROM queue_envelopes WHERE task_id = $1")
        .bind(envelope.task_id)
        .execute(&mut *tx)
        .await
        .context("failed to remove popped envelope")?;

    sqlx::query(
        "INSERT INTO in_flight (task_id, leased_at, lease_expires_at) \
         VALUES ($1, NOW(), NOW() + make_interval(secs => $2)) \
         ON CONFLICT (task_id) DO UPDATE SET \
            leased_at = EXCLUDED.leased_at, lease_expires_at = EXCLUDED.lease_expires_at",
    )
    .bind(envelope.task_id)
    .bind(lease_ttl_seconds as f64)
    .execute(&mut *tx)
    .await
    .context("failed to register in-flight lease")?;

    tx.commit().await.context("failed to commit pop transaction")?;
    Ok(Some(envelope))
}

/// Clear the in-flight marker for `task_id`.
pub async fn ack(pool: &PgPool, task_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM in_flight WHERE task_id = $1")
        .bind(task_id)
        .execute(pool)
        .await
        .context("failed to ack envelope")?;

    Ok(())
}

/// Number of envelopes currently ready (not yet popped).
pub async fn size(pool: &PgPool) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM queue_envelopes")
        .fetch_one(pool)
        .await
        .context("failed to count ready envelopes")?;
    Ok(row.0)
}

/// Number of envelopes currently in flight (popped, not yet acked).
pub async fn in_flight_count(pool: &PgPool) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM in_flight")
        .fetch_one(pool)
        .await
        .context("failed to count in-flight envelopes")?;
    Ok(row.0)
}

/// Clear every in-flight lease that has no TTL set or has expired, and
/// re-enqueue a fresh envelope for each (at-least-once redelivery; see the
/// stale-reclaim design decision).
///
/// Returns the number of envelopes reclaimed.
pub async fn reclaim_stale(pool: &PgPool) -> Result<u64> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to begin reclaim transaction")?;

    let stale: Vec<(i64, String, serde_json::Value)> = sqlx::query_as(
        "SELECT f.task_id, t.kind, t.payload \
         FROM in_flight f \
         JOIN tasks t ON t.id = f.task_id \
         WHERE f.lease_expires_at IS NULL OR f.lease_expires_at < NOW() \
         FOR UPDATE OF f SKIP LOCKED",
    )
    .fetch_all(&mut *tx)
    .await
    .context("failed to select stale in-flight leases")?;

    for (task_id, kind, payload) in &stale {
        sqlx::query("DELETE FROM in_flight WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *tx)
            .await
            .context("failed to clear stale lease")?;

        sqlx::query(
            "INSERT INTO queue_envelopes (task_id, kind, payload, enqueued_at) \
             VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (task_id) DO UPDATE SET \
                kind = EXCLUDED.kind, payload = EXCLUDED.payload, enqueued_at = EXCLUDED.enqueued_at",
        )
        .bind(task_id)
        .bind(kind)
        .bind(payload)
        .execute(&mut *tx)
        .await
        .context("failed to re-enqueue reclaimed envelope")?;
    }

    tx.commit()
        .await
        .context("failed to commit reclaim transaction")?;

    Ok(stale.len() as u64)
}

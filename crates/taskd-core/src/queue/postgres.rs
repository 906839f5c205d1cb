//! Durable [`Queue`] backend over `taskd_db::queries::queue`, safe for
//! concurrent pops from multiple worker processes via `FOR UPDATE SKIP
//! LOCKED`.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use taskd_db::queries::queue as db_queue;

use super::{Envelope, Queue};

pub struct PostgresQueue {
    pool: PgPool,
}

impl PostgresQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Queue for PostgresQueue {
    async fn enqueue(&self, task_id: i64, kind: &str, payload: &Value) -> anyhow::Result<()> {
        db_queue::enqueue(&self.pool, task_id, kind, payload).await
    }

    async fn pop(&self, lease_ttl_seconds: i64) -> anyhow::Result<Option<Envelope>> {
        let row = db_queue::pop(&self.pool, lease_ttl_seconds).await?;
        Ok(row.map(|r| Envelope {
            task_id: r.task_id,
            kind: r.kind,
            payload: r.payload,
        }))
    }

    async fn ack(&self, task_id: i64) -> anyhow::Result<()> {
        db_queue::ack(&self.pool, task_id).await
    }

    async fn size(&self) -> anyhow::Result<i64> {
        db_queue::size(&self.pool).await
    }

    async fn in_flight_count(&self) -> anyhow::Result<i64> {
        db_queue::in_flight_count(&self.pool).await
    }

    async fn reclaim_stale(&self) -> anyhow::Result<u64> {
        db_queue::reclaim_stale(&self.pool).await
    }
}

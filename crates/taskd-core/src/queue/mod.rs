//! Shared Work Queue (C2): at-least-once delivery with lease-based
//! in-flight tracking, behind a single backend-agnostic trait.
//!
//! Two backends exist: [`memory::MemoryQueue`] for tests and single-process
//! runs, and [`postgres::PostgresQueue`] for durable multi-worker operation.
//! Collapsing what the original split into two uncoordinated paths into one
//! trait means callers (the executor, the worker loop, the control surface)
//! never branch on which backend is active.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;

/// A popped unit of work: the envelope plus the lease it was popped under.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub task_id: i64,
    pub kind: String,
    pub payload: Value,
}

#[async_trait]
pub trait Queue: Send + Sync {
    /// Enqueue `task_id` for delivery. Re-enqueuing an already-queued task
    /// id overwrites its payload rather than creating a duplicate entry.
    async fn enqueue(&self, task_id: i64, kind: &str, payload: &Value) -> anyhow::Result<()>;

    /// Pop the oldest envelope and lease it for `lease_ttl_seconds`. Returns
    /// `None` if the queue is empty.
    async fn pop(&self, lease_ttl_seconds: i64) -> anyhow::Result<Option<Envelope>>;

    /// Acknowledge successful processing, releasing the lease.
    async fn ack(&self, task_id: i64) -> anyhow::Result<()>;

    /// Number of envelopes waiting to be popped.
    async fn size(&self) -> anyhow::Result<i64>;

    /// Number of envelopes currently leased out.
    async fn in_flight_count(&self) -> anyhow::Result<i64>;

    /// Reclaim every lease that has expired, re-enqueuing its envelope.
    /// Returns the number reclaimed.
    async fn reclaim_stale(&self) -> anyhow::Result<u64>;
}

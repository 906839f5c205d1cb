//! In-process [`Queue`] backend: a FIFO plus a lease map, guarded by a
//! single async mutex. Used by tests and by single-process deployments
//! that don't need cross-process durability.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use super::{Envelope, Queue};

struct Lease {
    envelope: Envelope,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct State {
    ready: VecDeque<Envelope>,
    in_flight: HashMap<i64, Lease>,
}

pub struct MemoryQueue {
    state: Mutex<State>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    async fn enqueue(&self, task_id: i64, kind: &str, payload: &Value) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        state.ready.retain(|e| e.task_id != task_id);
        state.ready.push_back(Envelope {
            task_id,
            kind: kind.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }

    async fn pop(&self, lease_ttl_seconds: i64) -> anyhow::Result<Option<Envelope>> {
        let mut state = self.state.lock().await;
        let Some(envelope) = state.ready.pop_front() else {
            return Ok(None);
        };
        let expires_at = Some(Utc::now() + chrono::Duration::seconds(lease_ttl_seconds));
        let result = Envelope {
            task_id: envelope.task_id,
            kind: envelope.kind.clone(),
            payload: envelope.payload.clone(),
        };
        state.in_flight.insert(
            envelope.task_id,
            Lease {
                envelope,
                expires_at,
            },
        );
        Ok(Some(result))
    }

    async fn ack(&self, task_id: i64) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        state.in_flight.remove(&task_id);
        Ok(())
    }

    async fn size(&self) -> anyhow::Result<i64> {
        Ok(self.state.lock().await.ready.len() as i64)
    }

    async fn in_flight_count(&self) -> anyhow::Result<i64> {
        Ok(self.state.lock().await.in_flight.len() as i64)
    }

    async fn reclaim_stale(&self) -> anyhow::Result<u64> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let stale_ids: Vec<i64> = state
            .in_flight
            .iter()
            .filter(|(_, lease)| lease.expires_at.map(|exp| exp < now).unwrap_or(false))
            .map(|(id, _)| *id)
            .collect();

        let mut reclaimed = 0u64;
        for id in stale_ids {
            if let Some(lease) = state.in_flight.remove(&id) {
                state.ready.push_back(lease.envelope);
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_pop_ack_round_trip() {
        let q = MemoryQueue::new();
        q.enqueue(1, "text_processing", &serde_json::json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(q.size().await.unwrap(), 1);

        let popped = q.pop(300).await.unwrap().unwrap();
        assert_eq!(popped.task_id, 1);
        assert_eq!(q.size().await.unwrap(), 0);
        assert_eq!(q.in_flight_count().await.unwrap(), 1);

        q.ack(1).await.unwrap();
        assert_eq!(q.in_flight_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn pop_on_empty_returns_none() {
        let q = MemoryQueue::new();
        assert!(q.pop(300).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reclaim_stale_reenqueues_expired_leases() {
        let q = MemoryQueue::new();
        q.enqueue(1, "text_processing", &serde_json::json!({}))
            .await
            .unwrap();
        q.pop(-1).await.unwrap();
        assert_eq!(q.in_flight_count().await.unwrap(), 1);

        let reclaimed = q.reclaim_stale().await.unwrap();
        assert_eq!(reclaimed, 1);
        assert_eq!(q.in_flight_count().await.unwrap(), 0);
        assert_eq!(q.size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reclaim_stale_ignores_fresh_leases() {
        let q = MemoryQueue::new();
        q.enqueue(1, "text_processing", &serde_json::json!({}))
            .await
            .unwrap();
        q.pop(300).await.unwrap();
        assert_eq!(q.reclaim_stale().await.unwrap(), 0);
        assert_eq!(q.in_flight_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn re_enqueueing_same_task_id_replaces_pending_entry() {
        let q = MemoryQueue::new();
        q.enqueue(1, "text_processing", &serde_json::json!({"v": 1}))
            .await
            .unwrap();
        q.enqueue(1, "text_processing", &serde_json::json!({"v": 2}))
            .await
            .unwrap();
        assert_eq!(q.size().await.unwrap(), 1);
        let popped = q.pop(300).await.unwrap().unwrap();
        assert_eq!(popped.payload, serde_json::json!({"v": 2}));
    }
}

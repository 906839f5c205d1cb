//! Per-kind circuit breaker registry (C3).
//!
//! Process-local by default (§9 design note: externalizing it to a shared
//! store is possible but not required, so the registry is built behind a
//! trait rather than exposing `Arc<RwLock<_>>` directly).

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use taskd_db::models::BreakerState;

/// Snapshot of a single kind's breaker state.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BreakerRecord {
    pub kind: String,
    pub state: BreakerState,
    pub failures: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Whether a HALF_OPEN probe is currently outstanding. Not part of the
    /// public snapshot: it exists only to limit HALF_OPEN to a single
    /// concurrent trial call (§4.3).
    #[serde(skip)]
    probe_in_flight: bool,
}

impl BreakerRecord {
    fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            state: BreakerState::Closed,
            failures: 0,
            last_failure_at: None,
            probe_in_flight: false,
        }
    }
}

/// Configurable thresholds for breaker transitions.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout_seconds: i64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_seconds: 60,
        }
    }
}

/// The per-kind failure-isolation state machine.
///
/// `allow` is the only method that can transition OPEN -> HALF_OPEN; callers
/// must call it before every attempt, including the engine's own
/// `should_retry` check (§4.4 step 2).
pub trait CircuitBreakerRegistry: Send + Sync {
    /// Whether a call for `kind` is currently permitted. May transition the
    /// breaker from OPEN to HALF_OPEN as a side effect (§4.3).
    fn allow(&self, kind: &str) -> bool;

    /// Record a successful call, closing a HALF_OPEN breaker.
    fn record_success(&self, kind: &str);

    /// Record a failed call, possibly tripping the breaker to OPEN.
    fn record_failure(&self, kind: &str);

    /// Force a breaker back to CLOSED with a zeroed failure count.
    fn reset(&self, kind: &str);

    /// Snapshot of every breaker record observed so far.
    fn list(&self) -> Vec<BreakerRecord>;

    /// Snapshot of a single kind's record, if it has ever been observed.
    fn get(&self, kind: &str) -> Option<BreakerRecord>;
}

/// In-memory breaker registry guarded by a single lock; breakers are
/// lazily created on first observation and never deleted.
pub struct InMemoryBreakerRegistry {
    config: BreakerConfig,
    records: RwLock<HashMap<String, BreakerRecord>>,
}

impl InMemoryBreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryBreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

impl CircuitBreakerRegistry for InMemoryBreakerRegistry {
    fn allow(&self, kind: &str) -> bool {
        let mut records = self.records.write().unwrap();
        let record = records
            .entry(kind.to_string())
            .or_insert_with(|| BreakerRecord::new(kind));

        match record.state {
            BreakerState::Closed => true,
            // Only one probe call is let through per HALF_OPEN episode;
            // concurrent callers are refused until it resolves.
            BreakerState::HalfOpen => {
                if record.probe_in_flight {
                    false
                } else {
                    record.probe_in_flight = true;
                    true
                }
            }
            BreakerState::Open => {
                let elapsed = record
                    .last_failure_at
                    .map(|t| (Utc::now() - t).num_seconds())
                    .unwrap_or(i64::MAX);
                if elapsed > self.config.recovery_timeout_seconds {
                    record.state = BreakerState::HalfOpen;
                    record.probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self, kind: &str) {
        let mut records = self.records.write().unwrap();
        let record = records
            .entry(kind.to_string())
            .or_insert_with(|| BreakerRecord::new(kind));
        record.state = BreakerState::Closed;
        record.failures = 0;
        record.probe_in_flight = false;
    }

    fn record_failure(&self, kind: &str) {
        let mut records = self.records.write().unwrap();
        let record = records
            .entry(kind.to_string())
            .or_insert_with(|| BreakerRecord::new(kind));
        record.failures += 1;
        record.last_failure_at = Some(Utc::now());
        record.probe_in_flight = false;

        match record.state {
            BreakerState::HalfOpen => record.state = BreakerState::Open,
            BreakerState::Closed if record.failures >= self.config.failure_threshold => {
                record.state = BreakerState::Open;
            }
            _ => {}
        }
    }

    fn reset(&self, kind: &str) {
        let mut records = self.records.write().unwrap();
        records.insert(kind.to_string(), BreakerRecord::new(kind));
    }

    fn list(&self) -> Vec<BreakerRecord> {
        self.records.read().unwrap().values().cloned().collect()
    }

    fn get(&self, kind: &str) -> Option<BreakerRecord> {
        self.records.read().unwrap().get(kind).cloned()
    }
}

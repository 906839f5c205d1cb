//! Retry Policy Engine (C4): decides retry vs. give-up and computes the
//! next-attempt delay via a strategy selected from the error's class.

use std::fmt;
use std::sync::Arc;

use rand::Rng;
use taskd_db::models::Task;

use crate::breaker::CircuitBreakerRegistry;
use crate::error::{DefaultClassifier, ErrorClass, ErrorClassifier, TaskError};

/// Backoff strategy, selected from the error's [`ErrorClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    Fixed,
    Linear,
    Exponential,
    Jitter,
}

impl fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fixed => "fixed",
            Self::Linear => "linear",
            Self::Exponential => "exponential",
            Self::Jitter => "jitter",
        };
        f.write_str(s)
    }
}

fn strategy_for_class(class: ErrorClass) -> RetryStrategy {
    match class {
        ErrorClass::TransientNetwork => RetryStrategy::Exponential,
        ErrorClass::RateLimit => RetryStrategy::Jitter,
        ErrorClass::TransientStorage => RetryStrategy::Linear,
        ErrorClass::Unknown => RetryStrategy::Exponential,
        ErrorClass::Validation => RetryStrategy::Fixed, // unreachable: non-retryable
    }
}

/// Tunable parameters for delay computation.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub base_delay_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_seconds: 5,
        }
    }
}

/// Compute the delay in seconds for strategy `s`, base `base`, and attempt
/// index `n` (= `task.retry_count` before this attempt).
pub fn compute_delay(s: RetryStrategy, base: u64, n: u32) -> u64 {
    let base = base as f64;
    let n = n as i32;
    match s {
        RetryStrategy::Fixed => base as u64,
        RetryStrategy::Linear => (base * (n as f64 + 1.0)).min(120.0) as u64,
        RetryStrategy::Exponential => (base * 2f64.powi(n)).min(300.0) as u64,
        RetryStrategy::Jitter => {
            let raw = base * 2f64.powi(n);
            let jitter_fraction: f64 = rand::rng().random_range(0.1..0.3);
            ((raw + jitter_fraction * raw).floor()).min(300.0) as u64
        }
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay_seconds: u64 },
    GiveUp,
}

/// The Retry Policy Engine (C4).
pub struct RetryPolicy {
    config: RetryConfig,
    breakers: Arc<dyn CircuitBreakerRegistry>,
    classifier: Arc<dyn ErrorClassifier>,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig, breakers: Arc<dyn CircuitBreakerRegistry>) -> Self {
        Self {
            config,
            breakers,
            classifier: Arc::new(DefaultClassifier),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// `should_retry(task, error)` per §4.4.
    pub fn should_retry(&self, task: &Task, error: &TaskError) -> RetryDecision {
        if task.retry_count >= task.max_retries {
            return RetryDecision::GiveUp;
        }
        if !self.breakers.allow(&task.kind) {
            return RetryDecision::GiveUp;
        }

        let class = self.classifier.classify(error);
        if !class.is_retryable() {
            return RetryDecision::GiveUp;
        }

        let strategy = strategy_for_class(class);
        let delay = compute_delay(strategy, self.config.base_delay_seconds, task.retry_count as u32);
        RetryDecision::Retry {
            delay_seconds: delay,
        }
    }
}

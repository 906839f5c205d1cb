//! Composition root (§9 "global mutable state" redesign note): every
//! component is built once here and passed explicitly into the worker loop
//! and the control surface, rather than living behind ambient singletons.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use taskd_db::config::DbConfig;
use taskd_db::pool as db_pool;

use crate::breaker::{BreakerConfig, CircuitBreakerRegistry, InMemoryBreakerRegistry};
use crate::dlq::Dlq;
use crate::executor::{Executor, RetryScheduler};
use crate::handlers::HandlerRegistry;
use crate::queue::postgres::PostgresQueue;
use crate::queue::Queue;
use crate::retry::{RetryConfig, RetryPolicy};

/// Tunables that shape the components `Runtime::build` wires together.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub retry: RetryConfig,
    pub breaker: BreakerConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

/// Every shared component (C1-C5) an executor, worker, or control-surface
/// operation needs, wired together once at process startup.
pub struct Runtime {
    pub pool: PgPool,
    pub queue: Arc<dyn Queue>,
    pub breakers: Arc<dyn CircuitBreakerRegistry>,
    pub dlq: Dlq,
    pub handlers: Arc<HandlerRegistry>,
    pub executor: Arc<Executor>,
    pub cancel: CancellationToken,
}

impl Runtime {
    /// Build a `Runtime` against a fresh connection pool for `db_config`,
    /// running migrations if they have not already been applied.
    pub async fn build(db_config: &DbConfig, config: RuntimeConfig) -> anyhow::Result<Self> {
        let pool = db_pool::create_pool(db_config).await?;
        db_pool::run_migrations(&pool).await?;
        Ok(Self::from_pool(pool, config))
    }

    /// Build a `Runtime` around an existing pool (used by tests that share
    /// a Postgres fixture already migrated by the caller).
    pub fn from_pool(pool: PgPool, config: RuntimeConfig) -> Self {
        let cancel = CancellationToken::new();
        let queue: Arc<dyn Queue> = Arc::new(PostgresQueue::new(pool.clone()));
        let breakers: Arc<dyn CircuitBreakerRegistry> =
            Arc::new(InMemoryBreakerRegistry::new(config.breaker));
        let dlq = Dlq::new(pool.clone());
        let handlers = Arc::new(HandlerRegistry::with_builtin_handlers());
        let scheduler = Arc::new(RetryScheduler::spawn(queue.clone(), cancel.clone()));
        let retry_policy = RetryPolicy::new(config.retry, breakers.clone());
        let executor = Arc::new(Executor::new(
            pool.clone(),
            queue.clone(),
            breakers.clone(),
            retry_policy,
            Dlq::new(pool.clone()),
            handlers.clone(),
            scheduler,
        ));

        Self {
            pool,
            queue,
            breakers,
            dlq,
            handlers,
            executor,
            cancel,
        }
    }

    /// Request cooperative shutdown of every worker loop sharing this
    /// runtime's `cancel` token.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

//! Postgres-backed persistence for the task store, work queue, and
//! dead-letter queue. Row types live in [`models`]; query functions are
//! grouped by owning table under [`queries`].

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;

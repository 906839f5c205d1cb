//! Process configuration (§10.1): typed fields loaded from environment
//! variables, with CLI-flag overrides for the one value every subcommand
//! needs (the database URL).

use std::env;

use taskd_core::breaker::BreakerConfig;
use taskd_core::retry::RetryConfig;
use taskd_core::runtime::RuntimeConfig;
use taskd_core::worker::WorkerConfig;
use taskd_db::config::DbConfig;

/// Resolved process configuration.
///
/// `queue_url` and `secret_key` are carried as opaque fields for
/// forward-compatibility with deployments that point at an alternate queue
/// backend or terminate secrets elsewhere; this crate's logic never reads
/// them, since alternate backends and authN/authZ are explicit non-goals.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub queue_url: Option<String>,
    pub max_retries: i32,
    pub retry_delay_seconds: u64,
    pub failure_threshold: u32,
    pub recovery_timeout_seconds: i64,
    pub lease_ttl_seconds: i64,
    pub debug: bool,
    pub secret_key: Option<String>,
}

impl Config {
    pub const DEFAULT_MAX_RETRIES: i32 = 3;
    pub const DEFAULT_RETRY_DELAY_SECONDS: u64 = 5;
    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
    pub const DEFAULT_RECOVERY_TIMEOUT_SECONDS: i64 = 60;
    pub const DEFAULT_LEASE_TTL_SECONDS: i64 = 300;

    /// Build configuration from the environment, falling back to the
    /// defaults named in §10.1 for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("TASKD_DATABASE_URL")
                .unwrap_or_else(|_| DbConfig::DEFAULT_URL.to_owned()),
            queue_url: env::var("TASKD_QUEUE_URL").ok(),
            max_retries: env_parsed("TASKD_MAX_RETRIES", Self::DEFAULT_MAX_RETRIES),
            retry_delay_seconds: env_parsed(
                "TASKD_RETRY_DELAY_SECONDS",
                Self::DEFAULT_RETRY_DELAY_SECONDS,
            ),
            failure_threshold: env_parsed(
                "TASKD_FAILURE_THRESHOLD",
                Self::DEFAULT_FAILURE_THRESHOLD,
            ),
            recovery_timeout_seconds: env_parsed(
                "TASKD_RECOVERY_TIMEOUT_SECONDS",
                Self::DEFAULT_RECOVERY_TIMEOUT_SECONDS,
            ),
            lease_ttl_seconds: env_parsed("TASKD_LEASE_TTL_SECONDS", Self::DEFAULT_LEASE_TTL_SECONDS),
            debug: env::var("TASKD_DEBUG")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            secret_key: env::var("TASKD_SECRET_KEY").ok(),
        }
    }

    /// Resolve the database URL: CLI flag wins over the environment.
    pub fn resolve(cli_database_url: Option<&str>) -> Self {
        let mut config = Self::from_env();
        if let Some(url) = cli_database_url {
            config.database_url = url.to_string();
        }
        config
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_url.clone())
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            retry: RetryConfig {
                base_delay_seconds: self.retry_delay_seconds,
            },
            breaker: BreakerConfig {
                failure_threshold: self.failure_threshold,
                recovery_timeout_seconds: self.recovery_timeout_seconds,
            },
        }
    }

    pub fn worker_config(&self, concurrency: usize) -> WorkerConfig {
        WorkerConfig {
            concurrency,
            lease_ttl_seconds: self.lease_ttl_seconds,
            ..WorkerConfig::default()
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let _lock = lock_env();
        for key in [
            "TASKD_DATABASE_URL",
            "TASKD_MAX_RETRIES",
            "TASKD_FAILURE_THRESHOLD",
            "TASKD_DEBUG",
        ] {
            unsafe { env::remove_var(key) };
        }

        let config = Config::from_env();
        assert_eq!(config.database_url, DbConfig::DEFAULT_URL);
        assert_eq!(config.max_retries, Config::DEFAULT_MAX_RETRIES);
        assert_eq!(config.failure_threshold, Config::DEFAULT_FAILURE_THRESHOLD);
        assert!(!config.debug);
    }

    #[test]
    fn env_overrides_defaults() {
        let _lock = lock_env();
        unsafe { env::set_var("TASKD_MAX_RETRIES", "7") };
        unsafe { env::set_var("TASKD_DEBUG", "true") };

        let config = Config::from_env();
        assert_eq!(config.max_retries, 7);
        assert!(config.debug);

        unsafe { env::remove_var("TASKD_MAX_RETRIES") };
        unsafe { env::remove_var("TASKD_DEBUG") };
    }

    #[test]
    fn cli_flag_overrides_env_database_url() {
        let _lock = lock_env();
        unsafe { env::set_var("TASKD_DATABASE_URL", "postgresql://env:5432/envdb") };

        let config = Config::resolve(Some("postgresql://cli:5432/clidb"));
        assert_eq!(config.database_url, "postgresql://cli:5432/clidb");

        unsafe { env::remove_var("TASKD_DATABASE_URL") };
    }

    #[test]
    fn unparsable_numeric_env_falls_back_to_default() {
        let _lock = lock_env();
        unsafe { env::set_var("TASKD_MAX_RETRIES", "not-a-number") };

        let config = Config::from_env();
        assert_eq!(config.max_retries, Config::DEFAULT_MAX_RETRIES);

        unsafe { env::remove_var("TASKD_MAX_RETRIES") };
    }
}

mod breaker_cmd;
mod config;
mod dlq_cmd;
mod queue_cmd;
mod serve_cmd;
mod stats_cmd;
mod submit_cmd;
mod task_cmd;
#[cfg(test)]
mod test_util;
mod worker_cmd;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use config::Config;
use taskd_core::runtime::Runtime;
use taskd_db::pool;

#[derive(Parser)]
#[command(name = "taskd", about = "Asynchronous task-processing service")]
struct Cli {
    /// Database URL (overrides TASKD_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an example environment file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/taskd")]
        db_url: String,
        /// Overwrite an existing environment file
        #[arg(long)]
        force: bool,
    },
    /// Database management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Submit a new task
    Submit {
        /// Task kind (e.g. text_processing, ai_summarization, batch_processing, image_processing)
        kind: String,
        /// Path to a JSON payload file, or "-" to read from stdin
        payload_file: String,
        /// Maximum retry attempts before dead-lettering
        #[arg(long, default_value_t = Config::DEFAULT_MAX_RETRIES)]
        max_retries: i32,
    },
    /// Task inspection
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Work queue management
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Circuit breaker management
    Breaker {
        #[command(subcommand)]
        command: BreakerCommands,
    },
    /// Dead-letter queue management
    Dlq {
        #[command(subcommand)]
        command: DlqCommands,
    },
    /// Aggregate execution/breaker/DLQ statistics
    Stats,
    /// Worker process management
    Worker {
        #[command(subcommand)]
        command: WorkerCommands,
    },
    /// Start the optional read-only HTTP control surface
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Create the database (if needed) and run migrations
    Init,
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Show a single task
    Get { task_id: i64 },
    /// List recent tasks
    List {
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
}

#[derive(Subcommand)]
enum QueueCommands {
    /// Show ready/in-flight counts
    Stats,
    /// Reclaim leases past their TTL back onto the ready queue
    Cleanup,
}

#[derive(Subcommand)]
enum BreakerCommands {
    /// List every observed breaker
    List,
    /// Force a breaker back to closed
    Reset { kind: String },
}

#[derive(Subcommand)]
enum DlqCommands {
    /// List dead-lettered tasks
    List {
        /// Filter to a single task kind
        #[arg(long)]
        kind: Option<String>,
    },
    /// Resurrect a dead-lettered task back to pending
    Requeue { task_id: i64 },
    /// Permanently remove dead-letter entries older than a cutoff
    Purge {
        #[arg(long)]
        kind: Option<String>,
        #[arg(long, default_value_t = 24)]
        older_than_hours: i64,
    },
}

#[derive(Subcommand)]
enum WorkerCommands {
    /// Start the pop-execute loop until interrupted
    Run {
        /// Maximum number of jobs running concurrently
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },
}

/// Execute `taskd init`: write an example environment file.
fn cmd_init(db_url: &str, force: bool) -> Result<()> {
    let path = std::path::Path::new(".env.taskd");
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; use --force to overwrite.",
            path.display()
        );
    }

    let contents = format!(
        "# taskd environment configuration\n\
         TASKD_DATABASE_URL={db_url}\n\
         TASKD_MAX_RETRIES={max_retries}\n\
         TASKD_RETRY_DELAY_SECONDS={retry_delay}\n\
         TASKD_FAILURE_THRESHOLD={threshold}\n\
         TASKD_RECOVERY_TIMEOUT_SECONDS={recovery}\n\
         TASKD_LEASE_TTL_SECONDS={lease_ttl}\n\
         TASKD_DEBUG=false\n",
        max_retries = Config::DEFAULT_MAX_RETRIES,
        retry_delay = Config::DEFAULT_RETRY_DELAY_SECONDS,
        threshold = Config::DEFAULT_FAILURE_THRESHOLD,
        recovery = Config::DEFAULT_RECOVERY_TIMEOUT_SECONDS,
        lease_ttl = Config::DEFAULT_LEASE_TTL_SECONDS,
    );
    std::fs::write(path, contents)?;

    println!("Wrote {}", path.display());
    println!("Next: source it and run `taskd db init`.");
    Ok(())
}

/// Execute `taskd db init`: create database and run migrations.
async fn cmd_db_init(config: &Config) -> Result<()> {
    println!("Initializing taskd database...");
    let db_config = config.db_config();

    pool::ensure_database_exists(&db_config).await?;
    let db_pool = pool::create_pool(&db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;
    println!("taskd db init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::resolve(cli.database_url.as_deref());

    match cli.command {
        Commands::Init { db_url, force } => {
            cmd_init(&db_url, force)?;
        }
        Commands::Db { command } => match command {
            DbCommands::Init => cmd_db_init(&config).await?,
        },
        Commands::Submit {
            kind,
            payload_file,
            max_retries,
        } => {
            let rt = Runtime::build(&config.db_config(), config.runtime_config()).await?;
            let result = submit_cmd::run_submit(&rt, &kind, &payload_file, max_retries).await;
            rt.pool.close().await;
            result?;
        }
        Commands::Task { command } => {
            let rt = Runtime::build(&config.db_config(), config.runtime_config()).await?;
            let result = match command {
                TaskCommands::Get { task_id } => task_cmd::run_task_get(&rt, task_id).await,
                TaskCommands::List { limit, offset } => {
                    task_cmd::run_task_list(&rt, limit, offset).await
                }
            };
            rt.pool.close().await;
            result?;
        }
        Commands::Queue { command } => {
            let rt = Runtime::build(&config.db_config(), config.runtime_config()).await?;
            let result = match command {
                QueueCommands::Stats => queue_cmd::run_queue_stats(&rt).await,
                QueueCommands::Cleanup => queue_cmd::run_queue_cleanup(&rt).await,
            };
            rt.pool.close().await;
            result?;
        }
        Commands::Breaker { command } => {
            let rt = Runtime::build(&config.db_config(), config.runtime_config()).await?;
            let result = match command {
                BreakerCommands::List => breaker_cmd::run_breaker_list(&rt),
                BreakerCommands::Reset { kind } => breaker_cmd::run_breaker_reset(&rt, &kind),
            };
            rt.pool.close().await;
            result?;
        }
        Commands::Dlq { command } => {
            let rt = Runtime::build(&config.db_config(), config.runtime_config()).await?;
            let result = match command {
                DlqCommands::List { kind } => dlq_cmd::run_dlq_list(&rt, kind.as_deref()).await,
                DlqCommands::Requeue { task_id } => dlq_cmd::run_dlq_requeue(&rt, task_id).await,
                DlqCommands::Purge {
                    kind,
                    older_than_hours,
                } => dlq_cmd::run_dlq_purge(&rt, kind.as_deref(), older_than_hours).await,
            };
            rt.pool.close().await;
            result?;
        }
        Commands::Stats => {
            let rt = Runtime::build(&config.db_config(), config.runtime_config()).await?;
            let result = stats_cmd::run_stats(&rt).await;
            rt.pool.close().await;
            result?;
        }
        Commands::Worker { command } => match command {
            WorkerCommands::Run { concurrency } => {
                let rt = Runtime::build(&config.db_config(), config.runtime_config()).await?;
                let worker_config = config.worker_config(concurrency);
                let result = worker_cmd::run_worker_cmd(&rt, worker_config).await;
                rt.pool.close().await;
                result?;
            }
        },
        Commands::Serve { bind, port } => {
            let rt = Runtime::build(&config.db_config(), config.runtime_config()).await?;
            let rt = Arc::new(rt);
            serve_cmd::run_serve(rt, &bind, port).await?;
        }
    }

    Ok(())
}

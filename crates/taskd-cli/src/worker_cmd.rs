//! `taskd worker run` command: start the pop-execute loop (C7) until
//! interrupted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use taskd_core::runtime::Runtime;
use taskd_core::worker::{run_worker, WorkerConfig};

/// Run a worker loop against `rt` until Ctrl+C; a second Ctrl+C force-exits
/// without waiting out the shutdown grace period.
pub async fn run_worker_cmd(rt: &Runtime, config: WorkerConfig) -> Result<()> {
    println!(
        "Starting worker (concurrency={}, lease_ttl={}s)...",
        config.concurrency, config.lease_ttl_seconds
    );

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let got_first_signal = Arc::new(AtomicBool::new(false));
    let got_first_clone = Arc::clone(&got_first_signal);

    tokio::spawn(async move {
        loop {
            tokio::signal::ctrl_c().await.ok();
            if got_first_clone.swap(true, Ordering::SeqCst) {
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            eprintln!("\nShutting down worker gracefully (Ctrl+C again to force)...");
            cancel_clone.cancel();
        }
    });

    run_worker(rt.executor.clone(), rt.queue.clone(), config, cancel).await;
    println!("Worker stopped.");
    Ok(())
}

//! `taskd queue stats`/`taskd queue cleanup` commands.

use anyhow::Result;
use taskd_core::{control, runtime::Runtime};

pub async fn run_queue_stats(rt: &Runtime) -> Result<()> {
    let stats = control::queue_stats(rt).await?;
    println!("Queue:");
    println!("  ready:      {}", stats.size);
    println!("  in_flight:  {}", stats.in_flight);
    println!("  total:      {}", stats.total_pending);
    Ok(())
}

pub async fn run_queue_cleanup(rt: &Runtime) -> Result<()> {
    let reclaimed = control::queue_cleanup(rt).await?;
    println!("Reclaimed {reclaimed} stale lease(s).");
    Ok(())
}

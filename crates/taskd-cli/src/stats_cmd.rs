//! `taskd stats` command: aggregate execution/breaker/DLQ snapshot.

use anyhow::Result;
use taskd_core::{control, runtime::Runtime};

pub async fn run_stats(rt: &Runtime) -> Result<()> {
    let stats = control::stats(rt).await?;

    println!("Execution:");
    println!("  total_executed: {}", stats.execution.total_executed);
    println!("  successful:     {}", stats.execution.successful);
    println!("  failed:         {}", stats.execution.failed);
    println!("  retried:        {}", stats.execution.retried);
    if let Some(rate) = stats.execution.success_rate {
        println!("  success_rate:   {:.1}%", rate * 100.0);
    }
    println!();

    println!("Breakers:");
    if stats.breakers.is_empty() {
        println!("  none observed yet");
    }
    for record in &stats.breakers {
        println!(
            "  {:<20} {:<10} failures={}",
            record.kind,
            control::breaker_state_label(record),
            record.failures,
        );
    }
    println!();

    println!("Dead-letter queue: {} entries", stats.dlq_size);
    Ok(())
}

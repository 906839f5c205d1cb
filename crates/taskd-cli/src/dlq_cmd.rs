//! `taskd dlq list`/`requeue`/`purge` commands.

use anyhow::Result;
use taskd_core::{control, runtime::Runtime};

pub async fn run_dlq_list(rt: &Runtime, kind: Option<&str>) -> Result<()> {
    let entries = control::dlq_list(rt, kind).await?;

    if entries.is_empty() {
        println!("Dead-letter queue is empty.");
        return Ok(());
    }

    println!("{:<8} {:<20} {:<10} {:<30}", "TASK", "KIND", "RETRIES", "ERROR");
    println!("{}", "-".repeat(70));
    for entry in &entries {
        println!(
            "{:<8} {:<20} {:>3}/{:<6} {:<30}",
            entry.task_id,
            entry.kind,
            entry.retry_count,
            entry.max_retries,
            entry.error_kind.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

pub async fn run_dlq_requeue(rt: &Runtime, task_id: i64) -> Result<()> {
    match control::dlq_requeue(rt, task_id).await? {
        Some(task) => println!("Requeued task {} ({}), pending retry.", task.id, task.kind),
        None => println!("No dead-lettered task {task_id} found."),
    }
    Ok(())
}

pub async fn run_dlq_purge(rt: &Runtime, kind: Option<&str>, older_than_hours: i64) -> Result<()> {
    let purged = control::dlq_purge(rt, kind, older_than_hours).await?;
    println!("Purged {purged} dead-letter entry(ies).");
    Ok(())
}

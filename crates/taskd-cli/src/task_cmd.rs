//! `taskd task get`/`taskd task list` commands.

use anyhow::Result;
use taskd_core::{control, runtime::Runtime};

pub async fn run_task_get(rt: &Runtime, task_id: i64) -> Result<()> {
    let task = match control::get_task(rt, task_id).await? {
        Some(task) => task,
        None => {
            println!("task {task_id} not found");
            return Ok(());
        }
    };

    println!("Task: {} ({})", task.id, task.kind);
    println!("Status: {}", task.status);
    println!("Retries: {}/{}", task.retry_count, task.max_retries);
    println!("Created: {}", task.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(started) = task.started_at {
        println!("Started: {}", started.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(completed) = task.completed_at {
        println!("Completed: {}", completed.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(kind) = &task.error_kind {
        println!("Error: {} ({})", task.error_message.as_deref().unwrap_or(""), kind);
    }
    if let Some(result) = &task.result {
        println!("Result: {result}");
    }
    Ok(())
}

pub async fn run_task_list(rt: &Runtime, limit: i64, offset: i64) -> Result<()> {
    let tasks = control::list_tasks(rt, limit, offset).await?;

    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    println!("{:<8} {:<20} {:<10} {:>8}", "ID", "KIND", "STATUS", "RETRIES");
    println!("{}", "-".repeat(50));
    for task in &tasks {
        println!(
            "{:<8} {:<20} {:<10} {:>8}",
            task.id,
            task.kind,
            task.status,
            format!("{}/{}", task.retry_count, task.max_retries),
        );
    }
    Ok(())
}

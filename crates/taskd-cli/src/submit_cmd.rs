//! `taskd submit` command: create a task and enqueue it for pickup.

use anyhow::{Context, Result};
use taskd_core::{control, runtime::Runtime};

/// Submit a new task of `kind` whose payload is read from `payload_file`
/// (a JSON file), or from stdin if `payload_file` is `-`.
pub async fn run_submit(
    rt: &Runtime,
    kind: &str,
    payload_file: &str,
    max_retries: i32,
) -> Result<()> {
    let raw = if payload_file == "-" {
        std::io::read_to_string(std::io::stdin()).context("failed to read payload from stdin")?
    } else {
        std::fs::read_to_string(payload_file)
            .with_context(|| format!("failed to read payload file {payload_file}"))?
    };
    let payload: serde_json::Value =
        serde_json::from_str(&raw).context("payload is not valid JSON")?;

    let task = control::submit(rt, kind, payload, max_retries).await?;
    println!("Submitted task {} ({})", task.id, task.kind);
    Ok(())
}

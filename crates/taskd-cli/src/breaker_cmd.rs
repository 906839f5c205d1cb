//! `taskd breaker list`/`taskd breaker reset` commands.

use anyhow::Result;
use taskd_core::{control, runtime::Runtime};

pub fn run_breaker_list(rt: &Runtime) -> Result<()> {
    let breakers = control::breakers_list(rt);

    if breakers.is_empty() {
        println!("No breakers observed yet.");
        return Ok(());
    }

    println!("{:<20} {:<10} {:>10}", "KIND", "STATE", "FAILURES");
    println!("{}", "-".repeat(42));
    for record in &breakers {
        println!(
            "{:<20} {:<10} {:>10}",
            record.kind,
            control::breaker_state_label(record),
            record.failures,
        );
    }
    Ok(())
}

pub fn run_breaker_reset(rt: &Runtime, kind: &str) -> Result<()> {
    control::breaker_reset(rt, kind);
    println!("Breaker for {kind} reset to closed.");
    Ok(())
}

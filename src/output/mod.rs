//! Rendering of batch reports and single-command results.

use anyhow::Result;
use console::style;
use serde::Serialize;

use crate::batch::{BatchOutcome, BatchReport, TaskStatus};
use crate::utils::format_duration;

/// Print a batch report, either as structured JSON or as a styled
/// per-item log with summary counts.
pub fn print_report<O: Serialize>(report: &BatchReport<O>, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for result in &report.results {
        match result.status {
            TaskStatus::Success => {
                let attempts = if result.attempts > 1 {
                    format!(", {} attempts", result.attempts)
                } else {
                    String::new()
                };
                println!(
                    "  {} {} ({}{})",
                    style("✓").green(),
                    result.item,
                    format_duration(result.elapsed_secs),
                    attempts
                );
            }
            TaskStatus::Failed => {
                println!(
                    "  {} {} - {}",
                    style("✗").red(),
                    result.item,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            TaskStatus::Skipped => {
                println!("  {} {} (skipped)", style("-").yellow(), result.item);
            }
        }
    }

    let counts = format!(
        "{} succeeded, {} failed, {} skipped",
        report.succeeded(),
        report.failed(),
        report.skipped()
    );

    match report.outcome {
        BatchOutcome::Completed => {
            println!("\n{} {}", style("Batch completed:").green().bold(), counts);
        }
        BatchOutcome::PartialFailure => {
            println!(
                "\n{} {}",
                style("Batch completed with failures:").yellow().bold(),
                counts
            );
        }
        BatchOutcome::Aborted => {
            println!("\n{} {}", style("Batch aborted:").red().bold(), counts);
        }
    }

    Ok(())
}

/// Print any serializable result as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

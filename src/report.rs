// src/report.rs

//! Human-readable run output: one line per diagnostic plus a summary.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::events::BuildEvents;
use crate::scheduler::{RunResult, Severity, StageStatus};

/// Diagnostic lines (`ERROR [stage] message`) followed by the summary line.
pub fn format_run_result(result: &RunResult) -> Vec<String> {
    let mut lines = Vec::new();

    for stage in &result.stages {
        if stage.status == StageStatus::Skipped {
            lines.push(format!("SKIP [{}]", stage.stage));
            continue;
        }
        for diag in &stage.diagnostics {
            let level = match diag.severity {
                Severity::Error => "ERROR",
                Severity::Warning => "WARN",
            };
            lines.push(format!("{level} [{}] {diag}", stage.stage));
        }
    }

    lines.push(summary_line(result));
    lines
}

pub fn summary_line(result: &RunResult) -> String {
    let outcome = if result.is_success() { "succeeded" } else { "failed" };
    format!(
        "[assetflow] task '{}' {outcome}: {} stages, {} cached, {} failed ({} ms)",
        result.task,
        result.stages.len(),
        result.cache_hits(),
        result.failed_stages().count(),
        result.duration.as_millis()
    )
}

/// Diagnostics go to stderr, the summary to stdout.
pub fn print_run_result(result: &RunResult) {
    let mut lines = format_run_result(result);
    let summary = lines.pop().unwrap_or_default();
    for line in lines {
        eprintln!("{line}");
    }
    println!("{summary}");
}

/// Print every completed run until the event bus closes.
pub fn spawn_printer(events: &BuildEvents) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => print_run_result(&event.result),
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "printer lagged behind"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

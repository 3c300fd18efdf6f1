// src/engine/mod.rs

//! Run orchestration for one-shot and watch modes.
//!
//! This module ties together:
//! - the trigger queue (what happens when a task is triggered while it runs)
//! - the main runtime event loop that reacts to:
//!   - manual and file-watch triggers
//!   - finished runs
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::scheduler::RunStatus;

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Why a task was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Manual trigger (the command's task at startup).
    Manual,
    /// Triggered due to a filesystem event.
    FileWatch,
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// If true, exit once no run is in flight and nothing is queued (one-shot
    /// commands).
    pub exit_when_idle: bool,
}

/// Events flowing into the runtime from the watcher, the backend and signals.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A task should be run.
    TaskTriggered {
        task: TaskName,
        reason: TriggerReason,
    },
    /// A run started by the backend has finished.
    RunFinished {
        task: TaskName,
        status: RunStatus,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// Totals over every run the runtime performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub runs: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, status: RunStatus) {
        self.runs += 1;
        if status == RunStatus::Failure {
            self.failed += 1;
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use queue::TriggerQueue;
pub use runtime::Runtime;

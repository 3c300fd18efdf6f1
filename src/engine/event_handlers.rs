// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::engine::queue::TriggerQueue;
use crate::engine::{RunSummary, RuntimeOptions, TaskName, TriggerReason};
use crate::scheduler::RunStatus;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Start a scheduler run for this task.
    StartRun { task: TaskName, reason: TriggerReason },
    /// Request that the process exits (one-shot mode when idle, or after a
    /// shutdown once in-flight runs have drained).
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn keep_running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    fn exit() -> Self {
        Self {
            commands: vec![CoreCommand::RequestExit],
            keep_running: false,
        }
    }
}

/// Mutable state the handlers work on.
#[derive(Debug)]
pub struct CoreState<'a> {
    pub known: &'a BTreeSet<TaskName>,
    pub in_flight: &'a mut BTreeSet<TaskName>,
    pub queue: &'a mut TriggerQueue,
    pub options: &'a RuntimeOptions,
    pub shutting_down: &'a mut bool,
    pub summary: &'a mut RunSummary,
}

/// Handle a task trigger event.
///
/// - Unknown tasks and triggers during shutdown are dropped.
/// - An idle task starts right away. Different tasks run concurrently.
/// - A running task gets at most one queued follow-up; the in-flight run is
///   never cancelled.
pub fn handle_task_trigger(state: CoreState<'_>, task: TaskName, reason: TriggerReason) -> CoreStep {
    if *state.shutting_down {
        debug!(task = %task, "shutting down; ignoring trigger");
        return CoreStep::keep_running(Vec::new());
    }
    if !state.known.contains(&task) {
        warn!(task = %task, "trigger for unknown task ignored");
        return CoreStep::keep_running(Vec::new());
    }

    if state.in_flight.contains(&task) {
        state.queue.record_trigger(&task, reason);
        return CoreStep::keep_running(Vec::new());
    }

    state.in_flight.insert(task.clone());
    CoreStep::keep_running(vec![CoreCommand::StartRun { task, reason }])
}

/// Handle the end of a run: start its queued follow-up or, when nothing is
/// left to do, decide whether to exit.
pub fn handle_run_finished(state: CoreState<'_>, task: TaskName, status: RunStatus) -> CoreStep {
    if !state.in_flight.remove(&task) {
        warn!(task = %task, "finished event for a task that was not running");
    }
    state.summary.record(status);
    debug!(task = %task, ?status, in_flight = state.in_flight.len(), "run finished");

    if *state.shutting_down {
        return drained_or_wait(state);
    }

    if let Some(reason) = state.queue.take(&task) {
        state.in_flight.insert(task.clone());
        return CoreStep::keep_running(vec![CoreCommand::StartRun { task, reason }]);
    }

    if state.options.exit_when_idle && state.in_flight.is_empty() && state.queue.is_empty() {
        return CoreStep::exit();
    }

    CoreStep::keep_running(Vec::new())
}

/// Stop accepting triggers, drop queued follow-ups and wait for in-flight
/// runs to finish.
pub fn handle_shutdown(state: CoreState<'_>) -> CoreStep {
    if !*state.shutting_down {
        let dropped = state.queue.clear();
        info!(
            in_flight = state.in_flight.len(),
            dropped_follow_ups = dropped,
            "shutdown requested"
        );
        *state.shutting_down = true;
    }
    drained_or_wait(state)
}

fn drained_or_wait(state: CoreState<'_>) -> CoreStep {
    if state.in_flight.is_empty() {
        CoreStep::exit()
    } else {
        CoreStep::keep_running(Vec::new())
    }
}

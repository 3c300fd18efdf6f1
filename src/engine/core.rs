// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) reads events from channels,
//! starts runs on the backend and handles Ctrl-C. The core is unit tested
//! without any Tokio, channels, filesystem or processes.

use std::collections::BTreeSet;

use crate::engine::event_handlers::{
    handle_run_finished, handle_shutdown, handle_task_trigger, CoreState, CoreStep,
};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RunSummary, RuntimeEvent, RuntimeOptions, TaskName};
use crate::graph::TaskGraph;

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    known: BTreeSet<TaskName>,
    in_flight: BTreeSet<TaskName>,
    queue: TriggerQueue,
    options: RuntimeOptions,
    shutting_down: bool,
    summary: RunSummary,
}

impl CoreRuntime {
    pub fn new<I, S>(tasks: I, options: RuntimeOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        Self {
            known: tasks.into_iter().map(Into::into).collect(),
            in_flight: BTreeSet::new(),
            queue: TriggerQueue::new(),
            options,
            shutting_down: false,
            summary: RunSummary::default(),
        }
    }

    pub fn from_graph(graph: &TaskGraph, options: RuntimeOptions) -> Self {
        Self::new(graph.names(), options)
    }

    /// True when nothing runs and nothing is queued.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty() && self.queue.is_empty()
    }

    pub fn is_running(&self, task: &str) -> bool {
        self.in_flight.contains(task)
    }

    pub fn has_pending(&self, task: &str) -> bool {
        self.queue.contains(task)
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        let state = CoreState {
            known: &self.known,
            in_flight: &mut self.in_flight,
            queue: &mut self.queue,
            options: &self.options,
            shutting_down: &mut self.shutting_down,
            summary: &mut self.summary,
        };
        match event {
            RuntimeEvent::TaskTriggered { task, reason } => handle_task_trigger(state, task, reason),
            RuntimeEvent::RunFinished { task, status } => handle_run_finished(state, task, status),
            RuntimeEvent::ShutdownRequested => handle_shutdown(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CoreCommand, TriggerReason};
    use crate::scheduler::RunStatus;

    fn core(exit_when_idle: bool) -> CoreRuntime {
        CoreRuntime::new(["styles", "scripts"], RuntimeOptions { exit_when_idle })
    }

    fn trigger(task: &str) -> RuntimeEvent {
        RuntimeEvent::TaskTriggered {
            task: task.into(),
            reason: TriggerReason::FileWatch,
        }
    }

    fn finished(task: &str, status: RunStatus) -> RuntimeEvent {
        RuntimeEvent::RunFinished {
            task: task.into(),
            status,
        }
    }

    fn starts(step: &CoreStep) -> Vec<&str> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::StartRun { task, .. } => Some(task.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn retrigger_while_running_coalesces_into_one_follow_up() {
        let mut core = core(false);
        assert_eq!(starts(&core.step(trigger("styles"))), vec!["styles"]);

        // Same task again: never a second concurrent run.
        for _ in 0..3 {
            assert!(starts(&core.step(trigger("styles"))).is_empty());
        }
        assert!(core.has_pending("styles"));

        let step = core.step(finished("styles", RunStatus::Success));
        assert_eq!(starts(&step), vec!["styles"]);
        assert!(!core.has_pending("styles"));

        let step = core.step(finished("styles", RunStatus::Success));
        assert!(starts(&step).is_empty());
        assert!(core.is_idle());
        assert_eq!(core.summary().runs, 2);
    }

    #[test]
    fn different_tasks_run_concurrently() {
        let mut core = core(false);
        assert_eq!(starts(&core.step(trigger("styles"))), vec!["styles"]);
        assert_eq!(starts(&core.step(trigger("scripts"))), vec!["scripts"]);
        assert!(core.is_running("styles") && core.is_running("scripts"));
    }

    #[test]
    fn unknown_task_is_ignored() {
        let mut core = core(false);
        let step = core.step(trigger("nope"));
        assert!(step.commands.is_empty());
        assert!(step.keep_running);
    }

    #[test]
    fn one_shot_exits_when_idle_and_counts_failures() {
        let mut core = core(true);
        core.step(trigger("styles"));
        let step = core.step(finished("styles", RunStatus::Failure));
        assert!(!step.keep_running);
        assert_eq!(step.commands, vec![CoreCommand::RequestExit]);
        assert!(!core.summary().is_success());
    }

    #[test]
    fn shutdown_drops_queue_and_waits_for_in_flight() {
        let mut core = core(false);
        core.step(trigger("styles"));
        core.step(trigger("styles"));

        let step = core.step(RuntimeEvent::ShutdownRequested);
        assert!(step.keep_running);
        assert!(core.queue_is_empty());

        // Intake is closed.
        assert!(starts(&core.step(trigger("scripts"))).is_empty());

        let step = core.step(finished("styles", RunStatus::Success));
        assert!(!step.keep_running);
        assert!(starts(&step).is_empty());
    }

    #[test]
    fn shutdown_when_idle_exits_immediately() {
        let mut core = core(false);
        let step = core.step(RuntimeEvent::ShutdownRequested);
        assert!(!step.keep_running);
    }
}

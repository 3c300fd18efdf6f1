// src/engine/queue.rs

use std::collections::BTreeMap;

use tracing::debug;

use super::{TaskName, TriggerReason};

/// Follow-up runs requested while a task was already running.
///
/// Semantics:
/// - At most one pending follow-up per task. Further triggers for the same
///   task coalesce into it; the first reason is kept.
/// - A running task is never cancelled; its follow-up starts once it
///   finishes.
/// - Ordered by task name so draining is deterministic.
#[derive(Debug, Default)]
pub struct TriggerQueue {
    pending: BTreeMap<TaskName, TriggerReason>,
}

impl TriggerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are no queued triggers.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn contains(&self, task: &str) -> bool {
        self.pending.contains_key(task)
    }

    /// Record a trigger for a running task. Returns false when it merged into
    /// an already pending follow-up.
    pub fn record_trigger(&mut self, task: &str, reason: TriggerReason) -> bool {
        if self.pending.contains_key(task) {
            debug!(task = %task, "coalesced trigger into pending follow-up");
            return false;
        }
        debug!(task = %task, ?reason, "queued follow-up run");
        self.pending.insert(task.to_string(), reason);
        true
    }

    /// Remove and return the pending follow-up for `task`.
    pub fn take(&mut self, task: &str) -> Option<TriggerReason> {
        self.pending.remove(task)
    }

    /// Drop everything; returns how many follow-ups were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_most_one_follow_up_per_task() {
        let mut q = TriggerQueue::new();
        assert!(q.record_trigger("styles", TriggerReason::FileWatch));
        assert!(!q.record_trigger("styles", TriggerReason::Manual));
        assert!(q.record_trigger("scripts", TriggerReason::FileWatch));
        assert_eq!(q.len(), 2);

        assert_eq!(q.take("styles"), Some(TriggerReason::FileWatch));
        assert_eq!(q.take("styles"), None);
        assert_eq!(q.clear(), 1);
        assert!(q.is_empty());
    }
}

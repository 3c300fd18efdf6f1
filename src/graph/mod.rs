// src/graph/mod.rs

//! Stages, tasks and the validated task graph.
//!
//! A [`Stage`] is a leaf transformation. A [`Task`] is either a stage or a
//! `sequence`/`parallel` combinator over other tasks referenced by name.
//! [`TaskGraphBuilder`] validates the whole set (unknown names, cycles) and
//! produces an immutable [`TaskGraph`] that the scheduler walks.

pub mod builder;
pub mod stage;
pub mod task;

use std::collections::HashMap;
use std::sync::Arc;

pub use builder::TaskGraphBuilder;
pub use stage::{Operation, Options, Stage};
pub use task::{Task, TaskNode};

use crate::engine::TaskName;
use crate::types::RefreshKind;

/// Validated, acyclic set of tasks keyed by name.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    order: Vec<TaskName>,
    tasks: HashMap<TaskName, Task>,
}

impl TaskGraph {
    /// Callers must have checked references and acyclicity.
    pub(crate) fn new_unchecked(order: Vec<TaskName>, tasks: HashMap<TaskName, Task>) -> Self {
        Self { order, tasks }
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Task names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// Tasks in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|n| self.tasks.get(n))
    }

    /// Every declared stage, in declaration order.
    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.tasks().filter_map(|t| match t.node() {
            TaskNode::Stage(stage) => Some(stage.as_ref()),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn refresh_of(&self, name: &str) -> RefreshKind {
        self.get(name).map(Task::refresh).unwrap_or_default()
    }

    /// Stages reachable from `name`, depth-first in execution order.
    ///
    /// A stage used twice appears twice.
    pub fn stages_under(&self, name: &str) -> Vec<Arc<Stage>> {
        let mut out = Vec::new();
        self.collect_stages(name, &mut out);
        out
    }

    fn collect_stages(&self, name: &str, out: &mut Vec<Arc<Stage>>) {
        let Some(task) = self.get(name) else { return };
        match task.node() {
            TaskNode::Stage(stage) => out.push(Arc::clone(stage)),
            TaskNode::Sequence { children, .. } | TaskNode::Parallel { children, .. } => {
                for child in children {
                    self.collect_stages(child, out);
                }
            }
        }
    }
}

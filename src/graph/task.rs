// src/graph/task.rs

use std::sync::Arc;

use crate::engine::TaskName;
use crate::graph::stage::Stage;
use crate::types::{FailurePolicy, RefreshKind};

/// Body of a task: a leaf stage or a combinator over other tasks by name.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskNode {
    Stage(Arc<Stage>),
    Sequence {
        children: Vec<TaskName>,
        policy: FailurePolicy,
    },
    Parallel {
        children: Vec<TaskName>,
        policy: FailurePolicy,
    },
}

/// A named node of the task graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    name: TaskName,
    node: TaskNode,
    refresh: RefreshKind,
}

impl Task {
    pub fn stage(stage: Stage) -> Self {
        Self {
            name: stage.name.clone(),
            node: TaskNode::Stage(Arc::new(stage)),
            refresh: RefreshKind::default(),
        }
    }

    pub fn sequence<I, S>(name: impl Into<TaskName>, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        Self {
            name: name.into(),
            node: TaskNode::Sequence {
                children: children.into_iter().map(Into::into).collect(),
                policy: FailurePolicy::default(),
            },
            refresh: RefreshKind::default(),
        }
    }

    pub fn parallel<I, S>(name: impl Into<TaskName>, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        Self {
            name: name.into(),
            node: TaskNode::Parallel {
                children: children.into_iter().map(Into::into).collect(),
                policy: FailurePolicy::default(),
            },
            refresh: RefreshKind::default(),
        }
    }

    /// Set the failure policy. No effect on stage leaves.
    pub fn with_policy(mut self, new_policy: FailurePolicy) -> Self {
        match &mut self.node {
            TaskNode::Sequence { policy, .. } | TaskNode::Parallel { policy, .. } => {
                *policy = new_policy;
            }
            TaskNode::Stage(_) => {}
        }
        self
    }

    pub fn with_refresh(mut self, refresh: RefreshKind) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> &TaskNode {
        &self.node
    }

    pub fn refresh(&self) -> RefreshKind {
        self.refresh
    }

    /// Names this task refers to directly. Empty for stages.
    pub fn children(&self) -> &[TaskName] {
        match &self.node {
            TaskNode::Stage(_) => &[],
            TaskNode::Sequence { children, .. } | TaskNode::Parallel { children, .. } => {
                children.as_slice()
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.node {
            TaskNode::Stage(_) => "stage",
            TaskNode::Sequence { .. } => "sequence",
            TaskNode::Parallel { .. } => "parallel",
        }
    }
}

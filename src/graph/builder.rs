// src/graph/builder.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::engine::TaskName;
use crate::errors::{AssetflowError, Result};
use crate::graph::stage::Stage;
use crate::graph::task::Task;
use crate::graph::TaskGraph;
use crate::types::FailurePolicy;

/// Collects stages and combinators, then validates them into a [`TaskGraph`].
///
/// Children are referenced by name, so a task can be declared before the
/// tasks it refers to. All checks happen in [`TaskGraphBuilder::build`]:
/// duplicate names, unknown references, empty combinators and cycles are
/// reported as configuration errors before anything runs.
#[derive(Debug, Default)]
pub struct TaskGraphBuilder {
    tasks: Vec<Task>,
}

impl TaskGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn stage(self, stage: Stage) -> Self {
        self.task(Task::stage(stage))
    }

    /// Children run strictly in order; a failure does not stop later steps.
    pub fn sequence<I, S>(self, name: impl Into<TaskName>, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        self.task(Task::sequence(name, children))
    }

    pub fn parallel<I, S>(self, name: impl Into<TaskName>, children: I, policy: FailurePolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        self.task(Task::parallel(name, children).with_policy(policy))
    }

    pub fn build(self) -> Result<TaskGraph> {
        let mut order = Vec::with_capacity(self.tasks.len());
        let mut by_name: HashMap<TaskName, Task> = HashMap::with_capacity(self.tasks.len());

        for task in self.tasks {
            if by_name.contains_key(task.name()) {
                return Err(AssetflowError::ConfigError(format!(
                    "task '{}' is declared more than once",
                    task.name()
                )));
            }
            order.push(task.name().to_string());
            by_name.insert(task.name().to_string(), task);
        }

        validate_references(&order, &by_name)?;
        validate_acyclic(&order, &by_name)?;

        debug!(tasks = order.len(), "task graph validated");
        Ok(TaskGraph::new_unchecked(order, by_name))
    }
}

fn validate_references(order: &[TaskName], tasks: &HashMap<TaskName, Task>) -> Result<()> {
    for name in order {
        let task = &tasks[name];
        if task.kind() != "stage" && task.children().is_empty() {
            return Err(AssetflowError::ConfigError(format!(
                "{} task '{}' has no children",
                task.kind(),
                name
            )));
        }
        for child in task.children() {
            if child == name {
                return Err(AssetflowError::GraphCycle(format!(
                    "task '{}' includes itself",
                    name
                )));
            }
            if !tasks.contains_key(child) {
                return Err(AssetflowError::ConfigError(format!(
                    "task '{}' references unknown task '{}'",
                    name, child
                )));
            }
        }
    }
    Ok(())
}

fn validate_acyclic(order: &[TaskName], tasks: &HashMap<TaskName, Task>) -> Result<()> {
    // Edge direction: parent -> child.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in order {
        graph.add_node(name.as_str());
    }

    for name in order {
        for child in tasks[name].children() {
            graph.add_edge(name.as_str(), child.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(AssetflowError::GraphCycle(format!(
            "cycle detected in task graph involving task '{}'",
            cycle.node_id()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> Stage {
        Stage::new(name).input(format!("{name}/**/*"))
    }

    #[test]
    fn builds_nested_composition() {
        let graph = TaskGraphBuilder::new()
            .stage(leaf("lint"))
            .stage(leaf("dev"))
            .stage(leaf("prod"))
            .sequence("styles", ["lint", "dev", "prod"])
            .parallel("all", ["styles", "lint"], FailurePolicy::FailSafe)
            .build()
            .unwrap();

        assert_eq!(graph.len(), 5);
        let stages: Vec<_> = graph
            .stages_under("all")
            .iter()
            .map(|s| s.name.clone())
            .collect();
        assert_eq!(stages, vec!["lint", "dev", "prod", "lint"]);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let err = TaskGraphBuilder::new()
            .stage(leaf("a"))
            .sequence("loop", ["a", "loop"])
            .build()
            .unwrap_err();
        assert!(matches!(err, AssetflowError::GraphCycle(_)), "{err}");
        assert!(err.is_configuration());
    }

    #[test]
    fn transitive_cycle_is_rejected() {
        let err = TaskGraphBuilder::new()
            .stage(leaf("a"))
            .sequence("x", ["a", "y"])
            .parallel("y", ["z"], FailurePolicy::FailFast)
            .sequence("z", ["x"])
            .build()
            .unwrap_err();
        assert!(matches!(err, AssetflowError::GraphCycle(_)), "{err}");
    }

    #[test]
    fn unknown_child_is_config_error() {
        let err = TaskGraphBuilder::new()
            .sequence("x", ["missing"])
            .build()
            .unwrap_err();
        assert!(matches!(err, AssetflowError::ConfigError(_)));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = TaskGraphBuilder::new()
            .stage(leaf("a"))
            .sequence("a", ["a"])
            .build()
            .unwrap_err();
        assert!(matches!(err, AssetflowError::ConfigError(_)));
    }

    #[test]
    fn empty_combinator_is_rejected() {
        let err = TaskGraphBuilder::new()
            .parallel("nothing", Vec::<String>::new(), FailurePolicy::FailSafe)
            .build()
            .unwrap_err();
        assert!(matches!(err, AssetflowError::ConfigError(_)));
    }
}

// tests/graph_properties.rs

mod common;
use crate::common::builders::scheduler_with;
use crate::common::mock_project;
use crate::common::transforms::{EventLog, RecordingTransform};

use std::path::Path;

use proptest::prelude::*;

use assetflow::errors::AssetflowError;
use assetflow::graph::{Operation, Stage, Task, TaskGraph, TaskGraphBuilder};
use assetflow::transform::TransformRegistry;
use assetflow::types::FailurePolicy;

/// Shape of one generated combinator: kind and raw child picks.
#[derive(Debug, Clone)]
struct Combinator {
    parallel: bool,
    picks: Vec<usize>,
}

// Strategy to generate a valid layered graph.
// We ensure acyclicity by only allowing combinator N to refer to stages and
// combinators 0..N-1.
fn graph_strategy(max_stages: usize, max_combinators: usize) -> impl Strategy<Value = (usize, Vec<Combinator>)> {
    (1..=max_stages, 1..=max_combinators).prop_flat_map(|(stages, combinators)| {
        let combinator = (any::<bool>(), proptest::collection::vec(any::<usize>(), 1..4))
            .prop_map(|(parallel, picks)| Combinator { parallel, picks });
        (Just(stages), proptest::collection::vec(combinator, combinators))
    })
}

fn build_graph(stages: usize, combinators: &[Combinator], all_sequences: bool) -> TaskGraph {
    let mut builder = TaskGraphBuilder::new();
    let mut names: Vec<String> = Vec::new();

    for i in 0..stages {
        let name = format!("stage_{i}");
        builder = builder.stage(
            Stage::new(&name)
                .input("src/*.txt")
                .operation(Operation::new("record")),
        );
        names.push(name);
    }

    for (i, c) in combinators.iter().enumerate() {
        let name = format!("task_{i}");
        let children: Vec<String> = c.picks.iter().map(|p| names[p % names.len()].clone()).collect();
        let task = if c.parallel && !all_sequences {
            Task::parallel(&name, children).with_policy(FailurePolicy::FailSafe)
        } else {
            Task::sequence(&name, children)
        };
        builder = builder.task(task);
        names.push(name);
    }

    builder.build().expect("layered graphs are acyclic")
}

fn run_top(graph: TaskGraph, top: &str) -> (Vec<String>, Vec<String>) {
    let log = EventLog::default();
    let registry = TransformRegistry::new().with("record", RecordingTransform::new(log.clone()));
    let (_mock, fs) = mock_project(&[("src/a.txt", "a")]);
    let (scheduler, _cache) = scheduler_with(graph, registry, fs, Path::new("."));

    let rt = tokio::runtime::Runtime::new().unwrap();
    let result = rt.block_on(scheduler.run(top)).unwrap();
    assert!(result.is_success());

    let ran: Vec<String> = result.stages.iter().map(|s| s.stage.clone()).collect();
    let started: Vec<String> = log
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| e.strip_prefix("start:").map(str::to_string))
        .collect();
    (ran, started)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn sequences_run_stages_in_depth_first_order(
        (stages, combinators) in graph_strategy(5, 6)
    ) {
        let graph = build_graph(stages, &combinators, true);
        let top = format!("task_{}", combinators.len() - 1);
        let expected: Vec<String> = graph.stages_under(&top).iter().map(|s| s.name.clone()).collect();

        let (ran, started) = run_top(graph, &top);

        prop_assert_eq!(&ran, &expected);
        prop_assert_eq!(&started, &expected);
    }

    #[test]
    fn every_reachable_stage_runs_once_per_use(
        (stages, combinators) in graph_strategy(5, 6)
    ) {
        let graph = build_graph(stages, &combinators, false);
        let top = format!("task_{}", combinators.len() - 1);
        let mut expected: Vec<String> = graph.stages_under(&top).iter().map(|s| s.name.clone()).collect();

        let (mut ran, mut started) = run_top(graph, &top);

        expected.sort();
        ran.sort();
        started.sort();
        prop_assert_eq!(&ran, &expected);
        prop_assert_eq!(&started, &expected);
    }

    #[test]
    fn rings_are_rejected_as_cycles(len in 2usize..6) {
        let mut builder = TaskGraphBuilder::new().stage(Stage::new("leaf").input("src/*.txt"));
        for i in 0..len {
            let next = format!("ring_{}", (i + 1) % len);
            builder = builder.sequence(format!("ring_{i}"), ["leaf".to_string(), next]);
        }

        let err = builder.build().unwrap_err();
        prop_assert!(matches!(err, AssetflowError::GraphCycle(_)), "{}", err);
    }
}

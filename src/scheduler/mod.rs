// src/scheduler/mod.rs

//! Executes a task graph to completion and produces a [`RunResult`].
//!
//! Sequences are walked in order; parallel children are futures joined on
//! the current tokio task. Every stage problem is contained in its
//! [`StageResult`]; only an unknown task name escapes [`Scheduler::run`].

pub mod inputs;
pub mod result;
mod stage;

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use tracing::{debug, info};

pub use result::{
    CacheOutcome, Diagnostic, RunResult, RunStatus, Severity, StageResult, StageStatus,
};

use crate::cache::CacheStore;
use crate::errors::{AssetflowError, Result};
use crate::events::BuildEvents;
use crate::fs::FileSystem;
use crate::graph::{TaskGraph, TaskNode};
use crate::transform::TransformRegistry;
use crate::types::{BuildMode, FailurePolicy};

/// Owns the cache store and is the only component that writes outputs.
#[derive(Debug, Clone)]
pub struct Scheduler {
    graph: Arc<TaskGraph>,
    registry: Arc<TransformRegistry>,
    cache: Arc<dyn CacheStore>,
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    mode: BuildMode,
    events: Option<BuildEvents>,
}

impl Scheduler {
    /// Checks every stage's operations against `registry` before anything
    /// can run.
    pub fn new(
        graph: Arc<TaskGraph>,
        registry: Arc<TransformRegistry>,
        cache: Arc<dyn CacheStore>,
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
    ) -> Result<Self> {
        for stage in graph.stages() {
            registry.validate_stage(stage)?;
        }
        Ok(Self {
            graph,
            registry,
            cache,
            fs,
            root: root.into(),
            mode: BuildMode::default(),
            events: None,
        })
    }

    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    /// Publish a `BuildCompleted` event after each run.
    pub fn with_events(mut self, events: BuildEvents) -> Self {
        self.events = Some(events);
        self
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    /// Run `task` and everything below it.
    pub async fn run(&self, task: &str) -> Result<RunResult> {
        if !self.graph.contains(task) {
            return Err(AssetflowError::TaskNotFound(task.to_string()));
        }

        let started = Instant::now();
        info!(task = %task, mode = %self.mode, "run started");

        let stages = self.run_node(task, &CancelScope::default()).await;
        let result = RunResult::new(task, stages, started.elapsed());

        info!(
            task = %task,
            status = ?result.status,
            stages = result.stages.len(),
            cache_hits = result.cache_hits(),
            elapsed_ms = result.duration.as_millis() as u64,
            "run finished"
        );

        if let Some(events) = &self.events {
            events.emit(result.clone());
        }
        Ok(result)
    }

    /// Remove `<root>/<output_root>`.
    ///
    /// Refuses paths that could reach outside the project.
    pub async fn clean(&self, output_root: &Path) -> Result<()> {
        check_relative_dir(output_root)?;
        let target = self.root.join(output_root);
        info!(path = ?target, "cleaning output root");

        let fs = Arc::clone(&self.fs);
        blocking(move || fs.remove_dir_all(&target)).await?;
        Ok(())
    }

    pub async fn clear_cache(&self) -> Result<()> {
        info!("clearing cache");
        let cache = Arc::clone(&self.cache);
        blocking(move || cache.clear().map_err(anyhow::Error::from)).await?;
        Ok(())
    }

    fn run_node<'a>(&'a self, name: &'a str, scope: &'a CancelScope) -> BoxFuture<'a, Vec<StageResult>> {
        async move {
            let Some(task) = self.graph.get(name) else {
                return Vec::new();
            };

            match task.node() {
                TaskNode::Stage(stage) => {
                    if scope.is_cancelled() {
                        return vec![StageResult::skipped(
                            stage.name.clone(),
                            "skipped after a sibling failed",
                        )];
                    }
                    vec![self.run_stage(Arc::clone(stage)).await]
                }
                TaskNode::Sequence { children, policy } => {
                    let mut results = Vec::new();
                    let mut failed = false;
                    for child in children {
                        if scope.is_cancelled() || (failed && *policy == FailurePolicy::FailFast) {
                            debug!(task = %name, child = %child, "skipping sequence child");
                            results.extend(self.skip_all(child, name));
                            continue;
                        }
                        let child_results = self.run_node(child, scope).await;
                        failed |= child_results.iter().any(StageResult::is_failure);
                        results.extend(child_results);
                    }
                    results
                }
                TaskNode::Parallel { children, policy } => {
                    let scope = scope.child();
                    let scope = &scope;
                    let runs = children.iter().map(|child| async move {
                        let results = self.run_node(child, scope).await;
                        if *policy == FailurePolicy::FailFast
                            && results.iter().any(StageResult::is_failure)
                        {
                            debug!(task = %name, child = %child, "fail-fast: cancelling siblings");
                            scope.cancel();
                        }
                        results
                    });
                    join_all(runs).await.into_iter().flatten().collect()
                }
            }
        }
        .boxed()
    }

    fn skip_all(&self, name: &str, parent: &str) -> Vec<StageResult> {
        self.graph
            .stages_under(name)
            .into_iter()
            .map(|stage| {
                StageResult::skipped(
                    stage.name.clone(),
                    format!("skipped after a failure in '{parent}'"),
                )
            })
            .collect()
    }
}

/// Cancellation flags of the enclosing fail-fast combinators.
#[derive(Debug, Default)]
struct CancelScope {
    flags: Vec<Arc<AtomicBool>>,
}

impl CancelScope {
    fn child(&self) -> Self {
        let mut flags = self.flags.clone();
        flags.push(Arc::new(AtomicBool::new(false)));
        Self { flags }
    }

    fn cancel(&self) {
        if let Some(flag) = self.flags.last() {
            flag.store(true, Ordering::SeqCst);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.flags.iter().any(|f| f.load(Ordering::SeqCst))
    }
}

fn check_relative_dir(dir: &Path) -> Result<()> {
    let safe = !dir.as_os_str().is_empty()
        && dir.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && dir.components().any(|c| matches!(c, Component::Normal(_)));
    if safe {
        Ok(())
    } else {
        Err(AssetflowError::ConfigError(format!(
            "refusing to clean {dir:?}: output root must be a relative directory inside the project"
        )))
    }
}

/// Run synchronous filesystem work off the async threads.
pub(crate) async fn blocking<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("blocking filesystem task failed")?
}

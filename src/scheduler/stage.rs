// src/scheduler/stage.rs

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::bail;
use futures::FutureExt;
use tracing::{debug, info, warn};

use super::inputs::resolve_inputs;
use super::{blocking, CacheOutcome, Diagnostic, Scheduler, StageResult};
use crate::cache::{CacheEntry, CacheError, Fingerprint};
use crate::graph::Stage;
use crate::transform::{Artifact, TransformContext};

impl Scheduler {
    /// Resolve inputs, consult the cache, run the operations and write the
    /// artifacts of one stage.
    pub(super) async fn run_stage(&self, stage: Arc<Stage>) -> StageResult {
        let started = Instant::now();
        let mut result = self.execute_stage(&stage).await;
        result.duration = started.elapsed();

        if result.is_success() {
            info!(
                stage = %stage.name,
                cache = ?result.cache,
                transforms = result.transforms_run,
                outputs = result.outputs.len(),
                elapsed_ms = result.duration.as_millis() as u64,
                "stage finished"
            );
        } else {
            warn!(
                stage = %stage.name,
                diagnostics = result.diagnostics.len(),
                "stage failed"
            );
        }
        result
    }

    async fn execute_stage(&self, stage: &Arc<Stage>) -> StageResult {
        let name = stage.name.clone();

        let inputs = match self.load_inputs(stage).await {
            Ok(inputs) => inputs,
            Err(e) => {
                return StageResult::failure(
                    name,
                    vec![Diagnostic::error(format!("reading inputs: {e:#}"))],
                );
            }
        };

        if inputs.is_empty() {
            debug!(stage = %name, "no inputs matched; nothing to do");
            return StageResult::success(name, CacheOutcome::Bypassed);
        }

        let key = stage
            .cache
            .then(|| Fingerprint::compute(stage, self.mode, &inputs));

        if let Some(key) = key
            && let Some(entry) = self.cache_lookup(&name, key).await
        {
            return match self.write_outputs(stage, entry.artifacts).await {
                Ok(outputs) => StageResult {
                    diagnostics: entry.diagnostics,
                    outputs,
                    ..StageResult::success(name, CacheOutcome::Hit)
                },
                Err(e) => StageResult::failure(
                    name,
                    vec![Diagnostic::error(format!("writing cached outputs: {e:#}"))],
                ),
            };
        }

        let mut artifacts = inputs;
        let mut diagnostics = Vec::new();
        let mut transforms_run = 0;

        for op in &stage.operations {
            let Some(transform) = self.registry.get(&op.uses) else {
                diagnostics.push(Diagnostic::error(format!("unknown operation '{}'", op.uses)));
                return failed(name, diagnostics, transforms_run);
            };
            let ctx = TransformContext {
                stage: &name,
                operation: op,
                mode: self.mode,
                root: &self.root,
            };

            transforms_run += 1;
            debug!(stage = %name, operation = %op.uses, artifacts = artifacts.len(), "applying");

            match AssertUnwindSafe(transform.apply(ctx, artifacts))
                .catch_unwind()
                .await
            {
                Ok(Ok(output)) => {
                    let has_error = output.diagnostics.iter().any(Diagnostic::is_error);
                    diagnostics.extend(output.diagnostics);
                    if has_error {
                        return failed(name, diagnostics, transforms_run);
                    }
                    artifacts = output.artifacts;
                }
                Ok(Err(e)) => {
                    diagnostics.push(Diagnostic::error(format!("{}: {e:#}", op.uses)));
                    return failed(name, diagnostics, transforms_run);
                }
                Err(panic) => {
                    diagnostics.push(Diagnostic::error(format!(
                        "{} panicked: {}",
                        op.uses,
                        panic_message(panic.as_ref())
                    )));
                    return failed(name, diagnostics, transforms_run);
                }
            }
        }

        let cache = match key {
            Some(key) => {
                let entry = CacheEntry::new(key, artifacts.clone())
                    .with_diagnostics(diagnostics.clone());
                self.cache_store(&name, entry).await;
                CacheOutcome::Miss
            }
            None => CacheOutcome::Bypassed,
        };

        match self.write_outputs(stage, artifacts).await {
            Ok(outputs) => StageResult {
                diagnostics,
                transforms_run,
                outputs,
                ..StageResult::success(name, cache)
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(format!("writing outputs: {e:#}")));
                failed(name, diagnostics, transforms_run)
            }
        }
    }

    async fn load_inputs(&self, stage: &Arc<Stage>) -> anyhow::Result<Vec<Artifact>> {
        let fs = Arc::clone(&self.fs);
        let root = self.root.clone();
        let stage = Arc::clone(stage);

        blocking(move || {
            let files = resolve_inputs(fs.as_ref(), &root, &stage)?;
            files
                .into_iter()
                .map(|file| -> anyhow::Result<Artifact> {
                    Ok(Artifact::new(file.relative, fs.read(&file.path)?))
                })
                .collect()
        })
        .await
    }

    /// A corrupted entry is reported and treated as a miss.
    async fn cache_lookup(&self, stage: &str, key: Fingerprint) -> Option<CacheEntry> {
        let cache = Arc::clone(&self.cache);
        match blocking(move || Ok(cache.get(&key))).await {
            Ok(Ok(hit)) => {
                debug!(stage = %stage, key = %key, hit = hit.is_some(), "cache lookup");
                hit
            }
            Ok(Err(CacheError::Corrupted { key, reason })) => {
                warn!(stage = %stage, key = %key, reason = %reason, "cache corruption; rebuilding");
                None
            }
            Ok(Err(e)) => {
                warn!(stage = %stage, error = %e, "cache lookup failed; rebuilding");
                None
            }
            Err(e) => {
                warn!(stage = %stage, error = %e, "cache lookup failed; rebuilding");
                None
            }
        }
    }

    async fn cache_store(&self, stage: &str, entry: CacheEntry) {
        let cache = Arc::clone(&self.cache);
        if let Err(e) = blocking(move || cache.put(entry).map_err(anyhow::Error::from)).await {
            warn!(stage = %stage, error = %e, "failed to store cache entry");
        }
    }

    /// Write artifacts below `<root>/<output>`; returns paths relative to the
    /// project root. Stages without an output directory write nothing.
    async fn write_outputs(&self, stage: &Stage, artifacts: Vec<Artifact>) -> anyhow::Result<Vec<PathBuf>> {
        let Some(output) = stage.output.clone() else {
            return Ok(Vec::new());
        };
        for artifact in &artifacts {
            if !is_plain_relative(&artifact.path) {
                bail!("artifact path {:?} escapes the output directory", artifact.path);
            }
        }

        let fs = Arc::clone(&self.fs);
        let root = self.root.clone();
        blocking(move || {
            let mut written = Vec::with_capacity(artifacts.len());
            for artifact in artifacts {
                let rel = output.join(&artifact.path);
                fs.write(&root.join(&rel), &artifact.contents)?;
                written.push(rel);
            }
            Ok(written)
        })
        .await
    }
}

fn failed(stage: String, diagnostics: Vec<Diagnostic>, transforms_run: usize) -> StageResult {
    StageResult {
        transforms_run,
        ..StageResult::failure(stage, diagnostics)
    }
}

fn is_plain_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

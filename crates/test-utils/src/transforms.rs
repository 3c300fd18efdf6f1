#![allow(dead_code)]

//! Fake transforms for scheduler tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetflow::scheduler::Diagnostic;
use assetflow::transform::{Artifact, Transform, TransformContext, TransformFuture, TransformOutput};

/// Passes inputs through and counts how often it ran.
#[derive(Debug, Clone, Default)]
pub struct CountingTransform {
    calls: Arc<AtomicUsize>,
}

impl CountingTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transform for CountingTransform {
    fn apply<'a>(&'a self, _ctx: TransformContext<'a>, inputs: Vec<Artifact>) -> TransformFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { Ok(TransformOutput::new(inputs)) })
    }
}

/// Fails every time, either with an error diagnostic or an `Err`.
///
/// Restricted with [`FailingTransform::only_in`], it passes the inputs of
/// every other stage through untouched.
#[derive(Debug, Clone)]
pub struct FailingTransform {
    message: String,
    as_error: bool,
    stages: Vec<String>,
}

impl FailingTransform {
    /// Reports an error-severity diagnostic against the first input.
    pub fn diagnostic(message: &str) -> Self {
        Self {
            message: message.to_string(),
            as_error: false,
            stages: Vec::new(),
        }
    }

    /// Returns `Err` from `apply`.
    pub fn error(message: &str) -> Self {
        Self {
            message: message.to_string(),
            as_error: true,
            stages: Vec::new(),
        }
    }

    /// Fail only in the named stages.
    pub fn only_in(mut self, stages: &[&str]) -> Self {
        self.stages = stages.iter().map(|s| s.to_string()).collect();
        self
    }
}

impl Transform for FailingTransform {
    fn apply<'a>(&'a self, ctx: TransformContext<'a>, inputs: Vec<Artifact>) -> TransformFuture<'a> {
        Box::pin(async move {
            if !self.stages.is_empty() && !self.stages.iter().any(|s| s == ctx.stage) {
                return Ok(TransformOutput::new(inputs));
            }
            if self.as_error {
                anyhow::bail!("{}", self.message);
            }
            let mut diagnostic = Diagnostic::error(self.message.clone());
            if let Some(first) = inputs.first() {
                diagnostic = diagnostic.in_file(first.path_str()).at_line(1);
            }
            Ok(TransformOutput::new(inputs).with_diagnostics(vec![diagnostic]))
        })
    }
}

/// Succeeds but reports a warning against the first input.
#[derive(Debug, Clone)]
pub struct WarningTransform {
    message: String,
}

impl WarningTransform {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl Transform for WarningTransform {
    fn apply<'a>(&'a self, _ctx: TransformContext<'a>, inputs: Vec<Artifact>) -> TransformFuture<'a> {
        Box::pin(async move {
            let mut diagnostic = Diagnostic::warning(self.message.clone());
            if let Some(first) = inputs.first() {
                diagnostic = diagnostic.in_file(first.path_str()).at_line(1);
            }
            Ok(TransformOutput::new(inputs).with_diagnostics(vec![diagnostic]))
        })
    }
}

/// Always panics.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingTransform;

impl Transform for PanickingTransform {
    fn apply<'a>(&'a self, ctx: TransformContext<'a>, _inputs: Vec<Artifact>) -> TransformFuture<'a> {
        Box::pin(async move { explode(ctx.stage) })
    }
}

fn explode(stage: &str) -> anyhow::Result<TransformOutput> {
    panic!("transform for '{stage}' blew up")
}

/// Shared, ordered log of `start:<stage>` / `end:<stage>` entries.
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// Passes inputs through, logging when each stage starts and ends.
///
/// An optional delay between the two lets tests observe overlap.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransform {
    log: EventLog,
    delay: Duration,
}

impl RecordingTransform {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl Transform for RecordingTransform {
    fn apply<'a>(&'a self, ctx: TransformContext<'a>, inputs: Vec<Artifact>) -> TransformFuture<'a> {
        Box::pin(async move {
            self.log.lock().unwrap().push(format!("start:{}", ctx.stage));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.log.lock().unwrap().push(format!("end:{}", ctx.stage));
            Ok(TransformOutput::new(inputs))
        })
    }
}

/// Upper-cases UTF-8 contents; stands in for a real compiler.
#[derive(Debug, Clone, Copy, Default)]
pub struct UppercaseTransform;

impl Transform for UppercaseTransform {
    fn apply<'a>(&'a self, _ctx: TransformContext<'a>, inputs: Vec<Artifact>) -> TransformFuture<'a> {
        Box::pin(async move {
            let artifacts = inputs
                .into_iter()
                .map(|a| {
                    let upper = String::from_utf8_lossy(&a.contents).to_uppercase();
                    Artifact::new(a.path, upper)
                })
                .collect();
            Ok(TransformOutput::new(artifacts))
        })
    }
}

// src/transform/mod.rs

//! Transform seam between the scheduler and the tools that actually compile,
//! minify, optimise or lint assets.
//!
//! A stage is a chain of [`Operation`]s. Each operation names a registered
//! [`Transform`], receives the artifacts produced by the previous step and
//! returns new artifacts plus diagnostics. The scheduler owns all file IO:
//! transforms only ever see bytes and relative paths.

pub mod builtin;
pub mod command;
pub mod registry;

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

pub use registry::TransformRegistry;

use crate::graph::Operation;
use crate::scheduler::Diagnostic;
use crate::types::BuildMode;

/// A file flowing through a stage.
///
/// `path` is relative: for inputs it is relative to the static part of the
/// glob that selected the file (`css/**/*.scss` selecting `css/a/b.scss`
/// yields `a/b.scss`); for outputs it is relative to the stage's output
/// directory.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// Forward-slash form of `path`, stable across platforms.
    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().replace('\\', "/")
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("path", &self.path)
            .field("bytes", &self.contents.len())
            .finish()
    }
}

/// What a transform gets to know about the step it is executing.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    pub stage: &'a str,
    pub operation: &'a Operation,
    pub mode: BuildMode,
    /// Project root; the working directory for external tools.
    pub root: &'a Path,
}

/// Result of one transform step.
#[derive(Debug, Default)]
pub struct TransformOutput {
    pub artifacts: Vec<Artifact>,
    pub diagnostics: Vec<Diagnostic>,
}

impl TransformOutput {
    pub fn new(artifacts: Vec<Artifact>) -> Self {
        Self {
            artifacts,
            diagnostics: Vec::new(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics.extend(diagnostics);
        self
    }
}

pub type TransformFuture<'a> =
    Pin<Box<dyn Future<Output = anyhow::Result<TransformOutput>> + Send + 'a>>;

/// An asynchronous step from artifacts to artifacts.
///
/// Returning `Err` or any error-severity diagnostic fails the stage; the
/// scheduler records it and carries on with the rest of the graph.
pub trait Transform: Send + Sync {
    /// Check an operation's options once, before any run starts.
    fn validate(&self, _operation: &Operation) -> anyhow::Result<()> {
        Ok(())
    }

    fn apply<'a>(&'a self, ctx: TransformContext<'a>, inputs: Vec<Artifact>) -> TransformFuture<'a>;
}

// src/graph/stage.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::engine::TaskName;

/// Free-form options attached to an operation (`suffix = ".min"`, ...).
///
/// A `BTreeMap` keeps iteration order stable, which the cache fingerprint
/// relies on.
pub type Options = BTreeMap<String, toml::Value>;

/// One step in a stage's processing chain, resolved against the
/// [`TransformRegistry`](crate::transform::TransformRegistry) by `uses`.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub uses: String,
    pub options: Options,
}

impl Operation {
    pub fn new(uses: impl Into<String>) -> Self {
        Self {
            uses: uses.into(),
            options: Options::new(),
        }
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn str_option(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }

    pub fn bool_option(&self, key: &str) -> Option<bool> {
        self.options.get(key).and_then(|v| v.as_bool())
    }
}

/// A single named transformation from input files to output artifacts.
///
/// Inputs are globs relative to the project root, evaluated in declaration
/// order. A leading `!` turns a glob into an exclusion, so
/// `["js/**/*.js", "!js/vendor/*.min.js"]` works as expected.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub name: TaskName,
    pub inputs: Vec<String>,
    /// Output directory relative to the project root. Stages without one
    /// (linters) produce no files.
    pub output: Option<PathBuf>,
    /// Whether results are memoised in the cache store.
    pub cache: bool,
    pub operations: Vec<Operation>,
}

impl Stage {
    pub fn new(name: impl Into<TaskName>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            output: None,
            cache: false,
            operations: Vec::new(),
        }
    }

    pub fn input(mut self, glob: impl Into<String>) -> Self {
        self.inputs.push(glob.into());
        self
    }

    pub fn output(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output = Some(dir.into());
        self
    }

    pub fn cached(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    /// Globs that select files, with any leading `./` removed.
    pub fn include_globs(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .filter(|g| !g.starts_with('!'))
            .map(|g| g.trim_start_matches("./"))
    }

    /// Globs prefixed with `!`, without the prefix.
    pub fn exclude_globs(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .filter_map(|g| g.strip_prefix('!'))
            .map(|g| g.trim_start_matches("./"))
    }
}

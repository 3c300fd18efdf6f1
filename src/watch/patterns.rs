// src/watch/patterns.rs

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use serde::Deserialize;

use crate::engine::TaskName;
use crate::types::RefreshKind;
use crate::watch::path_utils::split_glob;

/// A `[[watch]]` entry: which paths re-trigger which tasks.
///
/// ```toml
/// [[watch]]
/// paths = ["css/**/*.scss", "css/**/*.css"]
/// tasks = ["styles"]
/// commands = ["dev"]
///
/// # No build; connected pages just reload.
/// [[watch]]
/// paths = ["layouts/**/*"]
/// reload = "full"
/// ```
///
/// An empty `commands` list applies the entry to every watching command.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct WatchSubscription {
    pub paths: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<TaskName>,
    /// Signal connected pages directly instead of running tasks.
    #[serde(default)]
    pub reload: Option<RefreshKind>,
    #[serde(default)]
    pub commands: Vec<String>,
}

impl WatchSubscription {
    pub fn new<I, S, T, N>(paths: I, tasks: T) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        T: IntoIterator<Item = N>,
        N: Into<TaskName>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            tasks: tasks.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Changes to `paths` only signal a reload of kind `kind`.
    pub fn reload_only<I, S>(paths: I, kind: RefreshKind) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            reload: Some(kind),
            ..Self::default()
        }
    }

    pub fn exclude(mut self, glob: impl Into<String>) -> Self {
        self.exclude.push(glob.into());
        self
    }

    pub fn for_command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    pub fn applies_to(&self, command: &str) -> bool {
        self.commands.is_empty() || self.commands.iter().any(|c| c == command)
    }
}

/// Compiled watch/exclude glob patterns for a single subscription.
///
/// Patterns are relative to the project root; the watcher passes relative
/// paths (e.g. `"css/app.scss"`) into `matches`.
#[derive(Clone)]
pub struct CompiledSubscription {
    tasks: Vec<TaskName>,
    reload: Option<RefreshKind>,
    patterns: Vec<String>,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
    /// Static prefixes of `patterns`, relative to the project root.
    roots: Vec<PathBuf>,
}

impl fmt::Debug for CompiledSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSubscription")
            .field("patterns", &self.patterns)
            .field("tasks", &self.tasks)
            .field("reload", &self.reload)
            .finish_non_exhaustive()
    }
}

impl CompiledSubscription {
    pub fn tasks(&self) -> &[TaskName] {
        &self.tasks
    }

    pub fn reload(&self) -> Option<RefreshKind> {
        self.reload
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set
            && exclude.is_match(rel_path)
        {
            return false;
        }
        true
    }
}

pub fn compile_subscriptions(subs: &[WatchSubscription]) -> Result<Vec<CompiledSubscription>> {
    subs.iter()
        .map(|sub| {
            let watch_set = build_globset(&sub.paths)
                .with_context(|| format!("building watch globset for {:?}", sub.paths))?;
            let exclude_set = if sub.exclude.is_empty() {
                None
            } else {
                Some(
                    build_globset(&sub.exclude)
                        .with_context(|| format!("building exclude globset for {:?}", sub.paths))?,
                )
            };
            Ok(CompiledSubscription {
                tasks: sub.tasks.clone(),
                reload: sub.reload,
                patterns: sub.paths.clone(),
                watch_set,
                exclude_set,
                roots: sub.paths.iter().map(|p| split_glob(p).0).collect(),
            })
        })
        .collect()
}

/// Every task of every subscription matching `rel_path`.
pub fn tasks_for_path(subs: &[CompiledSubscription], rel_path: &str) -> BTreeSet<TaskName> {
    subs.iter()
        .filter(|s| s.matches(rel_path))
        .flat_map(|s| s.tasks.iter().cloned())
        .collect()
}

/// Refresh kinds of the reload-only subscriptions matching `rel_path`.
pub fn reloads_for_path(subs: &[CompiledSubscription], rel_path: &str) -> BTreeSet<RefreshKind> {
    subs.iter()
        .filter(|s| s.matches(rel_path))
        .filter_map(|s| s.reload)
        .collect()
}

/// Compile one glob with `*` not crossing directory separators.
pub fn compile_glob(pattern: &str) -> Result<globset::Glob> {
    GlobBuilder::new(pattern.trim_start_matches("./"))
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))
}

pub fn compile_matcher(pattern: &str) -> Result<GlobMatcher> {
    Ok(compile_glob(pattern)?.compile_matcher())
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(compile_glob(pat)?);
    }
    Ok(builder.build()?)
}

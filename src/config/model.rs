// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::graph::TaskGraph;
use crate::types::{CacheStorageMode, FailurePolicy, RefreshKind};
use crate::watch::WatchSubscription;

/// Top-level configuration exactly as read from `Assetflow.toml`.
///
/// ```toml
/// [config]
/// output_root = "assets"
///
/// [stage.fonts]
/// inputs = ["fonts/**/*"]
/// output = "assets/fonts"
/// operations = [{ uses = "copy" }]
///
/// [task.build]
/// sequence = ["fonts", "styles"]
///
/// [command.default]
/// task = "build"
/// watch = true
///
/// [[watch]]
/// paths = ["fonts/**/*"]
/// tasks = ["fonts"]
///
/// [[watch]]
/// paths = ["layouts/**/*"]
/// reload = "full"
/// ```
///
/// Validated into [`ConfigFile`] via `TryFrom`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub cache: CacheSection,

    /// `[stage.<name>]`, keyed by stage name.
    #[serde(default)]
    pub stage: BTreeMap<String, StageConfig>,

    /// `[task.<name>]` combinators, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// `[command.<name>]` entry points.
    #[serde(default)]
    pub command: BTreeMap<String, CommandConfig>,

    #[serde(default)]
    pub watch: Vec<WatchSubscription>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Directory removed by commands with `clean = true`.
    #[serde(default)]
    pub output_root: Option<String>,

    /// Coalescing window for file events, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Preferred port of the reload server; a free one is picked if taken.
    #[serde(default = "default_reload_port")]
    pub reload_port: u16,
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_reload_port() -> u16 {
    3333
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            output_root: None,
            debounce_ms: default_debounce_ms(),
            reload_port: default_reload_port(),
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    #[serde(default)]
    pub storage: CacheStorageMode,

    /// Relative to the project root.
    #[serde(default = "default_cache_dir")]
    pub dir: String,
}

fn default_cache_dir() -> String {
    ".assetflow/cache".to_string()
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            storage: CacheStorageMode::default(),
            dir: default_cache_dir(),
        }
    }
}

/// `[stage.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    /// Ordered globs; `!` excludes.
    #[serde(default)]
    pub inputs: Vec<String>,

    #[serde(default)]
    pub output: Option<String>,

    /// Memoise results in the cache store.
    #[serde(default)]
    pub cache: bool,

    #[serde(default)]
    pub operations: Vec<OperationConfig>,

    #[serde(default)]
    pub refresh: Option<RefreshKind>,
}

/// One entry of `operations = [...]`; every key besides `uses` is an option
/// for the transform.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationConfig {
    pub uses: String,

    #[serde(flatten)]
    pub options: BTreeMap<String, toml::Value>,
}

/// `[task.<name>]` section: exactly one of `sequence` / `parallel`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    #[serde(default)]
    pub sequence: Option<Vec<String>>,

    #[serde(default)]
    pub parallel: Option<Vec<String>>,

    #[serde(default)]
    pub policy: FailurePolicy,

    #[serde(default)]
    pub refresh: Option<RefreshKind>,
}

/// `[command.<name>]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CommandConfig {
    /// Filled from the section key; selects the `[[watch]]` entries.
    #[serde(skip)]
    pub name: String,

    /// Task run by the command.
    pub task: String,

    /// Remove `[config].output_root` first.
    #[serde(default)]
    pub clean: bool,

    /// Clear the cache first, in production mode or with
    /// `ASSETFLOW_CACHE=clear`.
    #[serde(default)]
    pub clear_cache: bool,

    /// Print the mode-relevant environment first.
    #[serde(default)]
    pub check_envs: bool,

    /// Start the reload server (watch mode only).
    #[serde(default)]
    pub reload: bool,

    /// Keep watching after the first run.
    #[serde(default)]
    pub watch: bool,
}

impl CommandConfig {
    /// A plain one-shot run of `task`.
    pub fn run_task(task: impl Into<String>) -> Self {
        let task = task.into();
        Self {
            name: task.clone(),
            task,
            clean: false,
            clear_cache: false,
            check_envs: false,
            reload: false,
            watch: false,
        }
    }
}

/// Validated configuration: references resolved, graph built and acyclic.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub cache: CacheSection,
    pub commands: BTreeMap<String, CommandConfig>,
    pub watch: Vec<WatchSubscription>,
    pub graph: TaskGraph,
}

impl ConfigFile {
    /// Resolve a command by name. A task name without a command section runs
    /// that task once.
    pub fn command(&self, name: &str) -> Option<CommandConfig> {
        self.commands.get(name).cloned().or_else(|| {
            self.graph
                .contains(name)
                .then(|| CommandConfig::run_task(name))
        })
    }

    /// The `[[watch]]` entries active while `command` watches.
    pub fn watch_for(&self, command: &str) -> Vec<WatchSubscription> {
        self.watch
            .iter()
            .filter(|sub| sub.applies_to(command))
            .cloned()
            .collect()
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.config.debounce_ms)
    }

    pub fn output_root(&self) -> Option<PathBuf> {
        self.config.output_root.as_ref().map(PathBuf::from)
    }
}

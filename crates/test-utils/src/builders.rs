#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use assetflow::cache::memory::MemoryCacheStore;
use assetflow::cache::CacheStore;
use assetflow::config::{
    CommandConfig, ConfigFile, OperationConfig, RawConfigFile, StageConfig, TaskConfig,
};
use assetflow::fs::FileSystem;
use assetflow::graph::TaskGraph;
use assetflow::scheduler::Scheduler;
use assetflow::transform::TransformRegistry;
use assetflow::types::{FailurePolicy, RefreshKind};
use assetflow::watch::WatchSubscription;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_stage(mut self, name: &str, stage: StageConfig) -> Self {
        self.config.stage.insert(name.to_string(), stage);
        self
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_command(mut self, name: &str, command: CommandConfig) -> Self {
        self.config.command.insert(name.to_string(), command);
        self
    }

    pub fn with_watch(mut self, subscription: WatchSubscription) -> Self {
        self.config.watch.push(subscription);
        self
    }

    pub fn with_output_root(mut self, dir: &str) -> Self {
        self.config.config.output_root = Some(dir.to_string());
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.config.config.debounce_ms = ms;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StageConfig`.
pub struct StageConfigBuilder {
    stage: StageConfig,
}

impl StageConfigBuilder {
    pub fn new() -> Self {
        Self {
            stage: StageConfig {
                inputs: vec![],
                output: None,
                cache: false,
                operations: vec![],
                refresh: None,
            },
        }
    }

    pub fn input(mut self, glob: &str) -> Self {
        self.stage.inputs.push(glob.to_string());
        self
    }

    pub fn output(mut self, dir: &str) -> Self {
        self.stage.output = Some(dir.to_string());
        self
    }

    pub fn cached(mut self) -> Self {
        self.stage.cache = true;
        self
    }

    pub fn operation(mut self, uses: &str) -> Self {
        self.stage.operations.push(OperationConfig {
            uses: uses.to_string(),
            options: BTreeMap::new(),
        });
        self
    }

    /// An operation with string options.
    pub fn operation_with(mut self, uses: &str, options: &[(&str, &str)]) -> Self {
        self.stage.operations.push(OperationConfig {
            uses: uses.to_string(),
            options: options
                .iter()
                .map(|(k, v)| (k.to_string(), toml::Value::String(v.to_string())))
                .collect(),
        });
        self
    }

    pub fn refresh(mut self, kind: RefreshKind) -> Self {
        self.stage.refresh = Some(kind);
        self
    }

    pub fn build(self) -> StageConfig {
        self.stage
    }
}

impl Default for StageConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn sequence(children: &[&str]) -> TaskConfig {
    TaskConfig {
        sequence: Some(children.iter().map(|c| c.to_string()).collect()),
        parallel: None,
        policy: FailurePolicy::default(),
        refresh: None,
    }
}

pub fn parallel(children: &[&str], policy: FailurePolicy) -> TaskConfig {
    TaskConfig {
        sequence: None,
        parallel: Some(children.iter().map(|c| c.to_string()).collect()),
        policy,
        refresh: None,
    }
}

/// Scheduler over `fs` rooted at `root`, with an in-memory cache.
pub fn scheduler_with(
    graph: TaskGraph,
    registry: TransformRegistry,
    fs: Arc<dyn FileSystem>,
    root: &Path,
) -> (Scheduler, Arc<dyn CacheStore>) {
    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
    let scheduler = Scheduler::new(
        Arc::new(graph),
        Arc::new(registry),
        Arc::clone(&cache),
        fs,
        root.to_path_buf(),
    )
    .expect("Failed to build scheduler");
    (scheduler, cache)
}

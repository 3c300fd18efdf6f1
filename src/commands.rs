// src/commands.rs

//! Command-layer helpers: built-in commands, cache clearing policy and the
//! dry-run description.

use crate::config::env::REPORTED_VARS;
use crate::config::{CommandConfig, ConfigFile, Environment};
use crate::graph::TaskNode;

/// The cache is cleared only when the command asks for it and either the
/// build is for production or `ASSETFLOW_CACHE=clear` (or `CACHE_ENV=clear`)
/// is set.
pub fn should_clear_cache(command: &CommandConfig, env: &Environment) -> bool {
    command.clear_cache && (env.mode.is_production() || env.force_cache_clear)
}

pub fn check_line() -> String {
    format!("assetflow {} OK", env!("CARGO_PKG_VERSION"))
}

/// `NAME = value` for each mode-relevant variable.
pub fn env_report(lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
    REPORTED_VARS
        .iter()
        .map(|key| {
            let value = lookup(key).unwrap_or_else(|| "(unset)".to_string());
            format!("{key} = {value}")
        })
        .collect()
}

/// Human-readable description of everything the config declares.
pub fn describe(cfg: &ConfigFile) -> Vec<String> {
    let mut lines = vec!["assetflow dry-run".to_string()];
    if let Some(root) = &cfg.config.output_root {
        lines.push(format!("  config.output_root = {root}"));
    }
    lines.push(format!("  config.debounce_ms = {}", cfg.config.debounce_ms));
    lines.push(format!(
        "  cache = {:?} at {}",
        cfg.cache.storage, cfg.cache.dir
    ));
    lines.push(String::new());

    lines.push(format!("tasks ({}):", cfg.graph.len()));
    for task in cfg.graph.tasks() {
        lines.push(format!("  - {} ({}, refresh = {})", task.name(), task.kind(), task.refresh()));
        match task.node() {
            TaskNode::Stage(stage) => {
                lines.push(format!("      inputs: {:?}", stage.inputs));
                if let Some(output) = &stage.output {
                    lines.push(format!("      output: {}", output.display()));
                }
                let ops: Vec<&str> = stage.operations.iter().map(|o| o.uses.as_str()).collect();
                lines.push(format!("      operations: {ops:?}"));
                if stage.cache {
                    lines.push("      cache: true".to_string());
                }
            }
            TaskNode::Sequence { children, policy } | TaskNode::Parallel { children, policy } => {
                lines.push(format!("      children: {children:?} ({policy:?})"));
            }
        }
    }

    if !cfg.watch.is_empty() {
        lines.push(String::new());
        lines.push(format!("watch ({}):", cfg.watch.len()));
        for sub in &cfg.watch {
            let action = match sub.reload {
                Some(kind) => format!("reload ({kind})"),
                None => format!("{:?}", sub.tasks),
            };
            let scope = if sub.commands.is_empty() {
                String::new()
            } else {
                format!(" [{}]", sub.commands.join(", "))
            };
            lines.push(format!("  - {:?} -> {action}{scope}", sub.paths));
        }
    }

    if !cfg.commands.is_empty() {
        lines.push(String::new());
        lines.push(format!("commands ({}):", cfg.commands.len()));
        for (name, cmd) in &cfg.commands {
            lines.push(format!(
                "  - {name}: task = {}, clean = {}, clear_cache = {}, reload = {}, watch = {}",
                cmd.task, cmd.clean, cmd.clear_cache, cmd.reload, cmd.watch
            ));
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BuildMode;

    #[test]
    fn cache_clear_needs_request_and_reason() {
        let mut cmd = CommandConfig::run_task("build");
        let dev = Environment::default();
        let prod = Environment {
            mode: BuildMode::Production,
            force_cache_clear: false,
        };
        let forced = Environment {
            mode: BuildMode::Development,
            force_cache_clear: true,
        };

        assert!(!should_clear_cache(&cmd, &prod));
        cmd.clear_cache = true;
        assert!(!should_clear_cache(&cmd, &dev));
        assert!(should_clear_cache(&cmd, &prod));
        assert!(should_clear_cache(&cmd, &forced));
    }

    #[test]
    fn env_report_marks_unset() {
        let lines = env_report(|k| (k == "NODE_ENV").then(|| "production".to_string()));
        assert_eq!(
            lines,
            vec![
                "ASSETFLOW_ENV = (unset)",
                "NODE_ENV = production",
                "ASSETFLOW_CACHE = (unset)",
                "CACHE_ENV = (unset)"
            ]
        );
    }
}

// src/config/validate.rs

use std::path::{Component, Path};

use crate::config::model::{ConfigFile, RawConfigFile, StageConfig, TaskConfig};
use crate::errors::{AssetflowError, Result};
use crate::graph::{Operation, Stage, Task, TaskGraph, TaskGraphBuilder};
use crate::watch::patterns::{compile_glob, compile_subscriptions};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = AssetflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let graph = build_graph(&raw)?;
        validate_references(&raw, &graph)?;

        let commands = raw
            .command
            .into_iter()
            .map(|(name, mut command)| {
                command.name = name.clone();
                (name, command)
            })
            .collect();

        Ok(ConfigFile {
            config: raw.config,
            cache: raw.cache,
            commands,
            watch: raw.watch,
            graph,
        })
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_stages(cfg)?;
    validate_global_config(cfg)?;
    validate_stages(cfg)?;
    validate_tasks(cfg)?;
    Ok(())
}

fn ensure_has_stages(cfg: &RawConfigFile) -> Result<()> {
    if cfg.stage.is_empty() {
        return Err(config_error(
            "config must contain at least one [stage.<name>] section",
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.debounce_ms == 0 {
        return Err(config_error("[config].debounce_ms must be >= 1 (got 0)"));
    }
    if let Some(root) = &cfg.config.output_root
        && !is_inside_project(Path::new(root))
    {
        return Err(config_error(format!(
            "[config].output_root {root:?} must be a relative directory inside the project"
        )));
    }
    if cfg.cache.dir.trim().is_empty() {
        return Err(config_error("[cache].dir must not be empty"));
    }
    Ok(())
}

fn validate_stages(cfg: &RawConfigFile) -> Result<()> {
    for (name, stage) in &cfg.stage {
        if cfg.task.contains_key(name) {
            return Err(config_error(format!(
                "'{name}' is declared both as a stage and as a task"
            )));
        }
        for glob in &stage.inputs {
            let pattern = glob.strip_prefix('!').unwrap_or(glob);
            compile_glob(pattern)
                .map_err(|e| config_error(format!("stage '{name}': {e:#}")))?;
        }
        if let Some(output) = &stage.output
            && !is_inside_project(Path::new(output))
        {
            return Err(config_error(format!(
                "stage '{name}': output {output:?} must be a relative directory inside the project"
            )));
        }
    }
    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in &cfg.task {
        match (&task.sequence, &task.parallel) {
            (Some(_), None) | (None, Some(_)) => {}
            (Some(_), Some(_)) => {
                return Err(config_error(format!(
                    "task '{name}' sets both `sequence` and `parallel`"
                )));
            }
            (None, None) => {
                return Err(config_error(format!(
                    "task '{name}' needs either `sequence` or `parallel`"
                )));
            }
        }
    }
    Ok(())
}

/// Stages first, then combinators; the builder checks names and cycles.
fn build_graph(cfg: &RawConfigFile) -> Result<TaskGraph> {
    let mut builder = TaskGraphBuilder::new();
    for (name, stage) in &cfg.stage {
        builder = builder.task(stage_task(name, stage));
    }
    for (name, task) in &cfg.task {
        builder = builder.task(combinator_task(name, task));
    }
    builder.build()
}

fn stage_task(name: &str, cfg: &StageConfig) -> Task {
    let mut stage = Stage::new(name).cached(cfg.cache);
    stage.inputs = cfg.inputs.clone();
    if let Some(output) = &cfg.output {
        stage = stage.output(output.trim_start_matches("./"));
    }
    for op in &cfg.operations {
        stage = stage.operation(Operation {
            uses: op.uses.clone(),
            options: op.options.clone(),
        });
    }

    let task = Task::stage(stage);
    match cfg.refresh {
        Some(refresh) => task.with_refresh(refresh),
        None => task,
    }
}

fn combinator_task(name: &str, cfg: &TaskConfig) -> Task {
    let task = match (&cfg.sequence, &cfg.parallel) {
        (Some(children), _) => Task::sequence(name, children.iter().cloned()),
        (None, Some(children)) => Task::parallel(name, children.iter().cloned()),
        // Rejected by `validate_tasks`.
        (None, None) => Task::sequence(name, Vec::<String>::new()),
    };
    let task = task.with_policy(cfg.policy);
    match cfg.refresh {
        Some(refresh) => task.with_refresh(refresh),
        None => task,
    }
}

fn validate_references(cfg: &RawConfigFile, graph: &TaskGraph) -> Result<()> {
    for (name, command) in &cfg.command {
        if !graph.contains(&command.task) {
            return Err(AssetflowError::TaskNotFound(format!(
                "{} (referenced by [command.{name}])",
                command.task
            )));
        }
    }

    for (i, sub) in cfg.watch.iter().enumerate() {
        if sub.paths.is_empty() {
            return Err(config_error(format!("[[watch]] entry {i} has no `paths`")));
        }
        match (sub.tasks.is_empty(), sub.reload) {
            (true, None) => {
                return Err(config_error(format!(
                    "[[watch]] entry {i} needs either `tasks` or `reload`"
                )));
            }
            (false, Some(_)) => {
                return Err(config_error(format!(
                    "[[watch]] entry {i} sets both `tasks` and `reload`; task runs already reload"
                )));
            }
            _ => {}
        }
        for command in &sub.commands {
            if !cfg.command.contains_key(command) {
                return Err(config_error(format!(
                    "[[watch]] entry {i} names unknown command '{command}'"
                )));
            }
        }
        for task in &sub.tasks {
            if !graph.contains(task) {
                return Err(AssetflowError::TaskNotFound(format!(
                    "{task} (referenced by [[watch]] entry {i})"
                )));
            }
        }
    }
    compile_subscriptions(&cfg.watch).map_err(|e| config_error(format!("[[watch]]: {e:#}")))?;

    Ok(())
}

fn is_inside_project(dir: &Path) -> bool {
    !dir.as_os_str().is_empty()
        && dir
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && dir.components().any(|c| matches!(c, Component::Normal(_)))
}

fn config_error(msg: impl Into<String>) -> AssetflowError {
    AssetflowError::ConfigError(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(text)?;
        ConfigFile::try_from(raw)
    }

    const BASE: &str = r#"
        [stage.css]
        inputs = ["css/**/*.scss"]
        output = "assets/css"
        cache = true
        operations = [
          { uses = "command", cmd = "sass --stdin", extension = "css" },
          { uses = "rename", suffix = ".min" },
        ]

        [stage.lint-css]
        inputs = ["css/**/*.scss"]
        operations = [{ uses = "command", cmd = "stylelint", passthrough = true }]
    "#;

    #[test]
    fn builds_graph_with_operation_options() {
        let cfg = parse(&format!(
            "{BASE}\n[task.styles]\nsequence = [\"lint-css\", \"css\"]\npolicy = \"fail-fast\"\nrefresh = \"inject\"\n"
        ))
        .unwrap();

        let styles = cfg.graph.get("styles").unwrap();
        assert_eq!(styles.kind(), "sequence");
        assert_eq!(styles.refresh(), crate::types::RefreshKind::Inject);

        let css = cfg.graph.stages().find(|s| s.name == "css").unwrap();
        assert!(css.cache);
        assert_eq!(css.operations[0].str_option("cmd"), Some("sass --stdin"));
        assert_eq!(css.operations[1].str_option("suffix"), Some(".min"));
        assert_eq!(cfg.debounce(), std::time::Duration::from_millis(100));
    }

    #[test]
    fn cycles_are_configuration_errors() {
        let err = parse(&format!(
            "{BASE}\n[task.a]\nsequence = [\"css\", \"b\"]\n[task.b]\nparallel = [\"a\"]\n"
        ))
        .unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(err, AssetflowError::GraphCycle(_)));
    }

    #[test]
    fn unknown_references_are_rejected() {
        let err = parse(&format!("{BASE}\n[command.default]\ntask = \"nope\"\n")).unwrap_err();
        assert!(matches!(err, AssetflowError::TaskNotFound(_)));

        let err = parse(&format!(
            "{BASE}\n[[watch]]\npaths = [\"css/**\"]\ntasks = [\"ghost\"]\n"
        ))
        .unwrap_err();
        assert!(matches!(err, AssetflowError::TaskNotFound(_)));

        let err = parse(&format!("{BASE}\n[task.t]\nsequence = [\"missing\"]\n")).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn malformed_sections_are_rejected() {
        assert!(parse("").is_err());
        assert!(parse(&format!("{BASE}\n[config]\ndebounce_ms = 0\n")).is_err());
        assert!(parse(&format!("{BASE}\n[config]\noutput_root = \"..\"\n")).is_err());
        assert!(parse(&format!(
            "{BASE}\n[task.t]\nsequence = [\"css\"]\nparallel = [\"css\"]\n"
        ))
        .is_err());
        assert!(parse(&format!("{BASE}\n[task.t]\npolicy = \"fail-fast\"\n")).is_err());
        assert!(parse(&format!("{BASE}\n[task.css]\nsequence = [\"lint-css\"]\n")).is_err());
    }

    #[test]
    fn watch_entries_need_one_action() {
        let err = parse(&format!("{BASE}\n[[watch]]\npaths = [\"css/**\"]\n")).unwrap_err();
        assert!(err.is_configuration());

        let err = parse(&format!(
            "{BASE}\n[[watch]]\npaths = [\"css/**\"]\ntasks = [\"css\"]\nreload = \"full\"\n"
        ))
        .unwrap_err();
        assert!(err.is_configuration());

        let cfg = parse(&format!(
            "{BASE}\n[[watch]]\npaths = [\"layouts/**\"]\nreload = \"full\"\n"
        ))
        .unwrap();
        assert_eq!(cfg.watch[0].reload, Some(crate::types::RefreshKind::Full));
    }

    #[test]
    fn watch_entries_are_scoped_to_declared_commands() {
        let cfg = parse(&format!(
            "{BASE}\n[command.dev]\ntask = \"lint-css\"\nwatch = true\n\
             [command.default]\ntask = \"css\"\nwatch = true\n\
             [[watch]]\npaths = [\"css/**\"]\ntasks = [\"lint-css\"]\ncommands = [\"dev\"]\n\
             [[watch]]\npaths = [\"css/**\"]\ntasks = [\"css\"]\ncommands = [\"default\"]\n"
        ))
        .unwrap();

        let dev = cfg.command("dev").unwrap();
        assert_eq!(dev.name, "dev");
        let tasks: Vec<_> = cfg.watch_for(&dev.name).into_iter().flat_map(|s| s.tasks).collect();
        assert_eq!(tasks, vec!["lint-css"]);
        let tasks: Vec<_> = cfg.watch_for("default").into_iter().flat_map(|s| s.tasks).collect();
        assert_eq!(tasks, vec!["css"]);

        let err = parse(&format!(
            "{BASE}\n[[watch]]\npaths = [\"css/**\"]\ntasks = [\"css\"]\ncommands = [\"ghost\"]\n"
        ))
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn task_names_double_as_commands() {
        let cfg = parse(BASE).unwrap();
        let cmd = cfg.command("css").unwrap();
        assert_eq!(cmd.task, "css");
        assert!(!cmd.watch);
        assert!(cfg.command("nope").is_none());
    }
}

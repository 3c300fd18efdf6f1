// src/lib.rs

pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod exec;
pub mod fs;
pub mod graph;
pub mod logging;
pub mod reload;
pub mod report;
pub mod scheduler;
pub mod transform;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::open_store;
use crate::cli::CliArgs;
use crate::commands::{check_line, describe, env_report, should_clear_cache};
use crate::config::{load_and_validate, project_root, CommandConfig, ConfigFile, Environment};
use crate::engine::{CoreRuntime, RunSummary, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason};
use crate::errors::AssetflowError;
use crate::events::BuildEvents;
use crate::exec::SchedulerBackend;
use crate::fs::{FileSystem, RealFileSystem};
use crate::reload::{client_script, ReloadNotifier, ReloadServer, ReloadTransport};
use crate::report::spawn_printer;
use crate::scheduler::Scheduler;
use crate::transform::TransformRegistry;

/// What an invocation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcome {
    pub summary: RunSummary,
    /// Whether the command kept watching until it was stopped.
    pub watched: bool,
}

impl Outcome {
    /// Non-zero only for one-shot invocations with a failed run. Watch mode
    /// reports failures and keeps going, so stopping it is not a failure.
    pub fn exit_code(&self) -> i32 {
        if self.watched || self.summary.is_success() {
            0
        } else {
            1
        }
    }
}

/// Everything `execute` needs besides the config and command.
pub struct ExecuteOptions {
    pub root: PathBuf,
    pub env: Environment,
    /// Keep watching after the first run.
    pub watching: bool,
    pub fs: Arc<dyn FileSystem>,
    pub registry: Arc<TransformRegistry>,
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - built-in commands
/// - config loading
/// - scheduler / cache / event bus
/// - (optional) file watcher and reload server
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<Outcome> {
    match args.command.as_str() {
        "check" => {
            println!("{}", check_line());
            return Ok(Outcome::default());
        }
        "envs" => {
            for line in env_report(|k| std::env::var(k).ok()) {
                println!("{line}");
            }
            return Ok(Outcome::default());
        }
        "client-script" => {
            let port = load_and_validate(&args.config)
                .map(|cfg| cfg.config.reload_port)
                .unwrap_or_else(|_| config::ConfigSection::default().reload_port);
            println!("{}", client_script(port));
            return Ok(Outcome::default());
        }
        _ => {}
    }

    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    if args.dry_run {
        for line in describe(&cfg) {
            println!("{line}");
        }
        debug!("dry-run complete (no execution)");
        return Ok(Outcome::default());
    }

    let command = cfg.command(&args.command).ok_or_else(|| {
        AssetflowError::TaskNotFound(format!(
            "{} (no [command.{0}] and no task of that name)",
            args.command
        ))
    })?;

    let options = ExecuteOptions {
        root: project_root(&config_path),
        env: Environment::from_env(),
        watching: command.watch && !args.once,
        fs: Arc::new(RealFileSystem),
        registry: Arc::new(TransformRegistry::with_builtins()),
    };
    info!(command = %args.command, task = %command.task, mode = %options.env.mode, "starting");

    execute(&cfg, &command, options).await
}

/// Run one command against a validated config.
pub async fn execute(
    cfg: &ConfigFile,
    command: &CommandConfig,
    options: ExecuteOptions,
) -> Result<Outcome> {
    let ExecuteOptions {
        root,
        env,
        watching,
        fs,
        registry,
    } = options;

    if command.check_envs {
        for line in env_report(|k| std::env::var(k).ok()) {
            println!("{line}");
        }
    }

    let cache = open_store(cfg.cache.storage, Arc::clone(&fs), root.join(&cfg.cache.dir));
    let events = BuildEvents::default();
    let scheduler = Scheduler::new(Arc::new(cfg.graph.clone()), registry, cache, fs, root.clone())?
        .with_mode(env.mode)
        .with_events(events.clone());

    if command.clean {
        match cfg.output_root() {
            Some(output_root) => scheduler.clean(&output_root).await?,
            None => warn!("clean requested but [config].output_root is not set"),
        }
    }
    if should_clear_cache(command, &env) {
        scheduler.clear_cache().await?;
    }

    let printer = spawn_printer(&events);

    // The server must outlive the runtime; dropping it stops nothing, its
    // threads live as long as the process.
    let reload = if watching && command.reload {
        let server = Arc::new(ReloadServer::start(cfg.config.reload_port)?);
        info!(port = server.port(), "run `assetflow client-script` for the page snippet");
        let notifier = ReloadNotifier::from_graph(&cfg.graph, server.clone()).spawn(&events);
        Some((server, notifier))
    } else {
        None
    };

    let scheduler = Arc::new(scheduler);
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let watcher = if watching {
        let subscriptions = cfg.watch_for(&command.name);
        if subscriptions.is_empty() {
            warn!(command = %command.name, "command watches but no [[watch]] entries apply to it");
        }
        let transport = reload
            .as_ref()
            .map(|(server, _)| Arc::clone(server) as Arc<dyn ReloadTransport>);
        Some(watch::spawn_watcher(
            root.clone(),
            &subscriptions,
            rt_tx.clone(),
            transport,
            cfg.debounce(),
        )?)
    } else {
        None
    };

    // Ctrl-C → graceful shutdown.
    let ctrl_c = {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        })
    };

    rt_tx
        .send(RuntimeEvent::TaskTriggered {
            task: command.task.clone(),
            reason: TriggerReason::Manual,
        })
        .await?;

    let backend = SchedulerBackend::new(Arc::clone(&scheduler), rt_tx);
    let core = CoreRuntime::from_graph(
        &cfg.graph,
        RuntimeOptions {
            exit_when_idle: !watching,
        },
    );
    let summary = Runtime::new(core, rt_rx, backend).run().await?;

    if let Some(watcher) = watcher {
        watcher.stop().await;
    }
    ctrl_c.abort();

    // Closing the event bus lets the subscribers drain and finish.
    drop(scheduler);
    drop(events);
    if let Err(e) = printer.await {
        warn!(error = %e, "printer task failed");
    }
    if let Some((_server, notifier)) = reload
        && let Err(e) = notifier.await
    {
        warn!(error = %e, "reload notifier task failed");
    }

    Ok(Outcome { summary, watched: watching })
}

// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::errors::{AssetflowError, Result};
use crate::reload::ReloadTransport;
use crate::watch::event_handler::run_event_loop;
use crate::watch::path_utils::collapse_watch_paths;
use crate::watch::patterns::{compile_subscriptions, CompiledSubscription, WatchSubscription};

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Stopping (or dropping)
/// the handle ends event intake.
pub struct WatcherHandle {
    watcher: Option<RecommendedWatcher>,
    task: JoinHandle<()>,
    active: usize,
    dropped: Vec<AssetflowError>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("active", &self.active)
            .field("dropped", &self.dropped.len())
            .finish()
    }
}

impl WatcherHandle {
    /// Number of subscriptions being watched.
    pub fn active_subscriptions(&self) -> usize {
        self.active
    }

    /// Subscriptions dropped because their root could not be watched.
    pub fn dropped(&self) -> &[AssetflowError] {
        &self.dropped
    }

    /// Stop intake and wait for the event loop to wind down. Pending
    /// debounce windows are discarded.
    pub async fn stop(mut self) {
        self.watcher.take();
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "watcher event loop ended abnormally");
        }
        info!("file watcher stopped");
    }
}

/// Spawn a filesystem watcher for `subscriptions` and send debounced
/// `RuntimeEvent::TaskTriggered` events into `runtime_tx`.
///
/// - `root` is the project root against which all glob patterns are evaluated.
/// - Reload-only subscriptions signal `reload` directly; they are inert when
///   no transport is given.
/// - Each glob is watched at its static prefix; nested roots are collapsed.
/// - A subscription whose root is missing or cannot be watched is reported
///   once as a [`AssetflowError::WatchIo`] and dropped; the others continue.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    subscriptions: &[WatchSubscription],
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    reload: Option<Arc<dyn ReloadTransport>>,
    window: Duration,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or(root);

    let compiled = compile_subscriptions(subscriptions)?;
    let mut dropped = Vec::new();
    let (mut resolved, mut active) = (Vec::new(), Vec::new());

    for sub in compiled {
        match resolve_roots(&root, &sub) {
            Ok(roots) => {
                resolved.push(roots);
                active.push(sub);
            }
            Err(e) => {
                warn!(error = %e, patterns = ?sub.patterns(), "dropping watch subscription");
                dropped.push(e);
            }
        }
    }

    // Channel from the blocking notify callback into the async world.
    let (raw_tx, raw_rx) = mpsc::unbounded_channel::<PathBuf>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !is_content_change(&event.kind) {
                    return;
                }
                for path in event.paths {
                    // Only fails once the event loop is gone.
                    let _ = raw_tx.send(path);
                }
            }
            Err(err) => {
                // We can't log via tracing here easily, so fallback to stderr.
                eprintln!("assetflow: file watch error: {err}");
            }
        },
        Config::default(),
    )
    .map_err(|e| AssetflowError::Other(e.into()))?;

    let watch_roots = collapse_watch_paths(resolved.iter().flatten().cloned());
    for dir in &watch_roots {
        if let Err(e) = watcher.watch(dir, RecursiveMode::Recursive) {
            // Drop every subscription that needed this directory.
            let mut i = 0;
            while i < active.len() {
                if resolved[i].iter().any(|r| r.starts_with(dir)) {
                    let sub = active.remove(i);
                    resolved.remove(i);
                    let err = AssetflowError::WatchIo {
                        path: dir.clone(),
                        reason: e.to_string(),
                    };
                    warn!(error = %err, patterns = ?sub.patterns(), "dropping watch subscription");
                    dropped.push(err);
                } else {
                    i += 1;
                }
            }
        } else {
            debug!(dir = ?dir, "watching");
        }
    }

    info!(
        root = ?root,
        subscriptions = active.len(),
        dropped = dropped.len(),
        window_ms = window.as_millis() as u64,
        "file watcher started"
    );

    let count = active.len();
    let task = tokio::spawn(run_event_loop(
        root,
        Arc::new(active),
        raw_rx,
        runtime_tx,
        reload,
        window,
    ));

    Ok(WatcherHandle {
        watcher: Some(watcher),
        task,
        active: count,
        dropped,
    })
}

/// Absolute watch directories for one subscription.
fn resolve_roots(root: &Path, sub: &CompiledSubscription) -> Result<Vec<PathBuf>> {
    sub.roots()
        .iter()
        .map(|rel| {
            let dir = root.join(rel);
            dir.canonicalize().map_err(|e| AssetflowError::WatchIo {
                path: dir,
                reason: e.to_string(),
            })
        })
        .collect()
}

fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

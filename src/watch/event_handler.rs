// src/watch/event_handler.rs

//! Turns raw changed paths into debounced task triggers and, for reload-only
//! subscriptions, direct reload signals.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::engine::{RuntimeEvent, TriggerReason};
use crate::reload::{ReloadSignal, ReloadTransport};
use crate::types::RefreshKind;
use crate::watch::debounce::Debouncer;
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::{reloads_for_path, tasks_for_path, CompiledSubscription};

/// Directory holding our own state (cache); never a source of triggers.
const STATE_DIR: &str = ".assetflow/";
const TEMP_SUFFIX: &str = ".assetflow-tmp";

/// Consume changed paths until `raw_rx` closes.
///
/// Each path is matched against every subscription; every matching task
/// enters the debouncer and is sent to the runtime once its window closes.
/// Reload-only matches are debounced the same way and go straight to
/// `reload` without a build; without a transport they are ignored.
/// Windows still open when intake stops are dropped.
pub async fn run_event_loop(
    root: PathBuf,
    subscriptions: Arc<Vec<CompiledSubscription>>,
    mut raw_rx: mpsc::UnboundedReceiver<PathBuf>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    reload: Option<Arc<dyn ReloadTransport>>,
    window: Duration,
) {
    let mut tasks = Debouncer::new(window);
    let mut reloads: Debouncer<RefreshKind> = Debouncer::keyed(window);

    loop {
        let deadline = match (tasks.next_deadline(), reloads.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        tokio::select! {
            maybe_path = raw_rx.recv() => {
                let Some(path) = maybe_path else {
                    debug!(
                        pending = !(tasks.is_empty() && reloads.is_empty()),
                        "watch intake closed"
                    );
                    break;
                };
                let Some(rel) = watched_path(&root, &path) else {
                    continue;
                };
                record_tasks(&rel, &subscriptions, &mut tasks);
                if reload.is_some() {
                    record_reloads(&rel, &subscriptions, &mut reloads);
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                let now = Instant::now();
                if let Some(transport) = &reload {
                    for kind in reloads.take_due(now) {
                        send_reload(transport.as_ref(), kind);
                    }
                }
                for task in tasks.take_due(now) {
                    debug!(task = %task, "debounce window closed -> triggering task");
                    let event = RuntimeEvent::TaskTriggered {
                        task,
                        reason: TriggerReason::FileWatch,
                    };
                    if let Err(err) = runtime_tx.send(event).await {
                        warn!("failed to send RuntimeEvent::TaskTriggered: {err}");
                        // If the runtime channel is closed, there's no point
                        // keeping the watcher loop alive.
                        return;
                    }
                }
            }
        }
    }

    debug!("watcher event loop finished");
}

/// The path relative to `root`, unless it is outside the project or one of
/// our own files.
fn watched_path(root: &Path, path: &Path) -> Option<String> {
    let Some(rel) = relative_str(root, path) else {
        debug!(?path, ?root, "event outside project root ignored");
        return None;
    };
    if rel.starts_with(STATE_DIR) || rel.ends_with(TEMP_SUFFIX) {
        return None;
    }
    Some(rel)
}

fn record_tasks(rel: &str, subscriptions: &[CompiledSubscription], debouncer: &mut Debouncer) {
    let now = Instant::now();
    for task in tasks_for_path(subscriptions, rel) {
        if debouncer.record(&task, now) {
            debug!(task = %task, path = %rel, "watch match -> debouncing");
        }
    }
}

fn record_reloads(
    rel: &str,
    subscriptions: &[CompiledSubscription],
    debouncer: &mut Debouncer<RefreshKind>,
) {
    let now = Instant::now();
    for kind in reloads_for_path(subscriptions, rel) {
        if debouncer.record(kind, now) {
            debug!(kind = %kind, path = %rel, "watch match -> debouncing reload");
        }
    }
}

fn send_reload(transport: &dyn ReloadTransport, kind: RefreshKind) {
    let signal = ReloadSignal {
        source: "watch".to_string(),
        kind,
    };
    match transport.send(&signal) {
        Ok(()) => debug!(kind = %kind, "reload signalled without a build"),
        Err(e) => warn!(kind = %kind, error = %e, "failed to signal reload"),
    }
}

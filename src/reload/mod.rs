// src/reload/mod.rs

//! Browser reload after successful rebuilds.
//!
//! [`ReloadNotifier`] listens on the build event bus and forwards a
//! [`ReloadSignal`] to a [`ReloadTransport`] for every successful run. Failed
//! runs are never signalled, so a broken build leaves the page as it was.

pub mod server;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use server::ReloadServer;

use crate::engine::TaskName;
use crate::events::BuildEvents;
use crate::graph::TaskGraph;
use crate::scheduler::RunResult;
use crate::types::RefreshKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadSignal {
    /// The task whose run succeeded, or `watch` for reload-only
    /// subscriptions.
    pub source: String,
    pub kind: RefreshKind,
}

/// Delivers signals to connected clients.
pub trait ReloadTransport: Send + Sync {
    fn send(&self, signal: &ReloadSignal) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct ReloadNotifier {
    refresh: HashMap<TaskName, RefreshKind>,
    transport: Arc<dyn ReloadTransport>,
}

impl fmt::Debug for ReloadNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadNotifier")
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}

impl ReloadNotifier {
    /// Every task refreshes with a full reload unless configured otherwise.
    pub fn new(transport: Arc<dyn ReloadTransport>) -> Self {
        Self {
            refresh: HashMap::new(),
            transport,
        }
    }

    /// Take each task's `refresh` setting from the graph.
    pub fn from_graph(graph: &TaskGraph, transport: Arc<dyn ReloadTransport>) -> Self {
        let refresh = graph
            .tasks()
            .map(|t| (t.name().to_string(), t.refresh()))
            .collect();
        Self { refresh, transport }
    }

    pub fn with_refresh(mut self, task: impl Into<TaskName>, kind: RefreshKind) -> Self {
        self.refresh.insert(task.into(), kind);
        self
    }

    /// The signal a run deserves; `None` for failed runs.
    pub fn signal_for(&self, result: &RunResult) -> Option<ReloadSignal> {
        if !result.is_success() {
            return None;
        }
        let kind = self.refresh.get(&result.task).copied().unwrap_or_default();
        Some(ReloadSignal {
            source: result.task.clone(),
            kind,
        })
    }

    /// Signal clients about `result`. Returns whether anything was sent.
    pub fn notify(&self, result: &RunResult) -> bool {
        let Some(signal) = self.signal_for(result) else {
            debug!(task = %result.task, "run failed; not reloading");
            return false;
        };
        match self.transport.send(&signal) {
            Ok(()) => {
                debug!(source = %signal.source, kind = %signal.kind, "reload signalled");
                true
            }
            Err(e) => {
                warn!(source = %signal.source, error = %e, "failed to signal reload");
                false
            }
        }
    }

    /// Notify for every completed run until the event bus closes.
    pub fn spawn(self, events: &BuildEvents) -> JoinHandle<()> {
        let mut rx = events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        self.notify(&event.result);
                    }
                    Err(RecvError::Lagged(n)) => warn!(skipped = n, "reload notifier lagged behind"),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Snippet for pages served during development. It connects to the reload
/// server, cache-busts stylesheets on `inject` and reloads on `reload`.
pub fn client_script(port: u16) -> String {
    format!(
        r#"<script>
(function () {{
  var socket = new WebSocket("ws://" + location.hostname + ":{port}");
  socket.addEventListener("message", function (event) {{
    if (event.data === "inject") {{
      document.querySelectorAll('link[rel="stylesheet"]').forEach(function (link) {{
        var url = new URL(link.href);
        url.searchParams.set("assetflow", Date.now());
        link.href = url.toString();
      }});
    }} else if (event.data === "reload") {{
      location.reload();
    }}
  }});
}})();
</script>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::scheduler::{Diagnostic, StageResult};

    #[derive(Default)]
    struct Recording(Mutex<Vec<ReloadSignal>>);

    impl ReloadTransport for Recording {
        fn send(&self, signal: &ReloadSignal) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(signal.clone());
            Ok(())
        }
    }

    fn run(task: &str, ok: bool) -> RunResult {
        let stage = if ok {
            StageResult::success(task, crate::scheduler::CacheOutcome::Miss)
        } else {
            StageResult::failure(task, vec![Diagnostic::error("boom")])
        };
        RunResult::new(task, vec![stage], Duration::ZERO)
    }

    #[test]
    fn failures_never_signal() {
        let transport = Arc::new(Recording::default());
        let notifier = ReloadNotifier::new(transport.clone());
        assert!(!notifier.notify(&run("styles", false)));
        assert!(transport.0.lock().unwrap().is_empty());
    }

    #[test]
    fn refresh_kind_follows_task() {
        let transport = Arc::new(Recording::default());
        let notifier =
            ReloadNotifier::new(transport.clone()).with_refresh("styles", RefreshKind::Inject);

        assert!(notifier.notify(&run("styles", true)));
        assert!(notifier.notify(&run("scripts", true)));

        let sent = transport.0.lock().unwrap();
        assert_eq!(sent[0].kind, RefreshKind::Inject);
        assert_eq!(sent[1].kind, RefreshKind::Full);
    }

    #[test]
    fn client_script_mentions_port_and_messages() {
        let js = client_script(3333);
        assert!(js.contains(":3333"));
        assert!(js.contains("\"inject\""));
        assert!(js.contains("\"reload\""));
    }
}

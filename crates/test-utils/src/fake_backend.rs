use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use assetflow::engine::{RuntimeEvent, TaskName, TriggerReason};
use assetflow::errors::Result;
use assetflow::exec::RunBackend;
use assetflow::scheduler::RunStatus;
use tokio::sync::mpsc;

/// A fake backend that:
/// - records which runs were started (and why)
/// - when `auto_finish` is on, immediately reports `RunFinished`, failing the
///   tasks listed in `failing`.
///
/// With `auto_finish` off the test sends `RunFinished` itself, which keeps
/// runs "in flight" for as long as it likes.
pub struct FakeRunBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    started: Arc<Mutex<Vec<(TaskName, TriggerReason)>>>,
    failing: HashSet<TaskName>,
    auto_finish: bool,
}

impl FakeRunBackend {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        started: Arc<Mutex<Vec<(TaskName, TriggerReason)>>>,
    ) -> Self {
        Self {
            runtime_tx,
            started,
            failing: HashSet::new(),
            auto_finish: true,
        }
    }

    pub fn failing(mut self, task: &str) -> Self {
        self.failing.insert(task.to_string());
        self
    }

    pub fn manual_finish(mut self) -> Self {
        self.auto_finish = false;
        self
    }
}

impl RunBackend for FakeRunBackend {
    fn start_run(
        &mut self,
        task: TaskName,
        reason: TriggerReason,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let started = Arc::clone(&self.started);
        let status = if self.failing.contains(&task) {
            RunStatus::Failure
        } else {
            RunStatus::Success
        };
        let auto_finish = self.auto_finish;

        Box::pin(async move {
            started.lock().unwrap().push((task.clone(), reason));

            if auto_finish {
                // Report from a separate task so the runtime is not blocked
                // on its own channel.
                tokio::spawn(async move {
                    let _ = tx.send(RuntimeEvent::RunFinished { task, status }).await;
                });
            }
            Ok(())
        })
    }
}

// src/exec/backend.rs

//! Pluggable run backend abstraction.
//!
//! The runtime talks to a `RunBackend` instead of the scheduler directly.
//! This makes it easy to swap in a fake backend in tests.
//!
//! - `SchedulerBackend` is the production implementation. Each run is its
//!   own tokio task that reports back with `RuntimeEvent::RunFinished`.
//! - Tests can provide their own `RunBackend` that, for example, records
//!   which runs were started and emits `RunFinished` events on demand.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::engine::{RuntimeEvent, TaskName, TriggerReason};
use crate::errors::Result;
use crate::scheduler::{RunStatus, Scheduler};

/// Trait abstracting how task runs are started.
pub trait RunBackend: Send {
    /// Start a run of `task`. The implementation must eventually emit
    /// exactly one `RunFinished` for it.
    fn start_run(
        &mut self,
        task: TaskName,
        reason: TriggerReason,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production backend running tasks on the [`Scheduler`].
pub struct SchedulerBackend {
    scheduler: Arc<Scheduler>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl SchedulerBackend {
    pub fn new(scheduler: Arc<Scheduler>, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            scheduler,
            runtime_tx,
        }
    }
}

impl RunBackend for SchedulerBackend {
    fn start_run(
        &mut self,
        task: TaskName,
        reason: TriggerReason,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone handles so the spawned run doesn't borrow `self`.
        let scheduler = Arc::clone(&self.scheduler);
        let tx = self.runtime_tx.clone();

        Box::pin(async move {
            debug!(task = %task, ?reason, "starting run");
            tokio::spawn(async move {
                let status = match AssertUnwindSafe(scheduler.run(&task)).catch_unwind().await {
                    Ok(Ok(result)) => result.status,
                    Ok(Err(e)) => {
                        error!(task = %task, error = %e, "run could not start");
                        RunStatus::Failure
                    }
                    Err(_) => {
                        error!(task = %task, "run panicked");
                        RunStatus::Failure
                    }
                };
                if tx
                    .send(RuntimeEvent::RunFinished { task, status })
                    .await
                    .is_err()
                {
                    debug!("runtime gone before run finished");
                }
            });
            Ok(())
        })
    }
}

// src/events.rs

//! Build-completed event bus.
//!
//! The scheduler publishes one [`BuildCompleted`] per run; the reload
//! notifier and the diagnostics printer subscribe independently.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use crate::scheduler::RunResult;

const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct BuildCompleted {
    pub result: Arc<RunResult>,
}

#[derive(Debug, Clone)]
pub struct BuildEvents {
    tx: broadcast::Sender<BuildCompleted>,
}

impl BuildEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BuildCompleted> {
        self.tx.subscribe()
    }

    /// Publish a finished run. Returns the number of subscribers reached.
    pub fn emit(&self, result: RunResult) -> usize {
        let event = BuildCompleted {
            result: Arc::new(result),
        };
        match self.tx.send(event) {
            Ok(n) => n,
            Err(_) => {
                trace!("no build event subscribers");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BuildEvents {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

use std::sync::{Arc, Mutex};

use assetflow::reload::{ReloadSignal, ReloadTransport};

/// Keeps every signal it is asked to send.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<ReloadSignal>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<ReloadSignal> {
        self.sent.lock().unwrap().clone()
    }
}

impl ReloadTransport for RecordingTransport {
    fn send(&self, signal: &ReloadSignal) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(signal.clone());
        Ok(())
    }
}

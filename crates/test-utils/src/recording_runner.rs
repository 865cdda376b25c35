use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use pulse::exec::RunnerControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerCall {
    Refresh,
    Stop,
}

/// Runner stand-in that only records the control calls it receives.
#[derive(Debug, Clone)]
pub struct RecordingRunner {
    calls: Arc<Mutex<Vec<RunnerCall>>>,
    changed: Arc<watch::Sender<usize>>,
}

impl Default for RecordingRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingRunner {
    pub fn new() -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            changed: Arc::new(changed),
        }
    }

    pub fn calls(&self) -> Vec<RunnerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn refreshes(&self) -> usize {
        self.count(RunnerCall::Refresh)
    }

    pub fn stops(&self) -> usize {
        self.count(RunnerCall::Stop)
    }

    fn count(&self, call: RunnerCall) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    /// Wait until at least `n` refreshes were recorded.
    pub async fn wait_for_refreshes(&self, n: usize) {
        let mut rx = self.changed.subscribe();
        while self.refreshes() < n {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    fn record(&self, call: RunnerCall) {
        let len = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call);
            calls.len()
        };
        self.changed.send_replace(len);
    }
}

impl RunnerControl for RecordingRunner {
    fn refresh(&self) {
        self.record(RunnerCall::Refresh);
    }

    fn stop(&self) {
        self.record(RunnerCall::Stop);
    }
}

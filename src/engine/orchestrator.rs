// src/engine/orchestrator.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::{BuildBackend, BuildOutcome, BuildSpec, BuildTask, RunnerControl};
use crate::types::{ChangeSignal, StopPolicy};

/// The build currently in flight (or waiting for its predecessor).
#[derive(Debug)]
struct InFlight {
    id: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// A build task reporting back to the control loop.
type Finished = (u64, BuildOutcome);

/// Main control loop: change signals in, builds and runner requests out.
///
/// The loop waits on the shutdown token, the signal channel and build
/// completions. Builds run in spawned tasks; each new build first waits for
/// the previous (cancelled) one to finish, so build subprocesses never
/// overlap. Every runner request is issued from the loop itself, so a stop
/// for a newer change can never be overtaken by a refresh for an older build.
pub struct Orchestrator<B: BuildBackend, R: RunnerControl> {
    backend: Arc<B>,
    runner: R,
    signals: mpsc::Receiver<ChangeSignal>,
    spec: Arc<BuildSpec>,
    policy: StopPolicy,
    shutdown: CancellationToken,
    in_flight: Option<InFlight>,
    next_id: u64,
    finished_tx: mpsc::UnboundedSender<Finished>,
    finished_rx: mpsc::UnboundedReceiver<Finished>,
}

impl<B: BuildBackend, R: RunnerControl> fmt::Debug for Orchestrator<B, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("spec", &self.spec)
            .field("policy", &self.policy)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl<B: BuildBackend, R: RunnerControl> Orchestrator<B, R> {
    pub fn new(
        backend: Arc<B>,
        runner: R,
        signals: mpsc::Receiver<ChangeSignal>,
        spec: BuildSpec,
        shutdown: CancellationToken,
    ) -> Self {
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            runner,
            signals,
            spec: Arc::new(spec),
            policy: StopPolicy::default(),
            shutdown,
            in_flight: None,
            next_id: 0,
            finished_tx,
            finished_rx,
        }
    }

    pub fn with_stop_policy(mut self, policy: StopPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run until shutdown is requested or the signal channel closes.
    ///
    /// On the way out the runner is stopped and the in-flight build is
    /// cancelled and awaited.
    pub async fn run(mut self) -> Result<()> {
        info!(policy = %self.policy, "orchestrator started");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("shutdown requested");
                    break;
                }
                signal = self.signals.recv() => match signal {
                    Some(ChangeSignal) => self.on_change(),
                    None => {
                        info!("change signal channel closed; shutting down");
                        break;
                    }
                },
                Some((id, outcome)) = self.finished_rx.recv() => self.on_finished(id, &outcome),
            }
        }

        self.runner.stop();
        if let Some(build) = self.in_flight.take() {
            debug!(build = build.id, "cancelling in-flight build");
            build.cancel.cancel();
            if let Err(err) = build.handle.await {
                warn!(build = build.id, error = %err, "build task failed");
            }
        }

        info!("orchestrator exiting");
        Ok(())
    }

    fn on_change(&mut self) {
        self.next_id += 1;
        let id = self.next_id;
        debug!(build = id, "change detected");

        if self.policy == StopPolicy::Immediately {
            self.runner.stop();
        }

        let previous = self.in_flight.take().map(|prev| {
            debug!(build = prev.id, "cancelling superseded build");
            prev.cancel.cancel();
            prev.handle
        });

        let cancel = self.shutdown.child_token();
        let task = BuildTask::new(id, Arc::clone(&self.spec), cancel.clone());
        let backend = Arc::clone(&self.backend);
        let finished = self.finished_tx.clone();

        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                if let Err(err) = previous.await {
                    warn!(error = %err, "previous build task failed");
                }
            }

            let outcome = backend.build(task).await;
            let _ = finished.send((id, outcome));
        });

        self.in_flight = Some(InFlight { id, cancel, handle });
    }

    /// Only the newest build may replace the program; anything older was
    /// superseded by a change that arrived after it was started.
    fn on_finished(&self, id: u64, outcome: &BuildOutcome) {
        if id != self.next_id {
            debug!(build = id, latest = self.next_id, "discarding superseded build result");
            return;
        }
        if outcome.is_success() {
            self.runner.refresh();
        }
    }
}

// src/exec/runner.rs

//! Supervision of the target program.
//!
//! A [`Runner`] owns at most one running instance. Control requests
//! ([`RunnerHandle::refresh`], [`RunnerHandle::stop`]) never block: they
//! overwrite a single "latest request" slot and wake the loop. While an old
//! instance is being stopped further requests simply overwrite the slot, so
//! only the most recent one is acted on once the old instance is gone.
//!
//! State machine:
//!
//! ```text
//! Idle ──refresh──▶ Starting ──spawned──▶ Running
//!  ▲                   │ spawn failed        │ stop / refresh
//!  │◀──────────────────┘                     ▼
//!  │◀────────────exited on its own──── Running
//!  │◀──────────terminated─────────── Stopping ──superseding refresh──▶ Starting
//! ```

use std::path::PathBuf;
use std::process::{Command as StdCommand, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::exec::process::{self, ProcessGroup};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Starting,
    Running,
    Stopping,
}

/// Control surface the orchestrator uses. Both calls return immediately.
pub trait RunnerControl: Send + Sync + 'static {
    /// Replace the running instance (if any) with a fresh one.
    fn refresh(&self);
    /// Stop the running instance (if any).
    fn stop(&self);
}

/// How to launch the target program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub binary: PathBuf,
    pub working_dir: PathBuf,
    pub args: Vec<String>,
    pub grace_period: Duration,
}

impl RunSpec {
    pub fn from_config(cfg: &Config, binary: PathBuf) -> Self {
        Self {
            binary,
            working_dir: cfg.working_dir.clone(),
            args: cfg.run_args.clone(),
            grace_period: cfg.grace_period,
        }
    }

    fn command(&self) -> StdCommand {
        let mut cmd = StdCommand::new(&self.binary);
        cmd.args(&self.args).current_dir(&self.working_dir);
        cmd
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Refresh,
    Stop,
}

#[derive(Debug)]
struct Shared {
    pending: Mutex<Option<Request>>,
    wake: Notify,
    state: watch::Sender<RunnerState>,
}

impl Shared {
    fn request(&self, req: Request) {
        {
            let mut slot = match self.pending.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *slot = Some(req);
        }
        self.wake.notify_one();
    }

    fn take_request(&self) -> Option<Request> {
        match self.pending.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn set_state(&self, state: RunnerState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            debug!(from = ?*current, to = ?state, "runner state");
            *current = state;
            true
        });
    }
}

/// Cheap, cloneable control handle for a [`Runner`].
#[derive(Debug, Clone)]
pub struct RunnerHandle {
    shared: Arc<Shared>,
}

impl RunnerHandle {
    pub fn state(&self) -> RunnerState {
        *self.shared.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<RunnerState> {
        self.shared.state.subscribe()
    }
}

impl RunnerControl for RunnerHandle {
    fn refresh(&self) {
        self.shared.request(Request::Refresh);
    }

    fn stop(&self) {
        self.shared.request(Request::Stop);
    }
}

/// A live instance. The process itself is owned by its supervising task.
#[derive(Debug)]
struct Instance {
    id: u64,
    pid: Option<u32>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Supervises the target program; drive it with [`Runner::listen`].
#[derive(Debug)]
pub struct Runner {
    spec: RunSpec,
    shared: Arc<Shared>,
}

impl Runner {
    pub fn new(spec: RunSpec) -> Self {
        let (state, _) = watch::channel(RunnerState::Idle);
        Self {
            spec,
            shared: Arc::new(Shared {
                pending: Mutex::new(None),
                wake: Notify::new(),
                state,
            }),
        }
    }

    pub fn handle(&self) -> RunnerHandle {
        RunnerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run the control loop until `cancel` fires, then stop the instance.
    pub async fn listen(self, cancel: CancellationToken) {
        let (exit_tx, mut exit_rx) = mpsc::unbounded_channel::<u64>();
        let mut current: Option<Instance> = None;
        let mut next_id: u64 = 0;

        info!(binary = %self.spec.binary.display(), "runner started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(exited) = exit_rx.recv() => {
                    if current.as_ref().is_some_and(|i| i.id == exited) {
                        if let Some(instance) = current.take() {
                            Self::reap(instance).await;
                        }
                        self.shared.set_state(RunnerState::Idle);
                    }
                }
                _ = self.shared.wake.notified() => {
                    let Some(request) = self.shared.take_request() else {
                        continue;
                    };
                    self.stop_instance(&mut current).await;

                    // Requests that arrived while stopping supersede this one.
                    let request = self.shared.take_request().unwrap_or(request);
                    match request {
                        Request::Stop => {}
                        Request::Refresh => {
                            next_id += 1;
                            current = self.start_instance(next_id, &cancel, &exit_tx);
                        }
                    }
                }
            }
        }

        self.stop_instance(&mut current).await;
        info!("runner stopped");
    }

    fn start_instance(
        &self,
        id: u64,
        parent: &CancellationToken,
        exits: &mpsc::UnboundedSender<u64>,
    ) -> Option<Instance> {
        self.shared.set_state(RunnerState::Starting);

        let mut cmd = process::prepare(self.spec.command(), Stdio::inherit);
        let group = match ProcessGroup::spawn(&mut cmd) {
            Ok(group) => group,
            Err(err) => {
                error!(
                    binary = %self.spec.binary.display(),
                    error = %err,
                    "failed to start process"
                );
                self.shared.set_state(RunnerState::Idle);
                return None;
            }
        };

        let pid = group.pid();
        info!(pid = ?pid, args = ?self.spec.args, "process started");

        let cancel = parent.child_token();
        let task = tokio::spawn(supervise(
            id,
            group,
            cancel.clone(),
            self.spec.grace_period,
            exits.clone(),
        ));

        self.shared.set_state(RunnerState::Running);
        Some(Instance {
            id,
            pid,
            cancel,
            task,
        })
    }

    /// Stop the current instance and wait until it is gone.
    async fn stop_instance(&self, current: &mut Option<Instance>) {
        let Some(instance) = current.take() else {
            return;
        };
        self.shared.set_state(RunnerState::Stopping);
        info!(pid = ?instance.pid, "stopping process");
        instance.cancel.cancel();
        Self::reap(instance).await;
        self.shared.set_state(RunnerState::Idle);
    }

    async fn reap(instance: Instance) {
        if let Err(err) = instance.task.await {
            warn!(pid = ?instance.pid, error = %err, "process supervisor task failed");
        }
    }
}

/// Wait for the instance to exit on its own, or terminate it on cancel.
///
/// Natural exits are reported on `exits`; a cancelled instance is not
/// reported since the loop is already waiting on this task.
async fn supervise(
    id: u64,
    mut group: ProcessGroup,
    cancel: CancellationToken,
    grace: Duration,
    exits: mpsc::UnboundedSender<u64>,
) {
    let pid = group.pid();

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            match process::terminate(&mut group, grace).await {
                Ok(status) => {
                    debug!(pid = ?pid, status = %process::describe_exit(&status), "process stopped")
                }
                Err(err) => warn!(pid = ?pid, error = %err, "failed to wait for stopped process"),
            }
        }
        status = group.wait() => {
            match status {
                Ok(status) if status.success() => info!(pid = ?pid, "process exited"),
                Ok(status) => warn!(
                    pid = ?pid,
                    exit_code = ?status.code(),
                    status = %process::describe_exit(&status),
                    "process exited with failure"
                ),
                Err(err) => error!(pid = ?pid, error = %err, "failed to wait for process"),
            }
            let _ = exits.send(id);
        }
    }
}

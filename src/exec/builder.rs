// src/exec/builder.rs

//! Build execution: optional pre-build shell command, then the build tool.
//!
//! Both stages run as process groups bound to the task's cancellation token.
//! Cancelling the token kills the whole group and reaps the child before the
//! build reports [`BuildOutcome::Aborted`].

use std::fmt;
use std::path::PathBuf;
use std::process::{Command as StdCommand, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::exec::output::{self, OutputTail, Stream};
use crate::exec::process::{self, ProcessGroup};

/// Number of output lines kept for a failure report.
pub const DEFAULT_TAIL_LINES: usize = 20;

/// How long forwarders may keep draining pipes after the child exits.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything needed to build the target, shared by every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    pub package: PathBuf,
    pub output: PathBuf,
    pub build_tool: Vec<String>,
    pub build_args: Vec<String>,
    pub prebuild: Option<String>,
}

impl BuildSpec {
    pub fn from_config(cfg: &Config, output: PathBuf) -> Self {
        Self {
            package: cfg.package_path.clone(),
            output,
            build_tool: cfg.build_tool.clone(),
            build_args: cfg.build_args.clone(),
            prebuild: cfg.prebuild.clone(),
        }
    }

    /// `<tool...> -o <output> <build args...> <package>`, or `None` if no
    /// build tool is configured.
    pub fn compile_command(&self) -> Option<StdCommand> {
        let (program, tool_args) = self.build_tool.split_first()?;
        let mut cmd = StdCommand::new(program);
        cmd.args(tool_args)
            .arg("-o")
            .arg(&self.output)
            .args(&self.build_args)
            .arg(&self.package);
        Some(cmd)
    }
}

/// One build attempt. Its token is single-use; a new attempt gets a new task.
#[derive(Debug, Clone)]
pub struct BuildTask {
    pub id: u64,
    pub spec: Arc<BuildSpec>,
    pub cancel: CancellationToken,
}

impl BuildTask {
    pub fn new(id: u64, spec: Arc<BuildSpec>, cancel: CancellationToken) -> Self {
        Self { id, spec, cancel }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Prebuild,
    Compile,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStage::Prebuild => f.write_str("pre-build command"),
            BuildStage::Compile => f.write_str("build"),
        }
    }
}

/// Why a build attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub stage: BuildStage,
    /// Exit code, if the process ran and exited normally.
    pub exit_code: Option<i32>,
    /// Spawn error or exit description.
    pub reason: String,
    /// Last lines of combined stdout/stderr.
    pub output_tail: Vec<String>,
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Success { elapsed: Duration },
    Failed(BuildFailure),
    Aborted,
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Success { .. })
    }
}

enum StageEnd {
    Failed(BuildFailure),
    Aborted,
}

/// Runs build tasks. Never executes the produced binary.
#[derive(Debug)]
pub struct Builder {
    successes: watch::Sender<u64>,
    tail_lines: usize,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        let (successes, _) = watch::channel(0);
        Self {
            successes,
            tail_lines: DEFAULT_TAIL_LINES,
        }
    }

    pub fn with_tail_lines(mut self, lines: usize) -> Self {
        self.tail_lines = lines;
        self
    }

    /// Generation counter bumped after every successful build.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.successes.subscribe()
    }

    pub async fn build(&self, task: &BuildTask) -> BuildOutcome {
        let outcome = self.run_stages(task).await;

        match &outcome {
            BuildOutcome::Success { elapsed } => {
                info!(build = task.id, elapsed = ?elapsed, "build succeeded");
                self.successes.send_modify(|generation| *generation += 1);
            }
            BuildOutcome::Failed(failure) => {
                error!(
                    build = task.id,
                    stage = %failure.stage,
                    exit_code = ?failure.exit_code,
                    error = %failure,
                    "build failed"
                );
            }
            BuildOutcome::Aborted => info!(build = task.id, "build aborted"),
        }

        outcome
    }

    async fn run_stages(&self, task: &BuildTask) -> BuildOutcome {
        if task.cancel.is_cancelled() {
            return BuildOutcome::Aborted;
        }

        let spec = &task.spec;

        if let Some(prebuild) = &spec.prebuild {
            info!(build = task.id, command = %prebuild, "running pre-build command");
            let cmd = process::shell_command(prebuild);
            if let Err(end) = self.run_stage(task, BuildStage::Prebuild, cmd).await {
                return end.into();
            }
        }

        let Some(cmd) = spec.compile_command() else {
            return BuildOutcome::Failed(BuildFailure {
                stage: BuildStage::Compile,
                exit_code: None,
                reason: "no build tool configured".to_string(),
                output_tail: Vec::new(),
            });
        };

        info!(build = task.id, package = %spec.package.display(), "building");
        let start = Instant::now();
        match self.run_stage(task, BuildStage::Compile, cmd).await {
            Ok(()) => BuildOutcome::Success {
                elapsed: start.elapsed(),
            },
            Err(end) => end.into(),
        }
    }

    async fn run_stage(
        &self,
        task: &BuildTask,
        stage: BuildStage,
        cmd: StdCommand,
    ) -> Result<(), StageEnd> {
        let program = cmd.get_program().to_string_lossy().into_owned();
        let mut cmd = process::prepare(cmd, Stdio::piped);

        let mut group = ProcessGroup::spawn(&mut cmd).map_err(|err| {
            StageEnd::Failed(BuildFailure {
                stage,
                exit_code: None,
                reason: format!("spawn {program}: {err}"),
                output_tail: Vec::new(),
            })
        })?;
        debug!(build = task.id, %stage, pid = ?group.pid(), "spawned build process");

        let tail = OutputTail::new(self.tail_lines);
        let mut forwarders = Vec::with_capacity(2);
        if let Some(stdout) = group.take_stdout() {
            forwarders.push(output::forward(stdout, Stream::Stdout, tail.clone()));
        }
        if let Some(stderr) = group.take_stderr() {
            forwarders.push(output::forward(stderr, Stream::Stderr, tail.clone()));
        }

        let status = tokio::select! {
            biased;
            _ = task.cancel.cancelled() => {
                debug!(build = task.id, %stage, pid = ?group.pid(), "killing cancelled build process");
                if let Err(err) = group.kill().await {
                    warn!(build = task.id, %stage, error = %err, "failed to reap cancelled build process");
                }
                for forwarder in forwarders {
                    forwarder.abort();
                }
                return Err(StageEnd::Aborted);
            }
            status = group.wait() => status,
        };

        // Something outside the group may still hold the pipes open.
        let drain = async {
            for forwarder in forwarders {
                let _ = forwarder.await;
            }
        };
        if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, drain).await.is_err() {
            debug!(build = task.id, %stage, "output still open after exit; not waiting");
        }

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(StageEnd::Failed(BuildFailure {
                stage,
                exit_code: status.code(),
                reason: process::describe_exit(&status),
                output_tail: tail.snapshot(),
            })),
            Err(err) => Err(StageEnd::Failed(BuildFailure {
                stage,
                exit_code: None,
                reason: format!("wait for {program}: {err}"),
                output_tail: tail.snapshot(),
            })),
        }
    }
}

impl From<StageEnd> for BuildOutcome {
    fn from(end: StageEnd) -> Self {
        match end {
            StageEnd::Failed(failure) => BuildOutcome::Failed(failure),
            StageEnd::Aborted => BuildOutcome::Aborted,
        }
    }
}

// src/exec/process.rs

//! Child process plumbing shared by the builder and the runner.
//!
//! Every child is started as the leader of its own process group (Unix), so
//! signalling the group reaches whatever the child spawned in turn: `go
//! build` forks the compiler and linker, a shell pre-build command forks its
//! own programs.

use std::io;
use std::process::{Command as StdCommand, ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, warn};

/// Wrap a shell command line for the current platform.
pub fn shell_command(command_line: &str) -> StdCommand {
    if cfg!(windows) {
        let mut c = StdCommand::new("cmd");
        c.arg("/C").arg(command_line);
        c
    } else {
        let mut c = StdCommand::new("sh");
        c.arg("-c").arg(command_line);
        c
    }
}

/// Apply the common spawn settings (null stdin, the given stdout/stderr
/// mode, own process group, kill on drop) and hand the command to Tokio.
///
/// `kill_on_drop` only reaches the group leader; the group is signalled
/// explicitly through [`GracefulStop`].
pub fn prepare(mut cmd: StdCommand, output: fn() -> Stdio) -> Command {
    cmd.stdin(Stdio::null()).stdout(output()).stderr(output());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    let mut cmd = Command::from(cmd);
    cmd.kill_on_drop(true);
    cmd
}

/// "Ask nicely, then insist" termination of a process tree.
///
/// The platform decides what each step means; callers never branch on the
/// target OS themselves.
pub trait GracefulStop {
    /// Ask the process to shut down on its own.
    fn request_stop(&mut self) -> io::Result<()>;
    /// Terminate the process immediately.
    fn force_kill(&mut self) -> io::Result<()>;
}

/// A spawned child running as the leader of its own process group.
#[derive(Debug)]
pub struct ProcessGroup {
    child: Child,
    pid: Option<u32>,
}

impl ProcessGroup {
    pub fn spawn(cmd: &mut Command) -> io::Result<Self> {
        let child = cmd.spawn()?;
        let pid = child.id();
        Ok(Self { child, pid })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Wait for the leader to exit. Cancel safe.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Force-kill the group and reap the leader.
    pub async fn kill(&mut self) -> io::Result<ExitStatus> {
        if let Err(err) = self.force_kill() {
            warn!(pid = ?self.pid, error = %err, "failed to kill process group");
        }
        self.child.wait().await
    }
}

#[cfg(unix)]
impl ProcessGroup {
    fn signal_group(&mut self, signal: nix::sys::signal::Signal) -> io::Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        let Some(pid) = self.pid else {
            return Ok(());
        };
        let Ok(raw) = i32::try_from(pid) else {
            return Err(io::Error::other(format!("pid {pid} out of range")));
        };
        match killpg(Pid::from_raw(raw), signal) {
            // The group is already gone.
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(io::Error::from(errno)),
        }
    }
}

#[cfg(unix)]
impl GracefulStop for ProcessGroup {
    fn request_stop(&mut self) -> io::Result<()> {
        self.signal_group(nix::sys::signal::Signal::SIGINT)
    }

    fn force_kill(&mut self) -> io::Result<()> {
        let group = self.signal_group(nix::sys::signal::Signal::SIGKILL);
        // Covers a leader that left its group.
        let leader = self.child.start_kill();
        group.and(match leader {
            Err(err) if err.kind() == io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        })
    }
}

#[cfg(windows)]
impl GracefulStop for ProcessGroup {
    // Console interrupts cannot be targeted at a single child on Windows.
    fn request_stop(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    fn force_kill(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }
}

/// Termination protocol: graceful request, wait up to `grace`, force-kill,
/// and always reap the leader before returning.
pub async fn terminate(group: &mut ProcessGroup, grace: Duration) -> io::Result<ExitStatus> {
    if let Err(err) = group.request_stop() {
        warn!(pid = ?group.pid(), error = %err, "failed to request graceful stop; killing");
        return group.kill().await;
    }

    match tokio::time::timeout(grace, group.wait()).await {
        Ok(status) => status,
        Err(_elapsed) => {
            warn!(pid = ?group.pid(), grace = ?grace, "process did not exit within grace period; killing");
            group.kill().await
        }
    }
}

/// Human-readable exit description for logs.
pub fn describe_exit(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit code {code}");
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            debug!(signal, "process terminated by signal");
            return format!("signal {signal}");
        }
    }
    "unknown exit status".to_string()
}

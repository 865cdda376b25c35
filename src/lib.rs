// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::engine::Orchestrator;
use crate::errors::{PulseError, Result};
use crate::exec::{BuildSpec, Builder, RealBuildBackend, RunSpec, Runner, artifact};
use crate::fs::RealFileSystem;
use crate::watch::{FileWatcher, IgnoreMatcher, IgnoreRuleSet, WatchSignal};

/// High-level entry point used by `main.rs`.
///
/// Runs in the current directory and shuts down on Ctrl-C. See [`run_in`].
pub async fn run(args: CliArgs) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let shutdown = CancellationToken::new();

    // Ctrl-C → graceful shutdown.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("interrupt received");
            shutdown.cancel();
        });
    }

    run_in(args, cwd, shutdown).await
}

/// Wire everything together for the project rooted at `cwd`:
/// - config loading and validation
/// - ignore rules and the file watcher
/// - builder, runner and orchestrator
///
/// Returns once `shutdown` fires (or the watcher died) and everything has
/// been wound down: the build is cancelled, the program stopped and the
/// output binary removed. A watcher failure is returned as the error.
pub async fn run_in(args: CliArgs, cwd: PathBuf, shutdown: CancellationToken) -> Result<()> {
    let cfg = Arc::new(load_and_validate(&args, &cwd)?);

    let rules = IgnoreRuleSet::from_config(&cfg, &RealFileSystem);
    debug!(patterns = ?rules.patterns(), "ignore rules");
    let matcher = IgnoreMatcher::new(&cfg.project_root, &rules)?;

    let output = artifact::output_binary_path(&cfg.package_path);
    artifact::ensure_output_dir(&output)?;
    debug!(path = %output.display(), "output binary");

    let mut watcher = FileWatcher::from_config(&cfg, matcher)?;
    for dir in &cfg.watch_dirs {
        match watcher.add_directory(dir, &shutdown) {
            Ok(()) => info!(path = %dir.display(), "watching"),
            Err(PulseError::Cancelled) => {
                info!("interrupted while adding watch directories");
                return Ok(());
            }
            Err(err) => return Err(err),
        }
    }

    let runner = Runner::new(RunSpec::from_config(&cfg, output.clone()));
    let runner_handle = runner.handle();
    let runner_task = tokio::spawn(runner.listen(shutdown.child_token()));

    let WatchSignal {
        signals,
        handle: watch_task,
    } = watcher.listen(shutdown.child_token());

    let backend = Arc::new(RealBuildBackend::new(Builder::new()));
    let orchestrator = Orchestrator::new(
        backend,
        runner_handle,
        signals,
        BuildSpec::from_config(&cfg, output.clone()),
        shutdown.clone(),
    )
    .with_stop_policy(cfg.stop_policy);

    let result = orchestrator.run().await;

    // Everything below the root token winds down from here.
    shutdown.cancel();
    if let Err(err) = runner_task.await {
        error!(error = %err, "runner task failed");
    }
    let watch_result = match watch_task.await {
        Ok(res) => res,
        Err(join) => Err(PulseError::Other(anyhow!("watcher task failed: {join}"))),
    };

    artifact::remove_output(&output);

    result?;
    watch_result
}

// src/config/validate.rs

use std::fs;

use crate::config::model::Config;
use crate::errors::{PulseError, Result};

/// Reject configurations the orchestrator cannot start with.
///
/// Every error here is fatal and reported before the watch loop starts.
pub fn validate(cfg: &Config) -> Result<()> {
    validate_watch_dirs(cfg)?;
    validate_working_dir(cfg)?;
    validate_build(cfg)?;
    validate_timings(cfg)?;
    Ok(())
}

fn validate_watch_dirs(cfg: &Config) -> Result<()> {
    for dir in &cfg.watch_dirs {
        let meta = fs::metadata(dir).map_err(|e| {
            PulseError::config(format!("stat watch path {}: {e}", dir.display()))
        })?;
        if !meta.is_dir() {
            return Err(PulseError::config(format!(
                "watch path {} is not a directory",
                dir.display()
            )));
        }
    }
    Ok(())
}

fn validate_working_dir(cfg: &Config) -> Result<()> {
    if !cfg.working_dir.is_dir() {
        return Err(PulseError::config(format!(
            "working directory {} is not a directory",
            cfg.working_dir.display()
        )));
    }
    Ok(())
}

fn validate_build(cfg: &Config) -> Result<()> {
    match cfg.build_tool.first() {
        Some(program) if !program.trim().is_empty() => Ok(()),
        _ => Err(PulseError::config("build_tool must name a program")),
    }
}

fn validate_timings(cfg: &Config) -> Result<()> {
    if cfg.debounce.is_zero() {
        return Err(PulseError::config("debounce must be >= 1ms (got 0)"));
    }
    if cfg.grace_period.is_zero() {
        return Err(PulseError::config("grace period must be >= 1ms (got 0)"));
    }
    Ok(())
}

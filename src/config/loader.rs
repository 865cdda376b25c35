// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cli::CliArgs;
use crate::config::model::{Config, RawConfigFile};
use crate::config::validate::validate;
use crate::errors::{PulseError, Result};

/// Load a configuration file from a given path.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Resolve which config file to read, if any.
///
/// - An explicit `--config` path must exist.
/// - Otherwise `pulse.toml` in `cwd` is used when present.
/// - Otherwise defaults apply.
pub fn load_optional(explicit: Option<&Path>, cwd: &Path) -> Result<RawConfigFile> {
    match explicit {
        Some(path) => {
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                cwd.join(path)
            };
            load_from_path(&path).map_err(|err| match err {
                PulseError::IoError(io) => {
                    PulseError::config(format!("read config file {}: {io}", path.display()))
                }
                other => other,
            })
        }
        None => {
            let default = cwd.join(default_config_path());
            if default.is_file() {
                debug!(path = %default.display(), "using default config file");
                load_from_path(&default)
            } else {
                Ok(RawConfigFile::default())
            }
        }
    }
}

/// Build the final configuration from the CLI and the optional config file,
/// then check it.
///
/// This is the recommended entry point for the rest of the application.
pub fn load_and_validate(cli: &CliArgs, cwd: &Path) -> Result<Config> {
    let raw = load_optional(cli.config.as_deref(), cwd)?;
    let config = Config::resolve(cli, raw, cwd);
    validate(&config)?;
    Ok(config)
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("pulse.toml")
}

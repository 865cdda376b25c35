// src/exec/artifact.rs

//! Location of the transient output binary.
//!
//! The binary lives under `<tmp>/pulse/` and is named after the package
//! directory plus a short hash of its absolute path, so two packages with the
//! same basename never share an output file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, warn};

use crate::errors::Result;

/// Sub-directory of the system temp dir holding every output binary.
pub const OUTPUT_DIR_NAME: &str = "pulse";

/// Number of hex characters of the path hash appended to the name.
const HASH_PREFIX_LEN: usize = 4;

/// File name of the output binary for `package` (an absolute path).
pub fn binary_name(package: &Path) -> String {
    let base = package
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_string());

    let hash = blake3::hash(package.to_string_lossy().as_bytes());
    let hex = hash.to_hex();
    let mut name = format!("{base}{}", &hex.as_str()[..HASH_PREFIX_LEN]);

    if cfg!(windows) && !name.ends_with(".exe") {
        name.push_str(".exe");
    }
    name
}

/// Output binary path under the system temp directory.
pub fn output_binary_path(package: &Path) -> PathBuf {
    output_binary_path_in(&std::env::temp_dir(), package)
}

/// Output binary path under an explicit temp root.
pub fn output_binary_path_in(tmp_root: &Path, package: &Path) -> PathBuf {
    tmp_root.join(OUTPUT_DIR_NAME).join(binary_name(package))
}

/// Create the directory that will hold `output`.
pub fn ensure_output_dir(output: &Path) -> Result<()> {
    if let Some(dir) = output.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }
    Ok(())
}

/// Remove the output binary at shutdown. A missing file is fine.
pub fn remove_output(output: &Path) {
    match fs::remove_file(output) {
        Ok(()) => debug!(path = %output.display(), "removed output binary"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %output.display(), error = %err, "failed to remove output binary"),
    }
}

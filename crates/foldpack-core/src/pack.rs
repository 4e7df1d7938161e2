//! Packager: runs the archiving command over the finished output tree.

use crate::error::{Error, Result};
use foldpack_util::hash::blake3_file;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Result of a successful packaging run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackOutcome {
    /// Archive reported by the command (last non-empty stdout line), if it exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<PathBuf>,
    /// BLAKE3 digest of the archive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Run `command` in `dir`. A non-zero exit aborts with the command's stderr.
pub async fn pack(dir: &Path, command: &[String]) -> Result<PackOutcome> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| Error::ConfigInvalid("`packCommand` is empty".to_string()))?;
    let display = command.join(" ");

    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| Error::io("failed to start packaging command", dir, e))?;

    if !output.status.success() {
        return Err(Error::Archive {
            command: display,
            status: output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string()),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let archive = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .map(|name| dir.join(name))
        .filter(|p| p.is_file());

    let digest = match &archive {
        Some(path) => Some(
            blake3_file(path).map_err(|e| Error::io("failed to hash archive", path, e))?,
        ),
        None => None,
    };

    Ok(PackOutcome { archive, digest })
}

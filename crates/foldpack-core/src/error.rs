use std::path::PathBuf;
use thiserror::Error;

/// Stable error codes, surfaced in `--json` output.
pub mod codes {
    pub const PRECONDITION_FAILED: &str = "PRECONDITION_FAILED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const IO_ERROR: &str = "IO_ERROR";
    pub const MANIFEST_INVALID: &str = "MANIFEST_INVALID";
    pub const EXPORT_COLLISION: &str = "EXPORT_COLLISION";
    pub const ARCHIVE_FAILED: &str = "ARCHIVE_FAILED";
    pub const CONFIG_READ: &str = "CONFIG_READ";
    pub const CONFIG_PARSE: &str = "CONFIG_PARSE";
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
}

/// Core error type for foldpack operations.
///
/// Every error is fatal to the run; nothing is retried.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Precondition(String),

    #[error("{what} not found: {}", .path.display())]
    NotFound { what: &'static str, path: PathBuf },

    #[error("{context} ({}): {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest at {}: {source}", .path.display())]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Export '{key}' is produced by both {first} and {second}")]
    ExportCollision {
        key: String,
        first: String,
        second: String,
    },

    #[error("Packaging command `{command}` failed with status {status}: {stderr}")]
    Archive {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to read config at {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    ConfigInvalid(String),
}

impl Error {
    /// Create an IO error with a short description of the failed step.
    #[must_use]
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }

    /// Create a not-found error for a required file or folder.
    #[must_use]
    pub fn not_found(what: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            what,
            path: path.into(),
        }
    }

    /// Get the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Precondition(_) => codes::PRECONDITION_FAILED,
            Self::NotFound { .. } => codes::NOT_FOUND,
            Self::Io { .. } => codes::IO_ERROR,
            Self::ManifestParse { .. } => codes::MANIFEST_INVALID,
            Self::ExportCollision { .. } => codes::EXPORT_COLLISION,
            Self::Archive { .. } => codes::ARCHIVE_FAILED,
            Self::ConfigRead { .. } => codes::CONFIG_READ,
            Self::ConfigParse { .. } => codes::CONFIG_PARSE,
            Self::ConfigInvalid(_) => codes::CONFIG_INVALID,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! Unified error type for the mediabox engine.
//!
//! Every `mb-*` crate returns [`Error`]/[`Result`] rather than inventing its
//! own error enum. Variants follow the error taxonomy in the specification:
//! each one names a trigger and carries enough context for the orchestrator
//! to apply the right propagation policy (skip this file vs. abort the run).

use std::path::PathBuf;

/// Unified error type covering every failure mode in the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The probe inspector binary (e.g. `ffprobe`) could not be found on `PATH`.
    #[error("probe tool not found: {tool}")]
    ProbeToolMissing {
        /// Name of the missing tool.
        tool: String,
    },

    /// The probe process did not finish within its timeout.
    #[error("probe of {path} timed out after {timeout_secs}s")]
    ProbeTimeout {
        /// File being probed.
        path: PathBuf,
        /// Configured timeout.
        timeout_secs: u64,
    },

    /// The probe process exited with a non-zero status.
    #[error("probe of {path} failed: {stderr}")]
    ProbeNonzeroExit {
        /// File being probed.
        path: PathBuf,
        /// Captured standard error.
        stderr: String,
    },

    /// The probe's JSON output could not be parsed into a `MediaProbe`.
    #[error("malformed probe output for {path}: {message}")]
    MalformedJson {
        /// File being probed.
        path: PathBuf,
        /// Parse failure detail.
        message: String,
    },

    /// The encoder process exited with a non-zero status.
    #[error("encoder failed for {path}: {stderr}")]
    EncoderNonzeroExit {
        /// Input file being transcoded.
        path: PathBuf,
        /// Captured standard error.
        stderr: String,
    },

    /// The file's extension is not one the engine handles.
    #[error("unsupported format: {path}")]
    UnsupportedFormat {
        /// Offending file.
        path: PathBuf,
    },

    /// No English (or unlabeled) audio stream exists to preserve.
    #[error("no English audio stream in {path}")]
    NoEnglishAudio {
        /// Offending file.
        path: PathBuf,
    },

    /// Another worker already holds a valid lock on this file.
    #[error("{path} is locked by {holder}")]
    LockHeld {
        /// Locked file.
        path: PathBuf,
        /// Identity of the current lock holder (`hostname:pid`).
        holder: String,
    },

    /// A lock existed but was older than the staleness threshold.
    #[error("lock on {path} was stale and has been evicted")]
    LockStale {
        /// File whose lock was evicted.
        path: PathBuf,
    },

    /// Writing the per-directory cache file failed.
    #[error("failed to write cache in {directory}: {message}")]
    CacheWriteFailed {
        /// Directory whose cache file failed to write.
        directory: PathBuf,
        /// Underlying error detail.
        message: String,
    },

    /// Notifying the downstream library indexer failed.
    #[error("indexer notification failed: {message}")]
    IndexerNotifyFailed {
        /// Underlying error detail.
        message: String,
    },

    /// A `SIGINT`/`SIGTERM` was received mid-job.
    #[error("interrupted")]
    InterruptRequested,

    /// Required configuration is missing or malformed; fatal at startup.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// An I/O operation failed outside the above, more specific cases.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON (de)serialization operation failed outside the above cases.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for conditions that don't fit a named variant.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Process exit code this error should produce when it is fatal at
    /// startup (per the CLI's `--dir`/`--file` exit-code contract).
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ConfigInvalid(_) => 2,
            Error::UnsupportedFormat { .. } => 1,
            _ => 1,
        }
    }

    /// Whether this error should abort the whole batch rather than just
    /// being logged and skipped for the current file.
    #[must_use]
    pub fn is_fatal_to_batch(&self) -> bool {
        matches!(self, Error::ConfigInvalid(_) | Error::InterruptRequested)
    }

    /// Convenience constructor for [`Error::ProbeToolMissing`].
    pub fn probe_tool_missing(tool: impl Into<String>) -> Self {
        Error::ProbeToolMissing { tool: tool.into() }
    }

    /// Convenience constructor for [`Error::ProbeNonzeroExit`].
    pub fn probe_nonzero_exit(path: impl Into<PathBuf>, stderr: impl Into<String>) -> Self {
        Error::ProbeNonzeroExit {
            path: path.into(),
            stderr: stderr.into(),
        }
    }

    /// Convenience constructor for [`Error::MalformedJson`].
    pub fn malformed_json(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::MalformedJson {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::LockHeld`].
    pub fn lock_held(path: impl Into<PathBuf>, holder: impl Into<String>) -> Self {
        Error::LockHeld {
            path: path.into(),
            holder: holder.into(),
        }
    }

    /// Convenience constructor for [`Error::CacheWriteFailed`].
    pub fn cache_write_failed(directory: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::CacheWriteFailed {
            directory: directory.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

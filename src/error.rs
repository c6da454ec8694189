//! Sync pipeline error taxonomy.
//!
//! Every component fails fast with exactly one of these variants; the
//! orchestrator maps the variant to a single human-readable stream line.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during a sync run.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SyncError {
    /// The document or file listing could not be retrieved.
    #[error("project source unavailable: {0}")]
    SourceUnavailable(String),

    /// Local disk I/O failed while materializing the snapshot.
    #[error("failed to write {}: {source}", .path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The control file is absent from the snapshot.
    #[error("sync config file {0} not found in project")]
    ConfigMissing(&'static str),

    /// The control file exists but is not valid JSON.
    #[error("sync config file is not valid JSON: {0}")]
    ConfigMalformed(#[source] serde_json::Error),

    /// The control file parsed but a required field is empty or invalid.
    #[error("sync config is incomplete: {0}")]
    ConfigIncomplete(String),

    /// Clone, fetch, or push could not reach the remote.
    #[error("remote repository unreachable: {0}")]
    RemoteUnreachable(String),

    /// The remote rejected the embedded credentials.
    #[error("remote rejected credentials: {0}")]
    AuthRejected(String),

    /// The cached workspace has an unusable `.git` directory.
    #[error("cached git workspace is corrupt: {0}")]
    CacheCorrupt(String),

    /// The staged snapshot matches the last commit. Benign terminal state.
    #[error("nothing to sync: project matches the remote repository")]
    NothingToSync,
}

impl SyncError {
    /// Build a [`SyncError::WriteFailure`] for `path`.
    pub fn write_failure(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::WriteFailure {
            path: path.into(),
            source,
        }
    }

    /// Whether this outcome is a benign terminal state rather than a failure.
    pub fn is_benign(&self) -> bool {
        matches!(self, SyncError::NothingToSync)
    }
}

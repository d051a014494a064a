//! Synchronizer error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that prevent the directory synchronizer from starting.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A watched directory could not be created.
    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The filesystem watch could not be established.
    #[error("Failed to watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The initial scan of a directory failed.
    #[error("Failed to scan directory {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking start-up work panicked or was cancelled.
    #[error("Synchronizer start-up task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// `start` was called while the synchronizer was already running.
    #[error("Directory synchronizer is already running")]
    AlreadyRunning,
}

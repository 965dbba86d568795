//! Error types for topology refresh cycles.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for refresh operations.
pub type Result<T> = std::result::Result<T, RefreshError>;

/// Why a single refresh cycle produced no new snapshot.
#[derive(Error, Debug)]
pub enum RefreshError {
    /// The dump command could not be started.
    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The dump command exited unsuccessfully.
    #[error("{command} failed with retc={}: {stderr}", exit_code(.status))]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    /// The scratch file could not be written or read back.
    #[error("scratch file {}: {source}", path.display())]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The dump contained no device lines.
    #[error("topology dump contained no devices")]
    EmptyDump,
}

fn exit_code(status: &Option<i32>) -> String {
    status.map_or_else(|| "signal".to_string(), |code| code.to_string())
}

impl From<RefreshError> for corelib::Error {
    fn from(err: RefreshError) -> Self {
        corelib::Error::RefreshCycle(err.to_string())
    }
}

use std::io;

use thiserror::Error;

/// Failures talking to a peer. Block validation failures are not here: they
/// are per-block and never abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to connect to {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("peer replied with error: {0}")]
    Remote(String),
    #[error("unexpected response to {command}: {response}")]
    UnexpectedResponse {
        command: &'static str,
        response: String,
    },
}

pub type SyncResult<T> = Result<T, SyncError>;

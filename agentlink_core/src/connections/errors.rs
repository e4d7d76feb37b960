use thiserror::Error;

/// A central error enum for transport-level failures.
///
/// These never escape a supervisor call; a connection handle turns them into
/// a log record plus an `OFFLINE` transition.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Timed out connecting to {0}")]
    Timeout(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Other error: {0}")]
    Other(String),
}

//! Pipeline-wide error types.

use thiserror::Error;

/// Pipeline-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline-wide error type.
///
/// None of these are retried; each one surfaces to the consumer as exactly
/// one terminal `Error` job event rather than a propagated panic.
#[derive(Error, Debug)]
pub enum Error {
    /// The external executable could not be started at all (missing or not
    /// executable). Distinct from a process that ran and exited non-zero.
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The extract stage exited zero but produced nothing we can serve.
    #[error("extraction completed but no output file was found")]
    OutputNotFound,

    /// The job was cancelled while a stage was running.
    #[error("extraction cancelled")]
    Cancelled,

    #[error("invalid state transition: cannot transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

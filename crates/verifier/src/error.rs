//! Verifier error types.

use event_store::{EventStoreError, Position};
use thiserror::Error;

/// Errors that abort a verification run.
///
/// Property violations are not errors; they are collected in the reports.
#[derive(Debug, Error)]
pub enum VerifierError {
    /// An error occurred in the event store under test.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// An appended event does not carry the batch metadata it was written with.
    #[error("Malformed batch metadata at position {position}: {reason}")]
    MalformedBatch { position: Position, reason: String },

    /// A worker task panicked or was cancelled.
    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Result type for verifier operations.
pub type Result<T> = std::result::Result<T, VerifierError>;

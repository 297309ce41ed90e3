//! Decision error types.

use event_store::EventStoreError;
use projections::ProjectionError;
use thiserror::Error;

use crate::cart::CartError;

/// Errors that can occur while building or executing a decision.
#[derive(Debug, Error)]
pub enum DecisionError {
    /// An error occurred in the event store, including a failed append
    /// condition.
    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    /// A projection slice could not be read from the decision model.
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// The cart rejected the command.
    #[error(transparent)]
    Cart(CartError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DecisionError {
    /// Returns true if the decision went stale before it could be appended.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DecisionError::EventStore(EventStoreError::AppendConditionFailed(_))
        )
    }
}

/// Result type for decision operations.
pub type Result<T> = std::result::Result<T, DecisionError>;

//! Projection error types.

use thiserror::Error;

/// Errors that can occur when reading projection state.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// No projection with this name is part of the composite.
    #[error("Unknown projection: {0}")]
    UnknownProjection(String),

    /// The state of the named projection is not of the requested type.
    #[error("State of projection '{name}' is not a {expected}")]
    StateTypeMismatch {
        name: String,
        expected: &'static str,
    },
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;

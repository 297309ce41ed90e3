use thiserror::Error;

use crate::Position;

/// Reasons an append condition rejected an append.
///
/// Callers should treat these as ordinary domain conflicts: somebody else
/// appended a relevant event since the decision was made. Recovering means
/// re-running the whole read-decide-append cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AppendConditionViolation {
    /// Matching events exist but the condition expected none at all.
    #[error(
        "The Event Store contained events matching the specified query but none were expected"
    )]
    UnexpectedMatch { last_match: Position },

    /// Matching events exist beyond the `after` position of the condition.
    #[error("The Event Store contained events matching the specified query after position {after}")]
    MatchAfterBoundary {
        after: Position,
        last_match: Position,
    },
}

impl AppendConditionViolation {
    /// Position of the most recent event that matched the condition's query.
    pub fn last_match(&self) -> Position {
        match self {
            Self::UnexpectedMatch { last_match } | Self::MatchAfterBoundary { last_match, .. } => {
                *last_match
            }
        }
    }
}

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The append condition did not hold at commit time.
    #[error(transparent)]
    AppendConditionFailed(#[from] AppendConditionViolation),

    /// An event type has no definition in the store's type registry.
    #[error("Unknown event type: {event_type}")]
    UnknownEventType { event_type: String },

    /// An append was attempted without any events.
    #[error("Cannot append empty event list")]
    EmptyAppend,

    /// A remote store returned data that does not have the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// Returns the condition violation if this error is one.
    pub fn as_condition_violation(&self) -> Option<&AppendConditionViolation> {
        match self {
            Self::AppendConditionFailed(violation) => Some(violation),
            _ => None,
        }
    }
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;

use serde::{Deserialize, Serialize};

/// Sequence position of an event in the store.
///
/// Positions are assigned exclusively by the event store. The first event
/// lands at position 1 and every subsequent event gets the next integer,
/// without gaps. Position 0 is never assigned and stands for "before the
/// first event".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Position(u64);

impl Position {
    /// Creates a position from a raw value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the position preceding the first event (0).
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the position of the first event (1).
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next position.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns true for the "before the first event" position.
    pub fn is_initial(&self) -> bool {
        self.0 == 0
    }

    /// Returns the raw position value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Position {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Position> for u64 {
    fn from(position: Position) -> Self {
        position.0
    }
}

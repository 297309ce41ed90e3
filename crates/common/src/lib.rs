//! Shared types for the dynamic consistency boundary workspace.

mod position;

pub use position::Position;

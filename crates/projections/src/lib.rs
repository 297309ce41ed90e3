//! Projections for building decision models.
//!
//! This crate provides:
//! - [`Projection`] trait: a pure fold scoped by its own query
//! - [`TaggedProjection`] / [`ProjectionBuilder`]: handler tables keyed by event type
//! - [`CompositeProjection`]: named projections folded together over one read

pub mod composite;
pub mod error;
pub mod projection;

pub use composite::{CompositeProjection, CompositeState};
pub use error::{ProjectionError, Result};
pub use projection::{Handler, Projection, ProjectionBuilder, TaggedProjection};

//! Event store for the dynamic consistency boundary pattern.
//!
//! This crate provides:
//! - [`Query`] / [`QueryItem`] for type- and tag-based event matching
//! - the [`EventStore`] trait with query-scoped [`AppendCondition`]s
//! - [`InMemoryEventStore`], the reference implementation
//! - an [`EventTypeRegistry`] and the [`wire`] codec for remote stores

pub mod error;
pub mod event;
pub mod memory;
pub mod query;
pub mod registry;
pub mod store;
pub mod wire;

pub use common::Position;
pub use error::{AppendConditionViolation, EventStoreError, Result};
pub use event::{Event, SequencedEvent, SequencedEvents};
pub use memory::InMemoryEventStore;
pub use query::{Query, QueryItem};
pub use registry::{EventDefinition, EventTypeRegistry};
pub use store::{
    AppendCondition, AppendOutcome, EventStore, EventStoreExt, EventStream, ReadOptions,
};

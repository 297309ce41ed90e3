//! Command handling infrastructure.
//!
//! A command is handled by building a decision model, letting a decide
//! function turn its state into new events, and appending them under the
//! model's append condition. A stale decision surfaces as an append
//! condition failure; it is never retried here.

use event_store::{AppendCondition, Event, EventStore, Position};
use projections::Projection;

use crate::decision_model::build_decision_model;
use crate::error::DecisionError;

/// Result of command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// The events that were decided and persisted.
    pub events: Vec<Event>,

    /// Position of the last appended event, `None` if nothing was appended.
    pub position: Option<Position>,

    /// The condition the append was guarded by.
    pub append_condition: AppendCondition,
}

impl CommandResult {
    /// Returns true if the command appended at least one event.
    pub fn appended(&self) -> bool {
        self.position.is_some()
    }
}

/// Handler for executing commands against an event store.
///
/// The handler is responsible for:
/// 1. Building the decision model from the projection's query
/// 2. Executing the decide function to produce events
/// 3. Appending the events guarded by the model's append condition
#[derive(Debug, Clone)]
pub struct CommandHandler<S>
where
    S: EventStore,
{
    store: S,
}

impl<S> CommandHandler<S>
where
    S: EventStore,
{
    /// Creates a new command handler with the given event store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Executes a decision and persists the resulting events.
    ///
    /// The decide function receives the projected state and returns either
    /// the events to append, or an error. Returning no events appends
    /// nothing and succeeds.
    #[tracing::instrument(skip_all)]
    pub async fn execute<P, F, E>(
        &self,
        projection: &P,
        decide: F,
    ) -> Result<CommandResult, DecisionError>
    where
        P: Projection,
        F: FnOnce(&P::State) -> Result<Vec<Event>, E>,
        DecisionError: From<E>,
    {
        let model = build_decision_model(&self.store, projection).await?;

        let events = decide(&model.state)?;

        if events.is_empty() {
            tracing::debug!("Decision produced no events");
            return Ok(CommandResult {
                events,
                position: None,
                append_condition: model.append_condition,
            });
        }

        let position = self
            .store
            .append(events.clone(), Some(model.append_condition.clone()))
            .await
            .map_err(<DecisionError as From<event_store::EventStoreError>>::from)
            .inspect_err(|e| {
                if e.is_conflict() {
                    tracing::warn!(error = %e, "Decision went stale before append");
                }
            })?;

        tracing::debug!(%position, count = events.len(), "Appended decided events");

        Ok(CommandResult {
            events,
            position: Some(position),
            append_condition: model.append_condition,
        })
    }
}

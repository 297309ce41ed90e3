//! Decision model construction.
//!
//! A decision model is the state of one or more projections, folded from a
//! single read, together with the append condition that guards any write
//! derived from it.

use event_store::{AppendCondition, EventStore, Position, ReadOptions};
use projections::{CompositeState, Projection};

/// Projected state plus the condition under which it is still current.
#[derive(Debug, Clone)]
pub struct DecisionModel<S = CompositeState> {
    /// State of the projection after folding every event read.
    pub state: S,

    /// Fails an append if any event matching the projection's query was
    /// appended after the last event read.
    pub append_condition: AppendCondition,
}

impl<S> DecisionModel<S> {
    /// Position of the last event folded into the state, if any.
    pub fn last_consumed_position(&self) -> Option<Position> {
        self.append_condition.after
    }
}

/// Builds a decision model from one forward read of the projection's query.
///
/// `after` is set to the position of the last event read. When nothing was
/// read it stays absent, so any matching event appended later fails the
/// condition.
#[tracing::instrument(skip_all, fields(query_items = projection.query().items().len()))]
pub async fn build_decision_model<E, P>(
    store: &E,
    projection: &P,
) -> event_store::Result<DecisionModel<P::State>>
where
    E: EventStore + ?Sized,
    P: Projection,
{
    let query = projection.query();
    let events = store.read(query, ReadOptions::forward()).await?;

    let mut state = projection.initial_state();
    let mut last_consumed: Option<Position> = None;
    for event in &events {
        state = projection.apply(state, event);
        last_consumed = Some(event.position);
    }

    let mut append_condition = AppendCondition::fail_if_events_match(query.clone());
    if let Some(position) = last_consumed.filter(|p| !p.is_initial()) {
        append_condition = append_condition.after(position);
    }

    metrics::counter!("decision_models_built_total").increment(1);
    tracing::debug!(
        events_read = events.len(),
        after = ?append_condition.after,
        "Built decision model"
    );

    Ok(DecisionModel {
        state,
        append_condition,
    })
}

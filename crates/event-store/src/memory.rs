use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AppendCondition, Event, EventStoreError, EventTypeRegistry, Position, Query, ReadOptions,
    Result, SequencedEvent, SequencedEvents,
    store::{EventStore, select_events, validate_events_for_append},
};

/// In-memory event store implementation.
///
/// The log lives behind a single `RwLock`. Reads share the lock and copy
/// out a snapshot; appends hold the write lock across the condition check
/// and the commit, which makes them mutually exclusive.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<SequencedEvent>>>,
    registry: Option<Arc<EventTypeRegistry>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that only accepts event types known to `registry`.
    pub fn with_registry(registry: EventTypeRegistry) -> Self {
        Self {
            events: Arc::default(),
            registry: Some(Arc::new(registry)),
        }
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Returns the position of the most recent event, if any.
    pub async fn last_position(&self) -> Option<Position> {
        self.events.read().await.last().map(|e| e.position)
    }

    /// Removes all events. Positions start again at 1.
    pub async fn reset(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[tracing::instrument(skip(self, query), fields(items = query.items().len()))]
    async fn read(&self, query: &Query, options: ReadOptions) -> Result<SequencedEvents> {
        let log = self.events.read().await;
        let events = select_events(&log, query, &options)
            .into_iter()
            .cloned()
            .collect();
        Ok(SequencedEvents::new(events))
    }

    #[tracing::instrument(skip(self, events, condition), fields(count = events.len()))]
    async fn append(
        &self,
        events: Vec<Event>,
        condition: Option<AppendCondition>,
    ) -> Result<Position> {
        validate_events_for_append(&events)?;
        if let Some(registry) = &self.registry {
            registry.ensure_known(&events)?;
        }

        let mut log = self.events.write().await;
        metrics::counter!("event_store_appends_total").increment(1);

        if let Some(condition) = &condition
            && let Err(violation) = condition.check(&log)
        {
            metrics::counter!("event_store_append_condition_failures_total").increment(1);
            tracing::debug!(%violation, "append condition failed");
            return Err(EventStoreError::AppendConditionFailed(violation));
        }

        let mut position = log.last().map(|e| e.position).unwrap_or_default();
        let count = events.len();
        log.reserve(count);
        for event in events {
            position = position.next();
            log.push(SequencedEvent::new(event, position));
        }
        metrics::counter!("event_store_events_appended_total").increment(count as u64);

        Ok(position)
    }
}

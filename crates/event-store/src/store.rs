use std::pin::Pin;
use std::time::Instant;

use async_trait::async_trait;
use futures_core::Stream;
use serde::{Deserialize, Serialize};

use crate::{
    AppendConditionViolation, Event, EventStoreError, Position, Query, Result, SequencedEvent,
    SequencedEvents,
};

/// Options for reading events from the store.
///
/// `from` is inclusive: for a forward read it is the minimum position, for
/// a backwards read the maximum. The position boundary is applied before
/// query matching, and `limit` truncates after ordering. A `from` of 0 and
/// a `limit` of 0 are treated as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Position>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub backwards: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl ReadOptions {
    /// Reads everything in ascending position order.
    pub fn forward() -> Self {
        Self::default()
    }

    /// Reads in descending position order.
    pub fn backwards() -> Self {
        Self {
            backwards: true,
            ..Self::default()
        }
    }

    /// Reads only the most recent matching event.
    pub fn last() -> Self {
        Self::backwards().limit(1)
    }

    /// Starts reading at this position (inclusive).
    pub fn from(mut self, position: Position) -> Self {
        self.from = Some(position);
        self
    }

    /// Limits the number of events returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Optimistic-concurrency precondition attached to an append.
///
/// The append fails if any event matching `fail_if_events_match` exists
/// after position `after` (or at all, when `after` is absent or 0).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendCondition {
    pub fail_if_events_match: Query,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Position>,
}

impl AppendCondition {
    /// Creates a condition expecting no event matching `query` at all.
    pub fn fail_if_events_match(query: Query) -> Self {
        Self {
            fail_if_events_match: query,
            after: None,
        }
    }

    /// Tolerates matching events up to and including `position`.
    pub fn after(mut self, position: Position) -> Self {
        self.after = Some(position);
        self
    }

    /// Checks this condition against a log ordered by ascending position.
    pub fn check(&self, log: &[SequencedEvent]) -> std::result::Result<(), AppendConditionViolation> {
        let last_match = select_events(log, &self.fail_if_events_match, &ReadOptions::last())
            .first()
            .map(|e| e.position);

        let Some(last_match) = last_match else {
            return Ok(());
        };

        match self.after.filter(|p| !p.is_initial()) {
            None => Err(AppendConditionViolation::UnexpectedMatch { last_match }),
            Some(after) if last_match > after => {
                Err(AppendConditionViolation::MatchAfterBoundary { after, last_match })
            }
            Some(_) => Ok(()),
        }
    }
}

/// Outcome of an append as reported across the adapter boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendOutcome {
    pub append_condition_failed: bool,
    pub duration_in_microseconds: u64,
}

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<SequencedEvent>> + Send>>;

/// Core trait for event store implementations.
///
/// An event store owns an append-only log and is the only authority for
/// position assignment. All implementations must be thread-safe
/// (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Reads the events matching `query`, honouring `options`.
    ///
    /// Every call derives a fresh snapshot from the current log.
    async fn read(&self, query: &Query, options: ReadOptions) -> Result<SequencedEvents>;

    /// Appends events, assigning them consecutive positions in order.
    ///
    /// If a condition is given, checking it and committing the events is a
    /// single atomic step: no other append can interleave. Returns the
    /// position of the last appended event.
    async fn append(
        &self,
        events: Vec<Event>,
        condition: Option<AppendCondition>,
    ) -> Result<Position>;

    /// Streams the events matching `query`.
    async fn stream(&self, query: &Query, options: ReadOptions) -> Result<EventStream> {
        use futures_util::stream;

        let events = self.read(query, options).await?;
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Returns the most recent event matching `query`.
    async fn read_last_event(&self, query: &Query) -> Result<Option<SequencedEvent>> {
        Ok(self
            .read(query, ReadOptions::last())
            .await?
            .into_iter()
            .next())
    }

    /// Reads the whole log in ascending order.
    async fn read_all(&self) -> Result<SequencedEvents> {
        self.read(&Query::all(), ReadOptions::forward()).await
    }

    /// Appends a single event.
    async fn append_event(
        &self,
        event: Event,
        condition: Option<AppendCondition>,
    ) -> Result<Position> {
        self.append(vec![event], condition).await
    }

    /// Appends and reports a condition violation as an outcome instead of
    /// an error. Any other failure is still returned as an error.
    async fn try_append(
        &self,
        events: Vec<Event>,
        condition: Option<AppendCondition>,
    ) -> Result<AppendOutcome> {
        let started = Instant::now();
        let append_condition_failed = match self.append(events, condition).await {
            Ok(_) => false,
            Err(EventStoreError::AppendConditionFailed(_)) => true,
            Err(e) => return Err(e),
        };
        Ok(AppendOutcome {
            append_condition_failed,
            duration_in_microseconds: u64::try_from(started.elapsed().as_micros())
                .unwrap_or(u64::MAX),
        })
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Selects the events of `log` matching `query`, honouring `options`.
///
/// `log` must be ordered by ascending position. This is the single
/// filtering routine shared by reads and append-condition checks.
pub fn select_events<'a>(
    log: &'a [SequencedEvent],
    query: &Query,
    options: &ReadOptions,
) -> Vec<&'a SequencedEvent> {
    let from = options.from.filter(|p| !p.is_initial());
    let limit = options.limit.filter(|l| *l > 0).unwrap_or(usize::MAX);

    if options.backwards {
        log.iter()
            .rev()
            .filter(|e| from.is_none_or(|from| e.position <= from))
            .filter(|e| query.matches(&e.event))
            .take(limit)
            .collect()
    } else {
        log.iter()
            .filter(|e| from.is_none_or(|from| e.position >= from))
            .filter(|e| query.matches(&e.event))
            .take(limit)
            .collect()
    }
}

/// Validates events before appending.
pub fn validate_events_for_append(events: &[Event]) -> Result<()> {
    if events.is_empty() {
        return Err(EventStoreError::EmptyAppend);
    }
    Ok(())
}

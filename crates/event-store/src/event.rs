use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::Position;

/// An event as handed to the store for appending.
///
/// Events carry a type, a set of tags used for cross-cutting filtering, and
/// an opaque JSON payload. They are immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The type of the event (e.g., "ItemAdded", "CartClosed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Tags attached to the event.
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// The event payload as JSON.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Event {
    /// Creates an untagged event with a raw JSON payload.
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            tags: BTreeSet::new(),
            data,
        }
    }

    /// Creates an untagged event from a serializable payload.
    pub fn from_payload<T: Serialize>(
        event_type: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(event_type, serde_json::to_value(payload)?))
    }

    /// Adds a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Adds several tags.
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Returns true if the event carries every tag in `tags`.
    pub fn has_tags(&self, tags: &BTreeSet<String>) -> bool {
        tags.is_subset(&self.tags)
    }

    /// Deserializes the payload into a concrete type.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

/// An event that has been committed to the store at a given position.
///
/// Sequenced events are permanent: the store never mutates, renumbers or
/// deletes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedEvent {
    #[serde(flatten)]
    pub event: Event,

    /// Position assigned by the store.
    pub position: Position,
}

impl SequencedEvent {
    pub fn new(event: Event, position: Position) -> Self {
        Self { event, position }
    }

    pub fn event_type(&self) -> &str {
        &self.event.event_type
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.event.tags
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.event.data
    }

    /// Drops the position, returning the event as it was appended.
    pub fn into_event(self) -> Event {
        self.event
    }
}

/// A read-only, finite snapshot of events returned by a read.
///
/// Each call to `read` derives a fresh snapshot from the current log; later
/// appends are never reflected in an existing `SequencedEvents`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequencedEvents {
    events: Vec<SequencedEvent>,
}

impl SequencedEvents {
    pub fn new(events: Vec<SequencedEvent>) -> Self {
        Self { events }
    }

    /// Returns the first event in read order, if any.
    pub fn first(&self) -> Option<&SequencedEvent> {
        self.events.first()
    }

    /// Returns the position of the last event in read order.
    pub fn last_position(&self) -> Option<Position> {
        self.events.last().map(|e| e.position)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SequencedEvent> {
        self.events.iter()
    }

    /// Returns the positions in read order.
    pub fn positions(&self) -> Vec<Position> {
        self.events.iter().map(|e| e.position).collect()
    }

    pub fn into_vec(self) -> Vec<SequencedEvent> {
        self.events
    }
}

impl IntoIterator for SequencedEvents {
    type Item = SequencedEvent;
    type IntoIter = std::vec::IntoIter<SequencedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a SequencedEvents {
    type Item = &'a SequencedEvent;
    type IntoIter = std::slice::Iter<'a, SequencedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

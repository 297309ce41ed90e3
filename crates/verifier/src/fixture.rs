//! Random queries and event batches for concurrent verification.

use event_store::{Event, Position, Query, QueryItem};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Inclusive range of counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub min: usize,
    pub max: usize,
}

impl Range {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// Picks a value in `min..=max`.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> usize {
        if self.max <= self.min {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }
}

/// Variety of the generated fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DcbOptions {
    pub number_of_event_types: usize,
    pub number_of_tags: usize,
    pub number_of_items_per_query: Range,
    pub event_types_per_query_item: Range,
    pub tags_per_query_item: Range,
    pub events_per_append: Range,
}

impl DcbOptions {
    /// Many small appends over a wide vocabulary.
    pub const fn consistency() -> Self {
        Self {
            number_of_event_types: 10,
            number_of_tags: 10,
            number_of_items_per_query: Range::new(0, 3),
            event_types_per_query_item: Range::new(0, 4),
            tags_per_query_item: Range::new(0, 3),
            events_per_append: Range::new(1, 2),
        }
    }

    /// Larger batches over a narrow vocabulary.
    pub const fn monotonic() -> Self {
        Self {
            number_of_event_types: 5,
            number_of_tags: 5,
            number_of_items_per_query: Range::new(0, 3),
            event_types_per_query_item: Range::new(0, 4),
            tags_per_query_item: Range::new(0, 3),
            events_per_append: Range::new(2, 5),
        }
    }
}

/// Payload of every generated event.
///
/// Only the first event of a batch records the query and the last matching
/// position the append was guarded by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMetadata {
    pub batch_index: usize,
    pub batch_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Query>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_matching_event_position: Option<Position>,
}

impl BatchMetadata {
    pub fn is_batch_start(&self) -> bool {
        self.batch_index == 0
    }
}

/// Seeded generator of queries and event batches.
#[derive(Debug, Clone)]
pub struct Fixture {
    options: DcbOptions,
    event_types: Vec<String>,
    tags: Vec<String>,
    rng: StdRng,
}

impl Fixture {
    pub fn new(options: DcbOptions, seed: u64) -> Self {
        Self {
            options,
            event_types: generate_strings("eventType", options.number_of_event_types),
            tags: generate_strings("tag", options.number_of_tags),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn options(&self) -> &DcbOptions {
        &self.options
    }

    pub fn event_types(&self) -> &[String] {
        &self.event_types
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Creates a query of random items.
    ///
    /// Every item constrains at least one of types or tags. A query with no
    /// items is the wildcard.
    pub fn create_query(&mut self) -> Query {
        let item_count = self.options.number_of_items_per_query.sample(&mut self.rng);
        Query::from_items((0..item_count).map(|_| self.create_query_item()))
    }

    fn create_query_item(&mut self) -> QueryItem {
        let types_range = self.options.event_types_per_query_item;
        let tags_range = self.options.tags_per_query_item;

        let mut type_count = types_range.sample(&mut self.rng);
        let mut tag_count = tags_range.sample(&mut self.rng);
        if type_count == 0 && tag_count == 0 {
            type_count = types_range.sample(&mut self.rng).max(1);
            tag_count = tags_range.sample(&mut self.rng).max(1);
        }

        let mut item = QueryItem::new();
        if type_count > 0 {
            item = item.types(some(&self.event_types, type_count, &mut self.rng));
        }
        if tag_count > 0 {
            item = item.tags(some(&self.tags, tag_count, &mut self.rng));
        }
        item
    }

    /// Creates a batch of events for an append guarded by `query` after
    /// `last_matching_event_position`.
    pub fn create_events(
        &mut self,
        query: &Query,
        last_matching_event_position: Position,
    ) -> serde_json::Result<Vec<Event>> {
        let batch_size = self.options.events_per_append.sample(&mut self.rng).max(1);

        (0..batch_size)
            .map(|batch_index| -> serde_json::Result<Event> {
                let metadata = BatchMetadata {
                    batch_index,
                    batch_size,
                    query: (batch_index == 0).then(|| query.clone()),
                    last_matching_event_position: (batch_index == 0)
                        .then_some(last_matching_event_position),
                };
                let event_type = self
                    .event_types
                    .choose(&mut self.rng)
                    .cloned()
                    .unwrap_or_else(|| "eventType1".to_string());
                let tag_count = self.options.tags_per_query_item.sample(&mut self.rng);
                let tags = some(&self.tags, tag_count, &mut self.rng);

                Ok(Event::from_payload(event_type, &metadata)?.with_tags(tags))
            })
            .collect()
    }
}

fn generate_strings(prefix: &str, n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("{prefix}{i}")).collect()
}

fn some<R: Rng>(values: &[String], n: usize, rng: &mut R) -> Vec<String> {
    values.choose_multiple(rng, n).cloned().collect()
}

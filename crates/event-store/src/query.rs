use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::Event;

/// A single type/tag filter.
///
/// An item matches an event when the event's type is one of `types` (if
/// given) and the event carries all of `tags` (if given). An absent field
/// does not constrain; an empty `types` set matches no event type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryItem {
    /// Event types, any of which may match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<BTreeSet<String>>,

    /// Tags, all of which must be present on the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
}

impl QueryItem {
    /// Creates an unconstrained item.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an item matching any of the given event types.
    pub fn for_types<I, T>(types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::new().types(types)
    }

    /// Creates an item matching events that carry all of the given tags.
    pub fn for_tags<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::new().tags(tags)
    }

    /// Restricts the item to the given event types.
    pub fn types<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Requires the given tags.
    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Returns true if `event` satisfies this item.
    pub fn matches(&self, event: &Event) -> bool {
        self.types
            .as_ref()
            .is_none_or(|types| types.contains(&event.event_type))
            && self.tags.as_ref().is_none_or(|tags| event.has_tags(tags))
    }
}

/// A disjunction of query items.
///
/// An event matches the query if it matches any item. The query without
/// items is the wildcard and matches every event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    items: Vec<QueryItem>,
}

impl Query {
    /// Returns the wildcard query.
    pub fn all() -> Self {
        Self::default()
    }

    /// Creates a query from items. An empty list yields the wildcard.
    pub fn from_items(items: impl IntoIterator<Item = QueryItem>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    /// Creates a single-item query for the given event types.
    pub fn for_types<I, T>(types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::from_items([QueryItem::for_types(types)])
    }

    /// Creates a single-item query for the given tags.
    pub fn for_tags<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::from_items([QueryItem::for_tags(tags)])
    }

    pub fn items(&self) -> &[QueryItem] {
        &self.items
    }

    /// Returns true for the wildcard query.
    pub fn is_all(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true if `event` matches this query.
    ///
    /// Every read filter and every append-condition check goes through this
    /// method.
    pub fn matches(&self, event: &Event) -> bool {
        self.is_all() || self.items.iter().any(|item| item.matches(event))
    }

    /// Returns the union of both queries.
    ///
    /// The wildcard absorbs: merging anything with `Query::all()` yields
    /// `Query::all()`.
    pub fn merge(&self, other: &Query) -> Query {
        if self.is_all() || other.is_all() {
            return Query::all();
        }
        let mut items = Vec::with_capacity(self.items.len() + other.items.len());
        items.extend(self.items.iter().cloned());
        items.extend(other.items.iter().cloned());
        Query { items }
    }
}

impl From<QueryItem> for Query {
    fn from(item: QueryItem) -> Self {
        Self { items: vec![item] }
    }
}

//! Core projection trait and the handler-table projection.

use std::collections::{BTreeSet, HashMap};

use event_store::{EventTypeRegistry, Query, QueryItem, SequencedEvent};

/// A pure fold over the events selected by its query.
///
/// `evolve` returns `None` when the event leaves the state untouched,
/// either because it does not match the query or because nothing handles
/// it. Callers use that signal for change detection.
pub trait Projection: Send + Sync {
    /// State produced by this projection.
    type State: Send + Sync + 'static;

    /// Returns the state before any event has been applied.
    fn initial_state(&self) -> Self::State;

    /// Returns the query selecting the events this projection consumes.
    fn query(&self) -> &Query;

    /// Returns the next state, or `None` if `event` does not change it.
    fn evolve(&self, state: &Self::State, event: &SequencedEvent) -> Option<Self::State>;

    /// Applies a single event.
    fn apply(&self, state: Self::State, event: &SequencedEvent) -> Self::State {
        match self.evolve(&state, event) {
            Some(next) => next,
            None => state,
        }
    }

    /// Folds a sequence of events into a state, starting from the initial one.
    fn fold<'a, I>(&self, events: I) -> Self::State
    where
        Self: Sized,
        I: IntoIterator<Item = &'a SequencedEvent>,
    {
        events
            .into_iter()
            .fold(self.initial_state(), |state, event| self.apply(state, event))
    }
}

/// Handler invoked for one event type.
pub type Handler<S> = Box<dyn Fn(&S, &SequencedEvent) -> S + Send + Sync>;

/// A projection dispatching on the event type to registered handlers.
///
/// Its query is a single item: the handled event types, narrowed by the
/// optional tag filter. A handler result equal to the current state is
/// reported as no change.
pub struct TaggedProjection<S> {
    initial_state: S,
    handlers: HashMap<String, Handler<S>>,
    query: Query,
}

impl<S> TaggedProjection<S>
where
    S: Clone + PartialEq + Send + Sync + 'static,
{
    /// Starts building a projection with the given initial state.
    pub fn builder(initial_state: S) -> ProjectionBuilder<S> {
        ProjectionBuilder::new(initial_state)
    }

    /// Returns the event types this projection has handlers for.
    pub fn handled_types(&self) -> BTreeSet<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Returns the handled event types that `registry` does not define.
    ///
    /// A handler registered under a misspelled type silently never fires;
    /// this lists such keys.
    pub fn unregistered_types(&self, registry: &EventTypeRegistry) -> Vec<String> {
        let unknown: Vec<String> = self
            .handled_types()
            .into_iter()
            .filter(|t| !registry.contains(t))
            .map(str::to_string)
            .collect();
        if !unknown.is_empty() {
            tracing::debug!(types = ?unknown, "handlers registered for unknown event types");
        }
        unknown
    }
}

impl<S> Projection for TaggedProjection<S>
where
    S: Clone + PartialEq + Send + Sync + 'static,
{
    type State = S;

    fn initial_state(&self) -> S {
        self.initial_state.clone()
    }

    fn query(&self) -> &Query {
        &self.query
    }

    fn evolve(&self, state: &S, event: &SequencedEvent) -> Option<S> {
        if !self.query.matches(&event.event) {
            return None;
        }
        let handler = self.handlers.get(event.event_type())?;
        let next = handler(state, event);
        (next != *state).then_some(next)
    }
}

impl<S> std::fmt::Debug for TaggedProjection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaggedProjection")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// Builder for [`TaggedProjection`].
pub struct ProjectionBuilder<S> {
    initial_state: S,
    handlers: HashMap<String, Handler<S>>,
    tag_filter: BTreeSet<String>,
}

impl<S> ProjectionBuilder<S>
where
    S: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(initial_state: S) -> Self {
        Self {
            initial_state,
            handlers: HashMap::new(),
            tag_filter: BTreeSet::new(),
        }
    }

    /// Registers the handler for an event type, replacing any previous one.
    pub fn on<F>(mut self, event_type: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&S, &SequencedEvent) -> S + Send + Sync + 'static,
    {
        self.handlers.insert(event_type.into(), Box::new(handler));
        self
    }

    /// Only events carrying all of these tags are considered.
    pub fn tag_filter<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tag_filter.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> TaggedProjection<S> {
        let mut item = QueryItem::new().types(self.handlers.keys().cloned());
        if !self.tag_filter.is_empty() {
            item = item.tags(self.tag_filter);
        }
        TaggedProjection {
            initial_state: self.initial_state,
            handlers: self.handlers,
            query: Query::from(item),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::{Event, EventDefinition, Position};

    fn seq(event_type: &str, tags: &[&str], position: u64) -> SequencedEvent {
        SequencedEvent::new(
            Event::new(event_type, serde_json::json!({"qty": 2})).with_tags(tags.iter().copied()),
            Position::new(position),
        )
    }

    fn item_count(cart: &str) -> TaggedProjection<u32> {
        TaggedProjection::builder(0u32)
            .on("ItemAdded", |count, _| count + 1)
            .on("ItemRemoved", |count, _| count.saturating_sub(1))
            .tag_filter([cart])
            .build()
    }

    #[test]
    fn query_is_derived_from_handlers_and_tags() {
        let projection = item_count("cart-1");
        let item = &projection.query().items()[0];
        assert_eq!(projection.query().items().len(), 1);
        assert_eq!(
            item.types,
            Some(BTreeSet::from(["ItemAdded".to_string(), "ItemRemoved".to_string()]))
        );
        assert_eq!(item.tags, Some(BTreeSet::from(["cart-1".to_string()])));
    }

    #[test]
    fn without_tag_filter_only_types_constrain() {
        let projection = TaggedProjection::builder(false)
            .on("CartClosed", |_, _| true)
            .build();
        assert_eq!(projection.query().items()[0].tags, None);
        assert!(projection.apply(false, &seq("CartClosed", &["any"], 1)));
    }

    #[test]
    fn apply_ignores_non_matching_events() {
        let projection = item_count("cart-1");
        assert_eq!(projection.apply(5, &seq("ItemAdded", &["cart-2"], 1)), 5);
        assert_eq!(projection.apply(5, &seq("CartClosed", &["cart-1"], 2)), 5);
        assert!(projection.evolve(&5, &seq("CartClosed", &["cart-1"], 2)).is_none());
    }

    #[test]
    fn apply_dispatches_on_type() {
        let projection = item_count("cart-1");
        let events = [
            seq("ItemAdded", &["cart-1"], 1),
            seq("ItemAdded", &["cart-1", "extra"], 2),
            seq("ItemRemoved", &["cart-1"], 3),
            seq("ItemAdded", &["cart-1"], 4),
        ];
        assert_eq!(projection.fold(&events), 2);
    }

    #[test]
    fn handler_sees_event_payload() {
        let projection = TaggedProjection::builder(0u64)
            .on("ItemAdded", |total, event| {
                total + event.data()["qty"].as_u64().unwrap_or(0)
            })
            .build();
        let events = [seq("ItemAdded", &[], 1), seq("ItemAdded", &[], 2)];
        assert_eq!(projection.fold(&events), 4);
    }

    #[test]
    fn projection_without_handlers_matches_nothing() {
        let projection = TaggedProjection::builder(7u8).build();
        assert!(!projection.query().is_all());
        assert!(!projection.query().matches(&seq("Anything", &[], 1).event));
        assert_eq!(projection.apply(7, &seq("Anything", &[], 1)), 7);
    }

    #[test]
    fn unregistered_types_flags_typos() {
        let registry = EventTypeRegistry::new()
            .register(EventDefinition::new("ItemAdded"))
            .register(EventDefinition::new("ItemRemoved"));
        assert!(item_count("c").unregistered_types(&registry).is_empty());

        let typo = TaggedProjection::builder(0u32)
            .on("ItemAdded", |c, _| c + 1)
            .on("ItemAded", |c, _| c + 1)
            .build();
        assert_eq!(typo.unregistered_types(&registry), vec!["ItemAded".to_string()]);
    }

    #[test]
    fn handler_returning_same_value_is_a_no_op() {
        let projection = TaggedProjection::builder(false)
            .on("CartClosed", |_, _| true)
            .build();
        let closed = seq("CartClosed", &[], 1);
        assert_eq!(projection.evolve(&false, &closed), Some(true));
        assert_eq!(projection.evolve(&true, &closed), None);
        assert!(projection.apply(true, &closed));
    }
}

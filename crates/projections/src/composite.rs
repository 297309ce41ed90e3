//! Composition of named projections into one.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use event_store::{Query, SequencedEvent};

use crate::projection::Projection;
use crate::{ProjectionError, Result};

type Slice = Arc<dyn Any + Send + Sync>;

/// Object-safe view of a projection whose state is type-erased.
trait ErasedProjection: Send + Sync {
    fn initial_slice(&self) -> Slice;

    fn erased_query(&self) -> &Query;

    fn evolve_slice(&self, slice: Option<&Slice>, event: &SequencedEvent) -> Option<Slice>;
}

impl<P: Projection> ErasedProjection for P {
    fn initial_slice(&self) -> Slice {
        Arc::new(self.initial_state())
    }

    fn erased_query(&self) -> &Query {
        self.query()
    }

    fn evolve_slice(&self, slice: Option<&Slice>, event: &SequencedEvent) -> Option<Slice> {
        let initial;
        let state = match slice.and_then(|s| s.downcast_ref::<P::State>()) {
            Some(state) => state,
            None => {
                initial = self.initial_state();
                &initial
            }
        };
        self.evolve(state, event).map(|next| Arc::new(next) as Slice)
    }
}

/// State of a [`CompositeProjection`]: one slice per named projection.
///
/// Cloning is cheap; slices are shared. Applying an event that changes no
/// slice returns the very same state, so [`CompositeState::ptr_eq`] can be
/// used to detect no-ops.
#[derive(Clone, Default)]
pub struct CompositeState {
    slices: BTreeMap<String, Slice>,
}

impl CompositeState {
    /// Returns the state of the named projection, if it has type `S`.
    pub fn get<S: 'static>(&self, name: &str) -> Option<&S> {
        self.slices.get(name)?.downcast_ref::<S>()
    }

    /// Like [`get`](Self::get), with the reason for a miss.
    pub fn try_get<S: 'static>(&self, name: &str) -> Result<&S> {
        let slice = self
            .slices
            .get(name)
            .ok_or_else(|| ProjectionError::UnknownProjection(name.to_string()))?;
        slice
            .downcast_ref::<S>()
            .ok_or_else(|| ProjectionError::StateTypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<S>(),
            })
    }

    /// Returns the projection names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slices.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Returns true if both states share every slice.
    pub fn ptr_eq(&self, other: &CompositeState) -> bool {
        self.slices.len() == other.slices.len()
            && self
                .slices
                .iter()
                .zip(&other.slices)
                .all(|((n1, s1), (n2, s2))| n1 == n2 && Arc::ptr_eq(s1, s2))
    }
}

impl std::fmt::Debug for CompositeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeState")
            .field("projections", &self.slices.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Several named projections folded together over a single read.
///
/// The composite query is the merge of every sub-projection's query, so one
/// read fetches everything any of them needs. Each sub-projection still
/// sees only the events its own query selects.
#[derive(Default)]
pub struct CompositeProjection {
    projections: Vec<(String, Box<dyn ErasedProjection>)>,
    query: Query,
}

impl CompositeProjection {
    /// Creates an empty composite. Its query is the wildcard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named projection, replacing any projection of the same name.
    pub fn with<P>(mut self, name: impl Into<String>, projection: P) -> Self
    where
        P: Projection + 'static,
    {
        self.insert(name, projection);
        self
    }

    /// Adds a named projection, replacing any projection of the same name.
    pub fn insert<P>(&mut self, name: impl Into<String>, projection: P)
    where
        P: Projection + 'static,
    {
        let name = name.into();
        let boxed: Box<dyn ErasedProjection> = Box::new(projection);
        match self.projections.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = boxed,
            None => self.projections.push((name, boxed)),
        }
        self.query = self.merged_query();
    }

    /// Returns the projection names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.projections.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.projections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projections.is_empty()
    }

    fn merged_query(&self) -> Query {
        self.projections
            .iter()
            .map(|(_, p)| p.erased_query())
            .fold(None, |merged: Option<Query>, query| match merged {
                Some(merged) => Some(merged.merge(query)),
                None => Some(query.clone()),
            })
            .unwrap_or_else(Query::all)
    }
}

impl Projection for CompositeProjection {
    type State = CompositeState;

    fn initial_state(&self) -> CompositeState {
        CompositeState {
            slices: self
                .projections
                .iter()
                .map(|(name, p)| (name.clone(), p.initial_slice()))
                .collect(),
        }
    }

    fn query(&self) -> &Query {
        &self.query
    }

    fn evolve(&self, state: &CompositeState, event: &SequencedEvent) -> Option<CompositeState> {
        if !self.query.matches(&event.event) {
            return None;
        }

        let mut next: Option<CompositeState> = None;
        for (name, projection) in &self.projections {
            if let Some(slice) = projection.evolve_slice(state.slices.get(name), event) {
                next.get_or_insert_with(|| state.clone())
                    .slices
                    .insert(name.clone(), slice);
            }
        }
        next
    }
}

impl std::fmt::Debug for CompositeProjection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeProjection")
            .field("projections", &self.names().collect::<Vec<_>>())
            .field("query", &self.query)
            .finish()
    }
}

//! Event type definitions and tag resolution.

use std::collections::BTreeMap;

use crate::{Event, EventStoreError, Result};

/// Definition of an event type known to the system.
///
/// Tag resolvers are templates such as `"cart:{data.cart_id}"`. Each
/// `{path}` placeholder is looked up as a dot path into the event, so
/// `{data.cart_id}` reads the `cart_id` field of the payload. Placeholders
/// that do not resolve to a value are left verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDefinition {
    pub name: String,
    pub tag_resolvers: Vec<String>,
}

impl EventDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag_resolvers: Vec::new(),
        }
    }

    /// Adds a tag resolver template.
    pub fn tag(mut self, template: impl Into<String>) -> Self {
        self.tag_resolvers.push(template.into());
        self
    }

    /// Resolves the tags for an event of this type with the given payload.
    pub fn tags_for(&self, data: &serde_json::Value) -> Vec<String> {
        let root = serde_json::json!({ "type": self.name, "data": data });
        self.tag_resolvers
            .iter()
            .map(|template| render_template(template, &root))
            .collect()
    }
}

/// Registry of event definitions.
///
/// When attached to a store, appends of unregistered event types are
/// rejected with [`EventStoreError::UnknownEventType`].
#[derive(Debug, Clone, Default)]
pub struct EventTypeRegistry {
    definitions: BTreeMap<String, EventDefinition>,
}

impl EventTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition, replacing any previous one of the same name.
    pub fn register(mut self, definition: EventDefinition) -> Self {
        self.definitions.insert(definition.name.clone(), definition);
        self
    }

    pub fn get(&self, event_type: &str) -> Option<&EventDefinition> {
        self.definitions.get(event_type)
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.definitions.contains_key(event_type)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Fails with `UnknownEventType` for the first unregistered event.
    pub fn ensure_known<'a>(&self, events: impl IntoIterator<Item = &'a Event>) -> Result<()> {
        for event in events {
            if !self.contains(&event.event_type) {
                return Err(EventStoreError::UnknownEventType {
                    event_type: event.event_type.clone(),
                });
            }
        }
        Ok(())
    }

    /// Creates an event of a registered type, resolving its tags.
    pub fn create_event(&self, event_type: &str, data: serde_json::Value) -> Result<Event> {
        let definition = self
            .get(event_type)
            .ok_or_else(|| EventStoreError::UnknownEventType {
                event_type: event_type.to_string(),
            })?;
        let tags = definition.tags_for(&data);
        Ok(Event::new(event_type, data).with_tags(tags))
    }
}

fn render_template(template: &str, root: &serde_json::Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let end = start + len;
        out.push_str(&rest[..start]);
        let path = &rest[start + 1..end];
        match lookup(root, path) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..=end]),
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    out
}

fn lookup(root: &serde_json::Value, path: &str) -> Option<String> {
    let value = path
        .split('.')
        .try_fold(root, |value, key| value.as_object()?.get(key))?;
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

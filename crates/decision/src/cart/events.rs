//! Cart events.

use std::sync::LazyLock;

use event_store::{Event, EventDefinition, EventStoreError, EventTypeRegistry};
use serde::{Deserialize, Serialize};

use super::CartId;

static REGISTRY: LazyLock<EventTypeRegistry> = LazyLock::new(|| {
    EventTypeRegistry::new()
        .register(EventDefinition::new("ItemAdded").tag("cart:{data.cartId}"))
        .register(EventDefinition::new("CartClosed").tag("cart:{data.cartId}"))
});

/// Returns the definitions of every cart event type.
pub fn cart_registry() -> &'static EventTypeRegistry {
    &REGISTRY
}

/// Events that can occur on a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    /// An item was put into the cart.
    ItemAdded(ItemAddedData),

    /// The cart was closed.
    CartClosed(CartClosedData),
}

impl CartEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            CartEvent::ItemAdded(_) => "ItemAdded",
            CartEvent::CartClosed(_) => "CartClosed",
        }
    }

    /// Converts into a store event, tagged by the cart registry.
    pub fn into_event(self) -> Result<Event, EventStoreError> {
        let event_type = self.event_type();
        let data = match self {
            CartEvent::ItemAdded(data) => serde_json::to_value(data)?,
            CartEvent::CartClosed(data) => serde_json::to_value(data)?,
        };
        cart_registry().create_event(event_type, data)
    }
}

/// Data for ItemAdded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemAddedData {
    pub cart_id: CartId,
    pub product_id: String,
}

/// Data for CartClosed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartClosedData {
    pub cart_id: CartId,
}

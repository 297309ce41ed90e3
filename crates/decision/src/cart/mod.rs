//! Shopping cart decisions built on tag-scoped projections.

mod commands;
mod events;
mod model;
mod service;

pub use commands::{AddItem, CartCommand, CloseCart};
pub use events::{CartClosedData, CartEvent, ItemAddedData, cart_registry};
pub use model::{cart_closed, cart_projections, item_count};
pub use service::CartService;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum number of items a cart can hold.
pub const MAX_ITEMS: u32 = 3;

/// Unique identifier for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartId(Uuid);

impl CartId {
    /// Creates a new random cart ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a cart ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Returns the tag carried by every event of this cart.
    pub fn tag(&self) -> String {
        format!("cart:{}", self.0)
    }
}

impl Default for CartId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CartId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Reasons a cart rejects a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Items cannot be added to a closed cart.
    #[error("Cart is closed")]
    Closed,

    /// The cart already holds the maximum number of items.
    #[error("Cart cannot have more than {max} items")]
    Full { max: u32 },

    /// The cart was closed before.
    #[error("Cart is already closed")]
    AlreadyClosed,
}

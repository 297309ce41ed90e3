//! Cart commands.

use super::CartId;

/// Command to add an item to a cart.
#[derive(Debug, Clone)]
pub struct AddItem {
    pub cart_id: CartId,
    pub product_id: String,
}

impl AddItem {
    pub fn new(cart_id: CartId, product_id: impl Into<String>) -> Self {
        Self {
            cart_id,
            product_id: product_id.into(),
        }
    }
}

/// Command to close a cart.
#[derive(Debug, Clone)]
pub struct CloseCart {
    pub cart_id: CartId,
}

impl CloseCart {
    pub fn new(cart_id: CartId) -> Self {
        Self { cart_id }
    }
}

/// Any cart command, for dispatching by value.
#[derive(Debug, Clone)]
pub enum CartCommand {
    AddItem(AddItem),
    CloseCart(CloseCart),
}

impl From<AddItem> for CartCommand {
    fn from(cmd: AddItem) -> Self {
        CartCommand::AddItem(cmd)
    }
}

impl From<CloseCart> for CartCommand {
    fn from(cmd: CloseCart) -> Self {
        CartCommand::CloseCart(cmd)
    }
}

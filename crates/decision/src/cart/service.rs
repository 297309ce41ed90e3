//! Cart service providing a simplified API for cart operations.

use async_trait::async_trait;
use event_store::{Event, EventStore};
use projections::CompositeState;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DecisionError;
use crate::scenario::CommandDispatcher;

use super::{
    AddItem, CartClosedData, CartCommand, CartError, CartEvent, CloseCart, ItemAddedData,
    MAX_ITEMS, cart_projections,
};

impl From<CartError> for DecisionError {
    fn from(e: CartError) -> Self {
        DecisionError::Cart(e)
    }
}

/// Service for managing carts.
///
/// Every command decides against the cart's own projections, so commands on
/// different carts never conflict.
pub struct CartService<S: EventStore> {
    handler: CommandHandler<S>,
}

impl<S: EventStore> CartService<S> {
    /// Creates a new cart service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S> {
        &self.handler
    }

    /// Adds an item to a cart that is open and not yet full.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(&self, cmd: AddItem) -> Result<CommandResult, DecisionError> {
        let cart_id = cmd.cart_id;

        self.handler
            .execute(&cart_projections(cart_id), |state| decide_add_item(state, cmd))
            .await
    }

    /// Closes a cart that is still open.
    #[tracing::instrument(skip(self))]
    pub async fn close_cart(&self, cmd: CloseCart) -> Result<CommandResult, DecisionError> {
        let cart_id = cmd.cart_id;

        self.handler
            .execute(&cart_projections(cart_id), |state| decide_close_cart(state, cmd))
            .await
    }
}

fn decide_add_item(state: &CompositeState, cmd: AddItem) -> Result<Vec<Event>, DecisionError> {
    if *state.try_get::<bool>("cartClosed")? {
        return Err(CartError::Closed.into());
    }
    if *state.try_get::<u32>("itemCount")? >= MAX_ITEMS {
        return Err(CartError::Full { max: MAX_ITEMS }.into());
    }

    let event = CartEvent::ItemAdded(ItemAddedData {
        cart_id: cmd.cart_id,
        product_id: cmd.product_id,
    });
    Ok(vec![event.into_event()?])
}

fn decide_close_cart(state: &CompositeState, cmd: CloseCart) -> Result<Vec<Event>, DecisionError> {
    if *state.try_get::<bool>("cartClosed")? {
        return Err(CartError::AlreadyClosed.into());
    }

    let event = CartEvent::CartClosed(CartClosedData {
        cart_id: cmd.cart_id,
    });
    Ok(vec![event.into_event()?])
}

#[async_trait]
impl<S: EventStore> CommandDispatcher<CartCommand> for CartService<S> {
    type Error = DecisionError;

    async fn dispatch(&self, command: CartCommand) -> Result<(), DecisionError> {
        match command {
            CartCommand::AddItem(cmd) => self.add_item(cmd).await?,
            CartCommand::CloseCart(cmd) => self.close_cart(cmd).await?,
        };
        Ok(())
    }
}

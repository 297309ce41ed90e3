//! Decision layer on top of the event store.
//!
//! This crate provides:
//! - [`build_decision_model`]: projected state plus the append condition guarding it
//! - [`CommandHandler`]: read, decide and append under that condition
//! - [`scenario`]: given/when/then runner for command handlers
//! - [`cart`]: a shopping cart decided from tag-scoped projections

pub mod cart;
pub mod command;
pub mod decision_model;
pub mod error;
pub mod scenario;

pub use cart::{
    AddItem, CartClosedData, CartCommand, CartError, CartEvent, CartId, CartService, CloseCart,
    ItemAddedData, MAX_ITEMS,
};
pub use command::{CommandHandler, CommandResult};
pub use decision_model::{DecisionModel, build_decision_model};
pub use error::{DecisionError, Result};
pub use scenario::{CommandDispatcher, Scenario, ScenarioReport, run_scenarios};

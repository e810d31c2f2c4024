//! Telegram bot handler tree configuration
//!
//! This module provides the main dispatcher schema for the Telegram bot.
//! The handlers are organized in a testable way, allowing integration tests
//! to use the same handler tree as production code.

mod callbacks;
mod commands;
mod receipts;
mod schema;
mod types;
mod webapp;

pub use schema::schema;
pub use types::{HandlerDeps, HandlerError, submitter_from_message};

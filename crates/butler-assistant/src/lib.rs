//! Dialog side of the Butler personal finance assistant.
//!
//! Incoming chat updates are routed by the [`Dispatcher`] to the
//! [`Assistant`], which walks each user through the menu and the expense
//! and gift flows. All reads and writes go through a
//! [`QueryChannel`](butler_proxy::QueryChannel), so the same dialog code
//! runs against the NATS client or an in-process service.
//!
//! # Modules
//!
//! - [`dialog`] -- Stages, turns and the conversation state machine
//! - [`dispatcher`] -- One task per update, per-user stage locks
//! - [`guard`] -- Allow-list and answer validation before handlers
//! - [`stores`] -- Users, expenses and gifts over the query channel
//! - [`budget`] -- Budget threshold checks and money formatting
//! - [`keyboard`] -- Reply keyboard layout
//! - [`lines`] -- Menu entries, categories and flavor text
//! - [`config`] -- The `assistant` config section
//! - [`error`] -- Dialog error type

pub mod budget;
pub mod config;
pub mod dialog;
pub mod dispatcher;
pub mod error;
pub mod guard;
pub mod keyboard;
pub mod lines;
pub mod stores;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience.
pub use config::AssistantConfig;
pub use dialog::{Assistant, Reply, Sender, Stage, Turn, Update};
pub use dispatcher::{Dispatcher, Outgoing, SharedChannel};
pub use error::AssistantError;
pub use keyboard::gen_keyboard;

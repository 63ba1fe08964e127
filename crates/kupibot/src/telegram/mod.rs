//! Telegram bot integration and handlers

pub mod bot;
pub mod broadcast;
pub mod commands;
pub mod payments;
pub mod schema;
pub mod types;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use broadcast::send_to_all;
pub use schema::schema;
pub use types::{HandlerDeps, HandlerError};

//! Kupidon - Telegram bot front end for the Kupidon mini-app.
//!
//! The bot greets users with a Mini App button carrying their experiment
//! variant, relays successful Stars payments to the backend, records user
//! ids to a flat file and serves a small backend-facing HTTP API next to
//! the Telegram webhook.
//!
//! # Module Structure
//!
//! - `cli`: command-line interface of the main binary
//! - `server`: backend-facing axum API (health, invoice, users)
//! - `telegram`: handler tree, commands, payments, broadcast

pub mod cli;
pub mod server;
pub mod telegram;

//! Kupicore - core library for the Kupidon Telegram bot.
//!
//! Everything here is Telegram-free: configuration, error types, the A/B
//! experiment bucketing, the retrying collector delivery and the flat-file
//! user registry. The bot crate wires these into handlers and the HTTP API.
//!
//! # Module Structure
//!
//! - `config`: process configuration, read once at startup
//! - `error`: centralized error types
//! - `logging`: logger initialization (console + file)
//! - `experiment`: deterministic A/B variant assignment
//! - `delivery`: bounded-retry JSON delivery to the collector
//! - `analytics`: collector client (events and payment notifications)
//! - `registry`: newline-delimited user id file

pub mod analytics;
pub mod config;
pub mod delivery;
pub mod error;
pub mod experiment;
pub mod logging;
pub mod registry;

// Re-export commonly used types for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use experiment::{assign_variant, Variant};
pub use registry::UserRegistry;

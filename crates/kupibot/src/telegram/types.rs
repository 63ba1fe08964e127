//! Handler types and shared dependencies

use std::sync::Arc;

use kupicore::analytics::BackendClient;
use kupicore::{Config, UserRegistry};

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub config: Arc<Config>,
    pub backend: Arc<BackendClient>,
    pub registry: Arc<UserRegistry>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(config: Arc<Config>, backend: Arc<BackendClient>, registry: Arc<UserRegistry>) -> Self {
        Self {
            config,
            backend,
            registry,
        }
    }
}

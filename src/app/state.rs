//! Application state shared across routes

use std::sync::Arc;

use crate::clients::ClientRegistry;
use crate::config::Config;
use crate::game::SessionHandle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Handle to the authoritative game session task
    pub session: SessionHandle,
    pub clients: Arc<ClientRegistry>,
}

impl AppState {
    pub fn new(config: Config, session: SessionHandle) -> Self {
        Self {
            config: Arc::new(config),
            session,
            clients: Arc::new(ClientRegistry::new()),
        }
    }
}

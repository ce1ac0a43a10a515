//! Application state module
//!
//! Contains the shared state used across all server connections.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::game::dictionary::{Dictionary, WordList};
use crate::game::session::GameSession;
use crate::net::dispatcher::{DispatcherHandle, GameDispatcher};
use crate::net::session::SessionManager;

/// Application state shared across all connections
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Registry of connected clients
    pub session_manager: Arc<SessionManager>,
    /// Sender side of the game dispatcher
    pub dispatcher: DispatcherHandle,
    /// Shutdown signal sender
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Create the application state and the dispatcher that serves it.
    ///
    /// The dispatcher must be spawned by the caller.
    pub fn new(
        config: ServerConfig,
        dictionary: Arc<dyn Dictionary>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> (Self, GameDispatcher) {
        let session_manager = Arc::new(SessionManager::with_limit(config.max_connections_per_ip));
        let (dispatcher, handle) = GameDispatcher::new(
            GameSession::new(dictionary),
            session_manager.clone(),
            config.event_buffer,
        );

        let state = Self {
            config,
            session_manager,
            dispatcher: handle,
            shutdown_tx,
        };
        (state, dispatcher)
    }

    /// Build the dictionary named in the config, or the built-in list
    pub async fn load_dictionary(config: &ServerConfig) -> Result<Arc<dyn Dictionary>> {
        let list = match &config.dictionary_path {
            Some(path) => WordList::load(path).await?,
            None => {
                let list = WordList::builtin();
                info!(words = list.len(), "Using built-in dictionary");
                list
            }
        };
        Ok(Arc::new(list))
    }
}

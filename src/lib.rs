//! Wordchain Game Server Library
//!
//! This library provides the core functionality for the Wordchain server:
//! a single room where players take turns submitting words that start with
//! the last letter of the previous word.
//!
//! ## Modules
//!
//! - `api` - Read-only HTTP status API
//! - `config` - Server configuration management
//! - `error` - Error types and result definitions
//! - `game` - Rules, dictionary, room state and the session state machine
//! - `net` - WebSocket handling, session registry and the game dispatcher
//! - `protocol` - JSON message format

pub mod api;
pub mod config;
pub mod error;
pub mod game;
pub mod net;
pub mod protocol;
pub mod state;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{Result, WordChainError};
pub use game::GameSession;
pub use state::AppState;

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

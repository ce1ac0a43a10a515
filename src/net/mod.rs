//! Networking module
//!
//! This module handles all network-related functionality for the Wordchain server:
//! - WebSocket connection handling
//! - Session registry (connection id -> outbound queue)
//! - The dispatcher task that serializes access to the game session

pub mod dispatcher;
pub mod handler;
pub mod session;

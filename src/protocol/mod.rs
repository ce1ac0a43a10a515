//! Protocol module
//!
//! Wire format for the Wordchain server: JSON text frames over WebSocket.

pub mod messages;

pub use messages::{decode_client_message, ClientMessage, ServerMessage};

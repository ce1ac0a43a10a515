//! Game module
//!
//! This module contains the core game logic for the Wordchain server:
//! - Rules (limits, username and word validation)
//! - Dictionary capability and the built-in word list
//! - Room state (players, turn order, word history)
//! - The session state machine driving joins, turns and departures

pub mod dictionary;
pub mod player;
pub mod room;
pub mod rules;
pub mod session;

pub use dictionary::{Dictionary, WordList};
pub use player::{ConnectionId, Player, UsedWord};
pub use room::{PlayerScore, Room, RoomState};
pub use session::{Directive, Event, GameSession};

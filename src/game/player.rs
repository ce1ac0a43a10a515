//! Player module
//!
//! Player records held by the room and the word history entries they produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque connection handle issued by the transport layer
pub type ConnectionId = u64;

/// A player seated in the room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Display name, unique within the room and fixed once joined
    pub username: String,
    /// Sum of the lengths of every word this player got accepted
    pub score: u32,
}

impl Player {
    /// Create a new player with a zero score
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            score: 0,
        }
    }

    /// Credit points for an accepted word
    pub fn award(&mut self, points: u32) {
        self.score += points;
    }
}

/// An accepted word in the room history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedWord {
    /// Normalized (trimmed, lowercase) word
    pub word: String,
    /// Username of the player who submitted it
    pub player: String,
    /// Time the word was accepted
    pub timestamp: DateTime<Utc>,
}

impl UsedWord {
    /// Create a history entry stamped with the current time
    pub fn new(word: impl Into<String>, player: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            player: player.into(),
            timestamp: Utc::now(),
        }
    }

    /// Last character of the word, if any
    pub fn last_char(&self) -> Option<char> {
        self.word.chars().last()
    }
}

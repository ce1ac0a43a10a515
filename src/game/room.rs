//! Room module
//!
//! The single shared room: who is seated, in what turn order, the accepted
//! word history and whether a game is running. Every mutation goes through a
//! method here so the invariants below hold after each call:
//! - `turn_order` holds exactly the usernames of seated players, no duplicates
//! - `current_turn` indexes into `turn_order` (0 when empty)
//! - `started` implies at least two players

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::game::player::{ConnectionId, Player, UsedWord};
use crate::game::rules::{word_points, MIN_PLAYERS_TO_START};

/// Per-player entry in a room snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerScore {
    pub username: String,
    pub score: u32,
}

/// Point-in-time view of the room broadcast to every player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomState {
    /// Players in turn order
    pub players: Vec<PlayerScore>,
    /// Accepted words, oldest first
    pub used_words: Vec<UsedWord>,
    /// Index into `players` of whoever moves next
    pub current_turn: usize,
    /// Username at `current_turn`, if anyone is seated
    pub current_player: Option<String>,
    /// Whether a game is running
    pub game_started: bool,
    /// Number of accepted words
    pub total_words: usize,
}

/// Shared room state
#[derive(Debug, Default)]
pub struct Room {
    /// Usernames in join order; defines the rotation
    turn_order: Vec<String>,
    /// Seated players keyed by connection
    players: BTreeMap<ConnectionId, Player>,
    /// Accepted words, append-only
    used_words: Vec<UsedWord>,
    /// Index into `turn_order`
    current_turn: usize,
    /// Whether a game is running
    started: bool,
}

impl Room {
    /// Create an empty room
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of seated players
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Whether nobody is seated
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Whether a game is running
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Current turn index
    pub fn current_turn(&self) -> usize {
        self.current_turn
    }

    /// Username whose turn it is
    pub fn current_player(&self) -> Option<&str> {
        self.turn_order.get(self.current_turn).map(String::as_str)
    }

    /// Usernames in turn order
    pub fn turn_order(&self) -> &[String] {
        &self.turn_order
    }

    /// Accepted word history
    pub fn used_words(&self) -> &[UsedWord] {
        &self.used_words
    }

    /// Look up the player seated on a connection
    pub fn player(&self, connection: ConnectionId) -> Option<&Player> {
        self.players.get(&connection)
    }

    /// Whether a username is taken (exact match)
    pub fn has_username(&self, username: &str) -> bool {
        self.players.values().any(|p| p.username == username)
    }

    /// Connections of every seated player
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.players.keys().copied().collect()
    }

    /// Seat a player at the tail of the rotation.
    ///
    /// The caller has already checked capacity and username uniqueness.
    pub fn add_player(&mut self, connection: ConnectionId, username: String) {
        debug_assert!(!self.has_username(&username));
        self.turn_order.push(username.clone());
        self.players.insert(connection, Player::new(username));
    }

    /// Start a game from the first player in the rotation
    pub fn start(&mut self) {
        self.started = true;
        self.current_turn = 0;
        info!(players = self.player_count(), "Game started");
    }

    /// Stop the game; history and scores are kept
    fn pause(&mut self) {
        let was_started = self.started;
        self.started = false;
        self.current_turn = 0;
        if was_started {
            info!(players = self.player_count(), "Game paused - not enough players");
        }
    }

    /// Append an accepted word, credit the submitter and pass the turn.
    ///
    /// Returns the points awarded, or `None` if the connection has no seat.
    pub fn record_word(&mut self, connection: ConnectionId, word: String) -> Option<u32> {
        let player = self.players.get_mut(&connection)?;
        let points = word_points(&word);
        player.award(points);
        self.used_words.push(UsedWord::new(word, player.username.clone()));
        self.advance_turn();
        Some(points)
    }

    /// Move to the next player, wrapping after the last
    fn advance_turn(&mut self) {
        if !self.turn_order.is_empty() {
            self.current_turn = (self.current_turn + 1) % self.turn_order.len();
        }
    }

    /// Remove a player and repair the turn index.
    ///
    /// Removing someone before the current player shifts the index left so it
    /// keeps pointing at the same person. Removing the current player leaves
    /// the index on whoever slid into that slot, wrapping to 0 past the end.
    pub fn remove_player(&mut self, connection: ConnectionId) -> Option<Player> {
        let player = self.players.remove(&connection)?;

        if let Some(removed) = self.turn_order.iter().position(|u| *u == player.username) {
            self.turn_order.remove(removed);

            if removed < self.current_turn {
                self.current_turn -= 1;
            } else if removed == self.current_turn && self.current_turn >= self.turn_order.len() {
                self.current_turn = 0;
            }
        }

        debug!(
            username = %player.username,
            remaining = self.player_count(),
            current_turn = self.current_turn,
            "Player removed from rotation"
        );

        if self.player_count() < MIN_PLAYERS_TO_START {
            self.pause();
        }

        Some(player)
    }

    /// Build the broadcast snapshot
    pub fn state(&self) -> RoomState {
        let players = self
            .turn_order
            .iter()
            .map(|username| PlayerScore {
                username: username.clone(),
                score: self
                    .players
                    .values()
                    .find(|p| p.username == *username)
                    .map_or(0, |p| p.score),
            })
            .collect();

        RoomState {
            players,
            used_words: self.used_words.clone(),
            current_turn: self.current_turn,
            current_player: self.current_player().map(str::to_string),
            game_started: self.started,
            total_words: self.used_words.len(),
        }
    }

    /// Check the structural invariants; used by tests
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.turn_order.len() != self.players.len() {
            return Err(format!(
                "turn order has {} entries for {} players",
                self.turn_order.len(),
                self.players.len()
            ));
        }
        for (i, name) in self.turn_order.iter().enumerate() {
            if self.turn_order[..i].contains(name) {
                return Err(format!("duplicate username {name}"));
            }
            if !self.has_username(name) {
                return Err(format!("{name} is in the rotation but not seated"));
            }
        }
        if self.turn_order.is_empty() {
            if self.current_turn != 0 {
                return Err("turn index not reset on empty room".to_string());
            }
        } else if self.current_turn >= self.turn_order.len() {
            return Err(format!(
                "turn index {} out of bounds for {} players",
                self.current_turn,
                self.turn_order.len()
            ));
        }
        if self.started && self.players.len() < MIN_PLAYERS_TO_START {
            return Err("game running with fewer than two players".to_string());
        }
        Ok(())
    }
}

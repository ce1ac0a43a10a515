//! Game session module
//!
//! `GameSession` is the room's state machine. It consumes inbound events
//! tagged with a connection id and answers with outbound directives for the
//! transport to deliver. It never touches sockets.
//!
//! Room lifecycle:
//! - Idle: fewer than two players, no game running
//! - Active: the join that brings the room to two players starts the game
//! - back to Idle as soon as a disconnect leaves fewer than two players

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{GameError, ProtocolError, WordRejection};
use crate::game::dictionary::Dictionary;
use crate::game::player::ConnectionId;
use crate::game::room::{Room, RoomState};
use crate::game::rules::{self, MAX_PLAYERS, MIN_PLAYERS_TO_START};
use crate::protocol::ServerMessage;

/// Inbound event from one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Request a seat under a username
    Join { username: String },
    /// Submit a word
    SubmitWord { word: String },
    /// Liveness check
    Ping,
    /// The transport lost the connection
    Disconnect,
    /// The connection sent a frame that could not be decoded
    Malformed(ProtocolError),
}

/// Outbound instruction for the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Deliver to a single connection
    Send {
        to: ConnectionId,
        message: ServerMessage,
    },
    /// Deliver to every seated player
    Broadcast { message: ServerMessage },
}

/// The single-room word-chain state machine
pub struct GameSession {
    room: Room,
    dictionary: Arc<dyn Dictionary>,
}

impl GameSession {
    /// Create a session with an empty room
    pub fn new(dictionary: Arc<dyn Dictionary>) -> Self {
        Self {
            room: Room::new(),
            dictionary,
        }
    }

    /// Read access to the room
    pub fn room(&self) -> &Room {
        &self.room
    }

    /// Current room snapshot
    pub fn state(&self) -> RoomState {
        self.room.state()
    }

    /// Connections of every seated player
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.room.connections()
    }

    /// Process one inbound event.
    ///
    /// Rejections are turned into an `ERROR` sent back to the originating
    /// connection only.
    pub fn handle(&mut self, connection: ConnectionId, event: Event) -> Vec<Directive> {
        let result = match event {
            Event::Join { username } => self.join(connection, &username),
            Event::SubmitWord { word } => self.submit_word(connection, &word),
            Event::Ping => Ok(self.ping(connection)),
            Event::Disconnect => Ok(self.disconnect(connection)),
            Event::Malformed(error) => Ok(vec![Directive::Send {
                to: connection,
                message: ServerMessage::error(error),
            }]),
        };

        result.unwrap_or_else(|err| {
            debug!(connection, error = %err, "Request rejected");
            vec![Directive::Send {
                to: connection,
                message: ServerMessage::error(err),
            }]
        })
    }

    /// Seat a connection in the room.
    ///
    /// On success the joiner gets a `JOIN_SUCCESS` snapshot, everyone gets the
    /// new room state, and if this join brought the room to two players the
    /// game starts and the state is broadcast again.
    pub fn join(
        &mut self,
        connection: ConnectionId,
        requested: &str,
    ) -> Result<Vec<Directive>, GameError> {
        if let Some(player) = self.room.player(connection) {
            return Err(GameError::AlreadyJoined(player.username.clone()));
        }

        let username = rules::validate_username(requested)?;

        if self.room.has_username(&username) {
            return Err(GameError::DuplicateUsername);
        }
        if self.room.player_count() >= MAX_PLAYERS {
            return Err(GameError::RoomFull);
        }

        self.room.add_player(connection, username.clone());
        info!(
            connection,
            username = %username,
            players = self.room.player_count(),
            "Player joined"
        );

        let mut directives = vec![
            Directive::Send {
                to: connection,
                message: ServerMessage::JoinSuccess {
                    username,
                    players: self.room.turn_order().to_vec(),
                    used_words: self.room.used_words().to_vec(),
                    current_turn: self.room.current_turn(),
                    game_started: self.room.is_started(),
                },
            },
            self.broadcast_state(),
        ];

        if self.room.player_count() >= MIN_PLAYERS_TO_START && !self.room.is_started() {
            self.room.start();
            directives.push(self.broadcast_state());
        }

        Ok(directives)
    }

    /// Submit a word on the sender's turn.
    ///
    /// On success the word is recorded, the submitter is credited its length,
    /// the turn passes on, the submitter gets `WORD_ACCEPTED` and everyone gets
    /// the new room state.
    pub fn submit_word(
        &mut self,
        connection: ConnectionId,
        raw: &str,
    ) -> Result<Vec<Directive>, GameError> {
        if !self.room.is_started() {
            return Err(GameError::GameNotStarted);
        }

        let word = rules::normalize_word(raw);
        let username = self
            .room
            .player(connection)
            .map(|p| p.username.clone())
            .ok_or(GameError::NotJoined)?;

        if self.room.current_player() != Some(username.as_str()) {
            return Err(GameError::NotYourTurn);
        }

        self.validate_word(&word)?;

        let points = self
            .room
            .record_word(connection, word.clone())
            .ok_or(GameError::NotJoined)?;
        info!(
            username = %username,
            word = %word,
            points,
            next = ?self.room.current_player(),
            "Word accepted"
        );

        Ok(vec![
            Directive::Send {
                to: connection,
                message: ServerMessage::WordAccepted {
                    word,
                    score: points,
                },
            },
            self.broadcast_state(),
        ])
    }

    /// Answer a liveness check; works whether or not the sender has joined
    pub fn ping(&self, connection: ConnectionId) -> Vec<Directive> {
        vec![Directive::Send {
            to: connection,
            message: ServerMessage::Pong,
        }]
    }

    /// Check a normalized word against the dictionary and history
    pub fn validate_word(&self, word: &str) -> Result<(), WordRejection> {
        rules::validate_word(word, self.room.used_words(), self.dictionary.as_ref())
    }

    /// Remove a connection's player, if any.
    ///
    /// Unknown connections are ignored. Remaining players, if any, get the new
    /// room state.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Vec<Directive> {
        let Some(player) = self.room.remove_player(connection) else {
            return Vec::new();
        };

        info!(
            connection,
            username = %player.username,
            remaining = self.room.player_count(),
            "Player left"
        );

        if self.room.is_empty() {
            Vec::new()
        } else {
            vec![self.broadcast_state()]
        }
    }

    fn broadcast_state(&self) -> Directive {
        Directive::Broadcast {
            message: ServerMessage::GameState(self.room.state()),
        }
    }
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("room", &self.room)
            .finish_non_exhaustive()
    }
}

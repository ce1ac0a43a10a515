//! Error handling module
//!
//! Defines custom error types for the Wordchain server.

use std::io;

use thiserror::Error;

use crate::game::player::ConnectionId;

/// Main error type for the Wordchain server
#[derive(Error, Debug)]
pub enum WordChainError {
    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Protocol-related errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Game rule rejections
    #[error("Game error: {0}")]
    Game(#[from] GameError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Network-specific errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Too many connections from {0}")]
    TooManyConnections(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    #[error("Write buffer full")]
    WriteBufferFull,

    #[error("Game dispatcher unavailable")]
    DispatcherUnavailable,
}

/// Protocol-specific errors
///
/// The display strings are sent verbatim to the client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid message format")]
    InvalidFormat,

    #[error("unknown message type")]
    UnknownMessageType(String),
}

/// Reasons a submitted word is rejected, in check order
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WordRejection {
    #[error("Word cannot be empty")]
    EmptyWord,

    #[error("Word must have at least 2 characters")]
    TooShort,

    #[error("Word not in dictionary")]
    NotInDictionary,

    #[error("Word already used")]
    AlreadyUsed,

    #[error("Word must start with \"{}\"", .expected.to_uppercase())]
    ChainMismatch { expected: char },
}

/// Game logic errors
///
/// None of these mutate room state; they are reported to the sender only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Username cannot be empty")]
    EmptyUsername,

    #[error("Username too long (max 20 characters)")]
    UsernameTooLong,

    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Room is full (max 5 players)")]
    RoomFull,

    #[error("Already joined as {0}")]
    AlreadyJoined(String),

    #[error("Game not started yet")]
    GameNotStarted,

    #[error("Join the game first")]
    NotJoined,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("{0}")]
    InvalidWord(#[from] WordRejection),
}

/// Result type alias for Wordchain operations
pub type Result<T> = std::result::Result<T, WordChainError>;

//! Message definitions module
//!
//! JSON text frames exchanged with clients. Every message is an object with a
//! `type` tag:
//! - inbound: `JOIN`, `WORD`, `PING`
//! - outbound: `JOIN_SUCCESS`, `WORD_ACCEPTED`, `GAME_STATE`, `ERROR`, `PONG`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::game::player::UsedWord;
use crate::game::room::RoomState;

/// Inbound type tags the server understands
const KNOWN_CLIENT_TYPES: &[&str] = &["JOIN", "WORD", "PING"];

/// Message sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Request a seat in the room
    Join {
        #[serde(default)]
        username: String,
    },
    /// Submit a word on the sender's turn
    Word {
        #[serde(default)]
        word: String,
    },
    /// Liveness check
    Ping,
}

/// Message sent to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Seat granted; sent to the joining connection only
    JoinSuccess {
        username: String,
        players: Vec<String>,
        used_words: Vec<UsedWord>,
        current_turn: usize,
        game_started: bool,
    },
    /// The sender's word was accepted; `score` is the points awarded
    WordAccepted { word: String, score: u32 },
    /// Full room snapshot
    GameState(RoomState),
    /// A request was rejected
    Error { message: String },
    /// Reply to `PING`
    Pong,
}

impl ServerMessage {
    /// Build an error message from anything displayable
    pub fn error(message: impl ToString) -> Self {
        ServerMessage::Error {
            message: message.to_string(),
        }
    }

    /// Tag name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::JoinSuccess { .. } => "JOIN_SUCCESS",
            ServerMessage::WordAccepted { .. } => "WORD_ACCEPTED",
            ServerMessage::GameState(_) => "GAME_STATE",
            ServerMessage::Error { .. } => "ERROR",
            ServerMessage::Pong => "PONG",
        }
    }

    /// Serialize to a JSON text frame
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Decode a client text frame.
///
/// Anything that is not a JSON object, or a known type whose fields have the
/// wrong shape, is `InvalidFormat`. A well-formed object with a missing or
/// unrecognised `type` is `UnknownMessageType`.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(|_| ProtocolError::InvalidFormat)?;

    let kind = match value.as_object() {
        Some(object) => object
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        None => return Err(ProtocolError::InvalidFormat),
    };

    if !KNOWN_CLIENT_TYPES.contains(&kind.as_str()) {
        return Err(ProtocolError::UnknownMessageType(kind));
    }

    serde_json::from_value(value).map_err(|_| ProtocolError::InvalidFormat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::room::PlayerScore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_decode_join() {
        let msg = decode_client_message(r#"{"type":"JOIN","username":"ann"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join {
                username: "ann".to_string()
            }
        );
    }

    #[test]
    fn test_decode_missing_fields_default_to_empty() {
        let msg = decode_client_message(r#"{"type":"WORD"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Word { word: String::new() });
    }

    #[test]
    fn test_decode_ping() {
        assert_eq!(
            decode_client_message(r#"{"type":"PING"}"#).unwrap(),
            ClientMessage::Ping
        );
    }

    #[test]
    fn test_decode_unknown_type() {
        assert_eq!(
            decode_client_message(r#"{"type":"DANCE"}"#),
            Err(ProtocolError::UnknownMessageType("DANCE".to_string()))
        );
        assert_eq!(
            decode_client_message(r#"{"word":"apple"}"#),
            Err(ProtocolError::UnknownMessageType(String::new()))
        );
    }

    #[test]
    fn test_decode_malformed() {
        assert_eq!(
            decode_client_message("not json"),
            Err(ProtocolError::InvalidFormat)
        );
        assert_eq!(
            decode_client_message(r#"["JOIN"]"#),
            Err(ProtocolError::InvalidFormat)
        );
        assert_eq!(
            decode_client_message(r#"{"type":"JOIN","username":7}"#),
            Err(ProtocolError::InvalidFormat)
        );
    }

    #[test]
    fn test_encode_game_state() {
        let msg = ServerMessage::GameState(RoomState {
            players: vec![PlayerScore {
                username: "ann".to_string(),
                score: 5,
            }],
            used_words: vec![],
            current_turn: 0,
            current_player: Some("ann".to_string()),
            game_started: false,
            total_words: 0,
        });

        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "GAME_STATE",
                "players": [{"username": "ann", "score": 5}],
                "used_words": [],
                "current_turn": 0,
                "current_player": "ann",
                "game_started": false,
                "total_words": 0
            })
        );
    }

    #[test]
    fn test_encode_tags() {
        let value: Value = serde_json::from_str(&ServerMessage::Pong.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "PONG"}));

        let value: Value = serde_json::from_str(
            &ServerMessage::WordAccepted {
                word: "apple".to_string(),
                score: 5,
            }
            .to_json()
            .unwrap(),
        )
        .unwrap();
        assert_eq!(value, json!({"type": "WORD_ACCEPTED", "word": "apple", "score": 5}));
        assert_eq!(ServerMessage::error("Not your turn").kind(), "ERROR");
    }
}

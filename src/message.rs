//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol using Serde's tagged enum
//! for type-safe serialization/deserialization. Frames that do not fit the
//! schema are carried as opaque `Payload`s.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// `message_type` of a game message that updates the ready-state map
pub const READY_MESSAGE_TYPE: &str = "ready";

/// Client → Server message
///
/// All messages from client to server. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a new room and become its host
    CreateRoom {
        #[serde(default)]
        player_name: Option<String>,
    },
    /// Join an existing room by code
    JoinRoom {
        room_code: String,
        #[serde(default)]
        player_name: Option<String>,
    },
    /// Leave the current room
    LeaveRoom,
    /// Start the game (host only)
    StartGame,
    /// Application message relayed to the room
    GameMessage {
        message_type: String,
        #[serde(default)]
        data: Value,
    },
}

impl ClientMessage {
    /// Parse a text frame, returning None for anything outside the schema
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Per-player roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerData {
    pub name: String,
    pub is_host: bool,
}

/// Server → Client message
///
/// All messages from server to client. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection successful, player ID issued
    Connected { player_id: String },
    /// Room created, sender is host
    RoomCreated { room_code: String, player_id: String },
    /// Room joined, sender is guest
    RoomJoined { room_code: String, player_id: String },
    /// Request rejected
    RoomError { error: String },
    /// Everyone else already in the room
    PlayerList { players: BTreeMap<String, PlayerData> },
    /// Another player joined
    PlayerJoined {
        player_id: String,
        player_data: PlayerData,
    },
    /// Another player left
    PlayerLeft { player_id: String },
    /// Room no longer exists
    RoomClosed { reason: String },
    /// Host started the game
    GameStarted,
    /// Accumulated ready-state of the room
    GameStateUpdated { state: serde_json::Map<String, Value> },
}

impl ServerMessage {
    /// Serialize to a JSON text frame
    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Opaque frame contents, relayed without interpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let error = match &err {
            AppError::RoomNotFound(_) => "Room not found",
            AppError::RoomFull => "Room is full",
            AppError::NotHost => "Only the host can start the game",
            AppError::AlreadyInRoom => "Already in a room",
            AppError::NotInRoom => "Not in a room",
            // Fatal errors are not typically converted (connection closes)
            _ => "Internal error",
        };
        ServerMessage::RoomError {
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_deserialize() {
        let json = r#"{"type": "join_room", "room_code": "wxyz", "player_name": "Bob"}"#;
        match ClientMessage::parse(json) {
            Some(ClientMessage::JoinRoom {
                room_code,
                player_name,
            }) => {
                assert_eq!(room_code, "wxyz");
                assert_eq!(player_name.as_deref(), Some("Bob"));
            }
            other => panic!("Wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_unit_messages_accept_empty_bodies() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"leave_room"}"#),
            Some(ClientMessage::LeaveRoom)
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"start_game","extra":1}"#),
            Some(ClientMessage::StartGame)
        );
    }

    #[test]
    fn test_unrecognized_payloads_do_not_parse() {
        assert_eq!(ClientMessage::parse("not json"), None);
        assert_eq!(ClientMessage::parse(r#"{"type":"teleport"}"#), None);
        assert_eq!(ClientMessage::parse(r#"{"type":"join_room"}"#), None);
        assert_eq!(ClientMessage::parse("42"), None);
    }

    #[test]
    fn test_server_message_serialize() {
        let msg = ServerMessage::Connected {
            player_id: "p1".to_string(),
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"connected\""));
        assert!(json.contains("\"player_id\":\"p1\""));

        let json = ServerMessage::GameStarted.to_json().unwrap();
        assert_eq!(json, r#"{"type":"game_started"}"#);
    }

    #[test]
    fn test_player_list_shape() {
        let mut players = BTreeMap::new();
        players.insert(
            "p1".to_string(),
            PlayerData {
                name: "Alice".to_string(),
                is_host: true,
            },
        );
        let value = serde_json::to_value(ServerMessage::PlayerList { players }).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "player_list",
                "players": {"p1": {"name": "Alice", "is_host": true}}
            })
        );
    }

    #[test]
    fn test_error_conversion() {
        let msg: ServerMessage = AppError::NotHost.into();
        assert_eq!(
            msg,
            ServerMessage::RoomError {
                error: "Only the host can start the game".to_string()
            }
        );
    }
}

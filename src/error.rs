//! Error types for the relay server
//!
//! Defines application-level errors and handshake rejections.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (send `room_error` to client).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Status response could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] tokio_tungstenite::tungstenite::http::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Room not found with the given code
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Room already holds the maximum number of players
    #[error("Room is full")]
    RoomFull,

    /// Only the host may perform this action
    #[error("Not host")]
    NotHost,

    /// Client is not in any room
    #[error("Not in room")]
    NotInRoom,

    /// Client is already in a room
    #[error("Already in room")]
    AlreadyInRoom,

    /// Could not draw an unused room code within the retry bound
    #[error("Room code space exhausted after {0} attempts")]
    CodeSpaceExhausted(usize),
}

/// Reasons a raw-relay handshake is refused
///
/// Each one closes the connection with a specific code and reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayRejection {
    /// Target path or role query could not be parsed
    #[error("malformed connection target")]
    MalformedTarget,

    /// A host already claimed this code
    #[error("room already exists")]
    RoomExists,

    /// No host has claimed this code
    #[error("room not found")]
    RoomNotFound,

    /// Room already holds the maximum number of members
    #[error("room full")]
    RoomFull,
}

impl RelayRejection {
    /// WebSocket close code sent with the rejection
    pub fn close_code(&self) -> CloseCode {
        match self {
            RelayRejection::MalformedTarget => CloseCode::Protocol,
            RelayRejection::RoomExists | RelayRejection::RoomNotFound | RelayRejection::RoomFull => {
                CloseCode::Policy
            }
        }
    }
}

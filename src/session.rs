//! Session struct definition
//!
//! Represents a connected client with their state and outbound channel.

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::debug;

use crate::message::{Payload, ServerMessage};
use crate::types::{ClientId, RoomCode};

/// Display name used until the client supplies one
pub const DEFAULT_DISPLAY_NAME: &str = "Player";

/// Effects delivered to a connection's write task
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Protocol message, serialized as JSON text
    Message(ServerMessage),
    /// Opaque frame forwarded verbatim
    Relay(Payload),
    /// Close the connection with a code and reason
    Close { code: CloseCode, reason: String },
}

/// Server → connection channel
pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

/// Fire-and-forget delivery
///
/// A connection whose write task already ended is skipped. Never blocks.
pub fn deliver(sender: &OutboundSender, id: ClientId, outbound: Outbound) {
    if sender.is_closed() {
        debug!("Dropping message for closed connection {}", id);
        return;
    }
    let _ = sender.send(outbound);
}

/// Per-connection session record
///
/// Holds the client's id, display name, current room, and outbound channel.
#[derive(Debug)]
pub struct Session {
    /// Unique identifier for this connection
    pub id: ClientId,
    /// Name shown to other players
    pub display_name: String,
    /// Room the client is seated in, if any
    pub room_code: Option<RoomCode>,
    /// Server → client channel
    pub sender: OutboundSender,
}

impl Session {
    /// Create a new unseated session
    pub fn new(id: ClientId, sender: OutboundSender) -> Self {
        Self {
            id,
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            room_code: None,
            sender,
        }
    }

    /// Send a protocol message to this client
    pub fn send(&self, msg: ServerMessage) {
        deliver(&self.sender, self.id, Outbound::Message(msg));
    }

    /// Forward an opaque frame to this client
    pub fn relay(&self, payload: Payload) {
        deliver(&self.sender, self.id, Outbound::Relay(payload));
    }

    /// Set the display name, keeping the current one for blank input
    pub fn set_display_name(&mut self, name: Option<String>) {
        if let Some(name) = name {
            let name = name.trim();
            if !name.is_empty() {
                self.display_name = name.to_string();
            }
        }
    }

    pub fn is_seated(&self) -> bool {
        self.room_code.is_some()
    }
}

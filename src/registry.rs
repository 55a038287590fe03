//! Connection registry
//!
//! Maps every live connection to its session record.

use std::collections::HashMap;

use tracing::debug;

use crate::message::{Payload, ServerMessage};
use crate::session::{OutboundSender, Session};
use crate::types::{ClientId, ClientIdAllocator, RoomCode};

/// Live sessions keyed by client id
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: HashMap<ClientId, Session>,
    ids: ClientIdAllocator,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and acknowledge it with `connected`
    pub fn connect(&mut self, sender: OutboundSender) -> ClientId {
        let id = self.ids.allocate();
        let session = Session::new(id, sender);
        session.send(ServerMessage::Connected {
            player_id: id.to_string(),
        });
        self.sessions.insert(id, session);
        debug!("Registered session {}, {} live", id, self.sessions.len());
        id
    }

    /// Discard a session
    ///
    /// Returns None if it was already removed, so teardown runs once.
    pub fn remove(&mut self, id: ClientId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    pub fn get(&self, id: ClientId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// Current room of a session
    pub fn room_of(&self, id: ClientId) -> Option<RoomCode> {
        self.sessions.get(&id).and_then(|s| s.room_code.clone())
    }

    /// Point a session at a room, or clear it
    pub fn set_room(&mut self, id: ClientId, room_code: Option<RoomCode>) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.room_code = room_code;
        }
    }

    /// Send a protocol message to one session
    pub fn send_to(&self, id: ClientId, msg: ServerMessage) {
        if let Some(session) = self.sessions.get(&id) {
            session.send(msg);
        }
    }

    /// Send the same protocol message to several sessions
    pub fn broadcast(&self, ids: &[ClientId], msg: &ServerMessage) {
        for id in ids {
            self.send_to(*id, msg.clone());
        }
    }

    /// Forward an opaque frame to several sessions
    pub fn relay(&self, ids: &[ClientId], payload: &Payload) {
        for id in ids {
            if let Some(session) = self.sessions.get(id) {
                session.relay(payload.clone());
            }
        }
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

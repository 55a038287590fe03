//! Room struct definition
//!
//! Represents a game room with one host and up to four guests.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use serde_json::Value;

use crate::error::AppError;
use crate::message::PlayerData;
use crate::types::{ClientId, RoomCode};

/// Maximum number of players in a room, host included
pub const MAX_PLAYERS: usize = 5;

/// Roster entry for a seated player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    pub name: String,
}

/// Result of removing a player from a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// The client was not a member
    NotMember,
    /// A guest left, the room stays open
    Guest,
    /// The host left, the room must be destroyed
    Host,
}

/// Game room
///
/// The host is always a key of `players`. Once the host is removed the room
/// is dead and the directory discards it; there is no host promotion.
#[derive(Debug)]
pub struct Room {
    /// Room code for identification
    pub code: RoomCode,
    /// Room creator (host)
    pub host_id: ClientId,
    /// All seated players, host included
    pub players: HashMap<ClientId, PlayerInfo>,
    /// Ready values set by each player, keyed by player id
    pub ready_state: serde_json::Map<String, Value>,
    /// Room creation time
    pub created_at: Instant,
}

impl Room {
    /// Create a new room with the given code and host
    pub fn new(code: RoomCode, host_id: ClientId, host_name: String) -> Self {
        let mut players = HashMap::new();
        players.insert(host_id, PlayerInfo { name: host_name });
        Self {
            code,
            host_id,
            players,
            ready_state: serde_json::Map::new(),
            created_at: Instant::now(),
        }
    }

    /// Check if room is full (5 people)
    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    /// Check if a client is in this room
    pub fn contains(&self, client_id: ClientId) -> bool {
        self.players.contains_key(&client_id)
    }

    pub fn is_host(&self, client_id: ClientId) -> bool {
        self.host_id == client_id
    }

    /// Get the number of players in the room
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Seat a new guest
    pub fn add_player(&mut self, client_id: ClientId, name: String) -> Result<(), AppError> {
        if self.is_full() {
            return Err(AppError::RoomFull);
        }
        self.players.insert(client_id, PlayerInfo { name });
        Ok(())
    }

    /// Remove a client from the room
    pub fn remove_player(&mut self, client_id: ClientId) -> Departure {
        if self.players.remove(&client_id).is_none() {
            return Departure::NotMember;
        }
        self.ready_state.remove(&client_id.to_string());
        if self.host_id == client_id {
            Departure::Host
        } else {
            Departure::Guest
        }
    }

    /// Ids of every player
    pub fn member_ids(&self) -> Vec<ClientId> {
        self.players.keys().copied().collect()
    }

    /// Ids of every player except `client_id`
    pub fn others(&self, client_id: ClientId) -> Vec<ClientId> {
        self.players
            .keys()
            .copied()
            .filter(|id| *id != client_id)
            .collect()
    }

    /// Roster entry as sent on the wire
    pub fn player_data(&self, client_id: ClientId) -> Option<PlayerData> {
        self.players.get(&client_id).map(|info| PlayerData {
            name: info.name.clone(),
            is_host: self.is_host(client_id),
        })
    }

    /// Roster of everyone except `client_id`, keyed by player id
    pub fn roster_excluding(&self, client_id: ClientId) -> BTreeMap<String, PlayerData> {
        self.players
            .iter()
            .filter(|(id, _)| **id != client_id)
            .map(|(id, info)| {
                (
                    id.to_string(),
                    PlayerData {
                        name: info.name.clone(),
                        is_host: self.is_host(*id),
                    },
                )
            })
            .collect()
    }

    /// Record a player's ready value and return the accumulated map
    pub fn set_ready(&mut self, client_id: ClientId, value: Value) -> serde_json::Map<String, Value> {
        self.ready_state.insert(client_id.to_string(), value);
        self.ready_state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> RoomCode {
        RoomCode("ABCD".to_string())
    }

    #[test]
    fn test_room_creation() {
        let host_id = ClientId(1);
        let room = Room::new(code(), host_id, "Alice".to_string());

        assert_eq!(room.host_id, host_id);
        assert!(room.contains(host_id));
        assert!(room.is_host(host_id));
        assert!(!room.is_full());
        assert_eq!(room.player_count(), 1);
    }

    #[test]
    fn test_room_capacity() {
        let mut room = Room::new(code(), ClientId(1), "Host".to_string());
        for n in 2..=5 {
            room.add_player(ClientId(n), format!("Guest {}", n)).unwrap();
        }
        assert!(room.is_full());

        let err = room.add_player(ClientId(6), "Late".to_string()).unwrap_err();
        assert!(matches!(err, AppError::RoomFull));
        assert_eq!(room.player_count(), MAX_PLAYERS);
        assert!(!room.contains(ClientId(6)));
    }

    #[test]
    fn test_room_departures() {
        let host_id = ClientId(1);
        let guest_id = ClientId(2);
        let mut room = Room::new(code(), host_id, "Alice".to_string());
        room.add_player(guest_id, "Bob".to_string()).unwrap();

        assert_eq!(room.remove_player(ClientId(9)), Departure::NotMember);
        assert_eq!(room.remove_player(guest_id), Departure::Guest);
        assert_eq!(room.player_count(), 1);
        assert_eq!(room.remove_player(host_id), Departure::Host);
    }

    #[test]
    fn test_roster_excludes_requester() {
        let host_id = ClientId(1);
        let guest_id = ClientId(2);
        let mut room = Room::new(code(), host_id, "Alice".to_string());
        room.add_player(guest_id, "Bob".to_string()).unwrap();

        let roster = room.roster_excluding(guest_id);
        assert_eq!(roster.len(), 1);
        assert_eq!(
            roster.get("p1"),
            Some(&PlayerData {
                name: "Alice".to_string(),
                is_host: true
            })
        );
        assert_eq!(room.others(host_id), vec![guest_id]);
    }

    #[test]
    fn test_ready_state_accumulates() {
        let mut room = Room::new(code(), ClientId(1), "Alice".to_string());
        room.add_player(ClientId(2), "Bob".to_string()).unwrap();

        room.set_ready(ClientId(1), Value::Bool(true));
        let state = room.set_ready(ClientId(2), Value::Bool(false));
        assert_eq!(state.len(), 2);
        assert_eq!(state.get("p1"), Some(&Value::Bool(true)));

        let state = room.set_ready(ClientId(1), Value::Bool(false));
        assert_eq!(state.get("p1"), Some(&Value::Bool(false)));

        room.remove_player(ClientId(2));
        assert!(!room.ready_state.contains_key("p2"));
    }
}

//! Room directory
//!
//! Owns every active room, keyed by code, and guarantees code uniqueness.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::AppError;
use crate::message::PlayerData;
use crate::room::{Departure, Room};
use crate::sweeper::expired_codes;
use crate::types::{ClientId, RoomCode};

/// Upper bound on code draws before giving up
pub const MAX_CODE_ATTEMPTS: usize = 10_000;

/// Source of candidate room codes
pub type CodeSource = Box<dyn FnMut() -> RoomCode + Send>;

/// Outcome of a successful join
#[derive(Debug, Clone, PartialEq)]
pub struct Joined {
    /// Everyone already in the room, keyed by player id
    pub roster: BTreeMap<String, PlayerData>,
    /// Pre-existing players to tell about the joiner
    pub notify: Vec<ClientId>,
    /// The joiner's own roster entry
    pub player_data: PlayerData,
}

/// Outcome of a leave request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leave {
    /// Room missing or client not a member
    NotMember,
    /// A guest left, `remaining` are still seated
    PlayerLeft { remaining: Vec<ClientId> },
    /// The host left and the room was deleted, `evicted` lost their seat
    RoomClosed { evicted: Vec<ClientId> },
}

/// All active rooms
pub struct RoomDirectory {
    rooms: HashMap<RoomCode, Room>,
    code_source: CodeSource,
}

impl RoomDirectory {
    /// Create an empty directory drawing random codes
    pub fn new() -> Self {
        Self::with_code_source(Box::new(RoomCode::generate))
    }

    /// Create an empty directory drawing codes from `code_source`
    pub fn with_code_source(code_source: CodeSource) -> Self {
        Self {
            rooms: HashMap::new(),
            code_source,
        }
    }

    /// Draw a code not currently in use
    pub fn generate_code(&mut self) -> Result<RoomCode, AppError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = (self.code_source)();
            if !self.rooms.contains_key(&code) {
                return Ok(code);
            }
        }
        Err(AppError::CodeSpaceExhausted(MAX_CODE_ATTEMPTS))
    }

    /// Register a new room with `host_id` as its only player
    pub fn create_room(&mut self, host_id: ClientId, host_name: String) -> Result<RoomCode, AppError> {
        let code = self.generate_code()?;
        let room = Room::new(code.clone(), host_id, host_name);
        self.rooms.insert(code.clone(), room);
        info!("Client {} created room {}", host_id, code);
        Ok(code)
    }

    /// Seat `client_id` in the room with `code`
    pub fn join_room(
        &mut self,
        code: &RoomCode,
        client_id: ClientId,
        name: String,
    ) -> Result<Joined, AppError> {
        let Some(room) = self.rooms.get_mut(code) else {
            return Err(AppError::RoomNotFound(code.to_string()));
        };

        let notify = room.member_ids();
        room.add_player(client_id, name)?;
        info!("Client {} joined room {}", client_id, code);

        let player_data = room.player_data(client_id).ok_or(AppError::NotInRoom)?;
        Ok(Joined {
            roster: room.roster_excluding(client_id),
            notify,
            player_data,
        })
    }

    /// Remove `client_id` from the room with `code`
    ///
    /// A host departure deletes the room.
    pub fn leave_room(&mut self, code: &RoomCode, client_id: ClientId) -> Leave {
        let Some(room) = self.rooms.get_mut(code) else {
            return Leave::NotMember;
        };

        match room.remove_player(client_id) {
            Departure::NotMember => Leave::NotMember,
            Departure::Guest => {
                info!("Client {} left room {}", client_id, code);
                Leave::PlayerLeft {
                    remaining: room.member_ids(),
                }
            }
            Departure::Host => {
                let evicted = room.member_ids();
                self.rooms.remove(code);
                info!("Host {} left, room {} closed", client_id, code);
                Leave::RoomClosed { evicted }
            }
        }
    }

    pub fn get(&self, code: &RoomCode) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn get_mut(&mut self, code: &RoomCode) -> Option<&mut Room> {
        self.rooms.get_mut(code)
    }

    /// Delete a room outright
    pub fn remove(&mut self, code: &RoomCode) -> Option<Room> {
        let room = self.rooms.remove(code);
        if room.is_some() {
            debug!("Room {} removed", code);
        }
        room
    }

    pub fn contains(&self, code: &RoomCode) -> bool {
        self.rooms.contains_key(code)
    }

    /// Number of active rooms
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Snapshot of codes whose rooms are older than `ttl` at `now`
    pub fn expired(&self, now: Instant, ttl: Duration) -> Vec<RoomCode> {
        expired_codes(
            self.rooms.iter().map(|(code, room)| (code, room.created_at)),
            now,
            ttl,
        )
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}

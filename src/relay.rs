//! RelayServer actor implementation
//!
//! The raw relay profile: role and room code are declared in the handshake
//! target, and every frame is fanned out without being parsed.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, info};

use crate::error::RelayRejection;
use crate::message::Payload;
use crate::room::MAX_PLAYERS;
use crate::session::{deliver, Outbound, OutboundSender};
use crate::sweeper::expired_codes;
use crate::types::{ClientId, ClientIdAllocator, RoomCode};

/// Close reason sent to clients when the host goes away
pub const HOST_LEFT_CLOSE_REASON: &str = "host left";

/// Close reason sent to members of an expired room
pub const EXPIRED_CLOSE_REASON: &str = "room expired";

/// Role declared at connect time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayRole {
    Host,
    Client,
}

/// Parsed handshake target: `/<CODE>?role=host|client`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayTarget {
    pub code: RoomCode,
    pub role: RelayRole,
}

impl RelayTarget {
    /// Parse the request target of the upgrade request
    pub fn parse(target: &str) -> Result<Self, RelayRejection> {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };

        let code = RoomCode::parse(path.trim_matches('/')).ok_or(RelayRejection::MalformedTarget)?;

        let role = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "role")
            .map(|(_, value)| value)
            .ok_or(RelayRejection::MalformedTarget)?;

        let role = match role.to_ascii_lowercase().as_str() {
            "host" => RelayRole::Host,
            "client" => RelayRole::Client,
            _ => return Err(RelayRejection::MalformedTarget),
        };

        Ok(Self { code, role })
    }
}

/// Commands sent from relay connections and the sweeper
#[derive(Debug)]
pub enum RelayCommand {
    /// Claim or join a room
    Join {
        target: RelayTarget,
        sender: OutboundSender,
        reply: oneshot::Sender<Result<ClientId, RelayRejection>>,
    },
    /// Connection closed
    Leave { client_id: ClientId },
    /// Opaque frame to fan out
    Frame { client_id: ClientId, payload: Payload },
    /// Evict rooms older than the TTL as of `now`
    Sweep { now: Instant },
    /// Report the number of active rooms
    RoomCount { reply: oneshot::Sender<usize> },
}

/// A relay room: one host plus the clients attached to it
#[derive(Debug)]
pub struct RelayRoom {
    pub code: RoomCode,
    pub host: ClientId,
    pub clients: HashSet<ClientId>,
    pub created_at: Instant,
}

impl RelayRoom {
    fn new(code: RoomCode, host: ClientId) -> Self {
        Self {
            code,
            host,
            clients: HashSet::new(),
            created_at: Instant::now(),
        }
    }

    pub fn member_count(&self) -> usize {
        1 + self.clients.len()
    }

    /// Everyone a frame from `from` is delivered to
    ///
    /// Host frames reach every client. Client frames reach the host and every
    /// other client.
    pub fn fan_out(&self, from: ClientId) -> Vec<ClientId> {
        if from == self.host {
            return self.clients.iter().copied().collect();
        }
        std::iter::once(self.host)
            .chain(self.clients.iter().copied().filter(|id| *id != from))
            .collect()
    }

    fn members(&self) -> Vec<ClientId> {
        std::iter::once(self.host).chain(self.clients.iter().copied()).collect()
    }
}

#[derive(Debug)]
struct Peer {
    sender: OutboundSender,
    code: RoomCode,
}

/// The raw relay router
pub struct RelayServer {
    peers: HashMap<ClientId, Peer>,
    rooms: HashMap<RoomCode, RelayRoom>,
    ids: ClientIdAllocator,
    room_ttl: Duration,
    receiver: mpsc::Receiver<RelayCommand>,
}

impl RelayServer {
    pub fn new(receiver: mpsc::Receiver<RelayCommand>, room_ttl: Duration) -> Self {
        Self {
            peers: HashMap::new(),
            rooms: HashMap::new(),
            ids: ClientIdAllocator::new(),
            room_ttl,
            receiver,
        }
    }

    /// Run the relay event loop until all senders are dropped
    pub async fn run(mut self) {
        info!("RelayServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("RelayServer shutting down");
    }

    pub fn room(&self, code: &RoomCode) -> Option<&RelayRoom> {
        self.rooms.get(code)
    }

    pub fn room_mut(&mut self, code: &RoomCode) -> Option<&mut RelayRoom> {
        self.rooms.get_mut(code)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Process a single command
    pub fn handle_command(&mut self, cmd: RelayCommand) {
        match cmd {
            RelayCommand::Join {
                target,
                sender,
                reply,
            } => {
                let result = self.handle_join(target, sender);
                let joined = result.as_ref().ok().copied();
                if reply.send(result).is_err() {
                    // Handler vanished before learning its id
                    if let Some(client_id) = joined {
                        self.handle_leave(client_id);
                    }
                }
            }
            RelayCommand::Leave { client_id } => self.handle_leave(client_id),
            RelayCommand::Frame { client_id, payload } => self.handle_frame(client_id, payload),
            RelayCommand::Sweep { now } => self.sweep(now),
            RelayCommand::RoomCount { reply } => {
                let _ = reply.send(self.rooms.len());
            }
        }
    }

    /// Seat a new connection according to its declared role
    pub fn handle_join(
        &mut self,
        target: RelayTarget,
        sender: OutboundSender,
    ) -> Result<ClientId, RelayRejection> {
        let RelayTarget { code, role } = target;

        match role {
            RelayRole::Host => {
                if self.rooms.contains_key(&code) {
                    return Err(RelayRejection::RoomExists);
                }
                let client_id = self.ids.allocate();
                self.rooms.insert(code.clone(), RelayRoom::new(code.clone(), client_id));
                info!("Host {} claimed relay room {}", client_id, code);
                self.peers.insert(client_id, Peer { sender, code });
                Ok(client_id)
            }
            RelayRole::Client => {
                let Some(room) = self.rooms.get_mut(&code) else {
                    return Err(RelayRejection::RoomNotFound);
                };
                if room.member_count() >= MAX_PLAYERS {
                    return Err(RelayRejection::RoomFull);
                }
                let client_id = self.ids.allocate();
                room.clients.insert(client_id);
                info!("Client {} joined relay room {}", client_id, code);
                self.peers.insert(client_id, Peer { sender, code });
                Ok(client_id)
            }
        }
    }

    /// Tear down a connection; a departing host closes the whole room
    ///
    /// Safe to call more than once.
    pub fn handle_leave(&mut self, client_id: ClientId) {
        let Some(peer) = self.peers.remove(&client_id) else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&peer.code) else {
            return;
        };

        if room.host == client_id {
            if let Some(room) = self.rooms.remove(&peer.code) {
                info!("Host {} left, relay room {} closed", client_id, room.code);
                self.close_members(&room, HOST_LEFT_CLOSE_REASON);
            }
        } else {
            room.clients.remove(&client_id);
            debug!("Client {} left relay room {}", client_id, peer.code);
        }
    }

    /// Fan an opaque frame out to the sender's room
    pub fn handle_frame(&mut self, client_id: ClientId, payload: Payload) {
        let Some(peer) = self.peers.get(&client_id) else {
            return;
        };
        let Some(room) = self.rooms.get(&peer.code) else {
            return;
        };

        for target in room.fan_out(client_id) {
            if let Some(peer) = self.peers.get(&target) {
                deliver(&peer.sender, target, Outbound::Relay(payload.clone()));
            }
        }
    }

    /// Close every member's connection and forget them
    fn close_members(&mut self, room: &RelayRoom, reason: &str) {
        for id in room.members() {
            if let Some(peer) = self.peers.remove(&id) {
                deliver(
                    &peer.sender,
                    id,
                    Outbound::Close {
                        code: CloseCode::Normal,
                        reason: reason.to_string(),
                    },
                );
            }
        }
    }

    /// Evict every room older than the TTL
    pub fn sweep(&mut self, now: Instant) {
        let expired = expired_codes(
            self.rooms.iter().map(|(code, room)| (code, room.created_at)),
            now,
            self.room_ttl,
        );

        for code in expired {
            let Some(room) = self.rooms.remove(&code) else {
                continue;
            };
            info!("Relay room {} expired", room.code);
            self.close_members(&room, EXPIRED_CLOSE_REASON);
        }
    }
}

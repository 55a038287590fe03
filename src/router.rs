//! MessageRouter actor implementation
//!
//! The central actor for the message protocol profile. It owns the
//! connection registry and the room directory and applies one command at a
//! time, so neither needs a lock.

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::directory::{Leave, RoomDirectory};
use crate::error::AppError;
use crate::message::{ClientMessage, Payload, ServerMessage, READY_MESSAGE_TYPE};
use crate::registry::ConnectionRegistry;
use crate::session::OutboundSender;
use crate::sweeper::EXPIRED_REASON;
use crate::types::{ClientId, RoomCode};

/// Reason given to guests when the host leaves
pub const HOST_LEFT_REASON: &str = "Host left";

/// Commands sent from connection handlers and the sweeper to the router
#[derive(Debug)]
pub enum RouterCommand {
    /// New connection opened
    Connect {
        sender: OutboundSender,
        reply: oneshot::Sender<ClientId>,
    },
    /// Connection closed
    Disconnect { client_id: ClientId },
    /// Frame received from a connection
    Inbound { client_id: ClientId, payload: Payload },
    /// Evict rooms older than the TTL as of `now`
    Sweep { now: Instant },
    /// Report the number of active rooms
    RoomCount { reply: oneshot::Sender<usize> },
}

/// The message protocol router
pub struct MessageRouter {
    /// All live sessions
    registry: ConnectionRegistry,
    /// All active rooms
    directory: RoomDirectory,
    /// Maximum room age
    room_ttl: Duration,
    /// Command receiver channel
    receiver: mpsc::Receiver<RouterCommand>,
}

impl MessageRouter {
    /// Create a router with an empty directory
    pub fn new(receiver: mpsc::Receiver<RouterCommand>, room_ttl: Duration) -> Self {
        Self::with_directory(receiver, room_ttl, RoomDirectory::new())
    }

    /// Create a router around an existing directory
    pub fn with_directory(
        receiver: mpsc::Receiver<RouterCommand>,
        room_ttl: Duration,
        directory: RoomDirectory,
    ) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            directory,
            room_ttl,
            receiver,
        }
    }

    /// Run the router event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("MessageRouter started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("MessageRouter shutting down");
    }

    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    pub fn directory_mut(&mut self) -> &mut RoomDirectory {
        &mut self.directory
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Process a single command
    pub fn handle_command(&mut self, cmd: RouterCommand) {
        match cmd {
            RouterCommand::Connect { sender, reply } => {
                let client_id = self.handle_connect(sender);
                if reply.send(client_id).is_err() {
                    // Handler vanished before learning its id
                    self.handle_disconnect(client_id);
                }
            }
            RouterCommand::Disconnect { client_id } => {
                self.handle_disconnect(client_id);
            }
            RouterCommand::Inbound { client_id, payload } => {
                self.handle_inbound(client_id, payload);
            }
            RouterCommand::Sweep { now } => {
                self.sweep(now);
            }
            RouterCommand::RoomCount { reply } => {
                let _ = reply.send(self.directory.len());
            }
        }
    }

    /// Handle new connection
    pub fn handle_connect(&mut self, sender: OutboundSender) -> ClientId {
        let client_id = self.registry.connect(sender);
        info!("Client {} connected", client_id);
        debug!(
            "Total clients: {}, Total rooms: {}",
            self.registry.len(),
            self.directory.len()
        );
        client_id
    }

    /// Handle connection teardown
    ///
    /// Safe to call more than once; only the first call has any effect.
    pub fn handle_disconnect(&mut self, client_id: ClientId) {
        if self.registry.get(client_id).is_none() {
            return;
        }

        self.leave_current_room(client_id);
        self.registry.remove(client_id);
        info!("Client {} disconnected", client_id);

        debug!(
            "Total clients: {}, Total rooms: {}",
            self.registry.len(),
            self.directory.len()
        );
    }

    /// Parse a frame and dispatch it
    ///
    /// Anything outside the schema is relayed opaque.
    pub fn handle_inbound(&mut self, client_id: ClientId, payload: Payload) {
        if self.registry.get(client_id).is_none() {
            return;
        }

        match payload {
            Payload::Text(text) => match ClientMessage::parse(&text) {
                Some(msg) => self.dispatch(client_id, msg, text),
                None => self.relay_to_others(client_id, Payload::Text(text)),
            },
            binary @ Payload::Binary(_) => self.relay_to_others(client_id, binary),
        }
    }

    fn dispatch(&mut self, client_id: ClientId, msg: ClientMessage, raw: String) {
        match msg {
            ClientMessage::CreateRoom { player_name } => {
                self.handle_create_room(client_id, player_name);
            }
            ClientMessage::JoinRoom {
                room_code,
                player_name,
            } => {
                self.handle_join_room(client_id, room_code, player_name);
            }
            ClientMessage::LeaveRoom => {
                self.leave_current_room(client_id);
            }
            ClientMessage::StartGame => {
                self.handle_start_game(client_id);
            }
            ClientMessage::GameMessage { message_type, data } => {
                if message_type == READY_MESSAGE_TYPE {
                    self.handle_ready(client_id, data);
                } else {
                    self.relay_to_others(client_id, Payload::Text(raw));
                }
            }
        }
    }

    /// Handle room creation
    fn handle_create_room(&mut self, client_id: ClientId, player_name: Option<String>) {
        let Some(session) = self.registry.get_mut(client_id) else {
            return;
        };

        if session.is_seated() {
            session.send(AppError::AlreadyInRoom.into());
            return;
        }

        session.set_display_name(player_name);
        let name = session.display_name.clone();

        match self.directory.create_room(client_id, name) {
            Ok(room_code) => {
                self.registry.set_room(client_id, Some(room_code.clone()));
                self.registry.send_to(
                    client_id,
                    ServerMessage::RoomCreated {
                        room_code: room_code.to_string(),
                        player_id: client_id.to_string(),
                    },
                );
            }
            Err(e) => {
                error!("Failed to create room for {}: {}", client_id, e);
                self.registry.send_to(client_id, e.into());
            }
        }
    }

    /// Handle room joining
    fn handle_join_room(&mut self, client_id: ClientId, room_code: String, player_name: Option<String>) {
        let Some(session) = self.registry.get_mut(client_id) else {
            return;
        };

        if session.is_seated() {
            session.send(AppError::AlreadyInRoom.into());
            return;
        }

        let Some(room_code) = RoomCode::parse(&room_code) else {
            session.send(AppError::RoomNotFound(room_code).into());
            return;
        };

        session.set_display_name(player_name);
        let name = session.display_name.clone();

        let joined = match self.directory.join_room(&room_code, client_id, name) {
            Ok(joined) => joined,
            Err(e) => {
                debug!("Client {} could not join {}: {}", client_id, room_code, e);
                self.registry.send_to(client_id, e.into());
                return;
            }
        };

        self.registry.set_room(client_id, Some(room_code.clone()));

        // Notify joiner
        self.registry.send_to(
            client_id,
            ServerMessage::RoomJoined {
                room_code: room_code.to_string(),
                player_id: client_id.to_string(),
            },
        );
        self.registry.send_to(
            client_id,
            ServerMessage::PlayerList {
                players: joined.roster,
            },
        );

        // Notify everyone already seated
        self.registry.broadcast(
            &joined.notify,
            &ServerMessage::PlayerJoined {
                player_id: client_id.to_string(),
                player_data: joined.player_data,
            },
        );
    }

    /// Handle game start (host only)
    fn handle_start_game(&mut self, client_id: ClientId) {
        let Some(room_code) = self.registry.room_of(client_id) else {
            self.registry.send_to(client_id, AppError::NotInRoom.into());
            return;
        };
        let Some(room) = self.directory.get(&room_code) else {
            return;
        };

        if !room.is_host(client_id) {
            warn!("Client {} tried to start room {} without being host", client_id, room_code);
            self.registry.send_to(client_id, AppError::NotHost.into());
            return;
        }

        info!("Room {} game started", room_code);
        self.registry
            .broadcast(&room.member_ids(), &ServerMessage::GameStarted);
    }

    /// Record a ready value and broadcast the room's accumulated state
    fn handle_ready(&mut self, client_id: ClientId, data: serde_json::Value) {
        let Some(room_code) = self.registry.room_of(client_id) else {
            debug!("Dropping ready update from unseated client {}", client_id);
            return;
        };
        let Some(room) = self.directory.get_mut(&room_code) else {
            return;
        };

        let state = room.set_ready(client_id, data);
        let members = room.member_ids();
        self.registry
            .broadcast(&members, &ServerMessage::GameStateUpdated { state });
    }

    /// Forward a frame verbatim to everyone in the sender's room but the sender
    fn relay_to_others(&self, client_id: ClientId, payload: Payload) {
        let Some(room_code) = self.registry.room_of(client_id) else {
            debug!("Dropping frame from unseated client {}", client_id);
            return;
        };
        let Some(room) = self.directory.get(&room_code) else {
            return;
        };

        self.registry.relay(&room.others(client_id), &payload);
    }

    /// Remove a client from their room, if any, and notify who is left
    fn leave_current_room(&mut self, client_id: ClientId) {
        let Some(room_code) = self.registry.room_of(client_id) else {
            return;
        };
        self.registry.set_room(client_id, None);

        match self.directory.leave_room(&room_code, client_id) {
            Leave::NotMember => {}
            Leave::PlayerLeft { remaining } => {
                self.registry.broadcast(
                    &remaining,
                    &ServerMessage::PlayerLeft {
                        player_id: client_id.to_string(),
                    },
                );
            }
            Leave::RoomClosed { evicted } => {
                self.close_for(&room_code, &evicted, HOST_LEFT_REASON);
            }
        }
    }

    /// Unseat `members` from `room_code` and tell them why
    fn close_for(&mut self, room_code: &RoomCode, members: &[ClientId], reason: &str) {
        for id in members {
            if self.registry.room_of(*id).as_ref() == Some(room_code) {
                self.registry.set_room(*id, None);
            }
            self.registry.send_to(
                *id,
                ServerMessage::RoomClosed {
                    reason: reason.to_string(),
                },
            );
        }
    }

    /// Evict every room older than the TTL
    pub fn sweep(&mut self, now: Instant) {
        let expired = self.directory.expired(now, self.room_ttl);
        if expired.is_empty() {
            return;
        }

        for room_code in expired {
            // Re-check against the live directory before notifying
            let Some(room) = self.directory.remove(&room_code) else {
                continue;
            };
            info!("Room {} expired", room.code);
            self.close_for(&room_code, &room.member_ids(), EXPIRED_REASON);
        }

        debug!("Sweep done, {} rooms remain", self.directory.len());
    }
}

//! WebSocket Room Relay Server Library
//!
//! A room-matchmaking and message relay server built with tokio-tungstenite
//! using the Actor pattern for state management. One connection hosts a
//! room and up to four others join it; the server relays their messages
//! without interpreting game content.
//!
//! # Features
//! - 4-letter room codes, unique among active rooms
//! - Host/guest roles; the room closes when the host leaves
//! - Message protocol profile (create/join/leave/start, ready state, relay)
//! - Raw relay profile (role and code in the handshake, opaque fan-out)
//! - Idle room expiry sweep
//! - Plain-HTTP status endpoint reporting the active room count
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `MessageRouter` (or `RelayServer`) is the central actor owning all state
//! - Each connection has a `handler` task communicating with the actor
//! - The sweeper ticks into the same mailbox
//! - No locks needed - all state access goes through message passing
//!
//! Client ids and room codes are not secrets and must not be used as
//! credentials.
//!
//! # Example
//! ```ignore
//! use std::time::Duration;
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use room_relay::{handle_connection, Dispatch, MessageRouter};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(MessageRouter::new(cmd_rx, Duration::from_secs(7200)).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let dispatch = Dispatch::Lobby(cmd_tx.clone());
//!         tokio::spawn(handle_connection(stream, dispatch));
//!     }
//! }
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod relay;
pub mod room;
pub mod router;
pub mod session;
pub mod status;
pub mod sweeper;
pub mod types;

// Re-export main types for convenience
pub use config::{Profile, ServerConfig};
pub use directory::RoomDirectory;
pub use error::{AppError, RelayRejection};
pub use handler::{handle_connection, Dispatch};
pub use message::{ClientMessage, Payload, PlayerData, ServerMessage};
pub use registry::ConnectionRegistry;
pub use relay::{RelayCommand, RelayServer};
pub use room::Room;
pub use router::{MessageRouter, RouterCommand};
pub use session::{Outbound, Session};
pub use sweeper::spawn_sweeper;
pub use types::{ClientId, RoomCode};

//! WebSocket Room Relay Server - Entry Point
//!
//! Starts the TCP listener, the actor for the configured profile and its
//! expiry sweeper, then accepts connections.

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use room_relay::{
    handle_connection, spawn_sweeper, Dispatch, MessageRouter, Profile, RelayCommand, RelayServer,
    RouterCommand, ServerConfig,
};

/// Channel buffer size for actor commands
const CHANNEL_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=room_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("room_relay=info")),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Start TCP listener
    let listener = TcpListener::bind(&config.addr).await?;
    info!(
        "Room relay server listening on {} ({:?} profile, room TTL {:?})",
        config.addr, config.profile, config.room_ttl
    );

    // Start the actor for the configured profile, plus its sweeper
    let dispatch = match config.profile {
        Profile::Lobby => {
            let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
            tokio::spawn(MessageRouter::new(cmd_rx, config.room_ttl).run());
            spawn_sweeper(cmd_tx.clone(), config.sweep_interval, |now| {
                RouterCommand::Sweep { now }
            });
            Dispatch::Lobby(cmd_tx)
        }
        Profile::Relay => {
            let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
            tokio::spawn(RelayServer::new(cmd_rx, config.room_ttl).run());
            spawn_sweeper(cmd_tx.clone(), config.sweep_interval, |now| {
                RelayCommand::Sweep { now }
            });
            Dispatch::Relay(cmd_tx)
        }
    };

    info!("Actor started");

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let dispatch = dispatch.clone();

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, dispatch).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

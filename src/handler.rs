//! WebSocket connection handler
//!
//! Handles individual TCP connections: status requests, WebSocket handshake,
//! and bidirectional communication with the router actor of the configured
//! profile.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, RelayRejection};
use crate::message::Payload;
use crate::relay::{RelayCommand, RelayTarget};
use crate::router::RouterCommand;
use crate::session::Outbound;
use crate::status;
use crate::types::ClientId;

/// Mailbox of the actor serving this process's wire profile
#[derive(Debug, Clone)]
pub enum Dispatch {
    Lobby(mpsc::Sender<RouterCommand>),
    Relay(mpsc::Sender<RelayCommand>),
}

impl Dispatch {
    /// Ask the actor how many rooms are active
    pub async fn room_count(&self) -> Result<usize, AppError> {
        let (reply, reply_rx) = oneshot::channel();
        let sent = match self {
            Dispatch::Lobby(cmd_tx) => cmd_tx.send(RouterCommand::RoomCount { reply }).await.is_ok(),
            Dispatch::Relay(cmd_tx) => cmd_tx.send(RelayCommand::RoomCount { reply }).await.is_ok(),
        };
        if !sent {
            return Err(AppError::ChannelSend);
        }
        reply_rx.await.map_err(|_| AppError::ChannelSend)
    }
}

/// Handle a new TCP connection
///
/// Plain HTTP requests get the status response; upgrades are handed to the
/// profile's connection handler.
pub async fn handle_connection(stream: TcpStream, dispatch: Dispatch) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    let head = status::peek_request_head(&stream).await?;
    if head.is_empty() {
        debug!("No request from {}, dropping connection", peer_addr);
        return Ok(());
    }
    if !head.is_websocket_upgrade() {
        let room_count = dispatch.room_count().await?;
        debug!("Status request from {}", peer_addr);
        let response = status::status_response(&head, room_count)?;
        return status::respond(stream, &head, &response).await;
    }

    match dispatch {
        Dispatch::Lobby(cmd_tx) => handle_lobby_connection(stream, cmd_tx).await,
        Dispatch::Relay(cmd_tx) => handle_relay_connection(stream, cmd_tx).await,
    }
}

/// Message protocol connection
async fn handle_lobby_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<RouterCommand>,
) -> Result<(), AppError> {
    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;

    // Channel for server -> client messages
    let (msg_tx, msg_rx) = mpsc::unbounded_channel();

    // Register with the router, which sends `connected`
    let (reply, reply_rx) = oneshot::channel();
    if cmd_tx
        .send(RouterCommand::Connect {
            sender: msg_tx,
            reply,
        })
        .await
        .is_err()
    {
        error!("Failed to register client - router closed");
        return Err(AppError::ChannelSend);
    }
    let client_id = reply_rx.await.map_err(|_| AppError::ChannelSend)?;
    info!("Client {} connected", client_id);

    pump(ws_stream, client_id, msg_rx, cmd_tx.clone(), |client_id, payload| {
        RouterCommand::Inbound { client_id, payload }
    })
    .await;

    let _ = cmd_tx.send(RouterCommand::Disconnect { client_id }).await;
    info!("Client {} disconnected", client_id);

    Ok(())
}

/// Raw relay connection
async fn handle_relay_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<RelayCommand>,
) -> Result<(), AppError> {
    // WebSocket handshake, keeping the request target
    let mut target = String::new();
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        target = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_default();
        Ok(resp)
    };
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, callback).await?;

    let target = match RelayTarget::parse(&target) {
        Ok(target) => target,
        Err(rejection) => {
            debug!("Rejecting relay target '{}': {}", target, rejection);
            return reject(ws_stream, rejection).await;
        }
    };

    let (msg_tx, msg_rx) = mpsc::unbounded_channel();
    let (reply, reply_rx) = oneshot::channel();
    if cmd_tx
        .send(RelayCommand::Join {
            target,
            sender: msg_tx,
            reply,
        })
        .await
        .is_err()
    {
        error!("Failed to register relay peer - server closed");
        return Err(AppError::ChannelSend);
    }

    let client_id = match reply_rx.await.map_err(|_| AppError::ChannelSend)? {
        Ok(client_id) => client_id,
        Err(rejection) => {
            info!("Relay join rejected: {}", rejection);
            return reject(ws_stream, rejection).await;
        }
    };
    info!("Relay peer {} connected", client_id);

    pump(ws_stream, client_id, msg_rx, cmd_tx.clone(), |client_id, payload| {
        RelayCommand::Frame { client_id, payload }
    })
    .await;

    let _ = cmd_tx.send(RelayCommand::Leave { client_id }).await;
    info!("Relay peer {} disconnected", client_id);

    Ok(())
}

/// Close a freshly upgraded connection with the rejection's code and reason
async fn reject(
    mut ws_stream: WebSocketStream<TcpStream>,
    rejection: RelayRejection,
) -> Result<(), AppError> {
    ws_stream
        .close(Some(CloseFrame {
            code: rejection.close_code(),
            reason: rejection.to_string().into(),
        }))
        .await?;
    Ok(())
}

/// Shuttle frames between the socket and the actor until either side ends
///
/// Inbound frames become commands via `to_command`. Whichever task finishes
/// first aborts the other, so undelivered outbound messages are dropped.
async fn pump<C, F>(
    ws_stream: WebSocketStream<TcpStream>,
    client_id: ClientId,
    mut msg_rx: mpsc::UnboundedReceiver<Outbound>,
    cmd_tx: mpsc::Sender<C>,
    to_command: F,
) where
    C: Send + 'static,
    F: Fn(ClientId, Payload) -> C + Send + 'static,
{
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Read task (WebSocket -> actor)
    let mut read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            let payload = match msg_result {
                Ok(Message::Text(text)) => Payload::Text(text.to_string()),
                Ok(Message::Binary(data)) => Payload::Binary(data.to_vec()),
                Ok(Message::Close(_)) => {
                    debug!("Client {} sent close frame", client_id);
                    break;
                }
                Ok(_) => {
                    // Ping/Pong - answered automatically by tungstenite
                    continue;
                }
                Err(e) => {
                    warn!("WebSocket error for {}: {}", client_id, e);
                    break;
                }
            };
            if cmd_tx.send(to_command(client_id, payload)).await.is_err() {
                debug!("Server closed, ending read task for {}", client_id);
                break;
            }
        }
        debug!("Read task ended for {}", client_id);
    });

    // Write task (Outbound -> WebSocket)
    let mut write_task = tokio::spawn(async move {
        while let Some(outbound) = msg_rx.recv().await {
            let frame = match outbound {
                Outbound::Message(msg) => match msg.to_json() {
                    Ok(json) => Message::Text(json.into()),
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        // Continue - don't break on serialization errors
                        continue;
                    }
                },
                Outbound::Relay(Payload::Text(text)) => Message::Text(text.into()),
                Outbound::Relay(Payload::Binary(data)) => Message::Binary(data.into()),
                Outbound::Close { code, reason } => {
                    debug!("Closing {}: {}", client_id, reason);
                    let _ = ws_sender
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
            };
            if ws_sender.send(frame).await.is_err() {
                debug!("WebSocket send failed, ending write task");
                break;
            }
        }
        debug!("Write task ended for {}", client_id);

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut read_task => {
            debug!("Read task completed for {}", client_id);
            write_task.abort();
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", client_id);
            read_task.abort();
        }
    }
}

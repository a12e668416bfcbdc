//! WebSocket listener and per-connection plumbing.
//!
//! Every connection gets a reader task and an unbounded outbound queue
//! drained by a writer task, so sends from room and lobby tasks never block
//! on a slow socket. A plain HTTP `GET /` on the same port is answered with
//! a small health document before the WebSocket handshake is attempted.

use crate::lobby::LobbyCommand;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::room::{RoomCommand, RoomHandle};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Identity of one socket; a player's seat can move across these via
/// reconnect tokens.
pub type ConnId = Uuid;

const HEALTH_BODY: &str = r#"{"status":"ok","service":"catan-server"}"#;

/// Registries shared across connection, room and lobby tasks. Each map entry
/// is owned by exactly one writer at a time; `DashMap` only guards the
/// registry itself.
pub struct ServerState {
    /// Outbound queue per live connection.
    pub connections: DashMap<ConnId, mpsc::UnboundedSender<ServerMessage>>,
    /// Which room, if any, a connection currently belongs to.
    pub conn_rooms: DashMap<ConnId, RoomHandle>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            conn_rooms: DashMap::new(),
        }
    }

    /// Best-effort send; a dropped receiver means the writer task is gone
    /// and the reader will notice the close on its own.
    pub fn send_to(&self, conn: ConnId, msg: ServerMessage) {
        if let Some(tx) = self.connections.get(&conn) {
            let _ = tx.send(msg);
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Accept connections until the listener fails.
pub async fn run_server(
    addr: SocketAddr,
    state: Arc<ServerState>,
    lobby: mpsc::UnboundedSender<LobbyCommand>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {addr}");

    while let Ok((stream, peer)) = listener.accept().await {
        let state = Arc::clone(&state);
        let lobby = lobby.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, state, lobby).await {
                debug!("connection from {peer} ended with error: {e}");
            }
        });
    }
    Ok(())
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    state: Arc<ServerState>,
    lobby: mpsc::UnboundedSender<LobbyCommand>,
) -> anyhow::Result<()> {
    // Health probes send a plain GET with no upgrade header; answer those
    // without a handshake. One peek is enough for the small requests health
    // checkers send.
    let mut head = [0u8; 1024];
    let n = stream.peek(&mut head).await?;
    let head = String::from_utf8_lossy(&head[..n]);
    if head.starts_with("GET") && !head.to_ascii_lowercase().contains("upgrade: websocket") {
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            HEALTH_BODY.len(),
            HEALTH_BODY
        );
        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await?;
        return Ok(());
    }

    let ws = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws.split();

    let conn: ConnId = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.connections.insert(conn, tx);
    info!(%conn, %peer, "websocket connected");

    // Writer: drain the outbound queue onto the socket.
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if ws_sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("failed to encode frame: {e}"),
            }
        }
    });

    // Reader: decode frames and route them until the socket closes.
    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => route_message(conn, msg, &state, &lobby),
                Err(_) => {
                    let message = if serde_json::from_str::<serde_json::Value>(&text).is_ok() {
                        "Unknown message type"
                    } else {
                        "Invalid message format"
                    };
                    warn!(%conn, "bad frame: {message}");
                    state.send_to(
                        conn,
                        ServerMessage::Error {
                            message: message.into(),
                        },
                    );
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // ping/pong/binary: nothing to route
            Err(e) => {
                debug!(%conn, "websocket error: {e}");
                break;
            }
        }
    }

    // The room keeps the seat; only the connection binding is dropped.
    if let Some(handle) = state.conn_rooms.get(&conn).map(|h| h.value().clone()) {
        handle.send(RoomCommand::Disconnected { conn });
    }
    state.conn_rooms.remove(&conn);
    state.connections.remove(&conn);
    writer.abort();
    info!(%conn, "websocket closed");
    Ok(())
}

fn route_message(
    conn: ConnId,
    msg: ClientMessage,
    state: &Arc<ServerState>,
    lobby: &mpsc::UnboundedSender<LobbyCommand>,
) {
    match msg {
        ClientMessage::CreateRoom { player_name } => {
            let _ = lobby.send(LobbyCommand::CreateRoom { conn, player_name });
        }
        ClientMessage::JoinRoom {
            room_id,
            player_name,
        } => {
            let _ = lobby.send(LobbyCommand::JoinRoom {
                conn,
                room_id,
                player_name,
            });
        }
        ClientMessage::ListRooms => {
            let _ = lobby.send(LobbyCommand::ListRooms { conn });
        }
        ClientMessage::Reconnect { token } => {
            let _ = lobby.send(LobbyCommand::Reconnect { conn, token });
        }
        ClientMessage::LeaveRoom => route_to_room(conn, state, RoomCommand::Leave { conn }),
        ClientMessage::StartGame => route_to_room(conn, state, RoomCommand::StartGame { conn }),
        ClientMessage::GameAction { action } => {
            route_to_room(conn, state, RoomCommand::Action { conn, action })
        }
        ClientMessage::Chat { message } => {
            route_to_room(conn, state, RoomCommand::Chat { conn, message })
        }
    }
}

fn route_to_room(conn: ConnId, state: &Arc<ServerState>, command: RoomCommand) {
    match state.conn_rooms.get(&conn).map(|h| h.value().clone()) {
        Some(handle) => handle.send(command),
        None => state.send_to(
            conn,
            ServerMessage::Error {
                message: "Not in a room".into(),
            },
        ),
    }
}

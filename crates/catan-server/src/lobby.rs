//! The lobby: a single owning task that serializes every cross-room
//! operation — room creation, joins, listing, and reconnect routing.
//!
//! Room state itself lives in the room tasks; the lobby keeps only the
//! registry of room handles, a cached summary per room for `LIST_ROOMS`, and
//! the reconnect-token index rooms feed it as they issue tokens.

use crate::protocol::{RoomInfo, RoomStatus, ServerMessage};
use crate::room::{spawn_room, RoomCommand, RoomHandle};
use crate::server::{ConnId, ServerState};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Room codes avoid glyphs that read ambiguously when spoken or retyped.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;

#[derive(Debug)]
pub enum LobbyCommand {
    CreateRoom {
        conn: ConnId,
        player_name: String,
    },
    JoinRoom {
        conn: ConnId,
        room_id: String,
        player_name: String,
    },
    ListRooms {
        conn: ConnId,
    },
    Reconnect {
        conn: ConnId,
        token: String,
    },
    /// Room → lobby: refresh the cached listing entry.
    RoomChanged {
        code: String,
        info: RoomInfo,
    },
    /// Room → lobby: a seat token was issued; index it for reconnects.
    TokenIssued {
        code: String,
        token: String,
    },
    /// Room → lobby: the room emptied and its task ended.
    RoomClosed {
        code: String,
    },
}

struct Lobby {
    state: Arc<ServerState>,
    tx: mpsc::UnboundedSender<LobbyCommand>,
    rooms: HashMap<String, RoomHandle>,
    summaries: HashMap<String, RoomInfo>,
    /// token → room code.
    tokens: HashMap<String, String>,
}

/// Spawn the lobby task; the returned sender is its only address.
pub fn spawn_lobby(state: Arc<ServerState>) -> mpsc::UnboundedSender<LobbyCommand> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let lobby_tx = tx.clone();

    tokio::spawn(async move {
        let mut lobby = Lobby {
            state,
            tx: lobby_tx,
            rooms: HashMap::new(),
            summaries: HashMap::new(),
            tokens: HashMap::new(),
        };
        while let Some(command) = rx.recv().await {
            lobby.handle(command);
        }
    });

    tx
}

impl Lobby {
    fn handle(&mut self, command: LobbyCommand) {
        match command {
            LobbyCommand::CreateRoom { conn, player_name } => {
                let code = self.fresh_code();
                let handle = spawn_room(
                    code.clone(),
                    conn,
                    player_name,
                    Arc::clone(&self.state),
                    self.tx.clone(),
                );
                self.rooms.insert(code, handle);
            }

            LobbyCommand::JoinRoom {
                conn,
                room_id,
                player_name,
            } => {
                let code = room_id.trim().to_ascii_uppercase();
                match self.rooms.get(&code) {
                    Some(handle) => handle.send(RoomCommand::Join {
                        conn,
                        name: player_name,
                    }),
                    None => self.state.send_to(
                        conn,
                        ServerMessage::Error {
                            message: "Failed to join room: room not found".into(),
                        },
                    ),
                }
            }

            LobbyCommand::ListRooms { conn } => {
                let rooms = self
                    .summaries
                    .values()
                    .filter(|info| info.status == RoomStatus::Waiting)
                    .cloned()
                    .collect();
                self.state.send_to(conn, ServerMessage::RoomList { rooms });
            }

            LobbyCommand::Reconnect { conn, token } => {
                match self.tokens.get(&token).and_then(|code| self.rooms.get(code)) {
                    Some(handle) => handle.send(RoomCommand::Reconnect { conn, token }),
                    None => self.state.send_to(
                        conn,
                        ServerMessage::Error {
                            message: "Reconnection failed".into(),
                        },
                    ),
                }
            }

            LobbyCommand::RoomChanged { code, info } => {
                self.summaries.insert(code, info);
            }

            LobbyCommand::TokenIssued { code, token } => {
                self.tokens.insert(token, code);
            }

            LobbyCommand::RoomClosed { code } => {
                self.rooms.remove(&code);
                self.summaries.remove(&code);
                self.tokens.retain(|_, c| *c != code);
                info!(room = %code, "room removed from lobby");
            }
        }
    }

    /// A 6-character code not currently in use.
    fn fresh_code(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let code: String = (0..CODE_LENGTH)
                .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
                .collect();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_alphabet_has_no_ambiguous_glyphs() {
        for banned in [b'I', b'O', b'0', b'1'] {
            assert!(!CODE_ALPHABET.contains(&banned));
        }
        assert_eq!(CODE_ALPHABET.len(), 32);
    }
}

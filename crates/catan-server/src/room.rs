//! Game rooms, each owned by a single task.
//!
//! A room's task is the only writer of its state: commands arrive through the
//! mailbox in FIFO order, so `dispatch` runs strictly serialized per room and
//! resulting broadcasts preserve that order for every recipient. Outbound
//! sends are fire-and-forget per connection; a stalled socket never blocks
//! the room.

use crate::lobby::LobbyCommand;
use crate::protocol::{RoomInfo, RoomPlayerInfo, RoomStatus, ServerMessage};
use crate::server::{ConnId, ServerState};
use catan_core::{GameState, GameView, PlayerAction, PlayerColor, PlayerId};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Seats per room.
pub const MAX_PLAYERS: usize = 4;

/// Seats required to start.
pub const MIN_PLAYERS: usize = 3;

/// Room-level failures, rendered into `ERROR` frames for the caller.
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Failed to join room: room is full")]
    RoomFull,
    #[error("Failed to join room: game already started")]
    JoinAfterStart,
    #[error("Only the host can start the game")]
    NotHost,
    #[error("Game already started")]
    AlreadyStarted,
    #[error("Need at least 3 players to start")]
    NotEnoughPlayers,
    #[error("Game has not started")]
    GameNotStarted,
}

/// Commands a room task consumes from its mailbox.
#[derive(Debug)]
pub enum RoomCommand {
    Join { conn: ConnId, name: String },
    Leave { conn: ConnId },
    StartGame { conn: ConnId },
    Action { conn: ConnId, action: PlayerAction },
    Chat { conn: ConnId, message: String },
    Reconnect { conn: ConnId, token: String },
    Disconnected { conn: ConnId },
}

/// A cloneable address for a room's mailbox.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    pub code: String,
    pub tx: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    pub fn send(&self, command: RoomCommand) {
        let _ = self.tx.send(command);
    }
}

/// One seat's record: identity, reconnect token, current connection.
struct Seat {
    id: PlayerId,
    name: String,
    token: String,
    conn: Option<ConnId>,
}

struct Room {
    code: String,
    state: Arc<ServerState>,
    lobby: mpsc::UnboundedSender<LobbyCommand>,
    handle: RoomHandle,
    seats: Vec<Seat>,
    host: PlayerId,
    status: RoomStatus,
    game: Option<GameState>,
}

/// Spawn a room task with its creator already seated as host. Returns the
/// handle; the `ROOM_CREATED` frame is sent from inside the task.
pub fn spawn_room(
    code: String,
    host_conn: ConnId,
    host_name: String,
    state: Arc<ServerState>,
    lobby: mpsc::UnboundedSender<LobbyCommand>,
) -> RoomHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = RoomHandle {
        code: code.clone(),
        tx,
    };

    let task_handle = handle.clone();
    tokio::spawn(async move {
        let mut room = Room {
            code,
            state,
            lobby,
            handle: task_handle,
            seats: Vec::new(),
            host: 0,
            status: RoomStatus::Waiting,
            game: None,
        };

        let seat = room.seat_player(host_conn, host_name);
        room.send_to_conn(
            host_conn,
            ServerMessage::RoomCreated {
                room_id: room.code.clone(),
                player_id: seat,
                token: room.seats[seat as usize].token.clone(),
            },
        );
        room.publish_summary();
        info!(room = %room.code, "room created");

        while let Some(command) = rx.recv().await {
            if room.handle_command(command) {
                break;
            }
        }
        let _ = room
            .lobby
            .send(LobbyCommand::RoomClosed {
                code: room.code.clone(),
            });
        info!(room = %room.code, "room closed");
    });

    handle
}

impl Room {
    /// Returns true when the room is empty and the task should end.
    fn handle_command(&mut self, command: RoomCommand) -> bool {
        match command {
            RoomCommand::Join { conn, name } => self.join(conn, name),
            RoomCommand::Leave { conn } => return self.leave(conn),
            RoomCommand::StartGame { conn } => self.start_game(conn),
            RoomCommand::Action { conn, action } => self.game_action(conn, action),
            RoomCommand::Chat { conn, message } => self.chat(conn, message),
            RoomCommand::Reconnect { conn, token } => self.reconnect(conn, token),
            RoomCommand::Disconnected { conn } => return self.disconnected(conn),
        }
        false
    }

    // ==================== Membership ====================

    fn seat_player(&mut self, conn: ConnId, name: String) -> PlayerId {
        let id = self.seats.len() as PlayerId;
        let token = Uuid::new_v4().to_string();
        let _ = self.lobby.send(LobbyCommand::TokenIssued {
            code: self.code.clone(),
            token: token.clone(),
        });
        self.seats.push(Seat {
            id,
            name,
            token,
            conn: Some(conn),
        });
        self.state.conn_rooms.insert(conn, self.handle.clone());
        id
    }

    fn join(&mut self, conn: ConnId, name: String) {
        if let Err(e) = self.try_join(conn, name) {
            self.send_to_conn(
                conn,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            );
        }
    }

    fn try_join(&mut self, conn: ConnId, name: String) -> Result<(), RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::JoinAfterStart);
        }
        if self.seats.len() >= MAX_PLAYERS {
            return Err(RoomError::RoomFull);
        }

        let seat = self.seat_player(conn, name);
        self.send_to_conn(
            conn,
            ServerMessage::RoomJoined {
                player_id: seat,
                token: self.seats[seat as usize].token.clone(),
                room_info: self.info(),
            },
        );
        self.broadcast_except(
            conn,
            ServerMessage::RoomUpdate {
                room_info: self.info(),
            },
        );
        self.publish_summary();
        Ok(())
    }

    fn leave(&mut self, conn: ConnId) -> bool {
        let Some(seat) = self.seat_of(conn) else {
            return false;
        };
        self.state.conn_rooms.remove(&conn);
        self.send_to_conn(conn, ServerMessage::RoomLeft);

        if self.status == RoomStatus::Waiting {
            self.remove_seat(seat)
        } else {
            // Seats are permanent once the game started; leaving is just a
            // disconnect with an explicit goodbye.
            self.mark_disconnected(seat);
            false
        }
    }

    fn disconnected(&mut self, conn: ConnId) -> bool {
        let Some(seat) = self.seat_of(conn) else {
            return false;
        };
        self.state.conn_rooms.remove(&conn);

        if self.status == RoomStatus::Waiting {
            self.remove_seat(seat)
        } else {
            self.mark_disconnected(seat);
            false
        }
    }

    /// Drop a seat from a waiting room, reindexing the rest so seat ids and
    /// colors stay dense. Returns true when the room emptied.
    fn remove_seat(&mut self, seat: PlayerId) -> bool {
        let host_left = seat == self.host;
        self.seats.retain(|s| s.id != seat);
        if self.seats.is_empty() {
            return true;
        }
        for (index, s) in self.seats.iter_mut().enumerate() {
            s.id = index as PlayerId;
        }
        if host_left {
            self.host = 0;
        } else if seat < self.host {
            self.host -= 1;
        }
        self.broadcast(ServerMessage::RoomUpdate {
            room_info: self.info(),
        });
        self.publish_summary();
        false
    }

    /// Flip the seat (and its engine player) to disconnected. Pending
    /// obligations stay; the game waits for a reconnect.
    fn mark_disconnected(&mut self, seat: PlayerId) {
        if let Some(s) = self.seats.iter_mut().find(|s| s.id == seat) {
            s.conn = None;
        }
        if let Some(game) = &mut self.game {
            game.players[seat as usize].connected = false;
        }
        self.broadcast(ServerMessage::PlayerDisconnected { player_id: seat });
        self.broadcast(ServerMessage::RoomUpdate {
            room_info: self.info(),
        });
        self.broadcast_states();
        self.publish_summary();
        info!(room = %self.code, seat, "player disconnected");
    }

    fn reconnect(&mut self, conn: ConnId, token: String) {
        let Some(seat) = self
            .seats
            .iter()
            .position(|s| s.token == token)
            .map(|i| i as PlayerId)
        else {
            self.send_to_conn(
                conn,
                ServerMessage::Error {
                    message: "Reconnection failed".into(),
                },
            );
            return;
        };

        if let Some(s) = self.seats.iter_mut().find(|s| s.id == seat) {
            s.conn = Some(conn);
        }
        if let Some(game) = &mut self.game {
            game.players[seat as usize].connected = true;
        }
        self.state.conn_rooms.insert(conn, self.handle.clone());

        if let Some(game) = &self.game {
            self.send_to_conn(
                conn,
                ServerMessage::Reconnected {
                    state: GameView::for_player(game, seat),
                },
            );
        } else {
            self.send_to_conn(
                conn,
                ServerMessage::RoomJoined {
                    player_id: seat,
                    token,
                    room_info: self.info(),
                },
            );
        }
        self.broadcast_except(conn, ServerMessage::PlayerReconnected { player_id: seat });
        self.broadcast_except(
            conn,
            ServerMessage::RoomUpdate {
                room_info: self.info(),
            },
        );
        self.publish_summary();
        info!(room = %self.code, seat, "player reconnected");
    }

    // ==================== Game flow ====================

    fn start_game(&mut self, conn: ConnId) {
        if let Err(e) = self.try_start_game(conn) {
            self.send_to_conn(
                conn,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            );
        }
    }

    fn try_start_game(&mut self, conn: ConnId) -> Result<(), RoomError> {
        let Some(seat) = self.seat_of(conn) else {
            return Ok(());
        };
        if seat != self.host {
            return Err(RoomError::NotHost);
        }
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::AlreadyStarted);
        }
        if self.seats.len() < MIN_PLAYERS {
            return Err(RoomError::NotEnoughPlayers);
        }

        let names = self.seats.iter().map(|s| s.name.clone()).collect();
        let seed: u64 = rand::thread_rng().gen();
        let game = GameState::new(self.code.clone(), names, seed);
        self.game = Some(game);
        self.status = RoomStatus::InProgress;

        for seat in &self.seats {
            if let (Some(conn), Some(game)) = (seat.conn, &self.game) {
                self.send_to_conn(
                    conn,
                    ServerMessage::GameStarted {
                        state: GameView::for_player(game, seat.id),
                    },
                );
            }
        }
        self.publish_summary();
        info!(room = %self.code, players = self.seats.len(), "game started");
        Ok(())
    }

    fn game_action(&mut self, conn: ConnId, action: PlayerAction) {
        let Some(seat) = self.seat_of(conn) else {
            return;
        };
        let Some(game) = &self.game else {
            self.send_to_conn(
                conn,
                ServerMessage::Error {
                    message: RoomError::GameNotStarted.to_string(),
                },
            );
            return;
        };

        match game.dispatch(seat, &action) {
            Ok(next) => {
                let new_events = next.log[game.log.len()..].to_vec();
                self.game = Some(next);

                for event in new_events {
                    self.broadcast(ServerMessage::GameEvent { event });
                }
                self.broadcast_states();

                if self.game.as_ref().is_some_and(|g| g.is_finished()) {
                    self.status = RoomStatus::Finished;
                    self.publish_summary();
                    info!(room = %self.code, "game finished");
                }
            }
            Err(reason) => {
                self.send_to_conn(
                    conn,
                    ServerMessage::ActionRejected {
                        action,
                        reason: reason.to_string(),
                    },
                );
            }
        }
    }

    fn chat(&mut self, conn: ConnId, message: String) {
        let Some(seat) = self.seat_of(conn) else {
            return;
        };
        let name = self.seats[seat as usize].name.clone();
        self.broadcast(ServerMessage::ChatMessage {
            player_id: seat,
            player_name: name,
            message,
        });
    }

    // ==================== Plumbing ====================

    fn seat_of(&self, conn: ConnId) -> Option<PlayerId> {
        self.seats
            .iter()
            .find(|s| s.conn == Some(conn))
            .map(|s| s.id)
    }

    fn send_to_conn(&self, conn: ConnId, msg: ServerMessage) {
        self.state.send_to(conn, msg);
    }

    fn broadcast(&self, msg: ServerMessage) {
        for seat in &self.seats {
            if let Some(conn) = seat.conn {
                self.state.send_to(conn, msg.clone());
            }
        }
    }

    fn broadcast_except(&self, except: ConnId, msg: ServerMessage) {
        for seat in &self.seats {
            match seat.conn {
                Some(conn) if conn != except => self.state.send_to(conn, msg.clone()),
                _ => {}
            }
        }
    }

    /// Push each connected seat its own filtered view of the current state.
    fn broadcast_states(&self) {
        let Some(game) = &self.game else {
            return;
        };
        for seat in &self.seats {
            if let Some(conn) = seat.conn {
                self.send_to_conn(
                    conn,
                    ServerMessage::StateUpdate {
                        state: GameView::for_player(game, seat.id),
                    },
                );
            }
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.code.clone(),
            host_id: self.host,
            status: self.status,
            max_players: MAX_PLAYERS as u8,
            players: self
                .seats
                .iter()
                .map(|s| RoomPlayerInfo {
                    id: s.id,
                    name: s.name.clone(),
                    color: PlayerColor::for_seat(s.id),
                    connected: s.conn.is_some(),
                })
                .collect(),
        }
    }

    /// Keep the lobby's cached listing in sync.
    fn publish_summary(&self) {
        if self
            .lobby
            .send(LobbyCommand::RoomChanged {
                code: self.code.clone(),
                info: self.info(),
            })
            .is_err()
        {
            warn!(room = %self.code, "lobby is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_room() -> Room {
        let (lobby_tx, _lobby_rx) = mpsc::unbounded_channel();
        let (tx, _rx) = mpsc::unbounded_channel();
        let code = "TESTQZ".to_string();
        Room {
            code: code.clone(),
            state: Arc::new(ServerState::new()),
            lobby: lobby_tx,
            handle: RoomHandle { code, tx },
            seats: Vec::new(),
            host: 0,
            status: RoomStatus::Waiting,
            game: None,
        }
    }

    #[test]
    fn join_caps_at_four_seats() {
        let mut room = test_room();
        for i in 0..4 {
            assert!(room.try_join(Uuid::new_v4(), format!("P{i}")).is_ok());
        }
        assert!(matches!(
            room.try_join(Uuid::new_v4(), "P5".into()),
            Err(RoomError::RoomFull)
        ));
        assert_eq!(room.seats.len(), 4);
    }

    #[test]
    fn start_requires_host_and_three_players() {
        let mut room = test_room();
        let host = Uuid::new_v4();
        let second = Uuid::new_v4();
        room.try_join(host, "Host".into()).unwrap();
        room.try_join(second, "Second".into()).unwrap();

        assert!(matches!(
            room.try_start_game(second),
            Err(RoomError::NotHost)
        ));
        assert!(matches!(
            room.try_start_game(host),
            Err(RoomError::NotEnoughPlayers)
        ));

        room.try_join(Uuid::new_v4(), "Third".into()).unwrap();
        room.try_start_game(host).unwrap();
        assert_eq!(room.status, RoomStatus::InProgress);
        assert!(room.game.is_some());

        // No second start, no late joins.
        assert!(matches!(
            room.try_start_game(host),
            Err(RoomError::AlreadyStarted)
        ));
        assert!(matches!(
            room.try_join(Uuid::new_v4(), "Late".into()),
            Err(RoomError::JoinAfterStart)
        ));
    }

    #[test]
    fn leaving_a_waiting_room_reindexes_and_passes_host() {
        let mut room = test_room();
        let host = Uuid::new_v4();
        let second = Uuid::new_v4();
        let third = Uuid::new_v4();
        room.try_join(host, "Host".into()).unwrap();
        room.try_join(second, "Second".into()).unwrap();
        room.try_join(third, "Third".into()).unwrap();

        assert!(!room.leave(host));
        assert_eq!(room.seats.len(), 2);
        assert_eq!(room.host, 0, "host seat passes to the next joiner");
        assert_eq!(room.seats[0].name, "Second");
        assert_eq!(room.seats[0].id, 0);
        assert_eq!(room.seats[1].id, 1);

        // The last leaver empties the room.
        assert!(!room.leave(second));
        assert!(room.leave(third));
    }

    #[test]
    fn disconnect_after_start_keeps_the_seat() {
        let mut room = test_room();
        let conns: Vec<ConnId> = (0..3).map(|_| Uuid::new_v4()).collect();
        for (i, &conn) in conns.iter().enumerate() {
            room.try_join(conn, format!("P{i}")).unwrap();
        }
        room.try_start_game(conns[0]).unwrap();

        assert!(!room.disconnected(conns[1]));
        assert_eq!(room.seats.len(), 3, "in-game seats are permanent");
        assert!(room.seats[1].conn.is_none());
        assert!(!room.game.as_ref().unwrap().players[1].connected);

        // The token rebinds a fresh connection to the same seat.
        let token = room.seats[1].token.clone();
        let new_conn = Uuid::new_v4();
        room.reconnect(new_conn, token);
        assert_eq!(room.seats[1].conn, Some(new_conn));
        assert!(room.game.as_ref().unwrap().players[1].connected);
    }

    #[test]
    fn reconnect_with_bad_token_changes_nothing() {
        let mut room = test_room();
        room.try_join(Uuid::new_v4(), "Host".into()).unwrap();
        let before = room.seats[0].conn;
        room.reconnect(Uuid::new_v4(), "not-a-token".into());
        assert_eq!(room.seats[0].conn, before);
    }
}

//! WebSocket frame types: one JSON object per frame, tagged on `type`.

use catan_core::{GameEvent, GameView, PlayerAction, PlayerColor, PlayerId};
use serde::{Deserialize, Serialize};

/// Frames a client may send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    CreateRoom { player_name: String },

    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: String, player_name: String },

    LeaveRoom,

    /// Host only; needs 3-4 seated players.
    StartGame,

    ListRooms,

    /// Resume a seat using the token issued at join.
    Reconnect { token: String },

    /// A game action for the engine, resolved to the sender's seat.
    GameAction { action: PlayerAction },

    Chat { message: String },
}

/// Frames the server sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    RoomCreated {
        room_id: String,
        player_id: PlayerId,
        token: String,
    },

    #[serde(rename_all = "camelCase")]
    RoomJoined {
        player_id: PlayerId,
        token: String,
        room_info: RoomInfo,
    },

    RoomList {
        rooms: Vec<RoomInfo>,
    },

    #[serde(rename_all = "camelCase")]
    RoomUpdate {
        room_info: RoomInfo,
    },

    RoomLeft,

    GameStarted {
        state: GameView,
    },

    StateUpdate {
        state: GameView,
    },

    /// Returned only to the sender of a rejected action.
    ActionRejected {
        action: PlayerAction,
        reason: String,
    },

    GameEvent {
        event: GameEvent,
    },

    Reconnected {
        state: GameView,
    },

    #[serde(rename_all = "camelCase")]
    PlayerDisconnected {
        player_id: PlayerId,
    },

    #[serde(rename_all = "camelCase")]
    PlayerReconnected {
        player_id: PlayerId,
    },

    Error {
        message: String,
    },

    #[serde(rename_all = "camelCase")]
    ChatMessage {
        player_id: PlayerId,
        player_name: String,
        message: String,
    },
}

/// Room lifecycle as shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    InProgress,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub room_id: String,
    pub host_id: PlayerId,
    pub status: RoomStatus,
    pub max_players: u8,
    pub players: Vec<RoomPlayerInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub color: PlayerColor,
    pub connected: bool,
}

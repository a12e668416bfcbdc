//! Deterministic rules engine for a hex-board settlement game.
//!
//! The crate owns the canonical game state and everything that mutates it:
//!
//! - [`hex`]: cube coordinates with canonical vertex/edge forms
//! - [`layout`]: the fixed 19-hex board shape and its derived tables
//! - [`board`]: tiles, buildings, roads, ports, robber, seeded generation
//! - [`player`] / [`bank`]: hands, pieces, dev cards, the shared supply
//! - [`actions`]: the action union, trade offers, logged events
//! - [`game`]: `GameState` and the pure `dispatch` reducer
//! - [`view`]: per-viewer projection that strips hidden information
//!
//! The engine is synchronous, allocation-light and free of I/O; a session
//! host in front of it owns sockets and rooms and feeds it one action at a
//! time. All randomness is derived from the seed carried in the state, so a
//! game replays bit-for-bit from its initial state and action sequence.

pub mod actions;
pub mod bank;
pub mod board;
pub mod game;
pub mod hex;
pub mod layout;
pub mod player;
mod rng;
pub mod view;

pub use actions::{GameEvent, PlayerAction, TradeId, TradeOffer, TradeResponse, TradeStatus};
pub use bank::Bank;
pub use board::{Board, Building, BuildingKind, Port, PortKind, Terrain, Tile};
pub use game::{
    GamePhase, GameState, MainSubPhase, RuleError, SetupPlacing, MIN_LARGEST_ARMY,
    MIN_LONGEST_ROAD, VICTORY_POINTS_TO_WIN,
};
pub use hex::{EdgeCoord, EdgeDirection, HexCoord, VertexCoord, VertexDirection};
pub use player::{costs, DevCard, DevCardKind, Player, PlayerColor, PlayerId, Resource, ResourceBundle};
pub use view::GameView;

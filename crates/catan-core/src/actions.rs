//! Player actions, trade offers and the events the engine logs.
//!
//! `PlayerAction` is the wire-facing tagged union: the session host decodes a
//! `GAME_ACTION` frame into one of these, stamps it with the sender's seat,
//! and hands it to `dispatch`. Keeping it a closed sum type means the
//! validator and every handler are exhaustively matched; adding an action is
//! a compile-time reminder everywhere it matters.

use crate::hex::{EdgeCoord, HexCoord, VertexCoord};
use crate::player::{PlayerId, Resource, ResourceBundle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier of a trade offer within one game.
pub type TradeId = u32;

/// Everything a seated player can ask the engine to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerAction {
    RollDice,
    PlaceSettlement {
        vertex: VertexCoord,
    },
    PlaceRoad {
        edge: EdgeCoord,
    },
    PlaceCity {
        vertex: VertexCoord,
    },
    BuyDevCard,
    #[serde(rename_all = "camelCase")]
    PlayKnight {
        robber_hex: HexCoord,
    },
    PlayRoadBuilding,
    PlayYearOfPlenty {
        resources: [Resource; 2],
    },
    PlayMonopoly {
        resource: Resource,
    },
    DiscardResources {
        resources: ResourceBundle,
    },
    MoveRobber {
        hex: HexCoord,
    },
    #[serde(rename_all = "camelCase")]
    Steal {
        target_player_id: PlayerId,
    },
    ProposeTrade {
        offering: ResourceBundle,
        requesting: ResourceBundle,
    },
    #[serde(rename_all = "camelCase")]
    RespondToTrade {
        trade_id: TradeId,
        accept: bool,
    },
    #[serde(rename_all = "camelCase")]
    ConfirmTrade {
        trade_id: TradeId,
        with_player_id: PlayerId,
    },
    #[serde(rename_all = "camelCase")]
    CancelTrade {
        trade_id: TradeId,
    },
    BankTrade {
        giving: ResourceBundle,
        receiving: ResourceBundle,
    },
    EndTurn,
}

/// A single responder's answer to an open offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeResponse {
    Pending,
    Accepted,
    Rejected,
}

/// Lifecycle of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Executed,
    Cancelled,
}

/// A player-to-player trade offer.
///
/// The proposer opens it, every other seat starts `pending`, any non-proposer
/// may accept or reject while it is open, and the proposer closes it by
/// confirming with one accepting counterparty (or cancelling).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeOffer {
    pub id: TradeId,
    pub proposer: PlayerId,
    pub offering: ResourceBundle,
    pub requesting: ResourceBundle,
    pub responses: HashMap<PlayerId, TradeResponse>,
    pub status: TradeStatus,
}

impl TradeOffer {
    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    pub fn response(&self, player: PlayerId) -> Option<TradeResponse> {
        self.responses.get(&player).copied()
    }
}

/// Events appended to the game log by successful dispatches.
///
/// The session host forwards each new entry to every connection, so these are
/// wire types too. Hidden information stays hidden: a steal logs `resource:
/// None` — only the two involved hands change, and each player sees their own
/// hand through their filtered view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum GameEvent {
    DiceRolled {
        player: PlayerId,
        dice: (u8, u8),
        total: u8,
    },
    ResourcesProduced {
        distributions: Vec<(PlayerId, Resource, u32)>,
    },
    /// A resource was claimed but the bank could not cover every claimant, so
    /// nobody received any of it this roll.
    ProductionShorted {
        resource: Resource,
        claimed: u32,
        available: u32,
    },
    SettlementPlaced {
        player: PlayerId,
        vertex: VertexCoord,
    },
    CityPlaced {
        player: PlayerId,
        vertex: VertexCoord,
    },
    RoadPlaced {
        player: PlayerId,
        edge: EdgeCoord,
    },
    DevCardBought {
        player: PlayerId,
    },
    KnightPlayed {
        player: PlayerId,
    },
    RoadBuildingPlayed {
        player: PlayerId,
        free_roads: u8,
    },
    YearOfPlentyPlayed {
        player: PlayerId,
        resources: [Resource; 2],
    },
    MonopolyPlayed {
        player: PlayerId,
        resource: Resource,
        collected: u32,
    },
    RobberMoved {
        player: PlayerId,
        from: HexCoord,
        to: HexCoord,
    },
    ResourceStolen {
        thief: PlayerId,
        victim: PlayerId,
        /// Never populated in the shared log; the hands involved learn the
        /// resource through their own filtered views.
        resource: Option<Resource>,
    },
    ResourcesDiscarded {
        player: PlayerId,
        count: u32,
    },
    TradeProposed {
        offer: TradeOffer,
    },
    TradeResponded {
        trade_id: TradeId,
        player: PlayerId,
        accepted: bool,
    },
    TradeExecuted {
        trade_id: TradeId,
        proposer: PlayerId,
        counterparty: PlayerId,
    },
    TradeCancelled {
        trade_id: TradeId,
    },
    BankTradeExecuted {
        player: PlayerId,
        gave: Resource,
        gave_count: u32,
        received: Resource,
    },
    LongestRoadChanged {
        previous: Option<PlayerId>,
        current: Option<PlayerId>,
        length: u32,
    },
    LargestArmyChanged {
        previous: Option<PlayerId>,
        current: Option<PlayerId>,
        knights: u32,
    },
    TurnEnded {
        player: PlayerId,
        next_player: PlayerId,
    },
    GameWon {
        player: PlayerId,
        victory_points: u32,
    },
}

//! Per-viewer projection of the authoritative state.
//!
//! This is the only place hidden information is dropped before a state
//! leaves the engine: the viewer keeps their full hand, card list and port
//! set, every other seat is reduced to counts and public flags. The
//! projection is total and side-effect-free; the session host calls it once
//! per recipient on every broadcast.

use crate::actions::TradeOffer;
use crate::board::{BuildingKind, PortKind, Terrain};
use crate::game::{GamePhase, GameState};
use crate::hex::{EdgeCoord, HexCoord};
use crate::layout::LAND_HEXES;
use crate::player::{DevCard, Player, PlayerColor, PlayerId, ResourceBundle};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A filtered snapshot of the game, specific to one viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub game_id: String,
    /// The seat this view was filtered for.
    pub you: PlayerId,
    pub board: BoardView,
    pub players: Vec<PlayerView>,
    /// Bank stock is public knowledge.
    pub bank: ResourceBundle,
    /// The deck itself stays hidden; only its size is shared.
    pub dev_deck_remaining: usize,
    pub turn: TurnStateView,
    /// Open trade offers, visible to everyone.
    pub trades: Vec<TradeOffer>,
    pub winner: Option<PlayerId>,
}

/// Turn bookkeeping, fully public.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnStateView {
    #[serde(flatten)]
    pub phase: GamePhase,
    pub current_player_index: PlayerId,
    pub turn_number: u32,
    pub dice_roll: Option<(u8, u8)>,
    pub dev_card_played_this_turn: bool,
    pub dev_card_bought_this_turn: bool,
    /// Who still owes a discard; everyone may see who holds up the game.
    pub pending_discards: BTreeMap<PlayerId, u32>,
    pub road_building_roads_left: u8,
    pub must_steal_from: Vec<PlayerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    pub tiles: Vec<TileView>,
    /// Keyed by canonical `"q,r,s,dir"` vertex keys.
    pub buildings: BTreeMap<String, BuildingView>,
    /// Keyed by canonical `"q,r,s,dir"` edge keys.
    pub roads: BTreeMap<String, RoadView>,
    pub ports: Vec<PortView>,
    pub robber_hex: HexCoord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileView {
    #[serde(flatten)]
    pub coord: HexCoord,
    pub terrain: Terrain,
    pub token: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingView {
    pub kind: BuildingKind,
    pub owner: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadView {
    pub owner: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortView {
    pub edge: EdgeCoord,
    pub kind: PortKind,
}

/// One seat as a given viewer sees it. The own-seat-only fields are `None`
/// (and absent from the JSON) in everyone else's view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub color: PlayerColor,
    pub connected: bool,
    pub resource_count: u32,
    pub dev_card_count: usize,
    pub knights_played: u32,
    pub has_longest_road: bool,
    pub has_largest_army: bool,
    pub longest_road_length: u32,
    /// Buildings plus award bonuses; hidden VP cards are not included.
    pub public_victory_points: u32,
    pub settlements_remaining: u32,
    pub cities_remaining: u32,
    pub roads_remaining: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceBundle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_cards: Option<Vec<DevCard>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports: Option<BTreeSet<PortKind>>,
}

impl GameView {
    /// Project the state for one viewer.
    pub fn for_player(state: &GameState, viewer: PlayerId) -> GameView {
        let players = state
            .players
            .iter()
            .map(|p| project_player(state, p, viewer))
            .collect();

        GameView {
            game_id: state.game_id.clone(),
            you: viewer,
            board: project_board(state),
            players,
            bank: *state.bank.resources(),
            dev_deck_remaining: state.dev_deck.len(),
            turn: TurnStateView {
                phase: state.phase.clone(),
                current_player_index: state.current_player,
                turn_number: state.turn_number,
                dice_roll: state.dice_roll,
                dev_card_played_this_turn: state.dev_card_played_this_turn,
                dev_card_bought_this_turn: state.dev_card_bought_this_turn,
                pending_discards: state
                    .pending_discards
                    .iter()
                    .map(|(&p, &n)| (p, n))
                    .collect(),
                road_building_roads_left: state.road_building_roads_left,
                must_steal_from: state.must_steal_from.clone(),
            },
            trades: state
                .trades
                .iter()
                .filter(|t| t.is_open())
                .cloned()
                .collect(),
            winner: state.winner,
        }
    }
}

fn project_board(state: &GameState) -> BoardView {
    // Tiles in the fixed enumeration order keeps payloads byte-stable.
    let tiles = LAND_HEXES
        .iter()
        .filter_map(|coord| state.board.tile(coord))
        .map(|tile| TileView {
            coord: tile.coord,
            terrain: tile.terrain,
            token: tile.token,
        })
        .collect();

    let buildings = state
        .board
        .buildings()
        .map(|(vertex, building)| {
            (
                vertex.key(),
                BuildingView {
                    kind: building.kind,
                    owner: building.owner,
                },
            )
        })
        .collect();

    let roads = state
        .board
        .roads()
        .map(|(edge, &owner)| (edge.key(), RoadView { owner }))
        .collect();

    let ports = state
        .board
        .ports()
        .iter()
        .map(|port| PortView {
            edge: port.edge,
            kind: port.kind,
        })
        .collect();

    BoardView {
        tiles,
        buildings,
        roads,
        ports,
        robber_hex: state.board.robber(),
    }
}

fn project_player(state: &GameState, player: &Player, viewer: PlayerId) -> PlayerView {
    let own = player.id == viewer;
    PlayerView {
        id: player.id,
        name: player.name.clone(),
        color: player.color,
        connected: player.connected,
        resource_count: player.resources.total(),
        dev_card_count: player.dev_cards.len(),
        knights_played: player.knights_played,
        has_longest_road: player.has_longest_road,
        has_largest_army: player.has_largest_army,
        longest_road_length: player.longest_road_length,
        public_victory_points: state.public_victory_points(player.id),
        settlements_remaining: player.settlements_remaining,
        cities_remaining: player.cities_remaining,
        roads_remaining: player.roads_remaining,
        resources: own.then_some(player.resources),
        dev_cards: own.then(|| player.dev_cards.clone()),
        ports: own.then(|| player.ports.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{DevCardKind, Resource};

    fn sample_state() -> GameState {
        let mut state = GameState::new(
            "view-test",
            vec!["Ada".into(), "Ben".into(), "Cy".into()],
            11,
        );
        state.players[0].resources = ResourceBundle::with_amounts(1, 2, 0, 0, 1);
        state.players[1].resources = ResourceBundle::with_amounts(0, 0, 3, 0, 0);
        state.players[1].dev_cards.push(DevCard {
            kind: DevCardKind::VictoryPoint,
            turn_acquired: 1,
        });
        state
    }

    #[test]
    fn own_hand_visible_others_counted() {
        let state = sample_state();
        let view = GameView::for_player(&state, 0);

        assert_eq!(view.you, 0);
        let me = &view.players[0];
        assert_eq!(me.resources, Some(state.players[0].resources));
        assert!(me.dev_cards.is_some());
        assert!(me.ports.is_some());

        let other = &view.players[1];
        assert_eq!(other.resources, None);
        assert_eq!(other.dev_cards, None);
        assert_eq!(other.resource_count, 3);
        assert_eq!(other.dev_card_count, 1);
    }

    #[test]
    fn hidden_fields_absent_from_json() {
        let state = sample_state();
        let view = GameView::for_player(&state, 0);
        let json = serde_json::to_value(&view).unwrap();

        let other = &json["players"][1];
        assert!(other.get("resources").is_none());
        assert!(other.get("devCards").is_none());
        assert_eq!(other["resourceCount"], 3);

        // The deck travels as a count only.
        assert_eq!(json["devDeckRemaining"], 25);
        assert!(json.get("devDeck").is_none());
    }

    #[test]
    fn public_vp_excludes_hidden_cards() {
        let state = sample_state();
        let view = GameView::for_player(&state, 0);
        assert_eq!(view.players[1].public_victory_points, 0);
        assert_eq!(state.victory_points(1), 1);
    }

    #[test]
    fn board_maps_use_string_keys() {
        let mut state = sample_state();
        let vertex = HexCoord::new(0, 0).vertex(crate::hex::VertexDirection::N);
        state.board.place_settlement(vertex, 2);
        let edge = vertex.touching_edges()[1];
        state.board.place_road(edge, 2);

        let view = GameView::for_player(&state, 1);
        assert_eq!(view.board.buildings[&vertex.key()].owner, 2);
        assert_eq!(view.board.roads[&edge.key()].owner, 2);

        let json = serde_json::to_value(&view.board).unwrap();
        assert!(json["buildings"][vertex.key()].is_object());
        assert_eq!(json["robberHex"]["q"], state.board.robber().q);
    }

    #[test]
    fn phase_flattens_into_turn_state() {
        let state = sample_state();
        let view = GameView::for_player(&state, 0);
        let json = serde_json::to_value(&view.turn).unwrap();
        assert_eq!(json["phase"], "SETUP");
        assert_eq!(json["setupSubPhase"], "PLACE_SETTLEMENT");
        assert_eq!(json["currentPlayerIndex"], 0);
    }

    #[test]
    fn bank_and_open_trades_are_public() {
        let mut state = sample_state();
        state.bank.dispense(&ResourceBundle::single(Resource::Ore, 3));
        let view = GameView::for_player(&state, 2);
        assert_eq!(view.bank.get(Resource::Ore), 16);
        assert!(view.trades.is_empty());
    }

    #[test]
    fn projection_has_no_side_effects() {
        let state = sample_state();
        let before = state.clone();
        for viewer in 0..3 {
            let _ = GameView::for_player(&state, viewer);
        }
        assert_eq!(state, before);
    }
}

//! The rule engine: `GameState` and the pure `dispatch` reducer.
//!
//! `dispatch` validates an action against the current state, and on success
//! returns a brand-new state; the input is never mutated and a rejected
//! action leaves no trace. All randomness (board, deck, dice, steals) flows
//! through the seed carried in the state, so replaying an action sequence
//! from the same initial state reproduces the game exactly.

use crate::actions::{GameEvent, PlayerAction, TradeId, TradeOffer, TradeResponse, TradeStatus};
use crate::bank::Bank;
use crate::board::{Board, Building, BuildingKind};
use crate::hex::{EdgeCoord, HexCoord, VertexCoord};
use crate::layout::layout;
use crate::player::{costs, DevCard, DevCardKind, Player, PlayerId, Resource, ResourceBundle};
use crate::rng::draw_rng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Victory points needed to win.
pub const VICTORY_POINTS_TO_WIN: u32 = 10;

/// Minimum road length to qualify for Longest Road.
pub const MIN_LONGEST_ROAD: u32 = 5;

/// Minimum knights played to qualify for Largest Army.
pub const MIN_LARGEST_ARMY: u32 = 3;

/// What the acting player must place during their setup step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetupPlacing {
    PlaceSettlement,
    PlaceRoad,
}

/// Sub-phase of a MAIN-phase turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MainSubPhase {
    RollDice,
    Discard,
    MoveRobber,
    Steal,
    TradeBuildPlay,
}

/// Top-level game phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    /// Initial snake-order placement of two settlements and two roads each.
    #[serde(rename_all = "camelCase")]
    Setup {
        /// Seat indices in snake order: 0,1,…,n-1,n-1,…,1,0.
        setup_order: Vec<PlayerId>,
        /// Index into `setup_order`.
        setup_step: usize,
        setup_sub_phase: SetupPlacing,
        /// The settlement placed earlier in this step, constraining the road.
        last_settlement_vertex: Option<VertexCoord>,
    },
    #[serde(rename_all = "camelCase")]
    Main { main_sub_phase: MainSubPhase },
    GameOver,
}

/// Typed rejection produced by the validator. The rendered message is the
/// human-readable reason forwarded to the offending client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("Game is over")]
    GameOver,
    #[error("No such player")]
    UnknownPlayer,
    #[error("Not your turn")]
    NotYourTurn,
    #[error("Invalid action for the current phase")]
    WrongPhase,
    #[error("Not a board hex")]
    UnknownHex,
    #[error("Not a board vertex")]
    UnknownVertex,
    #[error("Not a board edge")]
    UnknownEdge,
    #[error("That spot is already occupied")]
    Occupied,
    #[error("Too close to another settlement (distance rule)")]
    DistanceRule,
    #[error("Settlement must touch one of your roads")]
    SettlementNotConnected,
    #[error("Road must connect to your road network")]
    RoadNotConnected,
    #[error("Road must touch the settlement you just placed")]
    SetupRoadDetached,
    #[error("You need your own settlement there to build a city")]
    NotYourSettlement,
    #[error("Not enough resources for a {0}")]
    CannotAfford(&'static str),
    #[error("No {0} pieces remaining")]
    OutOfPieces(&'static str),
    #[error("The development card deck is empty")]
    DeckEmpty,
    #[error("You don't have that development card")]
    NoSuchCard,
    #[error("That card was bought this turn and cannot be played yet")]
    CardTooNew,
    #[error("A development card was already played this turn")]
    DevCardAlreadyPlayed,
    #[error("You have no discard pending")]
    NoDiscardPending,
    #[error("Discard must total exactly {0} cards")]
    WrongDiscardCount(u32),
    #[error("You don't hold those resources")]
    MissingResources,
    #[error("That player no longer holds the requested resources")]
    CounterpartyMissingResources,
    #[error("Robber must move to a different hex")]
    RobberSamePlace,
    #[error("That player cannot be robbed")]
    InvalidStealTarget,
    #[error("Trade offers must have resources on both sides")]
    EmptyTrade,
    #[error("No such trade offer")]
    UnknownTrade,
    #[error("Trade offer is no longer open")]
    TradeNotOpen,
    #[error("You cannot respond to your own offer")]
    OwnTrade,
    #[error("Only the proposer can do that with a trade offer")]
    NotYourTrade,
    #[error("That player has not accepted the offer")]
    CounterpartyNotAccepted,
    #[error("Bank trades give a single resource type")]
    MixedBankTrade,
    #[error("Bank trades receive exactly one resource of a different type")]
    BadBankTradeReceive,
    #[error("Bank trade requires giving {0} of that resource")]
    WrongTradeRate(u32),
    #[error("Bank doesn't have enough of that resource")]
    BankShort,
}

/// The complete, authoritative game state.
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub game_id: String,
    pub board: Board,
    pub players: Vec<Player>,
    pub bank: Bank,
    /// Remaining development cards; the top of the deck is index 0.
    pub dev_deck: Vec<DevCardKind>,
    pub phase: GamePhase,
    pub current_player: PlayerId,
    /// Starts at 0 during setup, 1 on the first MAIN turn.
    pub turn_number: u32,
    pub dice_roll: Option<(u8, u8)>,
    pub dev_card_played_this_turn: bool,
    pub dev_card_bought_this_turn: bool,
    /// Seats that still owe a discard after a 7, with the exact count owed.
    pub pending_discards: HashMap<PlayerId, u32>,
    /// Free roads left from a Road Building card.
    pub road_building_roads_left: u8,
    /// Candidate victims awaiting the robber's choice.
    pub must_steal_from: Vec<PlayerId>,
    /// Trade offers created this turn.
    pub trades: Vec<TradeOffer>,
    pub next_trade_id: TradeId,
    pub winner: Option<PlayerId>,
    /// Append-only event log; the session host forwards new entries.
    pub log: Vec<GameEvent>,
    /// RNG cursor; advanced by every draw.
    pub seed: u64,
}

impl GameState {
    /// Create a fresh game: generated board, shuffled deck, setup phase.
    pub fn new(game_id: impl Into<String>, player_names: Vec<String>, seed: u64) -> Self {
        assert!(
            (2..=4).contains(&player_names.len()),
            "a game seats 2-4 players"
        );

        let players: Vec<Player> = player_names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Player::new(i as PlayerId, name))
            .collect();

        let mut seed = seed;
        let board = Board::generate(&mut seed);

        let mut dev_deck = DevCardKind::standard_deck();
        dev_deck.shuffle(&mut draw_rng(&mut seed));

        let n = players.len();
        let setup_order: Vec<PlayerId> = (0..n).chain((0..n).rev()).map(|i| i as PlayerId).collect();

        Self {
            game_id: game_id.into(),
            board,
            players,
            bank: Bank::new(),
            dev_deck,
            phase: GamePhase::Setup {
                setup_order,
                setup_step: 0,
                setup_sub_phase: SetupPlacing::PlaceSettlement,
                last_settlement_vertex: None,
            },
            current_player: 0,
            turn_number: 0,
            dice_roll: None,
            dev_card_played_this_turn: false,
            dev_card_bought_this_turn: false,
            pending_discards: HashMap::new(),
            road_building_roads_left: 0,
            must_steal_from: Vec::new(),
            trades: Vec::new(),
            next_trade_id: 1,
            winner: None,
            log: Vec::new(),
            seed,
        }
    }

    /// Validate and apply an action, returning the successor state.
    ///
    /// Pure: equal inputs give equal outputs, and a rejection has no
    /// observable effect on anything.
    pub fn dispatch(&self, actor: PlayerId, action: &PlayerAction) -> Result<GameState, RuleError> {
        let mut next = self.clone();
        next.apply(actor, action)?;
        if matches!(next.phase, GamePhase::Main { .. }) {
            next.check_victory();
        }
        Ok(next)
    }

    /// Check an action without producing the successor state.
    pub fn validate_action(&self, actor: PlayerId, action: &PlayerAction) -> Result<(), RuleError> {
        self.dispatch(actor, action).map(|_| ())
    }

    // ==================== Accessors ====================

    pub fn player(&self, id: PlayerId) -> &Player {
        &self.players[id as usize]
    }

    fn player_mut(&mut self, id: PlayerId) -> &mut Player {
        &mut self.players[id as usize]
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, GamePhase::GameOver)
    }

    fn main_sub(&self) -> Option<MainSubPhase> {
        match &self.phase {
            GamePhase::Main { main_sub_phase } => Some(*main_sub_phase),
            _ => None,
        }
    }

    fn set_main_sub(&mut self, sub: MainSubPhase) {
        self.phase = GamePhase::Main {
            main_sub_phase: sub,
        };
    }

    fn require_main(&self, expected: MainSubPhase) -> Result<(), RuleError> {
        if self.main_sub() == Some(expected) {
            Ok(())
        } else {
            Err(RuleError::WrongPhase)
        }
    }

    fn require_current(&self, actor: PlayerId) -> Result<(), RuleError> {
        if actor == self.current_player {
            Ok(())
        } else {
            Err(RuleError::NotYourTurn)
        }
    }

    /// Total victory points, hidden VP cards included. Decides the win.
    pub fn victory_points(&self, player: PlayerId) -> u32 {
        self.public_victory_points(player) + self.player(player).victory_point_cards()
    }

    /// Victory points visible to everyone: buildings plus award bonuses.
    pub fn public_victory_points(&self, player: PlayerId) -> u32 {
        let mut vp = 0;
        for (_, building) in self.board.buildings() {
            if building.owner == player {
                vp += match building.kind {
                    BuildingKind::Settlement => 1,
                    BuildingKind::City => 2,
                };
            }
        }
        let p = self.player(player);
        if p.has_longest_road {
            vp += 2;
        }
        if p.has_largest_army {
            vp += 2;
        }
        vp
    }

    // ==================== Action application ====================

    fn apply(&mut self, actor: PlayerId, action: &PlayerAction) -> Result<(), RuleError> {
        if self.is_finished() {
            return Err(RuleError::GameOver);
        }
        if actor as usize >= self.players.len() {
            return Err(RuleError::UnknownPlayer);
        }

        match action {
            PlayerAction::PlaceSettlement { vertex } => match self.phase {
                GamePhase::Setup { .. } => self.setup_settlement(actor, *vertex),
                _ => self.build_settlement(actor, *vertex),
            },
            PlayerAction::PlaceRoad { edge } => match self.phase {
                GamePhase::Setup { .. } => self.setup_road(actor, *edge),
                _ => self.build_road(actor, *edge),
            },
            PlayerAction::RollDice => self.roll_dice(actor),
            PlayerAction::DiscardResources { resources } => self.discard(actor, resources),
            PlayerAction::MoveRobber { hex } => self.move_robber(actor, *hex),
            PlayerAction::Steal { target_player_id } => self.steal(actor, *target_player_id),
            PlayerAction::PlaceCity { vertex } => self.build_city(actor, *vertex),
            PlayerAction::BuyDevCard => self.buy_dev_card(actor),
            PlayerAction::PlayKnight { robber_hex } => self.play_knight(actor, *robber_hex),
            PlayerAction::PlayRoadBuilding => self.play_road_building(actor),
            PlayerAction::PlayYearOfPlenty { resources } => {
                self.play_year_of_plenty(actor, *resources)
            }
            PlayerAction::PlayMonopoly { resource } => self.play_monopoly(actor, *resource),
            PlayerAction::ProposeTrade {
                offering,
                requesting,
            } => self.propose_trade(actor, offering, requesting),
            PlayerAction::RespondToTrade { trade_id, accept } => {
                self.respond_to_trade(actor, *trade_id, *accept)
            }
            PlayerAction::ConfirmTrade {
                trade_id,
                with_player_id,
            } => self.confirm_trade(actor, *trade_id, *with_player_id),
            PlayerAction::CancelTrade { trade_id } => self.cancel_trade(actor, *trade_id),
            PlayerAction::BankTrade { giving, receiving } => {
                self.bank_trade(actor, giving, receiving)
            }
            PlayerAction::EndTurn => self.end_turn(actor),
        }
    }

    // ==================== Setup phase ====================

    fn setup_settlement(&mut self, actor: PlayerId, vertex: VertexCoord) -> Result<(), RuleError> {
        let GamePhase::Setup {
            ref setup_order,
            setup_step,
            setup_sub_phase,
            ..
        } = self.phase
        else {
            return Err(RuleError::WrongPhase);
        };
        if setup_sub_phase != SetupPlacing::PlaceSettlement {
            return Err(RuleError::WrongPhase);
        }
        if actor != setup_order[setup_step] {
            return Err(RuleError::NotYourTurn);
        }

        let vertex = vertex.canonical();
        if !layout().is_land_vertex(&vertex) {
            return Err(RuleError::UnknownVertex);
        }
        if self.board.building(&vertex).is_some() {
            return Err(RuleError::Occupied);
        }
        if !self.board.satisfies_distance_rule(&vertex) {
            return Err(RuleError::DistanceRule);
        }

        self.board.place_settlement(vertex, actor);
        self.player_mut(actor).settlements_remaining -= 1;
        self.grant_port_access(actor, vertex);
        self.log.push(GameEvent::SettlementPlaced {
            player: actor,
            vertex,
        });

        if let GamePhase::Setup {
            setup_sub_phase,
            last_settlement_vertex,
            ..
        } = &mut self.phase
        {
            *setup_sub_phase = SetupPlacing::PlaceRoad;
            *last_settlement_vertex = Some(vertex);
        }
        Ok(())
    }

    fn setup_road(&mut self, actor: PlayerId, edge: EdgeCoord) -> Result<(), RuleError> {
        let GamePhase::Setup {
            ref setup_order,
            setup_step,
            setup_sub_phase,
            last_settlement_vertex,
        } = self.phase
        else {
            return Err(RuleError::WrongPhase);
        };
        if setup_sub_phase != SetupPlacing::PlaceRoad {
            return Err(RuleError::WrongPhase);
        }
        if actor != setup_order[setup_step] {
            return Err(RuleError::NotYourTurn);
        }
        let second_round = setup_step >= self.players.len();

        let edge = edge.canonical();
        if !layout().is_land_edge(&edge) {
            return Err(RuleError::UnknownEdge);
        }
        if self.board.road_owner(&edge).is_some() {
            return Err(RuleError::Occupied);
        }
        let settlement = last_settlement_vertex.ok_or(RuleError::WrongPhase)?;
        if !settlement.touching_edges().contains(&edge) {
            return Err(RuleError::SetupRoadDetached);
        }

        self.board.place_road(edge, actor);
        self.player_mut(actor).roads_remaining -= 1;
        self.log.push(GameEvent::RoadPlaced {
            player: actor,
            edge,
        });

        // The second settlement pays out its adjacent hexes immediately.
        if second_round {
            let mut granted = ResourceBundle::new();
            for hex in settlement.touching_hexes() {
                if let Some(resource) = self
                    .board
                    .tile(&hex)
                    .and_then(|t| t.terrain.resource())
                {
                    granted.add(resource, 1);
                }
            }
            if !granted.is_empty() {
                self.bank.dispense(&granted);
                self.player_mut(actor).resources.add_bundle(&granted);
                let distributions = granted.entries().map(|(r, n)| (actor, r, n)).collect();
                self.log
                    .push(GameEvent::ResourcesProduced { distributions });
            }
        }

        self.advance_setup();
        Ok(())
    }

    fn advance_setup(&mut self) {
        let GamePhase::Setup {
            ref setup_order,
            setup_step,
            ..
        } = self.phase
        else {
            return;
        };
        let next_step = setup_step + 1;

        if next_step == setup_order.len() {
            self.current_player = 0;
            self.turn_number = 1;
            self.set_main_sub(MainSubPhase::RollDice);
            return;
        }

        let next_player = setup_order[next_step];
        self.current_player = next_player;
        if let GamePhase::Setup {
            setup_step,
            setup_sub_phase,
            last_settlement_vertex,
            ..
        } = &mut self.phase
        {
            *setup_step = next_step;
            *setup_sub_phase = SetupPlacing::PlaceSettlement;
            *last_settlement_vertex = None;
        }
    }

    // ==================== Dice & production ====================

    fn roll_dice(&mut self, actor: PlayerId) -> Result<(), RuleError> {
        self.require_main(MainSubPhase::RollDice)?;
        self.require_current(actor)?;

        let mut rng = draw_rng(&mut self.seed);
        let dice = (rng.gen_range(1..=6), rng.gen_range(1..=6));
        let total = dice.0 + dice.1;
        self.dice_roll = Some(dice);
        self.log.push(GameEvent::DiceRolled {
            player: actor,
            dice,
            total,
        });

        if total == 7 {
            self.pending_discards = self
                .players
                .iter()
                .filter(|p| p.resources.total() > 7)
                .map(|p| (p.id, p.resources.total() / 2))
                .collect();
            if self.pending_discards.is_empty() {
                self.set_main_sub(MainSubPhase::MoveRobber);
            } else {
                self.set_main_sub(MainSubPhase::Discard);
            }
        } else {
            self.produce_resources(total);
            self.set_main_sub(MainSubPhase::TradeBuildPlay);
        }
        Ok(())
    }

    /// Pay out production for a roll, all-or-nothing per resource when the
    /// bank cannot cover every claim.
    fn produce_resources(&mut self, total: u8) {
        let mut production = self.board.production_for_roll(total);

        let mut claimed = ResourceBundle::new();
        for bundle in production.values() {
            claimed.add_bundle(bundle);
        }
        for resource in Resource::ALL {
            let wanted = claimed.get(resource);
            let available = self.bank.available(resource);
            if wanted > available {
                for bundle in production.values_mut() {
                    bundle.set(resource, 0);
                }
                self.log.push(GameEvent::ProductionShorted {
                    resource,
                    claimed: wanted,
                    available,
                });
            }
        }

        let mut recipients: Vec<PlayerId> = production.keys().copied().collect();
        recipients.sort_unstable();

        let mut distributions = Vec::new();
        for player in recipients {
            let bundle = production[&player];
            if bundle.is_empty() {
                continue;
            }
            self.bank.dispense(&bundle);
            self.player_mut(player).resources.add_bundle(&bundle);
            distributions.extend(bundle.entries().map(|(r, n)| (player, r, n)));
        }
        if !distributions.is_empty() {
            self.log
                .push(GameEvent::ResourcesProduced { distributions });
        }
    }

    // ==================== Discard & robber ====================

    fn discard(&mut self, actor: PlayerId, resources: &ResourceBundle) -> Result<(), RuleError> {
        self.require_main(MainSubPhase::Discard)?;
        let required = *self
            .pending_discards
            .get(&actor)
            .ok_or(RuleError::NoDiscardPending)?;
        if resources.total() != required {
            return Err(RuleError::WrongDiscardCount(required));
        }
        if !self.player(actor).resources.covers(resources) {
            return Err(RuleError::MissingResources);
        }

        self.player_mut(actor).resources.subtract_bundle(resources);
        self.bank.receive(resources);
        self.pending_discards.remove(&actor);
        self.log.push(GameEvent::ResourcesDiscarded {
            player: actor,
            count: required,
        });

        if self.pending_discards.is_empty() {
            self.set_main_sub(MainSubPhase::MoveRobber);
        }
        Ok(())
    }

    fn move_robber(&mut self, actor: PlayerId, hex: HexCoord) -> Result<(), RuleError> {
        self.require_main(MainSubPhase::MoveRobber)?;
        self.require_current(actor)?;
        self.relocate_robber(actor, hex)?;
        self.resolve_steal_targets(actor);
        Ok(())
    }

    /// Shared robber movement for MOVE_ROBBER and the knight card.
    fn relocate_robber(&mut self, actor: PlayerId, hex: HexCoord) -> Result<(), RuleError> {
        if !layout().is_land_hex(&hex) {
            return Err(RuleError::UnknownHex);
        }
        if hex == self.board.robber() {
            return Err(RuleError::RobberSamePlace);
        }
        let from = self.board.robber();
        self.board.move_robber(hex);
        self.log.push(GameEvent::RobberMoved {
            player: actor,
            from,
            to: hex,
        });
        Ok(())
    }

    /// After the robber lands: no victims continues the turn, a single victim
    /// is robbed automatically, several await a STEAL choice.
    fn resolve_steal_targets(&mut self, actor: PlayerId) {
        let candidates: Vec<PlayerId> = self
            .board
            .players_on_hex(&self.board.robber())
            .into_iter()
            .filter(|&p| p != actor && self.player(p).resources.total() > 0)
            .collect();

        match candidates.as_slice() {
            [] => self.finish_robber_turn(),
            [victim] => {
                self.steal_random_card(actor, *victim);
                self.finish_robber_turn();
            }
            _ => {
                self.must_steal_from = candidates;
                self.set_main_sub(MainSubPhase::Steal);
            }
        }
    }

    /// A knight played before the roll returns to ROLL_DICE; otherwise the
    /// turn continues in TRADE_BUILD_PLAY.
    fn finish_robber_turn(&mut self) {
        if self.dice_roll.is_none() {
            self.set_main_sub(MainSubPhase::RollDice);
        } else {
            self.set_main_sub(MainSubPhase::TradeBuildPlay);
        }
    }

    fn steal(&mut self, actor: PlayerId, target: PlayerId) -> Result<(), RuleError> {
        self.require_main(MainSubPhase::Steal)?;
        self.require_current(actor)?;
        if !self.must_steal_from.contains(&target) {
            return Err(RuleError::InvalidStealTarget);
        }

        self.steal_random_card(actor, target);
        self.must_steal_from.clear();
        self.finish_robber_turn();
        Ok(())
    }

    /// Draw one card uniformly from the victim's hand (one of N cards, not
    /// one of 5 types) and move it to the thief.
    fn steal_random_card(&mut self, thief: PlayerId, victim: PlayerId) {
        let cards = self.player(victim).resources.flatten();
        if cards.is_empty() {
            return;
        }
        let mut rng = draw_rng(&mut self.seed);
        let resource = cards[rng.gen_range(0..cards.len())];

        let taken = ResourceBundle::single(resource, 1);
        self.player_mut(victim).resources.subtract_bundle(&taken);
        self.player_mut(thief).resources.add_bundle(&taken);
        self.log.push(GameEvent::ResourceStolen {
            thief,
            victim,
            resource: None,
        });
    }

    // ==================== Building ====================

    fn build_settlement(&mut self, actor: PlayerId, vertex: VertexCoord) -> Result<(), RuleError> {
        self.require_main(MainSubPhase::TradeBuildPlay)?;
        self.require_current(actor)?;

        let vertex = vertex.canonical();
        if !layout().is_land_vertex(&vertex) {
            return Err(RuleError::UnknownVertex);
        }
        if self.board.building(&vertex).is_some() {
            return Err(RuleError::Occupied);
        }
        if !self.board.satisfies_distance_rule(&vertex) {
            return Err(RuleError::DistanceRule);
        }
        if !self.board.touches_own_road(&vertex, actor) {
            return Err(RuleError::SettlementNotConnected);
        }
        if self.player(actor).settlements_remaining == 0 {
            return Err(RuleError::OutOfPieces("settlement"));
        }
        self.pay(actor, &costs::settlement(), "settlement")?;

        self.board.place_settlement(vertex, actor);
        self.player_mut(actor).settlements_remaining -= 1;
        self.grant_port_access(actor, vertex);
        self.log.push(GameEvent::SettlementPlaced {
            player: actor,
            vertex,
        });

        // A new settlement can sever an enemy road at this vertex.
        self.adjudicate_longest_road();
        Ok(())
    }

    fn build_road(&mut self, actor: PlayerId, edge: EdgeCoord) -> Result<(), RuleError> {
        self.require_main(MainSubPhase::TradeBuildPlay)?;
        self.require_current(actor)?;

        let edge = edge.canonical();
        if !layout().is_land_edge(&edge) {
            return Err(RuleError::UnknownEdge);
        }
        if self.board.road_owner(&edge).is_some() {
            return Err(RuleError::Occupied);
        }
        if !self.board.road_connects(&edge, actor) {
            return Err(RuleError::RoadNotConnected);
        }
        if self.player(actor).roads_remaining == 0 {
            return Err(RuleError::OutOfPieces("road"));
        }

        if self.road_building_roads_left > 0 {
            self.road_building_roads_left -= 1;
        } else {
            self.pay(actor, &costs::road(), "road")?;
        }

        self.board.place_road(edge, actor);
        self.player_mut(actor).roads_remaining -= 1;
        self.log.push(GameEvent::RoadPlaced {
            player: actor,
            edge,
        });

        self.adjudicate_longest_road();
        Ok(())
    }

    fn build_city(&mut self, actor: PlayerId, vertex: VertexCoord) -> Result<(), RuleError> {
        self.require_main(MainSubPhase::TradeBuildPlay)?;
        self.require_current(actor)?;

        let vertex = vertex.canonical();
        let owns_settlement = matches!(
            self.board.building(&vertex),
            Some(Building {
                kind: BuildingKind::Settlement,
                owner,
            }) if *owner == actor
        );
        if !owns_settlement {
            return Err(RuleError::NotYourSettlement);
        }
        if self.player(actor).cities_remaining == 0 {
            return Err(RuleError::OutOfPieces("city"));
        }
        self.pay(actor, &costs::city(), "city")?;

        self.board.upgrade_to_city(vertex, actor);
        let player = self.player_mut(actor);
        player.cities_remaining -= 1;
        // The settlement piece under the city returns to the reserve.
        player.settlements_remaining += 1;
        self.log.push(GameEvent::CityPlaced {
            player: actor,
            vertex,
        });
        Ok(())
    }

    fn buy_dev_card(&mut self, actor: PlayerId) -> Result<(), RuleError> {
        self.require_main(MainSubPhase::TradeBuildPlay)?;
        self.require_current(actor)?;
        if self.dev_deck.is_empty() {
            return Err(RuleError::DeckEmpty);
        }
        self.pay(actor, &costs::dev_card(), "development card")?;

        let kind = self.dev_deck.remove(0);
        let turn_acquired = self.turn_number;
        self.player_mut(actor).dev_cards.push(DevCard {
            kind,
            turn_acquired,
        });
        self.dev_card_bought_this_turn = true;
        self.log.push(GameEvent::DevCardBought { player: actor });
        Ok(())
    }

    /// Deduct a cost from the player, returning it to the bank.
    fn pay(
        &mut self,
        actor: PlayerId,
        cost: &ResourceBundle,
        what: &'static str,
    ) -> Result<(), RuleError> {
        if !self.player(actor).resources.covers(cost) {
            return Err(RuleError::CannotAfford(what));
        }
        self.player_mut(actor).resources.subtract_bundle(cost);
        self.bank.receive(cost);
        Ok(())
    }

    /// Record port access for every port edge touching this vertex.
    fn grant_port_access(&mut self, actor: PlayerId, vertex: VertexCoord) {
        for kind in self.board.port_kinds_at_vertex(&vertex) {
            self.player_mut(actor).ports.insert(kind);
        }
    }

    // ==================== Development cards ====================

    /// Common checks for playing a non-VP card; removes the card on success.
    fn take_playable_card(&mut self, actor: PlayerId, kind: DevCardKind) -> Result<(), RuleError> {
        if self.dev_card_played_this_turn {
            return Err(RuleError::DevCardAlreadyPlayed);
        }
        let turn = self.turn_number;
        let player = self.player_mut(actor);
        if !player.has_playable_dev_card(kind, turn) {
            // Distinguish "bought this turn" from "never had it".
            return if player.dev_cards.iter().any(|c| c.kind == kind) {
                Err(RuleError::CardTooNew)
            } else {
                Err(RuleError::NoSuchCard)
            };
        }
        player.remove_dev_card(kind, turn);
        self.dev_card_played_this_turn = true;
        Ok(())
    }

    fn play_knight(&mut self, actor: PlayerId, robber_hex: HexCoord) -> Result<(), RuleError> {
        // The knight alone may be played before the roll.
        match self.main_sub() {
            Some(MainSubPhase::RollDice) | Some(MainSubPhase::TradeBuildPlay) => {}
            _ => return Err(RuleError::WrongPhase),
        }
        self.require_current(actor)?;
        if !layout().is_land_hex(&robber_hex) {
            return Err(RuleError::UnknownHex);
        }
        if robber_hex == self.board.robber() {
            return Err(RuleError::RobberSamePlace);
        }
        self.take_playable_card(actor, DevCardKind::Knight)?;

        self.player_mut(actor).knights_played += 1;
        self.log.push(GameEvent::KnightPlayed { player: actor });
        self.adjudicate_largest_army();

        self.relocate_robber(actor, robber_hex)?;
        self.resolve_steal_targets(actor);
        Ok(())
    }

    fn play_road_building(&mut self, actor: PlayerId) -> Result<(), RuleError> {
        self.require_main(MainSubPhase::TradeBuildPlay)?;
        self.require_current(actor)?;
        if self.player(actor).roads_remaining == 0 {
            return Err(RuleError::OutOfPieces("road"));
        }
        self.take_playable_card(actor, DevCardKind::RoadBuilding)?;

        let free_roads = self.player(actor).roads_remaining.min(2) as u8;
        self.road_building_roads_left = free_roads;
        self.log.push(GameEvent::RoadBuildingPlayed {
            player: actor,
            free_roads,
        });
        Ok(())
    }

    fn play_year_of_plenty(
        &mut self,
        actor: PlayerId,
        resources: [Resource; 2],
    ) -> Result<(), RuleError> {
        self.require_main(MainSubPhase::TradeBuildPlay)?;
        self.require_current(actor)?;

        let mut wanted = ResourceBundle::new();
        wanted.add(resources[0], 1);
        wanted.add(resources[1], 1);
        if !self.bank.can_dispense(&wanted) {
            return Err(RuleError::BankShort);
        }
        self.take_playable_card(actor, DevCardKind::YearOfPlenty)?;

        self.bank.dispense(&wanted);
        self.player_mut(actor).resources.add_bundle(&wanted);
        self.log.push(GameEvent::YearOfPlentyPlayed {
            player: actor,
            resources,
        });
        Ok(())
    }

    fn play_monopoly(&mut self, actor: PlayerId, resource: Resource) -> Result<(), RuleError> {
        self.require_main(MainSubPhase::TradeBuildPlay)?;
        self.require_current(actor)?;
        self.take_playable_card(actor, DevCardKind::Monopoly)?;

        // Every other hand empties of that resource, straight to the actor;
        // the bank is not involved.
        let mut collected = 0;
        for player in &mut self.players {
            if player.id != actor {
                collected += player.resources.get(resource);
                player.resources.set(resource, 0);
            }
        }
        self.player_mut(actor).resources.add(resource, collected);
        self.log.push(GameEvent::MonopolyPlayed {
            player: actor,
            resource,
            collected,
        });
        Ok(())
    }

    // ==================== Trading ====================

    fn propose_trade(
        &mut self,
        actor: PlayerId,
        offering: &ResourceBundle,
        requesting: &ResourceBundle,
    ) -> Result<(), RuleError> {
        self.require_main(MainSubPhase::TradeBuildPlay)?;
        self.require_current(actor)?;
        if offering.is_empty() || requesting.is_empty() {
            return Err(RuleError::EmptyTrade);
        }
        if !self.player(actor).resources.covers(offering) {
            return Err(RuleError::MissingResources);
        }

        let id = self.next_trade_id;
        self.next_trade_id += 1;
        let responses = self
            .players
            .iter()
            .filter(|p| p.id != actor)
            .map(|p| (p.id, TradeResponse::Pending))
            .collect();
        let offer = TradeOffer {
            id,
            proposer: actor,
            offering: *offering,
            requesting: *requesting,
            responses,
            status: TradeStatus::Open,
        };
        self.trades.push(offer.clone());
        self.log.push(GameEvent::TradeProposed { offer });
        Ok(())
    }

    fn find_trade(&mut self, trade_id: TradeId) -> Result<&mut TradeOffer, RuleError> {
        self.trades
            .iter_mut()
            .find(|t| t.id == trade_id)
            .ok_or(RuleError::UnknownTrade)
    }

    fn respond_to_trade(
        &mut self,
        actor: PlayerId,
        trade_id: TradeId,
        accept: bool,
    ) -> Result<(), RuleError> {
        // Responses are the one action open to any seat in any MAIN sub-phase.
        if self.main_sub().is_none() {
            return Err(RuleError::WrongPhase);
        }
        let offer = self.find_trade(trade_id)?;
        if offer.proposer == actor {
            return Err(RuleError::OwnTrade);
        }
        if !offer.is_open() {
            return Err(RuleError::TradeNotOpen);
        }

        let response = if accept {
            TradeResponse::Accepted
        } else {
            TradeResponse::Rejected
        };
        offer.responses.insert(actor, response);
        self.log.push(GameEvent::TradeResponded {
            trade_id,
            player: actor,
            accepted: accept,
        });
        Ok(())
    }

    fn confirm_trade(
        &mut self,
        actor: PlayerId,
        trade_id: TradeId,
        counterparty: PlayerId,
    ) -> Result<(), RuleError> {
        self.require_main(MainSubPhase::TradeBuildPlay)?;
        self.require_current(actor)?;
        if counterparty as usize >= self.players.len() {
            return Err(RuleError::UnknownPlayer);
        }

        let offer = self.find_trade(trade_id)?;
        if offer.proposer != actor {
            return Err(RuleError::NotYourTrade);
        }
        if !offer.is_open() {
            return Err(RuleError::TradeNotOpen);
        }
        if offer.response(counterparty) != Some(TradeResponse::Accepted) {
            return Err(RuleError::CounterpartyNotAccepted);
        }
        let offering = offer.offering;
        let requesting = offer.requesting;

        // Both hands are re-checked at confirm time; they may have changed
        // since the offer was opened.
        if !self.player(actor).resources.covers(&offering) {
            return Err(RuleError::MissingResources);
        }
        if !self.player(counterparty).resources.covers(&requesting) {
            return Err(RuleError::CounterpartyMissingResources);
        }

        self.player_mut(actor).resources.subtract_bundle(&offering);
        self.player_mut(actor).resources.add_bundle(&requesting);
        self.player_mut(counterparty)
            .resources
            .subtract_bundle(&requesting);
        self.player_mut(counterparty)
            .resources
            .add_bundle(&offering);

        self.find_trade(trade_id)?.status = TradeStatus::Executed;
        self.log.push(GameEvent::TradeExecuted {
            trade_id,
            proposer: actor,
            counterparty,
        });
        Ok(())
    }

    fn cancel_trade(&mut self, actor: PlayerId, trade_id: TradeId) -> Result<(), RuleError> {
        let offer = self.find_trade(trade_id)?;
        if offer.proposer != actor {
            return Err(RuleError::NotYourTrade);
        }
        if !offer.is_open() {
            return Err(RuleError::TradeNotOpen);
        }
        offer.status = TradeStatus::Cancelled;
        self.log.push(GameEvent::TradeCancelled { trade_id });
        Ok(())
    }

    fn bank_trade(
        &mut self,
        actor: PlayerId,
        giving: &ResourceBundle,
        receiving: &ResourceBundle,
    ) -> Result<(), RuleError> {
        self.require_main(MainSubPhase::TradeBuildPlay)?;
        self.require_current(actor)?;

        let (give_resource, give_count) =
            single_resource(giving).ok_or(RuleError::MixedBankTrade)?;
        let (receive_resource, receive_count) =
            single_resource(receiving).ok_or(RuleError::BadBankTradeReceive)?;
        if receive_count != 1 || receive_resource == give_resource {
            return Err(RuleError::BadBankTradeReceive);
        }

        let rate = self.player(actor).trade_rate(give_resource);
        if give_count != rate {
            return Err(RuleError::WrongTradeRate(rate));
        }
        if !self.player(actor).resources.covers(giving) {
            return Err(RuleError::MissingResources);
        }
        if !self.bank.can_dispense(receiving) {
            return Err(RuleError::BankShort);
        }

        self.player_mut(actor).resources.subtract_bundle(giving);
        self.bank.receive(giving);
        self.bank.dispense(receiving);
        self.player_mut(actor).resources.add_bundle(receiving);
        self.log.push(GameEvent::BankTradeExecuted {
            player: actor,
            gave: give_resource,
            gave_count: give_count,
            received: receive_resource,
        });
        Ok(())
    }

    // ==================== Turn management ====================

    fn end_turn(&mut self, actor: PlayerId) -> Result<(), RuleError> {
        self.require_main(MainSubPhase::TradeBuildPlay)?;
        self.require_current(actor)?;

        // Open offers die with the turn that created them.
        for offer in &mut self.trades {
            if offer.is_open() {
                offer.status = TradeStatus::Cancelled;
                self.log.push(GameEvent::TradeCancelled { trade_id: offer.id });
            }
        }
        self.trades.clear();

        self.dice_roll = None;
        self.dev_card_played_this_turn = false;
        self.dev_card_bought_this_turn = false;
        self.road_building_roads_left = 0;
        self.must_steal_from.clear();
        self.pending_discards.clear();

        let next_player = (self.current_player + 1) % self.players.len() as PlayerId;
        self.log.push(GameEvent::TurnEnded {
            player: actor,
            next_player,
        });
        self.current_player = next_player;
        self.turn_number += 1;
        self.set_main_sub(MainSubPhase::RollDice);
        Ok(())
    }

    // ==================== Awards & victory ====================

    /// Recompute every player's longest road and settle the award per the
    /// transfer rules: the holder keeps it while tied for the lead, a unique
    /// surpasser takes it, and a tie after the holder falls leaves it vacant.
    fn adjudicate_longest_road(&mut self) {
        for i in 0..self.players.len() {
            let length = self.board.longest_road(i as PlayerId);
            self.players[i].longest_road_length = length;
        }

        let previous = self
            .players
            .iter()
            .find(|p| p.has_longest_road)
            .map(|p| p.id);
        let best = self
            .players
            .iter()
            .map(|p| p.longest_road_length)
            .max()
            .unwrap_or(0);
        let leaders: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|p| best >= MIN_LONGEST_ROAD && p.longest_road_length == best)
            .map(|p| p.id)
            .collect();

        let holder = Self::settle_award(previous, &leaders);
        if holder != previous {
            for player in &mut self.players {
                player.has_longest_road = Some(player.id) == holder;
            }
            self.log.push(GameEvent::LongestRoadChanged {
                previous,
                current: holder,
                length: best,
            });
        }
    }

    fn adjudicate_largest_army(&mut self) {
        let previous = self
            .players
            .iter()
            .find(|p| p.has_largest_army)
            .map(|p| p.id);
        let best = self
            .players
            .iter()
            .map(|p| p.knights_played)
            .max()
            .unwrap_or(0);
        let leaders: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|p| best >= MIN_LARGEST_ARMY && p.knights_played == best)
            .map(|p| p.id)
            .collect();

        let holder = Self::settle_award(previous, &leaders);
        if holder != previous {
            for player in &mut self.players {
                player.has_largest_army = Some(player.id) == holder;
            }
            self.log.push(GameEvent::LargestArmyChanged {
                previous,
                current: holder,
                knights: best,
            });
        }
    }

    /// Shared transfer rules for both awards.
    fn settle_award(previous: Option<PlayerId>, leaders: &[PlayerId]) -> Option<PlayerId> {
        match (previous, leaders) {
            (_, []) => None,
            (Some(holder), leaders) if leaders.contains(&holder) => Some(holder),
            (_, [unique]) => Some(*unique),
            // Several tied and none of them the holder: nobody gets it.
            _ => None,
        }
    }

    /// Only the current player can win; hidden VP cards keep other seats'
    /// scores below the line until their own turn.
    fn check_victory(&mut self) {
        if self.winner.is_some() {
            return;
        }
        let player = self.current_player;
        let victory_points = self.victory_points(player);
        if victory_points >= VICTORY_POINTS_TO_WIN {
            self.winner = Some(player);
            self.phase = GamePhase::GameOver;
            self.log.push(GameEvent::GameWon {
                player,
                victory_points,
            });
        }
    }
}

/// The sole (resource, count) entry of a bundle, if it has exactly one type.
fn single_resource(bundle: &ResourceBundle) -> Option<(Resource, u32)> {
    let mut entries = bundle.entries();
    let first = entries.next()?;
    if entries.next().is_some() {
        return None;
    }
    Some(first)
}

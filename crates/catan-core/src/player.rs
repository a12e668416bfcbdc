//! Player state: resources, development cards, pieces, awards.

use crate::board::PortKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Seat index of a player (0-3).
pub type PlayerId = u8;

/// The five tradeable resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Wood,
    Brick,
    Sheep,
    Wheat,
    Ore,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Wood,
        Resource::Brick,
        Resource::Sheep,
        Resource::Wheat,
        Resource::Ore,
    ];
}

/// A counted bundle of resources; used for hands, costs, trade sides and the
/// bank supply alike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceBundle {
    pub wood: u32,
    pub brick: u32,
    pub sheep: u32,
    pub wheat: u32,
    pub ore: u32,
}

impl ResourceBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_amounts(wood: u32, brick: u32, sheep: u32, wheat: u32, ore: u32) -> Self {
        Self {
            wood,
            brick,
            sheep,
            wheat,
            ore,
        }
    }

    /// A bundle holding `amount` of a single resource.
    pub fn single(resource: Resource, amount: u32) -> Self {
        let mut bundle = Self::new();
        bundle.add(resource, amount);
        bundle
    }

    pub fn total(&self) -> u32 {
        self.wood + self.brick + self.sheep + self.wheat + self.ore
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn get(&self, resource: Resource) -> u32 {
        match resource {
            Resource::Wood => self.wood,
            Resource::Brick => self.brick,
            Resource::Sheep => self.sheep,
            Resource::Wheat => self.wheat,
            Resource::Ore => self.ore,
        }
    }

    pub fn set(&mut self, resource: Resource, count: u32) {
        match resource {
            Resource::Wood => self.wood = count,
            Resource::Brick => self.brick = count,
            Resource::Sheep => self.sheep = count,
            Resource::Wheat => self.wheat = count,
            Resource::Ore => self.ore = count,
        }
    }

    pub fn add(&mut self, resource: Resource, amount: u32) {
        self.set(resource, self.get(resource) + amount);
    }

    pub fn add_bundle(&mut self, other: &ResourceBundle) {
        for resource in Resource::ALL {
            self.add(resource, other.get(resource));
        }
    }

    /// Whether every count in `cost` is covered.
    pub fn covers(&self, cost: &ResourceBundle) -> bool {
        Resource::ALL.iter().all(|&r| self.get(r) >= cost.get(r))
    }

    /// Subtract `cost`; caller must have checked [`covers`](Self::covers).
    pub fn subtract_bundle(&mut self, cost: &ResourceBundle) {
        debug_assert!(self.covers(cost));
        for resource in Resource::ALL {
            self.set(resource, self.get(resource) - cost.get(resource));
        }
    }

    /// The distinct resource types present, with counts.
    pub fn entries(&self) -> impl Iterator<Item = (Resource, u32)> + '_ {
        Resource::ALL
            .into_iter()
            .map(|r| (r, self.get(r)))
            .filter(|&(_, n)| n > 0)
    }

    /// Expand into one entry per card, for uniform draws over the multiset.
    pub fn flatten(&self) -> Vec<Resource> {
        let mut cards = Vec::with_capacity(self.total() as usize);
        for (resource, count) in self.entries() {
            cards.extend(std::iter::repeat(resource).take(count as usize));
        }
        cards
    }
}

/// Building and card costs.
pub mod costs {
    use super::ResourceBundle;

    /// Road: 1 wood, 1 brick.
    pub fn road() -> ResourceBundle {
        ResourceBundle::with_amounts(1, 1, 0, 0, 0)
    }

    /// Settlement: 1 wood, 1 brick, 1 sheep, 1 wheat.
    pub fn settlement() -> ResourceBundle {
        ResourceBundle::with_amounts(1, 1, 1, 1, 0)
    }

    /// City upgrade: 2 wheat, 3 ore.
    pub fn city() -> ResourceBundle {
        ResourceBundle::with_amounts(0, 0, 0, 2, 3)
    }

    /// Development card: 1 sheep, 1 wheat, 1 ore.
    pub fn dev_card() -> ResourceBundle {
        ResourceBundle::with_amounts(0, 0, 1, 1, 1)
    }
}

/// Development card types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DevCardKind {
    Knight,
    VictoryPoint,
    RoadBuilding,
    YearOfPlenty,
    Monopoly,
}

impl DevCardKind {
    /// The full 25-card deck, unshuffled.
    pub fn standard_deck() -> Vec<DevCardKind> {
        const DISTRIBUTION: &[(DevCardKind, usize)] = &[
            (DevCardKind::Knight, 14),
            (DevCardKind::VictoryPoint, 5),
            (DevCardKind::RoadBuilding, 2),
            (DevCardKind::YearOfPlenty, 2),
            (DevCardKind::Monopoly, 2),
        ];
        let mut deck = Vec::with_capacity(25);
        for &(kind, count) in DISTRIBUTION {
            deck.extend(std::iter::repeat(kind).take(count));
        }
        deck
    }
}

/// A development card in a player's hand, stamped with the turn it was bought
/// so same-turn plays can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevCard {
    pub kind: DevCardKind,
    pub turn_acquired: u32,
}

/// Player color, assigned by join order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerColor {
    Red,
    Blue,
    White,
    Orange,
}

impl PlayerColor {
    /// Color for a seat index.
    pub fn for_seat(id: PlayerId) -> Self {
        match id % 4 {
            0 => PlayerColor::Red,
            1 => PlayerColor::Blue,
            2 => PlayerColor::White,
            _ => PlayerColor::Orange,
        }
    }
}

/// One seat's complete state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: PlayerColor,
    pub resources: ResourceBundle,
    pub dev_cards: Vec<DevCard>,
    pub knights_played: u32,
    pub has_longest_road: bool,
    pub has_largest_army: bool,
    /// Cached length of this player's longest road, refreshed on every road
    /// or settlement placement.
    pub longest_road_length: u32,
    pub settlements_remaining: u32,
    pub cities_remaining: u32,
    pub roads_remaining: u32,
    /// Port types reachable from this player's buildings.
    pub ports: BTreeSet<PortKind>,
    pub connected: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            color: PlayerColor::for_seat(id),
            resources: ResourceBundle::new(),
            dev_cards: Vec::new(),
            knights_played: 0,
            has_longest_road: false,
            has_largest_army: false,
            longest_road_length: 0,
            settlements_remaining: 5,
            cities_remaining: 4,
            roads_remaining: 15,
            ports: BTreeSet::new(),
            connected: true,
        }
    }

    /// Count of hidden victory-point cards.
    pub fn victory_point_cards(&self) -> u32 {
        self.dev_cards
            .iter()
            .filter(|c| c.kind == DevCardKind::VictoryPoint)
            .count() as u32
    }

    /// Whether the player holds a card of `kind` bought before `turn`.
    pub fn has_playable_dev_card(&self, kind: DevCardKind, turn: u32) -> bool {
        self.dev_cards
            .iter()
            .any(|c| c.kind == kind && c.turn_acquired < turn)
    }

    /// Remove one playable card of `kind` (oldest first). Returns false when
    /// no such card is held.
    pub fn remove_dev_card(&mut self, kind: DevCardKind, turn: u32) -> bool {
        let pos = self
            .dev_cards
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == kind && c.turn_acquired < turn)
            .min_by_key(|(_, c)| c.turn_acquired)
            .map(|(i, _)| i);
        match pos {
            Some(i) => {
                self.dev_cards.remove(i);
                true
            }
            None => false,
        }
    }

    /// The player's best bank-trade rate for a resource: 2 with a matching
    /// 2:1 port, 3 with any generic port, otherwise 4.
    pub fn trade_rate(&self, resource: Resource) -> u32 {
        if self.ports.contains(&PortKind::Resource(resource)) {
            2
        } else if self.ports.contains(&PortKind::Generic) {
            3
        } else {
            4
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_totals_and_covers() {
        let hand = ResourceBundle::with_amounts(1, 2, 3, 4, 5);
        assert_eq!(hand.total(), 15);
        assert!(hand.covers(&ResourceBundle::with_amounts(1, 1, 1, 1, 1)));
        assert!(!hand.covers(&ResourceBundle::with_amounts(2, 0, 0, 0, 0)));
    }

    #[test]
    fn bundle_subtract() {
        let mut hand = ResourceBundle::with_amounts(3, 3, 3, 3, 3);
        hand.subtract_bundle(&ResourceBundle::with_amounts(1, 0, 2, 0, 3));
        assert_eq!(hand, ResourceBundle::with_amounts(2, 3, 1, 3, 0));
    }

    #[test]
    fn bundle_flatten_matches_counts() {
        let hand = ResourceBundle::with_amounts(2, 0, 1, 0, 0);
        let cards = hand.flatten();
        assert_eq!(cards.len(), 3);
        assert_eq!(cards.iter().filter(|&&r| r == Resource::Wood).count(), 2);
        assert_eq!(cards.iter().filter(|&&r| r == Resource::Sheep).count(), 1);
    }

    #[test]
    fn building_costs() {
        assert_eq!(costs::road().total(), 2);
        assert_eq!(costs::settlement().total(), 4);
        assert_eq!(costs::city().total(), 5);
        assert_eq!(costs::dev_card().total(), 3);
    }

    #[test]
    fn standard_deck_distribution() {
        let deck = DevCardKind::standard_deck();
        assert_eq!(deck.len(), 25);
        assert_eq!(
            deck.iter().filter(|&&k| k == DevCardKind::Knight).count(),
            14
        );
        assert_eq!(
            deck.iter()
                .filter(|&&k| k == DevCardKind::VictoryPoint)
                .count(),
            5
        );
    }

    #[test]
    fn dev_card_playable_only_after_purchase_turn() {
        let mut player = Player::new(0, "Test".to_string());
        player.dev_cards.push(DevCard {
            kind: DevCardKind::Knight,
            turn_acquired: 3,
        });

        assert!(!player.has_playable_dev_card(DevCardKind::Knight, 3));
        assert!(player.has_playable_dev_card(DevCardKind::Knight, 4));
        assert!(!player.remove_dev_card(DevCardKind::Knight, 3));
        assert!(player.remove_dev_card(DevCardKind::Knight, 4));
        assert!(player.dev_cards.is_empty());
    }

    #[test]
    fn remove_dev_card_prefers_oldest() {
        let mut player = Player::new(0, "Test".to_string());
        for turn in [5, 2, 4] {
            player.dev_cards.push(DevCard {
                kind: DevCardKind::Knight,
                turn_acquired: turn,
            });
        }
        assert!(player.remove_dev_card(DevCardKind::Knight, 10));
        assert!(!player.dev_cards.iter().any(|c| c.turn_acquired == 2));
        assert_eq!(player.dev_cards.len(), 2);
    }

    #[test]
    fn trade_rate_follows_ports() {
        let mut player = Player::new(1, "Trader".to_string());
        assert_eq!(player.trade_rate(Resource::Ore), 4);

        player.ports.insert(PortKind::Generic);
        assert_eq!(player.trade_rate(Resource::Ore), 3);

        player.ports.insert(PortKind::Resource(Resource::Ore));
        assert_eq!(player.trade_rate(Resource::Ore), 2);
        assert_eq!(player.trade_rate(Resource::Wood), 3);
    }

    #[test]
    fn colors_follow_join_order() {
        assert_eq!(PlayerColor::for_seat(0), PlayerColor::Red);
        assert_eq!(PlayerColor::for_seat(1), PlayerColor::Blue);
        assert_eq!(PlayerColor::for_seat(2), PlayerColor::White);
        assert_eq!(PlayerColor::for_seat(3), PlayerColor::Orange);
    }

    #[test]
    fn resource_wire_names_are_lowercase() {
        assert_eq!(serde_json::to_string(&Resource::Wood).unwrap(), "\"wood\"");
        assert_eq!(
            serde_json::from_str::<Resource>("\"ore\"").unwrap(),
            Resource::Ore
        );
    }
}

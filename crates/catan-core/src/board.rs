//! Board state: terrain tiles, number tokens, buildings, roads, ports and the
//! robber, plus the geometric rule checks that read them.
//!
//! Generation is fully seeded: the same seed always yields the same board,
//! and the seed is advanced in place for every shuffle so the caller's RNG
//! cursor moves with it.

use crate::hex::{EdgeCoord, HexCoord, VertexCoord};
use crate::layout::{layout, LAND_HEXES};
use crate::player::{PlayerId, Resource, ResourceBundle};
use crate::rng::draw_rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Terrain of a land hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terrain {
    Forest,
    Pasture,
    Fields,
    Hills,
    Mountains,
    Desert,
}

impl Terrain {
    /// The resource this terrain produces, if any.
    pub fn resource(self) -> Option<Resource> {
        match self {
            Terrain::Forest => Some(Resource::Wood),
            Terrain::Pasture => Some(Resource::Sheep),
            Terrain::Fields => Some(Resource::Wheat),
            Terrain::Hills => Some(Resource::Brick),
            Terrain::Mountains => Some(Resource::Ore),
            Terrain::Desert => None,
        }
    }
}

/// The 19-tile terrain pool: 4 forest, 4 pasture, 4 fields, 3 hills,
/// 3 mountains, 1 desert.
const TERRAIN_POOL: [Terrain; 19] = [
    Terrain::Forest,
    Terrain::Forest,
    Terrain::Forest,
    Terrain::Forest,
    Terrain::Pasture,
    Terrain::Pasture,
    Terrain::Pasture,
    Terrain::Pasture,
    Terrain::Fields,
    Terrain::Fields,
    Terrain::Fields,
    Terrain::Fields,
    Terrain::Hills,
    Terrain::Hills,
    Terrain::Hills,
    Terrain::Mountains,
    Terrain::Mountains,
    Terrain::Mountains,
    Terrain::Desert,
];

/// The 18 number tokens for the non-desert hexes.
const TOKEN_POOL: [u8; 18] = [2, 3, 3, 4, 4, 5, 5, 6, 6, 8, 8, 9, 9, 10, 10, 11, 11, 12];

/// A port's trade offer: 3:1 on anything, or 2:1 for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PortKind {
    Generic,
    Resource(Resource),
}

impl PortKind {
    /// How many of one resource this port trades for one of another.
    pub fn rate(&self) -> u32 {
        match self {
            PortKind::Generic => 3,
            PortKind::Resource(_) => 2,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            PortKind::Generic => "generic",
            PortKind::Resource(Resource::Wood) => "wood",
            PortKind::Resource(Resource::Brick) => "brick",
            PortKind::Resource(Resource::Sheep) => "sheep",
            PortKind::Resource(Resource::Wheat) => "wheat",
            PortKind::Resource(Resource::Ore) => "ore",
        }
    }
}

impl From<PortKind> for String {
    fn from(kind: PortKind) -> Self {
        kind.as_str().to_string()
    }
}

impl TryFrom<String> for PortKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "generic" => Ok(PortKind::Generic),
            "wood" => Ok(PortKind::Resource(Resource::Wood)),
            "brick" => Ok(PortKind::Resource(Resource::Brick)),
            "sheep" => Ok(PortKind::Resource(Resource::Sheep)),
            "wheat" => Ok(PortKind::Resource(Resource::Wheat)),
            "ore" => Ok(PortKind::Resource(Resource::Ore)),
            other => Err(format!("unknown port kind: {other}")),
        }
    }
}

/// A port placed on one of the 9 fixed coastal edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub edge: EdgeCoord,
    pub kind: PortKind,
}

/// A land hex with its terrain and number token (desert has none).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub coord: HexCoord,
    pub terrain: Terrain,
    pub token: Option<u8>,
}

/// What stands on a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildingKind {
    Settlement,
    City,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub kind: BuildingKind,
    pub owner: PlayerId,
}

impl Building {
    /// Resources produced per matching roll: 1 for a settlement, 2 for a city.
    pub fn yield_count(&self) -> u32 {
        match self.kind {
            BuildingKind::Settlement => 1,
            BuildingKind::City => 2,
        }
    }
}

/// The complete board.
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    tiles: HashMap<HexCoord, Tile>,
    buildings: HashMap<VertexCoord, Building>,
    roads: HashMap<EdgeCoord, PlayerId>,
    ports: Vec<Port>,
    robber: HexCoord,
}

impl Board {
    /// Generate a board from the seed, advancing it for every shuffle.
    ///
    /// Terrains are dealt over [`LAND_HEXES`] in enumeration order; tokens
    /// over the non-desert hexes. A token layout placing two 6/8 tokens on
    /// adjacent hexes is resampled up to 1000 times and then repaired by
    /// swapping offenders with random non-6/8 tokens, so generation always
    /// terminates with a legal board.
    pub fn generate(seed: &mut u64) -> Board {
        let mut terrains = TERRAIN_POOL.to_vec();
        terrains.shuffle(&mut draw_rng(seed));

        let non_desert: Vec<HexCoord> = LAND_HEXES
            .iter()
            .zip(&terrains)
            .filter(|(_, &t)| t != Terrain::Desert)
            .map(|(&c, _)| c)
            .collect();

        let mut tokens = TOKEN_POOL.to_vec();
        for _ in 0..1000 {
            tokens.shuffle(&mut draw_rng(seed));
            if red_tokens_separated(&non_desert, &tokens) {
                break;
            }
        }
        if !red_tokens_separated(&non_desert, &tokens) {
            repair_red_tokens(&non_desert, &mut tokens, seed);
        }

        let mut tiles = HashMap::with_capacity(19);
        let mut robber = LAND_HEXES[0];
        let mut token_iter = tokens.into_iter();
        for (&coord, &terrain) in LAND_HEXES.iter().zip(&terrains) {
            let token = if terrain == Terrain::Desert {
                robber = coord;
                None
            } else {
                token_iter.next()
            };
            tiles.insert(
                coord,
                Tile {
                    coord,
                    terrain,
                    token,
                },
            );
        }

        let mut port_kinds = vec![
            PortKind::Generic,
            PortKind::Generic,
            PortKind::Generic,
            PortKind::Generic,
            PortKind::Resource(Resource::Wood),
            PortKind::Resource(Resource::Brick),
            PortKind::Resource(Resource::Sheep),
            PortKind::Resource(Resource::Wheat),
            PortKind::Resource(Resource::Ore),
        ];
        port_kinds.shuffle(&mut draw_rng(seed));
        let ports = layout()
            .port_edges()
            .iter()
            .zip(port_kinds)
            .map(|(&edge, kind)| Port { edge, kind })
            .collect();

        Board {
            tiles,
            buildings: HashMap::new(),
            roads: HashMap::new(),
            ports,
            robber,
        }
    }

    // ==================== Queries ====================

    pub fn tile(&self, coord: &HexCoord) -> Option<&Tile> {
        self.tiles.get(coord)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    pub fn building(&self, vertex: &VertexCoord) -> Option<&Building> {
        self.buildings.get(&vertex.canonical())
    }

    pub fn buildings(&self) -> impl Iterator<Item = (&VertexCoord, &Building)> {
        self.buildings.iter()
    }

    pub fn road_owner(&self, edge: &EdgeCoord) -> Option<PlayerId> {
        self.roads.get(&edge.canonical()).copied()
    }

    pub fn roads(&self) -> impl Iterator<Item = (&EdgeCoord, &PlayerId)> {
        self.roads.iter()
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn robber(&self) -> HexCoord {
        self.robber
    }

    /// Port kinds whose edge touches this vertex.
    pub fn port_kinds_at_vertex(&self, vertex: &VertexCoord) -> Vec<PortKind> {
        let vertex = vertex.canonical();
        self.ports
            .iter()
            .filter(|p| p.edge.endpoints().contains(&vertex))
            .map(|p| p.kind)
            .collect()
    }

    /// Owners of buildings on the corners of a hex, deduplicated and sorted.
    pub fn players_on_hex(&self, hex: &HexCoord) -> Vec<PlayerId> {
        let owners: BTreeSet<PlayerId> = hex
            .corners()
            .iter()
            .filter_map(|v| self.building(v))
            .map(|b| b.owner)
            .collect();
        owners.into_iter().collect()
    }

    // ==================== Rule checks ====================

    /// Distance rule: no building on any adjacent vertex.
    pub fn satisfies_distance_rule(&self, vertex: &VertexCoord) -> bool {
        vertex
            .canonical()
            .adjacent_vertices()
            .iter()
            .all(|adj| self.building(adj).is_none())
    }

    /// Whether one of the player's roads touches this vertex.
    pub fn touches_own_road(&self, vertex: &VertexCoord, player: PlayerId) -> bool {
        vertex
            .canonical()
            .touching_edges()
            .iter()
            .any(|e| self.road_owner(e) == Some(player))
    }

    /// Whether a new road at `edge` connects to the player's network.
    ///
    /// A road connects through an endpoint if the player owns a building
    /// there, or owns an adjacent road and the endpoint is not occupied by an
    /// enemy building (enemy buildings block pass-through).
    pub fn road_connects(&self, edge: &EdgeCoord, player: PlayerId) -> bool {
        for endpoint in edge.canonical().endpoints() {
            let owner = self.building(&endpoint).map(|b| b.owner);
            if owner == Some(player) {
                return true;
            }
            if owner.is_none()
                && endpoint
                    .touching_edges()
                    .iter()
                    .any(|adj| *adj != edge.canonical() && self.road_owner(adj) == Some(player))
            {
                return true;
            }
        }
        false
    }

    // ==================== Mutations ====================

    /// Place a settlement; geometric validation is the caller's job.
    pub fn place_settlement(&mut self, vertex: VertexCoord, owner: PlayerId) {
        self.buildings.insert(
            vertex.canonical(),
            Building {
                kind: BuildingKind::Settlement,
                owner,
            },
        );
    }

    /// Replace a settlement with a city.
    pub fn upgrade_to_city(&mut self, vertex: VertexCoord, owner: PlayerId) {
        self.buildings.insert(
            vertex.canonical(),
            Building {
                kind: BuildingKind::City,
                owner,
            },
        );
    }

    /// Place a road; geometric validation is the caller's job.
    pub fn place_road(&mut self, edge: EdgeCoord, owner: PlayerId) {
        self.roads.insert(edge.canonical(), owner);
    }

    /// Move the robber.
    pub fn move_robber(&mut self, to: HexCoord) {
        self.robber = to;
    }

    // ==================== Production ====================

    /// Raw production for a roll, before bank scarcity: every hex bearing the
    /// rolled token, except the robber's hex, yields to each building on its
    /// corners (1 per settlement, 2 per city).
    pub fn production_for_roll(&self, roll: u8) -> HashMap<PlayerId, ResourceBundle> {
        let mut production: HashMap<PlayerId, ResourceBundle> = HashMap::new();

        for tile in self.tiles.values() {
            if tile.token != Some(roll) || tile.coord == self.robber {
                continue;
            }
            let resource = match tile.terrain.resource() {
                Some(r) => r,
                None => continue,
            };
            for corner in tile.coord.corners() {
                if let Some(building) = self.building(&corner) {
                    production
                        .entry(building.owner)
                        .or_default()
                        .add(resource, building.yield_count());
                }
            }
        }

        production
    }

    // ==================== Longest road ====================

    /// Length of the player's longest simple road path.
    ///
    /// Each road edge is used at most once, and traversal halts on arriving
    /// at a vertex occupied by another player's building (a path may still
    /// start at such a vertex: the enemy building splits the network, it does
    /// not erase the incident edges).
    pub fn longest_road(&self, player: PlayerId) -> u32 {
        let starts: HashSet<VertexCoord> = self
            .roads
            .iter()
            .filter(|&(_, &owner)| owner == player)
            .flat_map(|(edge, _)| edge.endpoints())
            .collect();

        let mut best = 0;
        for start in starts {
            let mut visited = HashSet::new();
            best = best.max(self.walk_roads(player, start, &mut visited));
        }
        best
    }

    fn walk_roads(
        &self,
        player: PlayerId,
        at: VertexCoord,
        visited: &mut HashSet<EdgeCoord>,
    ) -> u32 {
        let mut best = 0;
        for edge in at.touching_edges() {
            if self.road_owner(&edge) != Some(player) || visited.contains(&edge) {
                continue;
            }
            visited.insert(edge);
            let [a, b] = edge.endpoints();
            let next = if a == at { b } else { a };
            // Enemy buildings sever the path at this vertex.
            let blocked = self.building(&next).is_some_and(|b| b.owner != player);
            let continuation = if blocked {
                0
            } else {
                self.walk_roads(player, next, visited)
            };
            best = best.max(1 + continuation);
            visited.remove(&edge);
        }
        best
    }
}

/// True when no two hexes bearing 6 or 8 share an edge under this token order.
fn red_tokens_separated(non_desert: &[HexCoord], tokens: &[u8]) -> bool {
    let placement: HashMap<HexCoord, u8> = non_desert
        .iter()
        .copied()
        .zip(tokens.iter().copied())
        .collect();

    for (coord, &token) in &placement {
        if token != 6 && token != 8 {
            continue;
        }
        for neighbor in coord.neighbors() {
            if let Some(&adjacent) = placement.get(&neighbor) {
                if adjacent == 6 || adjacent == 8 {
                    return false;
                }
            }
        }
    }
    true
}

/// Swap each offending 6/8 token with a random non-6/8 token until the
/// constraint holds, bounded at 100 passes.
fn repair_red_tokens(non_desert: &[HexCoord], tokens: &mut [u8], seed: &mut u64) {
    for _ in 0..100 {
        if red_tokens_separated(non_desert, tokens) {
            return;
        }
        let mut rng = draw_rng(seed);

        let offenders: Vec<usize> = (0..tokens.len())
            .filter(|&i| {
                let token = tokens[i];
                if token != 6 && token != 8 {
                    return false;
                }
                let placement: HashMap<HexCoord, u8> = non_desert
                    .iter()
                    .copied()
                    .zip(tokens.iter().copied())
                    .collect();
                non_desert[i].neighbors().iter().any(|n| {
                    placement
                        .get(n)
                        .is_some_and(|&t| t == 6 || t == 8)
                })
            })
            .collect();

        for offender in offenders {
            let calm: Vec<usize> = (0..tokens.len())
                .filter(|&i| tokens[i] != 6 && tokens[i] != 8)
                .collect();
            if let Some(&target) = calm.choose(&mut rng) {
                tokens.swap(offender, target);
            }
        }
    }
}

//! Fixed board layout: the 19 land hexes, their derived vertex and edge sets,
//! and the 9 port edges.
//!
//! These tables are a function of the board shape alone, never of any game's
//! state, so they are computed once per process and shared read-only across
//! every room.

use crate::hex::{EdgeCoord, EdgeDirection, HexCoord, VertexCoord};
use std::collections::HashSet;
use std::sync::OnceLock;

/// The 19 land coordinates: a radius-2 region centered on the origin,
/// enumerated center-out ring by ring. Board generation assigns terrains and
/// number tokens in this order.
pub const LAND_HEXES: [HexCoord; 19] = [
    // Center
    HexCoord::new(0, 0),
    // Ring 1
    HexCoord::new(1, 0),
    HexCoord::new(1, -1),
    HexCoord::new(0, -1),
    HexCoord::new(-1, 0),
    HexCoord::new(-1, 1),
    HexCoord::new(0, 1),
    // Ring 2
    HexCoord::new(2, 0),
    HexCoord::new(2, -1),
    HexCoord::new(2, -2),
    HexCoord::new(1, -2),
    HexCoord::new(0, -2),
    HexCoord::new(-1, -1),
    HexCoord::new(-2, 0),
    HexCoord::new(-2, 1),
    HexCoord::new(-2, 2),
    HexCoord::new(-1, 2),
    HexCoord::new(0, 2),
    HexCoord::new(1, 1),
];

/// The 9 fixed port edges, spread around the coast. Each sits between a
/// ring-2 hex and an off-board hex; which port type lands on which edge is
/// shuffled per seed, the positions never change.
pub const PORT_EDGE_ANCHORS: [(HexCoord, EdgeDirection); 9] = [
    (HexCoord::new(0, -2), EdgeDirection::NW),
    (HexCoord::new(1, -2), EdgeDirection::NE),
    (HexCoord::new(2, -1), EdgeDirection::NE),
    (HexCoord::new(2, 0), EdgeDirection::E),
    (HexCoord::new(1, 1), EdgeDirection::SE),
    (HexCoord::new(0, 2), EdgeDirection::SW),
    (HexCoord::new(-2, 2), EdgeDirection::SW),
    (HexCoord::new(-2, 1), EdgeDirection::W),
    (HexCoord::new(-1, -1), EdgeDirection::NW),
];

/// Precomputed membership tables for the fixed board shape.
#[derive(Debug)]
pub struct BoardLayout {
    land_hexes: HashSet<HexCoord>,
    land_vertices: HashSet<VertexCoord>,
    land_edges: HashSet<EdgeCoord>,
    port_edges: Vec<EdgeCoord>,
}

impl BoardLayout {
    fn build() -> Self {
        let land_hexes: HashSet<HexCoord> = LAND_HEXES.into_iter().collect();

        let mut land_vertices = HashSet::new();
        let mut land_edges = HashSet::new();
        for hex in LAND_HEXES {
            land_vertices.extend(hex.corners());
            land_edges.extend(hex.edges());
        }

        let port_edges = PORT_EDGE_ANCHORS
            .into_iter()
            .map(|(hex, dir)| EdgeCoord::new(hex, dir))
            .collect();

        Self {
            land_hexes,
            land_vertices,
            land_edges,
            port_edges,
        }
    }

    /// Whether a hex is one of the 19 land tiles.
    pub fn is_land_hex(&self, hex: &HexCoord) -> bool {
        self.land_hexes.contains(hex)
    }

    /// Whether a vertex touches at least one land hex.
    pub fn is_land_vertex(&self, vertex: &VertexCoord) -> bool {
        self.land_vertices.contains(&vertex.canonical())
    }

    /// Whether an edge borders at least one land hex.
    pub fn is_land_edge(&self, edge: &EdgeCoord) -> bool {
        self.land_edges.contains(&edge.canonical())
    }

    /// All vertices touching land.
    pub fn land_vertices(&self) -> impl Iterator<Item = &VertexCoord> {
        self.land_vertices.iter()
    }

    /// All edges bordering land.
    pub fn land_edges(&self) -> impl Iterator<Item = &EdgeCoord> {
        self.land_edges.iter()
    }

    /// The 9 fixed coastal port edges.
    pub fn port_edges(&self) -> &[EdgeCoord] {
        &self.port_edges
    }
}

/// The shared layout tables, built lazily on first access.
pub fn layout() -> &'static BoardLayout {
    static LAYOUT: OnceLock<BoardLayout> = OnceLock::new();
    LAYOUT.get_or_init(BoardLayout::build)
}

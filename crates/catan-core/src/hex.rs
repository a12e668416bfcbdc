//! Cube-coordinate algebra for the hex board.
//!
//! Three coordinate families cover the board geometry:
//! - `HexCoord`: a tile position, stored as full cube coordinates (q, r, s)
//!   with q + r + s = 0, because that is what travels on the wire.
//! - `VertexCoord`: an intersection where 2-3 hexes meet, addressed as the
//!   north or south pole of some hex.
//! - `EdgeCoord`: a side shared by exactly 2 hexes, addressed from one of
//!   them in a NE/E/SE canonical direction.
//!
//! Every public constructor canonicalizes, so two coordinates naming the same
//! board feature always compare equal and hash identically. All of the
//! canonicalization is integer arithmetic on a half-step lattice; there is no
//! floating point anywhere in this module.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Vertex pole relative to its owning hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VertexDirection {
    /// Top vertex of the hex
    N,
    /// Bottom vertex of the hex
    S,
}

/// Edge direction relative to a hex.
///
/// Only NE, E and SE are canonical; the other three directions name the same
/// edge from the neighboring hex and are rewritten by [`EdgeCoord::canonical`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeDirection {
    NE,
    E,
    SE,
    SW,
    W,
    NW,
}

impl EdgeDirection {
    /// All six directions, clockwise from NE.
    pub const ALL: [EdgeDirection; 6] = [
        EdgeDirection::NE,
        EdgeDirection::E,
        EdgeDirection::SE,
        EdgeDirection::SW,
        EdgeDirection::W,
        EdgeDirection::NW,
    ];

    /// The same edge seen from the neighbor across it.
    pub fn opposite(self) -> EdgeDirection {
        match self {
            EdgeDirection::NE => EdgeDirection::SW,
            EdgeDirection::E => EdgeDirection::W,
            EdgeDirection::SE => EdgeDirection::NW,
            EdgeDirection::SW => EdgeDirection::NE,
            EdgeDirection::W => EdgeDirection::E,
            EdgeDirection::NW => EdgeDirection::SE,
        }
    }

    /// Whether this direction is one of the three canonical ones.
    pub fn is_canonical(self) -> bool {
        matches!(self, EdgeDirection::NE | EdgeDirection::E | EdgeDirection::SE)
    }
}

/// Cube coordinate of a hex tile.
///
/// `s` is redundant (q + r + s = 0) but carried explicitly to match the wire
/// format; deserialization re-derives it from (q, r) so a malformed frame can
/// never produce a coordinate that breaks the invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawHexCoord")]
pub struct HexCoord {
    pub q: i32,
    pub r: i32,
    pub s: i32,
}

#[derive(Deserialize)]
struct RawHexCoord {
    q: i32,
    r: i32,
    #[serde(default)]
    #[allow(dead_code)]
    s: i32,
}

impl From<RawHexCoord> for HexCoord {
    fn from(raw: RawHexCoord) -> Self {
        HexCoord::new(raw.q, raw.r)
    }
}

impl HexCoord {
    /// Create a hex coordinate from its axial pair; `s` is derived.
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r, s: -q - r }
    }

    /// The neighbor across the given edge direction.
    pub fn neighbor(&self, direction: EdgeDirection) -> HexCoord {
        match direction {
            EdgeDirection::NE => HexCoord::new(self.q + 1, self.r - 1),
            EdgeDirection::E => HexCoord::new(self.q + 1, self.r),
            EdgeDirection::SE => HexCoord::new(self.q, self.r + 1),
            EdgeDirection::SW => HexCoord::new(self.q - 1, self.r + 1),
            EdgeDirection::W => HexCoord::new(self.q - 1, self.r),
            EdgeDirection::NW => HexCoord::new(self.q, self.r - 1),
        }
    }

    /// All six neighboring hexes.
    pub fn neighbors(&self) -> [HexCoord; 6] {
        EdgeDirection::ALL.map(|d| self.neighbor(d))
    }

    /// Hex-grid distance to another hex.
    pub fn distance_to(&self, other: &HexCoord) -> u32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s - other.s).abs();
        ((dq + dr + ds) / 2) as u32
    }

    /// One of the two pole vertices of this hex.
    pub fn vertex(&self, dir: VertexDirection) -> VertexCoord {
        VertexCoord::new(*self, dir)
    }

    /// All six corner vertices of this hex, in canonical form.
    ///
    /// The four side corners are poles of neighboring hexes.
    pub fn corners(&self) -> [VertexCoord; 6] {
        [
            VertexCoord::new(*self, VertexDirection::N),
            VertexCoord::new(self.neighbor(EdgeDirection::NE), VertexDirection::S),
            VertexCoord::new(self.neighbor(EdgeDirection::SE), VertexDirection::N),
            VertexCoord::new(*self, VertexDirection::S),
            VertexCoord::new(self.neighbor(EdgeDirection::SW), VertexDirection::N),
            VertexCoord::new(self.neighbor(EdgeDirection::NW), VertexDirection::S),
        ]
    }

    /// All six edges of this hex, in canonical form.
    pub fn edges(&self) -> [EdgeCoord; 6] {
        EdgeDirection::ALL.map(|dir| EdgeCoord::new(*self, dir))
    }

    /// Serialized map key, `"q,r,s"`.
    pub fn key(&self) -> String {
        format!("{},{},{}", self.q, self.r, self.s)
    }

    /// Parse a `"q,r,s"` key back into a coordinate.
    pub fn from_key(key: &str) -> Option<HexCoord> {
        let mut parts = key.split(',');
        let q = parts.next()?.parse().ok()?;
        let r = parts.next()?.parse().ok()?;
        let _s: i32 = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(HexCoord::new(q, r))
    }
}

impl fmt::Display for HexCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.q, self.r, self.s)
    }
}

/// A vertex, addressed as the N or S pole of a hex.
///
/// With pointy-top hexes every intersection in the lattice is the north pole
/// of exactly one hex or the south pole of exactly one hex, so the canonical
/// (hex, dir) pair is unique. [`VertexCoord::canonical`] makes that explicit
/// by re-deriving the owning pole from the vertex's lattice point, which also
/// makes canonicalization trivially idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexCoord {
    #[serde(flatten)]
    pub hex: HexCoord,
    pub dir: VertexDirection,
}

impl VertexCoord {
    /// Create a vertex coordinate (automatically canonicalized).
    pub fn new(hex: HexCoord, dir: VertexDirection) -> Self {
        Self { hex, dir }.canonical()
    }

    /// Position on the half-step lattice: x in units of half the hex width,
    /// y in units of half the edge length.
    fn lattice(&self) -> (i32, i32) {
        let x = 2 * self.hex.q + self.hex.r;
        let y = 3 * self.hex.r
            + match self.dir {
                VertexDirection::N => -2,
                VertexDirection::S => 2,
            };
        (x, y)
    }

    /// The canonical representative for this vertex.
    ///
    /// Re-derives the unique owning (hex, pole) pair from the lattice point;
    /// equivalent representations collapse to the lexicographically smallest
    /// (and only) pole form.
    pub fn canonical(self) -> Self {
        let (x, y) = self.lattice();
        // North poles sit at y = 3r - 2, south poles at y = 3r + 2.
        let (r, dir) = match y.rem_euclid(3) {
            1 => ((y + 2) / 3, VertexDirection::N),
            2 => ((y - 2) / 3, VertexDirection::S),
            _ => unreachable!("a pole lattice point is never a hex center"),
        };
        let q = (x - r) / 2;
        Self {
            hex: HexCoord::new(q, r),
            dir,
        }
    }

    /// The 2-3 hexes meeting at this vertex (3 on the infinite lattice;
    /// boundary vertices touch off-board coordinates too).
    pub fn touching_hexes(&self) -> [HexCoord; 3] {
        match self.dir {
            VertexDirection::N => [
                self.hex,
                self.hex.neighbor(EdgeDirection::NW),
                self.hex.neighbor(EdgeDirection::NE),
            ],
            VertexDirection::S => [
                self.hex,
                self.hex.neighbor(EdgeDirection::SW),
                self.hex.neighbor(EdgeDirection::SE),
            ],
        }
    }

    /// The three lattice edges meeting at this vertex, canonicalized.
    pub fn touching_edges(&self) -> [EdgeCoord; 3] {
        match self.dir {
            VertexDirection::N => [
                EdgeCoord::new(self.hex, EdgeDirection::NW),
                EdgeCoord::new(self.hex, EdgeDirection::NE),
                EdgeCoord::new(self.hex.neighbor(EdgeDirection::NW), EdgeDirection::E),
            ],
            VertexDirection::S => [
                EdgeCoord::new(self.hex, EdgeDirection::SW),
                EdgeCoord::new(self.hex, EdgeDirection::SE),
                EdgeCoord::new(self.hex.neighbor(EdgeDirection::SW), EdgeDirection::E),
            ],
        }
    }

    /// The vertices one edge away (distance-rule neighborhood).
    pub fn adjacent_vertices(&self) -> [VertexCoord; 3] {
        self.touching_edges().map(|edge| {
            let [a, b] = edge.endpoints();
            if a == *self {
                b
            } else {
                a
            }
        })
    }

    /// Serialized map key, `"q,r,s,dir"`.
    pub fn key(&self) -> String {
        let d = match self.dir {
            VertexDirection::N => "N",
            VertexDirection::S => "S",
        };
        format!("{},{},{},{}", self.hex.q, self.hex.r, self.hex.s, d)
    }

    /// Parse a `"q,r,s,dir"` key back into a canonical vertex.
    pub fn from_key(key: &str) -> Option<VertexCoord> {
        let (hex_part, dir_part) = key.rsplit_once(',')?;
        let hex = HexCoord::from_key(hex_part)?;
        let dir = match dir_part {
            "N" => VertexDirection::N,
            "S" => VertexDirection::S,
            _ => return None,
        };
        Some(VertexCoord::new(hex, dir))
    }
}

impl fmt::Display for VertexCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// An edge, addressed from one of its two hexes in a canonical direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeCoord {
    #[serde(flatten)]
    pub hex: HexCoord,
    pub dir: EdgeDirection,
}

impl EdgeCoord {
    /// Create an edge coordinate (automatically canonicalized).
    pub fn new(hex: HexCoord, dir: EdgeDirection) -> Self {
        Self { hex, dir }.canonical()
    }

    /// Rewrite SW/W/NW forms to the NE/E/SE form anchored on the neighbor.
    pub fn canonical(self) -> Self {
        if self.dir.is_canonical() {
            self
        } else {
            Self {
                hex: self.hex.neighbor(self.dir),
                dir: self.dir.opposite(),
            }
        }
    }

    /// The two hexes sharing this edge.
    pub fn touching_hexes(&self) -> [HexCoord; 2] {
        [self.hex, self.hex.neighbor(self.dir)]
    }

    /// The two vertices at the ends of this edge.
    pub fn endpoints(&self) -> [VertexCoord; 2] {
        match self.dir {
            EdgeDirection::NE => [
                VertexCoord::new(self.hex, VertexDirection::N),
                VertexCoord::new(self.hex.neighbor(EdgeDirection::NE), VertexDirection::S),
            ],
            EdgeDirection::E => [
                VertexCoord::new(self.hex.neighbor(EdgeDirection::NE), VertexDirection::S),
                VertexCoord::new(self.hex.neighbor(EdgeDirection::SE), VertexDirection::N),
            ],
            EdgeDirection::SE => [
                VertexCoord::new(self.hex.neighbor(EdgeDirection::SE), VertexDirection::N),
                VertexCoord::new(self.hex, VertexDirection::S),
            ],
            // Non-canonical forms delegate to their canonical twin.
            _ => self.canonical().endpoints(),
        }
    }

    /// Edges sharing a vertex with this one (road connectivity neighborhood).
    pub fn adjacent_edges(&self) -> Vec<EdgeCoord> {
        let mut adjacent = HashSet::new();
        for vertex in self.endpoints() {
            for edge in vertex.touching_edges() {
                if edge != *self {
                    adjacent.insert(edge);
                }
            }
        }
        adjacent.into_iter().collect()
    }

    /// Serialized map key, `"q,r,s,dir"`.
    pub fn key(&self) -> String {
        let d = match self.dir {
            EdgeDirection::NE => "NE",
            EdgeDirection::E => "E",
            EdgeDirection::SE => "SE",
            EdgeDirection::SW => "SW",
            EdgeDirection::W => "W",
            EdgeDirection::NW => "NW",
        };
        format!("{},{},{},{}", self.hex.q, self.hex.r, self.hex.s, d)
    }

    /// Parse a `"q,r,s,dir"` key back into a canonical edge.
    pub fn from_key(key: &str) -> Option<EdgeCoord> {
        let (hex_part, dir_part) = key.rsplit_once(',')?;
        let hex = HexCoord::from_key(hex_part)?;
        let dir = match dir_part {
            "NE" => EdgeDirection::NE,
            "E" => EdgeDirection::E,
            "SE" => EdgeDirection::SE,
            "SW" => EdgeDirection::SW,
            "W" => EdgeDirection::W,
            "NW" => EdgeDirection::NW,
            _ => return None,
        };
        Some(EdgeCoord::new(hex, dir))
    }
}

impl fmt::Display for EdgeCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_neighbors_are_unique_and_adjacent() {
        let center = HexCoord::new(0, 0);
        let neighbors = center.neighbors();

        let unique: HashSet<_> = neighbors.iter().collect();
        assert_eq!(unique.len(), 6);

        for neighbor in &neighbors {
            assert_eq!(center.distance_to(neighbor), 1);
            assert_eq!(neighbor.q + neighbor.r + neighbor.s, 0);
        }
    }

    #[test]
    fn hex_distance() {
        let a = HexCoord::new(0, 0);
        assert_eq!(a.distance_to(&HexCoord::new(2, -1)), 2);
        assert_eq!(a.distance_to(&HexCoord::new(-3, 3)), 3);
    }

    #[test]
    fn vertex_canonicalization_is_idempotent() {
        for q in -2..=2 {
            for r in -2..=2 {
                for dir in [VertexDirection::N, VertexDirection::S] {
                    let v = VertexCoord::new(HexCoord::new(q, r), dir);
                    assert_eq!(v, v.canonical());
                    assert_eq!(v.canonical(), v.canonical().canonical());
                }
            }
        }
    }

    #[test]
    fn hex_corners_are_distinct() {
        let corners = HexCoord::new(0, 0).corners();
        let unique: HashSet<_> = corners.iter().collect();
        assert_eq!(unique.len(), 6);
    }

    #[test]
    fn neighboring_hexes_share_two_corners() {
        let a = HexCoord::new(0, 0);
        let b = a.neighbor(EdgeDirection::E);
        let ca: HashSet<_> = a.corners().into_iter().collect();
        let cb: HashSet<_> = b.corners().into_iter().collect();
        assert_eq!(ca.intersection(&cb).count(), 2);
    }

    #[test]
    fn edge_canonical_equality() {
        let e1 = EdgeCoord::new(HexCoord::new(0, 0), EdgeDirection::E);
        let e2 = EdgeCoord::new(HexCoord::new(1, 0), EdgeDirection::W);
        assert_eq!(e1, e2, "same edge named from both sides must be equal");

        let e3 = EdgeCoord::new(HexCoord::new(0, 0), EdgeDirection::SW);
        let e4 = EdgeCoord::new(HexCoord::new(-1, 1), EdgeDirection::NE);
        assert_eq!(e3, e4);
        assert!(e3.dir.is_canonical());
    }

    #[test]
    fn edge_endpoints_are_adjacent_vertices() {
        for dir in EdgeDirection::ALL {
            let edge = EdgeCoord::new(HexCoord::new(0, 0), dir);
            let [a, b] = edge.endpoints();
            assert_ne!(a, b);
            assert!(a.adjacent_vertices().contains(&b));
        }
    }

    #[test]
    fn vertex_touching_edges_contain_vertex() {
        let v = VertexCoord::new(HexCoord::new(0, 0), VertexDirection::N);
        for edge in v.touching_edges() {
            assert!(edge.endpoints().contains(&v));
        }
    }

    #[test]
    fn vertex_adjacency_is_symmetric() {
        let v = VertexCoord::new(HexCoord::new(0, 0), VertexDirection::S);
        for adj in v.adjacent_vertices() {
            assert_ne!(adj, v);
            assert!(adj.adjacent_vertices().contains(&v));
        }
    }

    #[test]
    fn edge_has_four_adjacent_edges() {
        let e = EdgeCoord::new(HexCoord::new(0, 0), EdgeDirection::E);
        assert_eq!(e.adjacent_edges().len(), 4);
    }

    #[test]
    fn key_round_trips() {
        let hex = HexCoord::new(2, -1);
        assert_eq!(HexCoord::from_key(&hex.key()), Some(hex));

        let v = VertexCoord::new(HexCoord::new(-2, 1), VertexDirection::S);
        assert_eq!(VertexCoord::from_key(&v.key()), Some(v));

        let e = EdgeCoord::new(HexCoord::new(1, 1), EdgeDirection::NW);
        assert_eq!(EdgeCoord::from_key(&e.key()), Some(e));
        assert_eq!(e.key(), e.canonical().key());
    }

    #[test]
    fn serde_rederives_s() {
        let hex: HexCoord = serde_json::from_str(r#"{"q":1,"r":-2,"s":99}"#).unwrap();
        assert_eq!(hex, HexCoord::new(1, -2));
        assert_eq!(hex.s, 1);
    }

    #[test]
    fn wire_format_matches_spec_shapes() {
        let v = VertexCoord::new(HexCoord::new(0, 0), VertexDirection::N);
        let json = serde_json::to_value(v).unwrap();
        assert_eq!(json["q"], 0);
        assert_eq!(json["s"], 0);
        assert_eq!(json["dir"], "N");

        let e: EdgeCoord = serde_json::from_str(r#"{"q":0,"r":0,"s":0,"dir":"SE"}"#).unwrap();
        assert_eq!(e.dir, EdgeDirection::SE);
    }
}

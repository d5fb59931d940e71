//! Face-edge adjacency of the cube.
//!
//! Each of the 24 (face, edge) pairs touches exactly one edge of another
//! face. Edge coordinates run along the edge in face-local units; where the
//! two faces' frames run in opposite directions along the shared edge the
//! connection is flipped and the coordinate changes sign.

use glam::DVec2;

use crate::{CubeFace, FaceDirection};

/// The face and edge on the other side of a face boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceEdgeAdjacency {
    /// The adjacent face.
    pub neighbor_face: CubeFace,
    /// Which edge of the adjacent face is shared.
    pub neighbor_edge: FaceDirection,
    /// The edge coordinate is negated when crossing.
    pub flipped: bool,
}

const fn adj(neighbor_face: CubeFace, neighbor_edge: FaceDirection, flipped: bool) -> FaceEdgeAdjacency {
    FaceEdgeAdjacency {
        neighbor_face,
        neighbor_edge,
        flipped,
    }
}

/// Static 6×4 table indexed by `[face.index()][dir.index()]`.
const ADJACENCY: [[FaceEdgeAdjacency; 4]; 6] = {
    use CubeFace::*;
    use FaceDirection::*;
    [
        // PosX: north, south, east, west
        [
            adj(PosY, East, false),
            adj(NegY, East, true),
            adj(NegZ, West, false),
            adj(PosZ, East, false),
        ],
        // NegX
        [
            adj(PosY, West, true),
            adj(NegY, West, false),
            adj(PosZ, West, false),
            adj(NegZ, East, false),
        ],
        // PosY
        [
            adj(NegZ, North, true),
            adj(PosZ, North, false),
            adj(PosX, North, false),
            adj(NegX, North, true),
        ],
        // NegY
        [
            adj(PosZ, South, false),
            adj(NegZ, South, true),
            adj(PosX, South, true),
            adj(NegX, South, false),
        ],
        // PosZ
        [
            adj(PosY, South, false),
            adj(NegY, North, false),
            adj(PosX, West, false),
            adj(NegX, East, false),
        ],
        // NegZ
        [
            adj(PosY, North, true),
            adj(NegY, South, true),
            adj(NegX, West, false),
            adj(PosX, East, false),
        ],
    ]
};

/// Look up which face and edge lie across `edge` of `face`.
#[inline]
#[must_use]
pub fn face_adjacency(face: CubeFace, edge: FaceDirection) -> FaceEdgeAdjacency {
    ADJACENCY[face.index()][edge.index()]
}

/// The coordinate of a face-local point along the given edge's axis.
#[inline]
#[must_use]
pub fn edge_coordinate(edge: FaceDirection, local: DVec2) -> f64 {
    if edge.runs_along_x() { local.x } else { local.y }
}

/// Carry an edge coordinate across `edge` of `face` onto the adjacent face.
///
/// Returns the adjacent face, its shared edge, and the coordinate along
/// that edge in the adjacent face's frame.
#[must_use]
pub fn transform_edge_coordinate(
    face: CubeFace,
    edge: FaceDirection,
    coordinate: f64,
) -> (CubeFace, FaceDirection, f64) {
    let a = face_adjacency(face, edge);
    let t = if a.flipped { -coordinate } else { coordinate };
    (a.neighbor_face, a.neighbor_edge, t)
}

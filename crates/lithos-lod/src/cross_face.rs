//! Neighbour resolution across face boundaries and stitching strides.

use lithos_cubesphere::{FaceDirection, transform_edge_coordinate};

use crate::face::QuadtreeFace;
use crate::node::{NodeId, NodeRef, QuadNode};

fn find_face(faces: &[QuadtreeFace], face: lithos_cubesphere::CubeFace) -> Option<&QuadtreeFace> {
    faces.iter().find(|f| f.face() == face)
}

/// Resolve a node reference against a set of faces.
pub fn resolve<'a>(faces: &'a [QuadtreeFace], r: NodeRef) -> Option<&'a QuadNode> {
    find_face(faces, r.face)?.get(r.node)
}

/// Link every boundary leaf to the leaf across the face edge whose span
/// contains the midpoint of its own edge. Every face must have run its
/// split pass and [`QuadtreeFace::populate_edges`] for the same camera.
///
/// Returns the number of boundary leaves left without a neighbour.
pub fn populate_nonside_neighbors(faces: &mut [QuadtreeFace]) -> usize {
    let mut links: Vec<(usize, NodeId, FaceDirection, NodeRef)> = Vec::new();
    let mut unresolved = 0;

    for (fi, face) in faces.iter().enumerate() {
        for dir in FaceDirection::ALL {
            for entry in face.edges(dir) {
                let mid = 0.5 * (entry.min + entry.max);
                let (other_face, other_edge, t) = transform_edge_coordinate(face.face(), dir, mid);
                let hit = find_face(faces, other_face).and_then(|f| f.find_edge_entry(other_edge, t));
                match hit {
                    Some(hit) => links.push((
                        fi,
                        entry.node,
                        dir,
                        NodeRef {
                            face: other_face,
                            node: hit.node,
                        },
                    )),
                    None => {
                        unresolved += 1;
                        tracing::warn!(
                            face = ?face.face(),
                            edge = ?dir,
                            coordinate = t,
                            "No leaf across face edge"
                        );
                    }
                }
            }
        }
    }

    for (fi, node, dir, neighbor) in links {
        faces[fi].node_mut(node).neighbors[dir.index()] = Some(neighbor);
    }
    unresolved
}

/// Per-edge stitching strides of a leaf in [`FaceDirection`] slot order.
///
/// A coarser neighbour `d` levels up gives stride `2^d`, clamped to
/// `resolution`. Same-level, finer and missing neighbours give 1.
pub fn stitching_strides(faces: &[QuadtreeFace], leaf: NodeRef, resolution: u32) -> [u32; 4] {
    let mut strides = [1; 4];
    let Some(node) = resolve(faces, leaf) else {
        return strides;
    };
    for (slot, neighbor) in node.neighbors.iter().enumerate() {
        let Some(other) = neighbor.and_then(|n| resolve(faces, n)) else {
            continue;
        };
        if other.level() < node.level() {
            let diff = u32::from(node.level() - other.level()).min(31);
            strides[slot] = (1u32 << diff).min(resolution.max(1));
        }
    }
    strides
}

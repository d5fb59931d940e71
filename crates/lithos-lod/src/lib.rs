//! Cube-sphere quadtree: per-face subdivision from a camera position,
//! same-face and cross-face neighbour links, and stitching strides.

mod cross_face;
mod face;
mod node;
mod settings;

pub use cross_face::{populate_nonside_neighbors, resolve, stitching_strides};
pub use face::{EdgeEntry, QuadtreeFace};
pub use node::{NodeId, NodeRef, QuadNode, quadrant};
pub use settings::{LodSettings, ProxySource, SphereProxy};

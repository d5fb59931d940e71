//! Cube-sphere parametrization: the six faces, their face-local frames, quadtree cell
//! addresses, and the face-edge adjacency table used for cross-face stitching.

mod adjacency;
mod chunk_address;
mod cube_face;
mod direction;

pub use adjacency::{FaceEdgeAdjacency, edge_coordinate, face_adjacency, transform_edge_coordinate};
pub use chunk_address::{ChunkAddress, FaceBounds};
pub use cube_face::CubeFace;
pub use direction::FaceDirection;

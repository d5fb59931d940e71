//! Procedural height field of a small body and the CPU map generator.
//!
//! The height field layers fBm gradient noise, ridged noise, seeded craters
//! and cleave planes. The map generator renders a patch's height, colour and
//! normal maps; `lithos-render` provides the GPU backend of the same trait.

mod coarse;
mod cpu_maps;
mod features;
mod height_field;
mod maps;
pub mod noise;
mod ramp;
mod topology;

pub use coarse::CoarseHeightmap;
pub use cpu_maps::CpuMapGenerator;
pub use features::{CleavePlane, Crater, FeatureSet};
pub use height_field::{HeightField, height};
pub use maps::{
    ChunkMaps, MapError, MapGenerator, MapRequest, edge_vertices, pack_unorm4x8,
    snap_stitched_edges, stitch_anchors,
};
pub use ramp::{ColorRamp, RAMP_WIDTH};
pub use topology::GridTopology;

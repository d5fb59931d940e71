//! Chunked terrain for one body: stitched chunk geometry, background
//! geometry jobs, pooled chunk management and the six-face terrain cube.

mod chunk;
mod chunk_manager;
mod error;
mod geometry;
mod render_group;
mod terrain_cube;
mod worker;

pub use chunk::{Chunk, ChunkId, ChunkKey, ChunkState, ChunkVariant};
pub use chunk_manager::{ChunkManager, ManagerSettings};
pub use error::{GeometryError, TerrainError};
pub use geometry::{ChunkGeometry, build_geometry};
pub use render_group::{HeadlessRenderGroup, RenderGroup};
pub use terrain_cube::{TerrainCube, TerrainStats};
pub use worker::{GeometryJob, InlineWorkerPool, JobId, JobOutput, ThreadWorkerPool, WorkerPool};

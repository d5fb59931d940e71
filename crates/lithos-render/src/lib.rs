//! wgpu side of the terrain: GPU map generation, the chunk displacement
//! pipeline and offscreen targets.

pub mod camera;
pub mod chunk_pipeline;
pub mod depth;
pub mod gpu;
pub mod map_pipeline;

pub use camera::Camera;
pub use chunk_pipeline::{
    CHUNK_SHADER_SOURCE, ChunkFrame, ChunkGpuData, ChunkPipeline, ChunkUniform, ChunkVertex,
    GridBuffers, draw_chunk, uv_layout,
};
pub use depth::RenderTarget;
pub use gpu::{GpuContext, GpuError, init_headless_blocking};
pub use map_pipeline::{GpuCrater, GpuMapGenerator, MAP_SHADER_SOURCE, MapParams};

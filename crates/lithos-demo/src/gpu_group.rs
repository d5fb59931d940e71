//! Render group that uploads chunks to wgpu and draws them offscreen.

use std::sync::Arc;

use glam::DVec3;
use lithos_planet::{Chunk, ChunkId, ChunkVariant, RenderGroup};
use lithos_render::{
    Camera, ChunkFrame, ChunkGpuData, ChunkPipeline, ChunkUniform, GpuContext, GridBuffers,
    RenderTarget, draw_chunk,
};
use lithos_terrain::HeightField;
use rustc_hash::FxHashMap;

struct GpuChunk {
    data: Option<ChunkGpuData>,
    frame: Option<ChunkFrame>,
    resolution: u32,
    visible: bool,
}

pub struct GpuRenderGroup {
    gpu: Arc<GpuContext>,
    field: Arc<HeightField>,
    pipeline: ChunkPipeline,
    target: RenderTarget,
    /// Index and uv buffers shared by every chunk of one resolution.
    grids: FxHashMap<u32, GridBuffers>,
    chunks: FxHashMap<ChunkId, GpuChunk>,
    light: DVec3,
}

impl GpuRenderGroup {
    pub fn new(gpu: Arc<GpuContext>, field: Arc<HeightField>, width: u32, height: u32) -> Self {
        let pipeline = ChunkPipeline::new(
            &gpu.device,
            RenderTarget::COLOR_FORMAT,
            Some(RenderTarget::DEPTH_FORMAT),
        );
        let target = RenderTarget::new(&gpu.device, width, height);
        Self {
            gpu,
            field,
            pipeline,
            target,
            grids: FxHashMap::default(),
            chunks: FxHashMap::default(),
            light: DVec3::new(1.0, 0.6, 0.3),
        }
    }

    fn frame_for(&self, chunk: &Chunk) -> Option<ChunkFrame> {
        let request = chunk.request()?;
        let geometry = chunk.geometry()?;
        let shape = self.field.shape();
        Some(ChunkFrame {
            offset: geometry.offset,
            tangent: request.face.tangent(),
            bitangent: request.face.bitangent(),
            width: request.width,
            resolution: request.resolution,
            border: request.border,
            radius: shape.radius,
            displacement: shape.displacement,
            bias: shape.bias,
            stretch: self.field.stretch(),
            variant: chunk.variant().shader_flag(),
            emissive: if chunk.variant() == ChunkVariant::Emissive { 1.0 } else { 0.0 },
        })
    }

    /// Draw every visible chunk from `camera`. Returns the number drawn.
    pub fn render(&mut self, camera: &Camera) -> usize {
        let view_proj = camera.view_projection_matrix();
        for entry in self.chunks.values() {
            if let (true, Some(data), Some(frame)) = (entry.visible, &entry.data, &entry.frame) {
                data.update_uniform(&self.gpu.queue, &ChunkUniform::new(view_proj, frame, self.light));
            }
        }

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("terrain-frame"),
            });
        let mut drawn = 0;
        {
            let mut pass = self.target.begin_pass(&mut encoder, wgpu::Color::BLACK);
            for entry in self.chunks.values() {
                let (true, Some(data)) = (entry.visible, &entry.data) else {
                    continue;
                };
                let Some(grid) = self.grids.get(&entry.resolution) else {
                    continue;
                };
                draw_chunk(&mut pass, &self.pipeline, grid, data);
                drawn += 1;
            }
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        drawn
    }

    pub fn target(&self) -> &RenderTarget {
        &self.target
    }
}

impl RenderGroup for GpuRenderGroup {
    fn attach(&mut self, chunk: &Chunk) {
        let resolution = chunk.request().map_or(0, |r| r.resolution);
        self.chunks.insert(
            chunk.id(),
            GpuChunk {
                data: None,
                frame: None,
                resolution,
                visible: false,
            },
        );
    }

    fn detach(&mut self, id: ChunkId) {
        if let Some(entry) = self.chunks.remove(&id)
            && let Some(data) = entry.data
        {
            data.destroy();
        }
    }

    fn set_visible(&mut self, id: ChunkId, visible: bool) {
        if let Some(entry) = self.chunks.get_mut(&id) {
            entry.visible = visible;
        }
    }

    fn upload(&mut self, chunk: &Chunk) {
        if chunk.is_static() {
            tracing::debug!(chunk = chunk.id().0, "Static chunk has no height map to upload");
            return;
        }
        let (Some(geometry), Some(maps), Some(frame)) =
            (chunk.geometry(), chunk.maps(), self.frame_for(chunk))
        else {
            return;
        };

        if let Some(topology) = chunk.topology() {
            self.grids
                .entry(topology.resolution())
                .or_insert_with(|| GridBuffers::new(&self.gpu.device, &topology));
        }

        let uniform = ChunkUniform::new(glam::Mat4::IDENTITY, &frame, self.light);
        let data = ChunkGpuData::new(
            &self.gpu.device,
            &self.gpu.queue,
            &self.pipeline,
            &geometry.vertices,
            maps,
            &uniform,
        );
        if let Some(entry) = self.chunks.get_mut(&chunk.id()) {
            if let Some(old) = entry.data.replace(data) {
                old.destroy();
            }
            entry.resolution = frame.resolution;
            entry.frame = Some(frame);
        }
    }

    fn build_program(&mut self, chunk: &Chunk) -> bool {
        // The pipeline is shared; a chunk is drawable once its data is uploaded.
        self.chunks
            .get(&chunk.id())
            .is_some_and(|entry| entry.data.is_some())
    }
}

//! The chunk displacement shader contract and its render pipeline.
//!
//! Chunks are drawn from two vertex buffers: a per-chunk [`ChunkVertex`]
//! buffer and a uv buffer shared by every chunk of the same resolution. The
//! height map is read in the vertex stage; colour and normal maps in the
//! fragment stage.

use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use glam::{DVec3, Mat4};
use lithos_terrain::{ChunkMaps, GridTopology};
use wgpu::util::DeviceExt;

/// WGSL source of the chunk vertex and fragment stages.
pub const CHUNK_SHADER_SOURCE: &str = include_str!("../shaders/chunk.wgsl");

/// One grid vertex of a chunk.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ChunkVertex {
    /// Cube-surface point relative to the chunk offset.
    pub position: [f32; 3],
    /// Undisplaced surface direction.
    pub normal: [f32; 3],
    /// Grid indices of the two stitch anchors.
    pub anchors: [u32; 2],
    /// Weight toward `anchors[1]`; zero for unstitched vertices.
    pub blend: f32,
}

impl ChunkVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
            0 => Float32x3,
            1 => Float32x3,
            2 => Uint32x2,
            3 => Float32,
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ChunkVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Layout of the shared uv buffer.
pub fn uv_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![4 => Float32x2];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

/// Per-chunk uniform. Layout matches `ChunkUniform` in `chunk.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ChunkUniform {
    pub view_proj: [[f32; 4]; 4],
    pub offset: [f32; 4],
    pub axis_u: [f32; 4],
    pub axis_v: [f32; 4],
    pub corner: [f32; 4],
    pub stretch: [f32; 4],
    pub light: [f32; 4],
    pub grid: [u32; 4],
}

/// Inputs for [`ChunkUniform::new`].
#[derive(Clone, Copy, Debug)]
pub struct ChunkFrame {
    /// Chunk centre on the cube surface.
    pub offset: DVec3,
    /// Face tangent and bitangent.
    pub tangent: DVec3,
    pub bitangent: DVec3,
    /// Chunk edge length in face-local units.
    pub width: f64,
    pub resolution: u32,
    pub border: u32,
    pub radius: f64,
    pub displacement: f64,
    pub bias: f64,
    pub stretch: DVec3,
    /// 0 for standard chunks, 1 for emissive ones.
    pub variant: u32,
    pub emissive: f32,
}

impl ChunkUniform {
    #[must_use]
    pub fn new(view_proj: Mat4, frame: &ChunkFrame, light: DVec3) -> Self {
        let step = frame.width / frame.resolution as f64;
        let corner = -(frame.tangent + frame.bitangent) * frame.width * 0.5;
        let v = |v: DVec3, w: f64| [v.x as f32, v.y as f32, v.z as f32, w as f32];
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            offset: v(frame.offset, frame.emissive as f64),
            axis_u: v(frame.tangent * step, frame.radius),
            axis_v: v(frame.bitangent * step, frame.displacement),
            corner: v(corner, frame.bias),
            stretch: v(frame.stretch, 0.0),
            light: v(light.normalize_or_zero(), 0.0),
            grid: [
                frame.resolution,
                frame.border,
                frame.resolution + 1 + 2 * frame.border,
                frame.variant,
            ],
        }
    }
}

/// Render pipeline for terrain chunks.
pub struct ChunkPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub sampler: wgpu::Sampler,
}

fn texture_entry(binding: u32, visibility: wgpu::ShaderStages, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

impl ChunkPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("terrain-chunk-shader"),
            source: wgpu::ShaderSource::Wgsl(CHUNK_SHADER_SOURCE.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("terrain-chunk-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(std::mem::size_of::<ChunkUniform>() as u64),
                    },
                    count: None,
                },
                texture_entry(1, wgpu::ShaderStages::VERTEX, false),
                texture_entry(2, wgpu::ShaderStages::FRAGMENT, true),
                texture_entry(3, wgpu::ShaderStages::FRAGMENT, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("terrain-chunk-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let depth_stencil = depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::GreaterEqual, // reverse-Z
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("terrain-chunk-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[ChunkVertex::layout(), uv_layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview_mask: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("terrain-map-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            pipeline,
            bind_group_layout,
            sampler,
        }
    }
}

/// GPU copies of a grid topology, shared by every chunk of its resolution.
pub struct GridBuffers {
    pub index_buffer: wgpu::Buffer,
    pub uv_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl GridBuffers {
    pub fn new(device: &wgpu::Device, topology: &GridTopology) -> Self {
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("terrain-grid-indices"),
            contents: bytemuck::cast_slice(topology.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });
        let uv_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("terrain-grid-uvs"),
            contents: bytemuck::cast_slice(topology.uvs()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self {
            index_buffer,
            uv_buffer,
            index_count: topology.indices().len() as u32,
        }
    }
}

fn map_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    side: u32,
    format: wgpu::TextureFormat,
    bytes: &[u8],
) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: side,
        height: side,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytes,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(side * 4),
            rows_per_image: Some(side),
        },
        size,
    );
    texture
}

/// Uploaded geometry, maps and uniform of one chunk.
pub struct ChunkGpuData {
    pub vertex_buffer: wgpu::Buffer,
    pub uniform_buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    textures: [wgpu::Texture; 3],
}

impl ChunkGpuData {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipeline: &ChunkPipeline,
        vertices: &[ChunkVertex],
        maps: &ChunkMaps,
        uniform: &ChunkUniform,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("terrain-chunk-vertices"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("terrain-chunk-uniform"),
            contents: bytemuck::bytes_of(uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let side = maps.texels_per_side as u32;
        let heights = map_texture(
            device,
            queue,
            "terrain-height-map",
            side,
            wgpu::TextureFormat::R32Float,
            bytemuck::cast_slice(&maps.heights),
        );
        let colors = map_texture(
            device,
            queue,
            "terrain-color-map",
            side,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            bytemuck::cast_slice(&maps.colors),
        );
        let normals = map_texture(
            device,
            queue,
            "terrain-normal-map",
            side,
            wgpu::TextureFormat::Rgba8Unorm,
            bytemuck::cast_slice(&maps.normals),
        );

        let view = |t: &wgpu::Texture| t.create_view(&wgpu::TextureViewDescriptor::default());
        let (hv, cv, nv) = (view(&heights), view(&colors), view(&normals));
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("terrain-chunk-bg"),
            layout: &pipeline.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&hv),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&cv),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&nv),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&pipeline.sampler),
                },
            ],
        });

        Self {
            vertex_buffer,
            uniform_buffer,
            bind_group,
            textures: [heights, colors, normals],
        }
    }

    /// Replace the uniform, e.g. after the camera moved.
    pub fn update_uniform(&self, queue: &wgpu::Queue, uniform: &ChunkUniform) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniform));
    }

    /// Release the GPU memory now rather than on drop.
    pub fn destroy(&self) {
        self.vertex_buffer.destroy();
        self.uniform_buffer.destroy();
        for t in &self.textures {
            t.destroy();
        }
    }
}

/// Record a draw of one chunk.
pub fn draw_chunk<'a>(
    render_pass: &mut wgpu::RenderPass<'a>,
    pipeline: &'a ChunkPipeline,
    grid: &'a GridBuffers,
    chunk: &'a ChunkGpuData,
) {
    render_pass.set_pipeline(&pipeline.pipeline);
    render_pass.set_bind_group(0, &chunk.bind_group, &[]);
    render_pass.set_vertex_buffer(0, chunk.vertex_buffer.slice(..));
    render_pass.set_vertex_buffer(1, grid.uv_buffer.slice(..));
    render_pass.set_index_buffer(grid.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
    render_pass.draw_indexed(0..grid.index_count, 0, 0..1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> ChunkFrame {
        ChunkFrame {
            offset: DVec3::new(1000.0, 0.0, 0.0),
            tangent: DVec3::NEG_Z,
            bitangent: DVec3::Y,
            width: 250.0,
            resolution: 4,
            border: 1,
            radius: 1000.0,
            displacement: 120.0,
            bias: 0.0,
            stretch: DVec3::new(1.4, 1.0, 0.8),
            variant: 0,
            emissive: 0.0,
        }
    }

    #[test]
    fn test_layout_sizes() {
        assert_eq!(std::mem::size_of::<ChunkVertex>(), 36);
        assert_eq!(std::mem::size_of::<ChunkUniform>(), 176);
    }

    #[test]
    fn test_uniform_grid_reconstruction() {
        let f = frame();
        let u = ChunkUniform::new(Mat4::IDENTITY, &f, DVec3::ONE);
        // Vertex (i, j) = corner + axis_u * i + axis_v * j.
        let at = |i: f32, j: f32| {
            [0, 1, 2].map(|k| u.corner[k] + u.axis_u[k] * i + u.axis_v[k] * j)
        };
        assert_eq!(at(2.0, 2.0), [0.0, 0.0, 0.0]);
        assert_eq!(at(4.0, 0.0), [0.0, -125.0, -125.0]);
        assert_eq!(u.grid, [4, 1, 7, 0]);
        assert_eq!(u.axis_u[3], 1000.0);
        assert_eq!(u.axis_v[3], 120.0);
    }

    #[test]
    fn test_pipeline_and_upload() {
        let Ok(gpu) = crate::init_headless_blocking() else {
            return;
        };
        let device = &gpu.device;
        let pipeline = ChunkPipeline::new(device, wgpu::TextureFormat::Rgba8UnormSrgb, None);
        let topology = GridTopology::new(4);
        let grid = GridBuffers::new(device, &topology);
        assert_eq!(grid.index_count, 96);

        let vertices = vec![ChunkVertex::default(); topology.vertex_count()];
        let texels = 7 * 7;
        let maps = ChunkMaps {
            texels_per_side: 7,
            border: 1,
            heights: vec![0.0; texels],
            colors: vec![[255, 255, 255, 255]; texels],
            normals: vec![[128, 128, 255, 255]; texels],
        };
        let uniform = ChunkUniform::new(Mat4::IDENTITY, &frame(), DVec3::ONE);
        let data = ChunkGpuData::new(device, &gpu.queue, &pipeline, &vertices, &maps, &uniform);

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("test-target"),
            size: wgpu::Extent3d {
                width: 16,
                height: 16,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("test-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            draw_chunk(&mut pass, &pipeline, &grid, &data);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        gpu.wait_idle();
        data.destroy();
    }
}

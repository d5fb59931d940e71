//! GPU backend of the map generator: three compute passes over storage buffers.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use lithos_terrain::{ChunkMaps, ColorRamp, HeightField, MapError, MapGenerator, MapRequest, RAMP_WIDTH};
use wgpu::util::DeviceExt;

use crate::gpu::GpuContext;

/// WGSL source of the height, colour and normal passes.
pub const MAP_SHADER_SOURCE: &str = include_str!("../shaders/maps.wgsl");

const WORKGROUP: u32 = 8;

/// Per-request parameters. Layout matches `MapParams` in `maps.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct MapParams {
    pub normal: [f32; 4],
    pub tangent: [f32; 4],
    pub bitangent: [f32; 4],
    pub footprint: [f32; 4],
    pub shape: [f32; 4],
    pub noise: [f32; 4],
    pub cleave: [f32; 4],
    pub grid: [u32; 4],
    pub counts: [u32; 4],
    pub strides: [u32; 4],
    pub ramp: [u32; 4],
    pub body: [f32; 4],
}

/// One crater as uploaded to the GPU.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuCrater {
    pub sphere: [f32; 4],
    pub params: [f32; 4],
}

impl MapParams {
    #[must_use]
    pub fn new(field: &HeightField, req: &MapRequest) -> Self {
        let shape = field.shape();
        let features = field.features();
        let v4 = |v: glam::DVec3| [v.x as f32, v.y as f32, v.z as f32, 0.0];
        Self {
            normal: v4(req.face.normal()),
            tangent: v4(req.face.tangent()),
            bitangent: v4(req.face.bitangent()),
            footprint: [
                req.center.x as f32,
                req.center.y as f32,
                req.width as f32,
                req.half_extent as f32,
            ],
            shape: [
                shape.displacement as f32,
                shape.ridges.weight as f32,
                features.rim_height() as f32,
                features.rim_width() as f32,
            ],
            noise: [
                shape.noise.frequency as f32,
                shape.noise.persistence as f32,
                shape.noise.lacunarity as f32,
                shape.ridges.frequency as f32,
            ],
            cleave: [
                features.cleave_depth() as f32,
                features.cleave_width() as f32,
                shape.ridges.sharpness as f32,
                0.0,
            ],
            grid: [
                req.resolution,
                req.border,
                req.texels_per_side() as u32,
                field.noise_seed(),
            ],
            counts: [
                shape.noise.octaves,
                shape.ridges.octaves,
                features.craters.len() as u32,
                features.cleaves.len() as u32,
            ],
            strides: req.strides,
            ramp: [shape.spectral_class.ramp_row(), RAMP_WIDTH as u32, 0, 0],
            body: [
                shape.stretch[0] as f32,
                shape.stretch[1] as f32,
                shape.stretch[2] as f32,
                shape.radius as f32,
            ],
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Pass {
    Height,
    Color,
    Normal,
}

/// Raw readback of whichever passes ran.
#[derive(Default)]
struct Readback {
    heights: Option<Vec<f32>>,
    colors: Option<Vec<[u8; 4]>>,
    normals: Option<Vec<[u8; 4]>>,
}

/// Renders map passes with wgpu compute shaders.
///
/// Feature lists and the colour ramp are uploaded once at construction;
/// each request allocates its own parameter and output buffers.
pub struct GpuMapGenerator {
    gpu: Arc<GpuContext>,
    field: Arc<HeightField>,
    layout: wgpu::BindGroupLayout,
    height_pipeline: wgpu::ComputePipeline,
    color_pipeline: wgpu::ComputePipeline,
    normal_pipeline: wgpu::ComputePipeline,
    craters: wgpu::Buffer,
    cleaves: wgpu::Buffer,
    ramp: wgpu::Buffer,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl GpuMapGenerator {
    pub fn new(gpu: Arc<GpuContext>, field: Arc<HeightField>) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("terrain-maps-shader"),
            source: wgpu::ShaderSource::Wgsl(MAP_SHADER_SOURCE.into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("terrain-maps-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, false),
                storage_entry(5, false),
                storage_entry(6, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("terrain-maps-pipeline-layout"),
            bind_group_layouts: &[&layout],
            immediate_size: 0,
        });

        let pipeline = |label: &str, entry: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let height_pipeline = pipeline("terrain-height-pass", "height_main");
        let color_pipeline = pipeline("terrain-color-pass", "color_main");
        let normal_pipeline = pipeline("terrain-normal-pass", "normal_main");

        let features = field.features();
        // Storage bindings must not be empty; counts in MapParams bound the loops.
        let mut craters: Vec<GpuCrater> = features
            .craters
            .iter()
            .map(|c| GpuCrater {
                sphere: [c.center.x as f32, c.center.y as f32, c.center.z as f32, c.radius as f32],
                params: [c.depth as f32, 0.0, 0.0, 0.0],
            })
            .collect();
        if craters.is_empty() {
            craters.push(GpuCrater::zeroed());
        }
        let mut cleaves: Vec<[f32; 4]> = features
            .cleaves
            .iter()
            .map(|p| [p.normal.x as f32, p.normal.y as f32, p.normal.z as f32, p.offset as f32])
            .collect();
        if cleaves.is_empty() {
            cleaves.push([0.0; 4]);
        }

        let craters = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("terrain-craters"),
            contents: bytemuck::cast_slice(&craters),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let cleaves = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("terrain-cleaves"),
            contents: bytemuck::cast_slice(&cleaves),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let ramp = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("terrain-color-ramp"),
            contents: bytemuck::cast_slice(&ColorRamp::shared().packed()),
            usage: wgpu::BufferUsages::STORAGE,
        });

        tracing::debug!(
            craters = features.craters.len(),
            cleaves = features.cleaves.len(),
            "GPU map generator ready"
        );

        Self {
            gpu,
            field,
            layout,
            height_pipeline,
            color_pipeline,
            normal_pipeline,
            craters,
            cleaves,
            ramp,
        }
    }

    #[must_use]
    pub fn field(&self) -> &Arc<HeightField> {
        &self.field
    }

    fn output_buffer(&self, label: &str, texels: usize, init: Option<&[f32]>) -> wgpu::Buffer {
        let usage =
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST;
        match init {
            Some(data) => self
                .gpu
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: bytemuck::cast_slice(data),
                    usage,
                }),
            None => self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: (texels * 4) as u64,
                usage,
                mapped_at_creation: false,
            }),
        }
    }

    /// Dispatch `passes` in order and read back their outputs. When
    /// `heights` is given it seeds the height buffer instead of a height pass.
    fn run(
        &self,
        req: &MapRequest,
        passes: &[Pass],
        heights: Option<&[f32]>,
    ) -> Result<Readback, MapError> {
        req.validate()?;
        let texels = req.texel_count();
        if let Some(h) = heights
            && h.len() != texels
        {
            return Err(MapError::InvalidRequest(format!(
                "height map has {} texels, expected {texels}",
                h.len()
            )));
        }

        let device = &self.gpu.device;
        let params = MapParams::new(&self.field, req);
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("terrain-map-params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let height_buffer = self.output_buffer("terrain-heights", texels, heights);
        let color_buffer = self.output_buffer("terrain-colors", texels, None);
        let normal_buffer = self.output_buffer("terrain-normals", texels, None);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("terrain-maps-bg"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.craters.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.cleaves.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.ramp.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: height_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: color_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: normal_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("terrain-maps-encoder"),
        });
        let groups = (req.texels_per_side() as u32).div_ceil(WORKGROUP);
        for pass in passes {
            let (pipeline, label) = match pass {
                Pass::Height => (&self.height_pipeline, "terrain-height-pass"),
                Pass::Color => (&self.color_pipeline, "terrain-color-pass"),
                Pass::Normal => (&self.normal_pipeline, "terrain-normal-pass"),
            };
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            cpass.set_pipeline(pipeline);
            cpass.set_bind_group(0, &bind_group, &[]);
            cpass.dispatch_workgroups(groups, groups, 1);
        }

        let size = (texels * 4) as u64;
        let staging = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let mut copies = Vec::new();
        if passes.contains(&Pass::Height) {
            let dst = staging("terrain-heights-readback");
            encoder.copy_buffer_to_buffer(&height_buffer, 0, &dst, 0, size);
            copies.push((Pass::Height, dst));
        }
        if passes.contains(&Pass::Color) {
            let dst = staging("terrain-colors-readback");
            encoder.copy_buffer_to_buffer(&color_buffer, 0, &dst, 0, size);
            copies.push((Pass::Color, dst));
        }
        if passes.contains(&Pass::Normal) {
            let dst = staging("terrain-normals-readback");
            encoder.copy_buffer_to_buffer(&normal_buffer, 0, &dst, 0, size);
            copies.push((Pass::Normal, dst));
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        let mut out = Readback::default();
        for (pass, buffer) in copies {
            let words = read_words(&self.gpu, &buffer)?;
            match pass {
                Pass::Height => out.heights = Some(words.iter().map(|w| f32::from_bits(*w)).collect()),
                Pass::Color => out.colors = Some(words.iter().map(|w| w.to_le_bytes()).collect()),
                Pass::Normal => out.normals = Some(words.iter().map(|w| w.to_le_bytes()).collect()),
            }
        }
        Ok(out)
    }
}

/// Map a readback buffer and copy it out as `u32` words.
fn read_words(gpu: &GpuContext, buffer: &wgpu::Buffer) -> Result<Vec<u32>, MapError> {
    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    gpu.device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })
        .map_err(|e| MapError::Backend(format!("device poll failed: {e}")))?;

    match rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(MapError::Backend(format!("buffer map failed: {e}"))),
        Err(_) => return Err(MapError::Backend("buffer map callback dropped".into())),
    }

    let words = {
        let mapped = slice.get_mapped_range();
        bytemuck::cast_slice::<u8, u32>(&mapped).to_vec()
    };
    buffer.unmap();
    Ok(words)
}

fn missing(what: &str) -> MapError {
    MapError::Backend(format!("{what} pass produced no output"))
}

impl MapGenerator for GpuMapGenerator {
    fn height_pass(&self, req: &MapRequest) -> Result<Vec<f32>, MapError> {
        self.run(req, &[Pass::Height], None)?
            .heights
            .ok_or_else(|| missing("height"))
    }

    fn color_pass(&self, req: &MapRequest, heights: &[f32]) -> Result<Vec<[u8; 4]>, MapError> {
        self.run(req, &[Pass::Color], Some(heights))?
            .colors
            .ok_or_else(|| missing("color"))
    }

    fn normal_pass(&self, req: &MapRequest, heights: &[f32]) -> Result<Vec<[u8; 4]>, MapError> {
        self.run(req, &[Pass::Normal], Some(heights))?
            .normals
            .ok_or_else(|| missing("normal"))
    }

    /// All three passes in one submission.
    fn generate(&self, req: &MapRequest) -> Result<ChunkMaps, MapError> {
        let out = self.run(req, &[Pass::Height, Pass::Color, Pass::Normal], None)?;
        Ok(ChunkMaps {
            texels_per_side: req.texels_per_side(),
            border: req.border as usize,
            heights: out.heights.ok_or_else(|| missing("height"))?,
            colors: out.colors.ok_or_else(|| missing("color"))?,
            normals: out.normals.ok_or_else(|| missing("normal"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;
    use lithos_config::ShapeConfig;
    use lithos_cubesphere::CubeFace;
    use lithos_terrain::CpuMapGenerator;

    fn setup() -> Option<(GpuMapGenerator, CpuMapGenerator)> {
        let gpu = Arc::new(crate::init_headless_blocking().ok()?);
        let field = Arc::new(HeightField::new(ShapeConfig::default()));
        Some((
            GpuMapGenerator::new(gpu, Arc::clone(&field)),
            CpuMapGenerator::new(field),
        ))
    }

    fn request() -> MapRequest {
        MapRequest {
            face: CubeFace::NegZ,
            center: DVec2::new(125.0, -375.0),
            width: 250.0,
            resolution: 16,
            strides: [1, 2, 1, 4],
            border: 1,
            half_extent: 1000.0,
        }
    }

    #[test]
    fn test_params_size_matches_wgsl() {
        assert_eq!(std::mem::size_of::<MapParams>(), 12 * 16);
        assert_eq!(std::mem::size_of::<GpuCrater>(), 32);
    }

    #[test]
    fn test_params_carry_request() {
        let field = HeightField::new(ShapeConfig::default());
        let req = request();
        let p = MapParams::new(&field, &req);
        assert_eq!(p.grid, [16, 1, 19, field.noise_seed()]);
        assert_eq!(p.strides, [1, 2, 1, 4]);
        assert_eq!(p.normal, [0.0, 0.0, -1.0, 0.0]);
        assert_eq!(p.counts[2], field.features().craters.len() as u32);
        assert_eq!(p.body, [1.4, 1.0, 0.8, 1000.0]);
    }

    #[test]
    fn test_gpu_heights_match_cpu() {
        let Some((gpu, cpu)) = setup() else {
            return;
        };
        let req = request();
        let g = gpu.generate(&req).unwrap();
        let c = cpu.generate(&req).unwrap();
        assert_eq!(g.heights.len(), c.heights.len());
        for (i, (a, b)) in g.heights.iter().zip(&c.heights).enumerate() {
            assert!((a - b).abs() < 1e-3, "texel {i}: gpu {a} vs cpu {b}");
        }
    }

    #[test]
    fn test_gpu_color_pass_matches_cpu_on_same_heights() {
        let Some((gpu, cpu)) = setup() else {
            return;
        };
        let req = request();
        let heights = cpu.height_pass(&req).unwrap();
        assert_eq!(
            gpu.color_pass(&req, &heights).unwrap(),
            cpu.color_pass(&req, &heights).unwrap()
        );
    }

    #[test]
    fn test_gpu_normals_close_to_cpu() {
        let Some((gpu, cpu)) = setup() else {
            return;
        };
        let req = request();
        let heights = cpu.height_pass(&req).unwrap();
        let g = gpu.normal_pass(&req, &heights).unwrap();
        let c = cpu.normal_pass(&req, &heights).unwrap();
        for (a, b) in g.iter().zip(&c) {
            for ch in 0..4 {
                assert!((a[ch] as i32 - b[ch] as i32).abs() <= 1, "{a:?} vs {b:?}");
            }
        }
    }

    fn shared_edge_normal_gap(gpu: &GpuMapGenerator, border: u32) -> i32 {
        let west = MapRequest {
            face: CubeFace::PosY,
            center: DVec2::new(-125.0, 375.0),
            width: 250.0,
            resolution: 8,
            strides: [1; 4],
            border,
            half_extent: 1000.0,
        };
        let mut east = west.clone();
        east.center.x += east.width;
        let a = gpu.generate(&west).unwrap();
        let b = gpu.generate(&east).unwrap();

        let pad = border as usize;
        let res = west.resolution as usize;
        let n = west.texels_per_side();
        (pad..=pad + res)
            .flat_map(|y| {
                let na = a.normals[y * n + res + pad];
                let nb = b.normals[y * n + pad];
                (0..3).map(move |c| (na[c] as i32 - nb[c] as i32).abs())
            })
            .max()
            .unwrap()
    }

    #[test]
    fn test_gpu_border_makes_shared_edge_normals_agree() {
        let Some((gpu, _)) = setup() else {
            return;
        };
        assert!(shared_edge_normal_gap(&gpu, 1) <= 1);
        let gap = shared_edge_normal_gap(&gpu, 0);
        assert!(gap > 2, "edge normals only differ by {gap}");
    }

    #[test]
    fn test_gpu_rejects_bad_request() {
        let Some((gpu, _)) = setup() else {
            return;
        };
        let mut req = request();
        req.resolution = 12;
        assert!(gpu.generate(&req).is_err());
    }
}

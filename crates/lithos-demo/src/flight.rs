//! Scripted approach toward the body, driving the terrain host loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::DVec3;
use lithos_config::{Config, MapBackendKind};
use lithos_planet::{
    HeadlessRenderGroup, RenderGroup, TerrainCube, TerrainError, TerrainStats, ThreadWorkerPool,
    WorkerPool,
};
use lithos_render::{Camera, GpuContext, GpuMapGenerator, init_headless_blocking};
use lithos_terrain::{CpuMapGenerator, HeightField, MapGenerator};
use tracing::{info, warn};

use crate::gpu_group::GpuRenderGroup;

const TARGET_WIDTH: u32 = 640;
const TARGET_HEIGHT: u32 = 360;

/// Camera path from far orbit down to just above the surface.
#[derive(Clone, Copy, Debug)]
pub struct FlightPath {
    pub direction: DVec3,
    pub start: f64,
    pub end: f64,
    pub frames: u32,
}

impl FlightPath {
    pub fn approach(field: &HeightField, frames: u32) -> Self {
        let extent = field.shape().max_extent();
        Self {
            direction: DVec3::new(0.35, 0.8, 0.5).normalize(),
            start: extent * 8.0,
            end: extent * 1.02,
            frames,
        }
    }

    /// Geometric interpolation, so detail ramps up evenly as the camera nears.
    pub fn position(&self, frame: u32) -> DVec3 {
        let t = if self.frames <= 1 {
            1.0
        } else {
            f64::from(frame.min(self.frames - 1)) / f64::from(self.frames - 1)
        };
        self.direction * self.start * (self.end / self.start).powf(t)
    }
}

/// What a run did, for the closing log line.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlightReport {
    pub frames: u32,
    pub reconfigurations: u32,
    pub busy_frames: u32,
    pub maps_built: usize,
    pub stats: TerrainStats,
}

/// Run the host loop along `path`, calling `on_frame` after each frame.
pub fn fly<W, G>(
    cube: &mut TerrainCube<W, G>,
    path: &FlightPath,
    budget: Duration,
    mut on_frame: impl FnMut(&mut TerrainCube<W, G>, DVec3),
) -> Result<FlightReport, TerrainError>
where
    W: WorkerPool,
    G: RenderGroup,
{
    let mut report = FlightReport::default();

    for frame in 0..path.frames {
        let position = path.position(frame);
        if cube.is_busy() {
            report.busy_frames += 1;
        } else {
            cube.set_camera_position(position)?;
            report.reconfigurations += 1;
        }
        cube.update();
        report.maps_built += cube.update_maps(Instant::now() + budget);
        on_frame(cube, position);
        report.frames += 1;

        if frame % 30 == 0 {
            let stats = cube.stats();
            info!(
                frame,
                altitude = position.length() - cube.field().shape().radius,
                active = stats.active_chunks,
                pooled = stats.pooled_chunks,
                min_size = stats.min_chunk_size.unwrap_or(0.0),
                "Flight progress"
            );
        }
    }

    // Let the last batch land before reporting.
    let settle_start = Instant::now();
    while cube.is_busy() && settle_start.elapsed() < Duration::from_secs(30) {
        cube.update();
        report.maps_built += cube.update_maps(Instant::now() + budget);
        if cube.is_busy() {
            std::thread::sleep(Duration::from_millis(1));
        }
    }
    if cube.is_busy() {
        warn!("Terrain still busy after the flight ended");
    }

    report.stats = cube.stats();
    Ok(report)
}

fn map_generator(
    config: &Config,
    field: &Arc<HeightField>,
    gpu: Option<&Arc<GpuContext>>,
) -> Box<dyn MapGenerator> {
    match (config.maps.backend, gpu) {
        (MapBackendKind::Gpu, Some(gpu)) => {
            Box::new(GpuMapGenerator::new(Arc::clone(gpu), Arc::clone(field)))
        }
        _ => Box::new(CpuMapGenerator::new(Arc::clone(field))),
    }
}

/// Build the body from `config` and fly toward it for `frames` frames.
pub fn run(config: &Config, frames: u32) -> Result<FlightReport, TerrainError> {
    let field = Arc::new(HeightField::new(config.shape.clone()));
    let path = FlightPath::approach(&field, frames);
    let budget = Duration::from_secs_f64(config.manager.frame_budget_ms.max(0.0) / 1000.0);
    let worker = ThreadWorkerPool::new(config.manager.worker_threads);

    let gpu = match config.maps.backend {
        MapBackendKind::Gpu => match init_headless_blocking() {
            Ok(gpu) => Some(Arc::new(gpu)),
            Err(e) => {
                warn!(error = %e, "GPU unavailable, generating maps on the CPU");
                None
            }
        },
        MapBackendKind::Cpu => None,
    };
    let generator = map_generator(config, &field, gpu.as_ref());

    let report = match gpu {
        Some(gpu) => {
            let group = GpuRenderGroup::new(Arc::clone(&gpu), Arc::clone(&field), TARGET_WIDTH, TARGET_HEIGHT);
            let mut cube = TerrainCube::new(config, Arc::clone(&field), generator, worker, group)?;
            let stretch = field.stretch();
            let mut drawn = 0;
            let report = fly(&mut cube, &path, budget, |cube, position| {
                let mut camera = Camera::looking_at_origin(position * stretch);
                camera.set_aspect_ratio(TARGET_WIDTH, TARGET_HEIGHT);
                drawn = cube.manager_mut().group_mut().render(&camera);
            })?;
            gpu.wait_idle();
            info!(chunks = drawn, "Last frame drawn");
            cube.dispose();
            report
        }
        None => {
            let mut cube = TerrainCube::new(config, Arc::clone(&field), generator, worker, HeadlessRenderGroup::new())?;
            let report = fly(&mut cube, &path, budget, |_, _| {})?;
            info!(visible = cube.manager().group().visible_count(), "Final visible chunks");
            cube.dispose();
            report
        }
    };

    Ok(report)
}

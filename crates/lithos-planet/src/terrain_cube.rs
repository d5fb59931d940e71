//! Six quadtree faces driving one chunk manager.

use std::sync::Arc;
use std::time::Instant;

use glam::{DVec2, DVec3};
use lithos_config::Config;
use lithos_cubesphere::{CubeFace, FaceBounds};
use lithos_lod::{
    LodSettings, NodeRef, ProxySource, QuadtreeFace, populate_nonside_neighbors, stitching_strides,
};
use lithos_terrain::{CoarseHeightmap, HeightField, MapGenerator, MapRequest};
use rustc_hash::FxHashMap;

use crate::chunk::{ChunkId, ChunkKey, ChunkVariant};
use crate::chunk_manager::{ChunkManager, ManagerSettings};
use crate::error::TerrainError;
use crate::render_group::RenderGroup;
use crate::worker::WorkerPool;

/// Node proxies at the lowest coarse height under each node.
struct CoarseProxy<'a> {
    field: &'a HeightField,
    coarse: &'a CoarseHeightmap,
}

impl ProxySource for CoarseProxy<'_> {
    fn proxy_position(&self, face: CubeFace, bounds: &FaceBounds) -> DVec3 {
        self.coarse.proxy_position(self.field, face, bounds)
    }
}

/// Snapshot of the cube after the last reconfiguration.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TerrainStats {
    /// Chunks serving the current leaf set.
    pub active_chunks: usize,
    /// Leaves across all six faces.
    pub leaves: usize,
    /// Edge length of the smallest active chunk in face-local units.
    pub min_chunk_size: Option<f64>,
    /// Chunks waiting in pools.
    pub pooled_chunks: usize,
    /// Chunk objects constructed so far.
    pub constructed_chunks: usize,
    /// Chunks allocated by the last reconfiguration.
    pub last_allocations: usize,
    /// Chunks recycled by the last reconfiguration.
    pub last_recycled: usize,
}

/// Six face quadtrees and the chunks serving their leaves.
///
/// Each frame the host calls [`Self::set_camera_position`] when the cube
/// is not busy, then [`Self::update`] and [`Self::update_maps`].
pub struct TerrainCube<W: WorkerPool, G: RenderGroup> {
    field: Arc<HeightField>,
    coarse: CoarseHeightmap,
    faces: Vec<QuadtreeFace>,
    manager: ChunkManager<W, G>,
    settings: LodSettings,
    resolution: u32,
    border: u32,
    variant: ChunkVariant,
    active: FxHashMap<ChunkKey, ChunkId>,
    leaves: usize,
    min_chunk_size: Option<f64>,
    last_allocations: usize,
    last_recycled: usize,
}

impl<W: WorkerPool, G: RenderGroup> TerrainCube<W, G> {
    /// Validate `config` and build the coarse heightmap and six root faces.
    /// No chunks exist until the first camera position.
    pub fn new(
        config: &Config,
        field: Arc<HeightField>,
        generator: Box<dyn MapGenerator>,
        worker: W,
        group: G,
    ) -> Result<Self, TerrainError> {
        config.validate()?;
        let half_extent = field.shape().radius;
        let resolution = config.lod.resolution;
        let border = config.maps.oversample;

        MapRequest {
            face: CubeFace::PosX,
            center: DVec2::ZERO,
            width: 2.0 * half_extent,
            resolution,
            strides: [1; 4],
            border,
            half_extent,
        }
        .validate()?;

        let coarse = CoarseHeightmap::build(&field, config.lod.coarse_resolution);
        let proxy = CoarseProxy {
            field: &field,
            coarse: &coarse,
        };
        let faces = CubeFace::ALL
            .iter()
            .map(|&face| QuadtreeFace::new(face, half_extent, &proxy))
            .collect();

        let variant = ChunkVariant::for_shape(field.shape());
        let manager = ChunkManager::new(
            worker,
            group,
            generator,
            Arc::clone(&field),
            ManagerSettings::from(&config.manager),
            variant,
        );

        tracing::info!(
            radius = half_extent,
            resolution,
            coarse = coarse.resolution(),
            ?variant,
            "Terrain cube created"
        );

        Ok(Self {
            field,
            coarse,
            faces,
            manager,
            settings: LodSettings::from(&config.lod),
            resolution,
            border,
            variant,
            active: FxHashMap::default(),
            leaves: 0,
            min_chunk_size: None,
            last_allocations: 0,
            last_recycled: 0,
        })
    }

    /// Rebuild the quadtrees for `camera` (body-local, before stretch) and
    /// start a batch that swaps the active chunk set to match the leaves.
    pub fn set_camera_position(&mut self, camera: DVec3) -> Result<(), TerrainError> {
        if self.manager.is_busy() {
            return Err(TerrainError::Busy);
        }
        self.forget_failed();

        let proxy = CoarseProxy {
            field: &self.field,
            coarse: &self.coarse,
        };
        for face in &mut self.faces {
            face.set_camera_position(camera, &self.settings, &proxy);
            face.populate_edges();
        }
        populate_nonside_neighbors(&mut self.faces);

        let half_extent = self.field.shape().radius;
        let mut required = Vec::new();
        for face in &self.faces {
            for (id, node) in face.leaves() {
                let leaf = NodeRef {
                    face: face.face(),
                    node: id,
                };
                let strides = stitching_strides(&self.faces, leaf, self.resolution);
                let key = ChunkKey {
                    address: node.address,
                    strides,
                    variant: self.variant,
                };
                let request = MapRequest {
                    face: face.face(),
                    center: node.center(),
                    width: node.size(),
                    resolution: self.resolution,
                    strides,
                    border: self.border,
                    half_extent,
                };
                required.push((key, request));
            }
        }
        self.leaves = required.len();

        let mut next = FxHashMap::default();
        let mut allocations = 0;
        let mut min_size = f64::INFINITY;
        for (key, request) in required {
            min_size = min_size.min(request.width);
            let id = match self.active.remove(&key) {
                Some(id) => id,
                None => {
                    allocations += 1;
                    self.manager.allocate_chunk(key, request)
                }
            };
            next.insert(key, id);
        }

        let recycled = self.active.len();
        for (_, id) in self.active.drain() {
            self.manager.recycle_chunk(id);
        }
        self.active = next;
        self.min_chunk_size = min_size.is_finite().then_some(min_size);
        self.last_allocations = allocations;
        self.last_recycled = recycled;

        tracing::info!(
            leaves = self.leaves,
            allocations,
            recycled,
            reused = self.leaves - allocations,
            min_chunk_size = self.min_chunk_size.unwrap_or(0.0),
            "Terrain reconfigured"
        );
        Ok(())
    }

    /// Drop keys whose chunks failed so the next reconfiguration asks
    /// for them again.
    fn forget_failed(&mut self) {
        for key in self.manager.take_failed() {
            self.active.remove(&key);
        }
    }

    /// Commit the pending batch once it is fully built.
    pub fn update(&mut self) -> bool {
        let committed = self.manager.update();
        self.forget_failed();
        committed
    }

    /// Build maps until `deadline`; see [`ChunkManager::update_maps`].
    pub fn update_maps(&mut self, deadline: Instant) -> usize {
        let built = self.manager.update_maps(deadline);
        self.forget_failed();
        built
    }

    /// A batch is in flight; reconfiguration returns [`TerrainError::Busy`].
    pub fn is_busy(&self) -> bool {
        self.manager.is_busy()
    }

    /// Switch the chunk variant. Takes effect on the next reconfiguration,
    /// which replaces every active chunk.
    pub fn set_variant(&mut self, variant: ChunkVariant) {
        if variant != self.variant {
            tracing::info!(from = ?self.variant, to = ?variant, "Switching chunk variant");
        }
        self.variant = variant;
        self.manager.set_variant(variant);
    }

    /// Variant requested for new chunks.
    pub fn variant(&self) -> ChunkVariant {
        self.variant
    }

    /// Dispose every chunk and forget the active set.
    pub fn dispose(&mut self) {
        self.manager.dispose();
        self.active.clear();
        self.leaves = 0;
        self.min_chunk_size = None;
    }

    /// Smallest active chunk edge length, if any chunk is active.
    pub fn min_active_chunk_size(&self) -> Option<f64> {
        self.min_chunk_size
    }

    /// Counters for the last reconfiguration.
    pub fn stats(&self) -> TerrainStats {
        TerrainStats {
            active_chunks: self.active.len(),
            leaves: self.leaves,
            min_chunk_size: self.min_chunk_size,
            pooled_chunks: self.manager.pooled_count(),
            constructed_chunks: self.manager.constructed_count(),
            last_allocations: self.last_allocations,
            last_recycled: self.last_recycled,
        }
    }

    /// The six face trees in [`CubeFace`] index order.
    pub fn faces(&self) -> &[QuadtreeFace] {
        &self.faces
    }

    /// Keys required by the last reconfiguration.
    pub fn active_keys(&self) -> impl Iterator<Item = &ChunkKey> + '_ {
        self.active.keys()
    }

    /// Chunk serving `key`.
    pub fn active_chunk(&self, key: &ChunkKey) -> Option<ChunkId> {
        self.active.get(key).copied()
    }

    /// Height field of the body.
    pub fn field(&self) -> &Arc<HeightField> {
        &self.field
    }

    /// Grid segments per chunk edge.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// The chunk manager.
    pub fn manager(&self) -> &ChunkManager<W, G> {
        &self.manager
    }

    /// Mutable chunk manager, for drawing through its group.
    pub fn manager_mut(&mut self) -> &mut ChunkManager<W, G> {
        &mut self.manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_group::HeadlessRenderGroup;
    use crate::worker::InlineWorkerPool;
    use std::cell::Cell;
    use std::time::Duration;
    use lithos_terrain::{CpuMapGenerator, MapError};

    fn config() -> Config {
        let mut config = Config::default();
        config.lod.resolution = 8;
        config.lod.coarse_resolution = 8;
        config
    }

    fn cube_with(
        config: &Config,
        generator: impl FnOnce(Arc<HeightField>) -> Box<dyn MapGenerator>,
    ) -> TerrainCube<InlineWorkerPool, HeadlessRenderGroup> {
        let field = Arc::new(HeightField::new(config.shape.clone()));
        let generator = generator(Arc::clone(&field));
        TerrainCube::new(config, field, generator, InlineWorkerPool::new(), HeadlessRenderGroup::new())
            .expect("cube")
    }

    fn cube() -> TerrainCube<InlineWorkerPool, HeadlessRenderGroup> {
        cube_with(&config(), |f| Box::new(CpuMapGenerator::new(f)))
    }

    fn settle(cube: &mut TerrainCube<InlineWorkerPool, HeadlessRenderGroup>) {
        for _ in 0..1000 {
            cube.update();
            cube.update_maps(Instant::now() + Duration::from_secs(60));
            if !cube.is_busy() {
                return;
            }
        }
        panic!("terrain did not settle");
    }

    fn far() -> DVec3 {
        DVec3::new(0.0, 0.0, 100_000.0)
    }

    /// Fails the first `n` map generations.
    struct FlakyMaps {
        inner: CpuMapGenerator,
        failures: Cell<usize>,
    }

    impl MapGenerator for FlakyMaps {
        fn height_pass(&self, req: &MapRequest) -> Result<Vec<f32>, MapError> {
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(MapError::Backend("transient".into()));
            }
            self.inner.height_pass(req)
        }
        fn color_pass(&self, req: &MapRequest, heights: &[f32]) -> Result<Vec<[u8; 4]>, MapError> {
            self.inner.color_pass(req, heights)
        }
        fn normal_pass(&self, req: &MapRequest, heights: &[f32]) -> Result<Vec<[u8; 4]>, MapError> {
            self.inner.normal_pass(req, heights)
        }
    }

    #[test]
    fn test_far_camera_gives_six_roots() {
        let mut cube = cube();
        cube.set_camera_position(far()).expect("reconfigure");
        settle(&mut cube);
        let stats = cube.stats();
        assert_eq!(stats.active_chunks, 6);
        assert_eq!(stats.leaves, 6);
        assert_eq!(stats.last_allocations, 6);
        assert_eq!(stats.min_chunk_size, Some(2000.0));
        assert_eq!(cube.manager().group().visible_count(), 6);
    }

    #[test]
    fn test_busy_rejects_reconfiguration() {
        let mut cube = cube();
        cube.set_camera_position(far()).expect("reconfigure");
        assert!(cube.is_busy());
        assert!(matches!(cube.set_camera_position(DVec3::ZERO), Err(TerrainError::Busy)));
        assert_eq!(cube.stats().leaves, 6, "rejected call changed nothing");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = config();
        config.lod.resolution = 12;
        let field = Arc::new(HeightField::new(config.shape.clone()));
        let result = TerrainCube::new(
            &config,
            Arc::clone(&field),
            Box::new(CpuMapGenerator::new(field)),
            InlineWorkerPool::new(),
            HeadlessRenderGroup::new(),
        );
        assert!(matches!(result, Err(TerrainError::Config(_))));
    }

    #[test]
    fn test_failed_chunk_is_requested_again() {
        let mut cube = cube_with(&config(), |f| {
            Box::new(FlakyMaps {
                inner: CpuMapGenerator::new(f),
                failures: Cell::new(1),
            })
        });
        cube.set_camera_position(far()).expect("reconfigure");
        settle(&mut cube);
        assert_eq!(cube.manager().group().visible_count(), 5);

        cube.set_camera_position(far()).expect("reconfigure");
        assert_eq!(cube.stats().last_allocations, 1);
        settle(&mut cube);
        assert_eq!(cube.manager().group().visible_count(), 6);
    }

    #[test]
    fn test_variant_switch_replaces_chunks() {
        let mut cube = cube();
        cube.set_camera_position(far()).expect("reconfigure");
        settle(&mut cube);

        cube.set_variant(ChunkVariant::Emissive);
        cube.set_camera_position(far()).expect("reconfigure");
        let stats = cube.stats();
        assert_eq!(stats.last_allocations, 6);
        assert_eq!(stats.last_recycled, 6);
        assert!(cube.active_keys().all(|k| k.variant == ChunkVariant::Emissive));
        settle(&mut cube);
        assert_eq!(cube.manager().live_count(), 6, "old variant chunks disposed");
        assert_eq!(cube.stats().pooled_chunks, 0);
    }

    #[test]
    fn test_dispose_clears_everything() {
        let mut cube = cube();
        cube.set_camera_position(far()).expect("reconfigure");
        settle(&mut cube);
        cube.dispose();
        assert_eq!(cube.stats().active_chunks, 0);
        assert_eq!(cube.manager().live_count(), 0);
        assert_eq!(cube.min_active_chunk_size(), None);
    }
}

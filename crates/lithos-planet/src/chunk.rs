//! One renderable terrain patch and its lifecycle.

use std::sync::{Arc, Weak};

use glam::DVec3;
use lithos_config::ShapeConfig;
use lithos_cubesphere::ChunkAddress;
use lithos_terrain::{ChunkMaps, GridTopology, HeightField, MapRequest};

use crate::geometry::ChunkGeometry;

/// Rendering variant; pools are kept per variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChunkVariant {
    /// Lit by the scene light.
    #[default]
    Standard,
    /// Self-lit, for hot or glowing bodies.
    Emissive,
}

impl ChunkVariant {
    /// Every variant, in pool index order.
    pub const ALL: [ChunkVariant; 2] = [ChunkVariant::Standard, ChunkVariant::Emissive];

    /// Variant a body of `shape` renders with.
    pub fn for_shape(shape: &ShapeConfig) -> Self {
        if shape.emissive {
            ChunkVariant::Emissive
        } else {
            ChunkVariant::Standard
        }
    }

    /// Pool slot of this variant.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Value of the `variant` slot in the chunk uniform.
    #[inline]
    pub fn shader_flag(self) -> u32 {
        self as u32
    }
}

/// Lifecycle of a chunk's render program.
///
/// Only `Ready` chunks may be pooled. A chunk whose program never finished
/// building stays in `Compiling` and is disposed when recycled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    /// Constructed or reconfigured, never drawn.
    Uninitialized,
    /// Program build started on first reveal.
    Compiling,
    /// Program built; the chunk may be pooled.
    Ready,
    /// Released; never used again.
    Disposed,
}

/// Identity of a required patch. Two leaves with the same key can share a
/// chunk; any change in stitching or variant needs a different one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    /// Quadtree leaf this patch covers.
    pub address: ChunkAddress,
    /// Stitching stride per edge in `FaceDirection` slot order.
    pub strides: [u32; 4],
    /// Variant the chunk is drawn and pooled with.
    pub variant: ChunkVariant,
}

/// Stable identity of a chunk object across pooling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(pub u64);

/// A pooled terrain patch.
///
/// Holds per-instance geometry and maps; index and uv buffers are shared
/// through [`GridTopology`]. Final positions are evaluated from the height
/// map at draw time unless the chunk was exported statically.
pub struct Chunk {
    id: ChunkId,
    variant: ChunkVariant,
    state: ChunkState,
    key: Option<ChunkKey>,
    request: Option<MapRequest>,
    topology: Weak<GridTopology>,
    geometry: Option<ChunkGeometry>,
    maps: Option<ChunkMaps>,
    /// Displaced positions when exported statically.
    baked: Option<Vec<DVec3>>,
    visible: bool,
}

impl Chunk {
    /// Empty chunk in `Uninitialized` state.
    pub fn new(id: ChunkId, variant: ChunkVariant) -> Self {
        Self {
            id,
            variant,
            state: ChunkState::Uninitialized,
            key: None,
            request: None,
            topology: Weak::new(),
            geometry: None,
            maps: None,
            baked: None,
            visible: false,
        }
    }

    /// Identity kept across pooling.
    pub fn id(&self) -> ChunkId {
        self.id
    }

    /// Variant fixed at construction.
    pub fn variant(&self) -> ChunkVariant {
        self.variant
    }

    /// Current program state.
    pub fn state(&self) -> ChunkState {
        self.state
    }

    /// Key of the leaf this chunk currently serves.
    pub fn key(&self) -> Option<&ChunkKey> {
        self.key.as_ref()
    }

    /// Footprint, strides and border of the current patch.
    pub fn request(&self) -> Option<&MapRequest> {
        self.request.as_ref()
    }

    /// Vertex data, once the geometry job has returned.
    pub fn geometry(&self) -> Option<&ChunkGeometry> {
        self.geometry.as_ref()
    }

    /// Generated maps, once `update_maps` has reached the chunk. A static
    /// bake empties the height map.
    pub fn maps(&self) -> Option<&ChunkMaps> {
        self.maps.as_ref()
    }

    /// The shared index/uv topology, if the cache still holds it.
    pub fn topology(&self) -> Option<Arc<GridTopology>> {
        self.topology.upgrade()
    }

    /// Revealed by the last committed batch.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Displacement baked into positions.
    pub fn is_static(&self) -> bool {
        self.baked.is_some()
    }

    /// Only `Ready` chunks go back to a pool.
    pub fn is_poolable(&self) -> bool {
        self.state == ChunkState::Ready
    }

    /// Geometry written and either maps built or displacement baked.
    pub fn is_complete(&self) -> bool {
        self.geometry.is_some() && self.maps.is_some()
    }

    /// Point the chunk at a new patch, dropping any previous content.
    pub fn configure(&mut self, key: ChunkKey, request: MapRequest, topology: &Arc<GridTopology>) {
        debug_assert_eq!(key.variant, self.variant);
        self.key = Some(key);
        self.request = Some(request);
        self.topology = Arc::downgrade(topology);
        self.clear_content();
    }

    pub(crate) fn clear_content(&mut self) {
        self.geometry = None;
        self.maps = None;
        self.baked = None;
        self.visible = false;
    }

    pub(crate) fn set_geometry(&mut self, geometry: ChunkGeometry) {
        self.geometry = Some(geometry);
    }

    pub(crate) fn set_maps(&mut self, maps: ChunkMaps) {
        self.maps = Some(maps);
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// First draw: `Uninitialized -> Compiling`. Returns false in any
    /// other state.
    pub(crate) fn begin_compile(&mut self) -> bool {
        if self.state == ChunkState::Uninitialized {
            self.state = ChunkState::Compiling;
            true
        } else {
            false
        }
    }

    /// `Compiling -> Ready` when the program built. A failed build leaves
    /// the chunk in `Compiling`.
    pub(crate) fn finish_compile(&mut self, ok: bool) {
        if ok && self.state == ChunkState::Compiling {
            self.state = ChunkState::Ready;
        }
    }

    pub(crate) fn dispose(&mut self) {
        self.clear_content();
        self.key = None;
        self.request = None;
        self.topology = Weak::new();
        self.state = ChunkState::Disposed;
    }

    /// World positions of every vertex under the displacement contract:
    /// `normalize(offset + position) * (radius + h * displacement + bias) * stretch`,
    /// with stitched vertices taking the blend of their displaced anchors.
    ///
    /// `None` until geometry and maps are both present.
    pub fn displaced_positions(&self, field: &HeightField) -> Option<Vec<DVec3>> {
        if let Some(baked) = &self.baked {
            return Some(baked.clone());
        }
        let geometry = self.geometry.as_ref()?;
        let maps = self.maps.as_ref()?;
        let request = self.request.as_ref()?;
        if maps.heights.is_empty() {
            return None;
        }

        let side = request.resolution + 1;
        let stretch = field.stretch();
        let displaced = |index: u32| {
            let (i, j) = (index % side, index / side);
            let p = request
                .face
                .cube_point(request.vertex_local(i as i64, j as i64), request.half_extent);
            let h = maps.vertex_height(i, j) as f64;
            p.normalize() * field.radius_at(h) * stretch
        };

        Some(
            geometry
                .vertices
                .iter()
                .enumerate()
                .map(|(index, v)| {
                    if v.blend > 0.0 {
                        displaced(v.anchors[0]).lerp(displaced(v.anchors[1]), v.blend as f64)
                    } else {
                        displaced(index as u32)
                    }
                })
                .collect(),
        )
    }

    /// Bake displacement into positions once and drop the height map.
    pub(crate) fn bake_static(&mut self, field: &HeightField) {
        if let Some(positions) = self.displaced_positions(field) {
            self.baked = Some(positions);
            if let Some(maps) = &mut self.maps {
                maps.heights = Vec::new();
            }
        }
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("id", &self.id)
            .field("variant", &self.variant)
            .field("state", &self.state)
            .field("key", &self.key)
            .field("visible", &self.visible)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::build_geometry;
    use lithos_cubesphere::CubeFace;
    use lithos_terrain::{CpuMapGenerator, MapGenerator};

    fn setup(strides: [u32; 4]) -> (Arc<HeightField>, Chunk) {
        let field = Arc::new(HeightField::new(ShapeConfig::default()));
        let r = field.shape().radius;
        let address = ChunkAddress::new(CubeFace::PosX, 3, 2, 5);
        let bounds = address.bounds(r);
        let request = MapRequest {
            face: address.face,
            center: bounds.center(),
            width: bounds.size(),
            resolution: 8,
            strides,
            border: 1,
            half_extent: r,
        };
        let key = ChunkKey {
            address,
            strides,
            variant: ChunkVariant::Standard,
        };
        let mut chunk = Chunk::new(ChunkId(7), ChunkVariant::Standard);
        chunk.configure(key, request.clone(), &GridTopology::shared(8));
        chunk.set_geometry(build_geometry(&request).expect("geometry"));
        let maps = CpuMapGenerator::new(Arc::clone(&field))
            .generate(&request)
            .expect("maps");
        chunk.set_maps(maps);
        (field, chunk)
    }

    #[test]
    fn test_state_machine() {
        let mut chunk = Chunk::new(ChunkId(1), ChunkVariant::Standard);
        assert_eq!(chunk.state(), ChunkState::Uninitialized);
        assert!(!chunk.is_poolable());
        assert!(chunk.begin_compile());
        assert_eq!(chunk.state(), ChunkState::Compiling);
        assert!(!chunk.begin_compile());
        chunk.finish_compile(true);
        assert_eq!(chunk.state(), ChunkState::Ready);
        assert!(chunk.is_poolable());
        chunk.dispose();
        assert_eq!(chunk.state(), ChunkState::Disposed);
        assert!(!chunk.is_poolable());
    }

    #[test]
    fn test_failed_compile_is_not_poolable() {
        let mut chunk = Chunk::new(ChunkId(2), ChunkVariant::Emissive);
        chunk.begin_compile();
        chunk.finish_compile(false);
        assert_eq!(chunk.state(), ChunkState::Compiling);
        assert!(!chunk.is_poolable());
    }

    #[test]
    fn test_configure_clears_content() {
        let (_, mut chunk) = setup([1; 4]);
        assert!(chunk.is_complete());
        let key = *chunk.key().expect("key");
        let request = chunk.request().expect("request").clone();
        chunk.configure(key, request, &GridTopology::shared(8));
        assert!(!chunk.is_complete());
        assert!(chunk.topology().is_some());
    }

    #[test]
    fn test_displaced_positions_match_surface() {
        let (field, chunk) = setup([1; 4]);
        let positions = chunk.displaced_positions(&field).expect("positions");
        let request = chunk.request().expect("request");
        for j in [0u32, 3, 8] {
            for i in [0u32, 5, 8] {
                let p = positions[(j * 9 + i) as usize];
                let dir = request.face.direction(request.vertex_local(i as i64, j as i64), request.half_extent);
                let expected = field.surface_point(dir);
                assert!((p - expected).length() < 1e-2, "({i}, {j}): {p:?} vs {expected:?}");
            }
        }
    }

    #[test]
    fn test_stitched_vertices_lie_on_anchor_segment() {
        let (field, chunk) = setup([1, 4, 1, 2]);
        let positions = chunk.displaced_positions(&field).expect("positions");
        let geometry = chunk.geometry().expect("geometry");
        for (v, p) in geometry.vertices.iter().zip(&positions) {
            if v.blend > 0.0 {
                let a = positions[v.anchors[0] as usize];
                let b = positions[v.anchors[1] as usize];
                let expected = a.lerp(b, v.blend as f64);
                assert!((*p - expected).length() < 1e-9);
            }
        }
    }

    #[test]
    fn test_bake_static_drops_heights() {
        let (field, mut chunk) = setup([2, 1, 1, 1]);
        let before = chunk.displaced_positions(&field).expect("positions");
        chunk.bake_static(&field);
        assert!(chunk.is_static());
        assert!(chunk.maps().expect("maps").heights.is_empty());
        assert_eq!(chunk.displaced_positions(&field), Some(before));
    }

    #[test]
    fn test_variant_for_shape() {
        let mut shape = ShapeConfig::default();
        shape.emissive = false;
        assert_eq!(ChunkVariant::for_shape(&shape), ChunkVariant::Standard);
        shape.emissive = true;
        assert_eq!(ChunkVariant::for_shape(&shape), ChunkVariant::Emissive);
        assert_eq!(ChunkVariant::Emissive.shader_flag(), 1);
    }
}

//! Height, colour and normal maps of a terrain patch.
//!
//! A [`MapRequest`] describes one patch: its face-local footprint, the grid
//! resolution, the per-edge stitching strides and an optional border. Texel
//! `(i + border, j + border)` samples exactly the point of grid vertex
//! `(i, j)`, so geometry and maps share one lattice.

use glam::{DVec2, DVec3};
use lithos_cubesphere::{CubeFace, FaceDirection};

/// Errors from map generation.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("invalid map request: {0}")]
    InvalidRequest(String),
    #[error("map backend failure: {0}")]
    Backend(String),
}

/// Everything a backend needs to render the three maps of one patch.
#[derive(Clone, Debug, PartialEq)]
pub struct MapRequest {
    pub face: CubeFace,
    /// Patch centre in face-local coordinates.
    pub center: DVec2,
    /// Patch edge length in face-local units.
    pub width: f64,
    /// Grid segments per edge; the patch has `resolution + 1` vertices per edge.
    pub resolution: u32,
    /// Stitching stride per edge in [`FaceDirection`] slot order.
    pub strides: [u32; 4],
    /// Extra texels rendered around the patch.
    pub border: u32,
    /// Half edge length of the face.
    pub half_extent: f64,
}

impl MapRequest {
    pub fn validate(&self) -> Result<(), MapError> {
        if self.resolution < 2 || !self.resolution.is_power_of_two() {
            return Err(MapError::InvalidRequest(format!(
                "resolution must be a power of two >= 2, got {}",
                self.resolution
            )));
        }
        if !(self.width > 0.0) || !(self.half_extent > 0.0) {
            return Err(MapError::InvalidRequest(format!(
                "patch width {} and half extent {} must be positive",
                self.width, self.half_extent
            )));
        }
        for (dir, &stride) in FaceDirection::ALL.iter().zip(&self.strides) {
            if stride == 0 || !stride.is_power_of_two() || stride > self.resolution {
                return Err(MapError::InvalidRequest(format!(
                    "{dir:?} stride {stride} is not a power of two in 1..={}",
                    self.resolution
                )));
            }
        }
        Ok(())
    }

    /// Texels per map edge.
    #[inline]
    #[must_use]
    pub fn texels_per_side(&self) -> usize {
        (self.resolution + 1 + 2 * self.border) as usize
    }

    #[inline]
    #[must_use]
    pub fn texel_count(&self) -> usize {
        self.texels_per_side() * self.texels_per_side()
    }

    /// Face-local spacing between neighbouring texels.
    #[inline]
    #[must_use]
    pub fn texel_spacing(&self) -> f64 {
        self.width / self.resolution as f64
    }

    /// Patch centre on the cube surface; vertex positions are stored
    /// relative to this point.
    #[must_use]
    pub fn offset(&self) -> DVec3 {
        self.face.cube_point(self.center, self.half_extent)
    }

    /// Face-local position of grid vertex `(i, j)`. Indices may lie outside
    /// `0..=resolution` to address border texels.
    #[must_use]
    pub fn vertex_local(&self, i: i64, j: i64) -> DVec2 {
        let res = self.resolution as f64;
        self.center + DVec2::new(i as f64 / res - 0.5, j as f64 / res - 0.5) * self.width
    }

    /// Unit direction sampled by texel `(tx, ty)`.
    #[must_use]
    pub fn texel_direction(&self, tx: usize, ty: usize) -> DVec3 {
        let b = self.border as i64;
        let local = self.vertex_local(tx as i64 - b, ty as i64 - b);
        self.face.direction(local, self.half_extent)
    }

    /// Row-major index of texel `(tx, ty)`.
    #[inline]
    #[must_use]
    pub fn texel_index(&self, tx: usize, ty: usize) -> usize {
        ty * self.texels_per_side() + tx
    }
}

/// Grid vertices on `edge` as `(i, j)` pairs, ordered along the edge.
#[must_use]
pub fn edge_vertices(edge: FaceDirection, resolution: u32) -> Vec<(u32, u32)> {
    (0..=resolution)
        .map(|k| match edge {
            FaceDirection::North => (k, resolution),
            FaceDirection::South => (k, 0),
            FaceDirection::East => (resolution, k),
            FaceDirection::West => (0, k),
        })
        .collect()
}

/// The two aligned vertices a boundary vertex at position `k` along an edge
/// interpolates between, and the blend weight toward the second.
///
/// Aligned vertices return `(k, k, 0.0)`.
#[inline]
#[must_use]
pub fn stitch_anchors(k: u32, stride: u32) -> (u32, u32, f32) {
    let stride = stride.max(1);
    let rem = k % stride;
    if rem == 0 {
        (k, k, 0.0)
    } else {
        let a = k - rem;
        (a, a + stride, rem as f32 / stride as f32)
    }
}

/// Pull non-aligned boundary heights onto the coarse neighbour's samples.
pub fn snap_stitched_edges(heights: &mut [f32], req: &MapRequest) {
    let b = req.border as usize;
    for edge in FaceDirection::ALL {
        let stride = req.strides[edge.index()];
        if stride <= 1 {
            continue;
        }
        let verts = edge_vertices(edge, req.resolution);
        let at = |k: u32| {
            let (i, j) = verts[k as usize];
            req.texel_index(i as usize + b, j as usize + b)
        };
        for k in 0..=req.resolution {
            let (a, c, t) = stitch_anchors(k, stride);
            if t == 0.0 {
                continue;
            }
            let (ha, hc) = (heights[at(a)], heights[at(c)]);
            heights[at(k)] = ha + (hc - ha) * t;
        }
    }
}

/// Pack a colour in `[0, 1]` the way WGSL `pack4x8unorm` does.
#[inline]
#[must_use]
pub fn pack_unorm4x8(v: [f32; 4]) -> [u8; 4] {
    v.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// The three generated maps of a patch, all `texels_per_side²` row-major.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkMaps {
    pub texels_per_side: usize,
    pub border: usize,
    /// Unitless height-field values.
    pub heights: Vec<f32>,
    /// RGBA8 colour.
    pub colors: Vec<[u8; 4]>,
    /// Tangent-space normals encoded as `n * 0.5 + 0.5` in RGBA8.
    pub normals: Vec<[u8; 4]>,
}

impl ChunkMaps {
    /// Height at grid vertex `(i, j)`.
    #[inline]
    #[must_use]
    pub fn vertex_height(&self, i: u32, j: u32) -> f32 {
        let (x, y) = (i as usize + self.border, j as usize + self.border);
        self.heights[y * self.texels_per_side + x]
    }
}

/// A backend that renders the height, colour and normal passes.
pub trait MapGenerator {
    /// Evaluate the height field per texel, with stride pre-snapping.
    fn height_pass(&self, req: &MapRequest) -> Result<Vec<f32>, MapError>;

    /// Map heights through the colour ramp of the body's spectral class.
    fn color_pass(&self, req: &MapRequest, heights: &[f32]) -> Result<Vec<[u8; 4]>, MapError>;

    /// Finite-difference normals from the height map.
    fn normal_pass(&self, req: &MapRequest, heights: &[f32]) -> Result<Vec<[u8; 4]>, MapError>;

    /// Run all three passes.
    fn generate(&self, req: &MapRequest) -> Result<ChunkMaps, MapError> {
        req.validate()?;
        let heights = self.height_pass(req)?;
        let colors = self.color_pass(req, &heights)?;
        let normals = self.normal_pass(req, &heights)?;
        Ok(ChunkMaps {
            texels_per_side: req.texels_per_side(),
            border: req.border as usize,
            heights,
            colors,
            normals,
        })
    }
}

impl<G: MapGenerator + ?Sized> MapGenerator for Box<G> {
    fn height_pass(&self, req: &MapRequest) -> Result<Vec<f32>, MapError> {
        (**self).height_pass(req)
    }

    fn color_pass(&self, req: &MapRequest, heights: &[f32]) -> Result<Vec<[u8; 4]>, MapError> {
        (**self).color_pass(req, heights)
    }

    fn normal_pass(&self, req: &MapRequest, heights: &[f32]) -> Result<Vec<[u8; 4]>, MapError> {
        (**self).normal_pass(req, heights)
    }

    fn generate(&self, req: &MapRequest) -> Result<ChunkMaps, MapError> {
        (**self).generate(req)
    }
}

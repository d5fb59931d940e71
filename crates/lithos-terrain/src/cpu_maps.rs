//! CPU backend of the map generator.

use std::sync::Arc;

use crate::maps::{MapError, MapGenerator, MapRequest, pack_unorm4x8, snap_stitched_edges};
use crate::ramp::ColorRamp;
use crate::HeightField;

/// Renders the three map passes on the calling thread.
///
/// Slower than the GPU backend but bit-reproducible, which makes it the
/// reference for tests and headless runs.
#[derive(Clone, Debug)]
pub struct CpuMapGenerator {
    field: Arc<HeightField>,
}

impl CpuMapGenerator {
    #[must_use]
    pub fn new(field: Arc<HeightField>) -> Self {
        Self { field }
    }

    #[must_use]
    pub fn field(&self) -> &Arc<HeightField> {
        &self.field
    }
}

/// Tangent-space normal at texel `(x, y)` by central differences, falling
/// back to one-sided differences at the map border.
///
/// Differences are taken over the distance between the two sampled points
/// on the undisplaced, stretched body, so slopes keep their physical size
/// near cube corners and along stretched axes.
pub(crate) fn texel_normal(
    heights: &[f32],
    req: &MapRequest,
    field: &HeightField,
    x: usize,
    y: usize,
) -> [f32; 3] {
    let n = req.texels_per_side();
    let h = |x: usize, y: usize| heights[y * n + x];
    let (x0, x1) = (x.saturating_sub(1), (x + 1).min(n - 1));
    let (y0, y1) = (y.saturating_sub(1), (y + 1).min(n - 1));
    let scale = field.shape().displacement as f32;
    let base = field.stretch() * field.shape().radius;
    let span = |(ax, ay): (usize, usize), (bx, by): (usize, usize)| {
        let a = req.texel_direction(ax, ay) * base;
        let b = req.texel_direction(bx, by) * base;
        (a.distance(b) as f32).max(f32::EPSILON)
    };

    let dx = (h(x1, y) - h(x0, y)) * scale / span((x0, y), (x1, y));
    let dy = (h(x, y1) - h(x, y0)) * scale / span((x, y0), (x, y1));

    let len = (dx * dx + dy * dy + 1.0).sqrt();
    [-dx / len, -dy / len, 1.0 / len]
}

impl MapGenerator for CpuMapGenerator {
    fn height_pass(&self, req: &MapRequest) -> Result<Vec<f32>, MapError> {
        req.validate()?;
        let n = req.texels_per_side();
        let mut heights: Vec<f32> = (0..n)
            .flat_map(|y| (0..n).map(move |x| (x, y)))
            .map(|(x, y)| self.field.height(req.texel_direction(x, y)) as f32)
            .collect();
        snap_stitched_edges(&mut heights, req);
        Ok(heights)
    }

    fn color_pass(&self, req: &MapRequest, heights: &[f32]) -> Result<Vec<[u8; 4]>, MapError> {
        check_len(req, heights)?;
        let ramp = ColorRamp::shared();
        let class = self.field.shape().spectral_class;
        Ok(heights.iter().map(|&h| ramp.sample(class, h)).collect())
    }

    fn normal_pass(&self, req: &MapRequest, heights: &[f32]) -> Result<Vec<[u8; 4]>, MapError> {
        check_len(req, heights)?;
        let n = req.texels_per_side();
        Ok((0..n)
            .flat_map(|y| (0..n).map(move |x| (x, y)))
            .map(|(x, y)| {
                let [nx, ny, nz] = texel_normal(heights, req, &self.field, x, y);
                pack_unorm4x8([nx * 0.5 + 0.5, ny * 0.5 + 0.5, nz * 0.5 + 0.5, 1.0])
            })
            .collect())
    }
}

fn check_len(req: &MapRequest, heights: &[f32]) -> Result<(), MapError> {
    if heights.len() != req.texel_count() {
        return Err(MapError::InvalidRequest(format!(
            "height map has {} texels, expected {}",
            heights.len(),
            req.texel_count()
        )));
    }
    Ok(())
}

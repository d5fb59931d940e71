//! Coarse pre-sampled heightmap for conservative proxy positions.
//!
//! Each face is sampled on a `(n + 1)²` vertex grid once at startup. Cell
//! minima are reduced into a min-pyramid so a query over any node's bounds
//! touches at most a handful of cells.

use glam::{DVec2, DVec3};
use lithos_cubesphere::{CubeFace, FaceBounds};

use crate::HeightField;

/// One pyramid level: `cells × cells` minima.
#[derive(Clone, Debug)]
struct MinLevel {
    cells: usize,
    minima: Vec<f32>,
}

impl MinLevel {
    fn get(&self, x: usize, y: usize) -> f32 {
        self.minima[y * self.cells + x]
    }
}

/// Per-face min-pyramids over the height field.
#[derive(Clone, Debug)]
pub struct CoarseHeightmap {
    half_extent: f64,
    resolution: usize,
    /// `faces[f][0]` is the finest level.
    faces: Vec<Vec<MinLevel>>,
}

impl CoarseHeightmap {
    /// Sample `field` on every face at `resolution` cells per edge.
    /// `resolution` is rounded up to a power of two.
    #[must_use]
    pub fn build(field: &HeightField, resolution: u32) -> Self {
        let n = resolution.max(1).next_power_of_two() as usize;
        let half_extent = field.shape().radius;
        let start = std::time::Instant::now();

        let faces = CubeFace::ALL
            .iter()
            .map(|&face| {
                let samples: Vec<f32> = (0..=n)
                    .flat_map(|j| (0..=n).map(move |i| (i, j)))
                    .map(|(i, j)| {
                        let local = DVec2::new(
                            -half_extent + 2.0 * half_extent * i as f64 / n as f64,
                            -half_extent + 2.0 * half_extent * j as f64 / n as f64,
                        );
                        field.height(face.direction(local, half_extent)) as f32
                    })
                    .collect();

                let stride = n + 1;
                let finest = MinLevel {
                    cells: n,
                    minima: (0..n)
                        .flat_map(|y| (0..n).map(move |x| (x, y)))
                        .map(|(x, y)| {
                            let a = samples[y * stride + x];
                            let b = samples[y * stride + x + 1];
                            let c = samples[(y + 1) * stride + x];
                            let d = samples[(y + 1) * stride + x + 1];
                            a.min(b).min(c).min(d)
                        })
                        .collect(),
                };

                let mut levels = vec![finest];
                while let Some(prev) = levels.last()
                    && prev.cells > 1
                {
                    let cells = prev.cells / 2;
                    let minima = (0..cells)
                        .flat_map(|y| (0..cells).map(move |x| (x, y)))
                        .map(|(x, y)| {
                            prev.get(2 * x, 2 * y)
                                .min(prev.get(2 * x + 1, 2 * y))
                                .min(prev.get(2 * x, 2 * y + 1))
                                .min(prev.get(2 * x + 1, 2 * y + 1))
                        })
                        .collect();
                    levels.push(MinLevel { cells, minima });
                }
                levels
            })
            .collect();

        tracing::debug!(
            resolution = n,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Built coarse heightmap"
        );

        Self {
            half_extent,
            resolution: n,
            faces,
        }
    }

    /// Cells per face edge at the finest level.
    #[must_use]
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Lowest sampled height over the cells covering `bounds`.
    #[must_use]
    pub fn min_height(&self, face: CubeFace, bounds: &FaceBounds) -> f64 {
        let levels = &self.faces[face.index()];
        let face_size = 2.0 * self.half_extent;
        let size = bounds.size().max(0.0);

        // Coarsest level whose cells are still no larger than needed.
        let mut level = 0;
        while level + 1 < levels.len()
            && face_size / levels[level + 1].cells as f64 <= size.max(face_size / self.resolution as f64)
        {
            level += 1;
        }
        let grid = &levels[level];
        let cell_size = face_size / grid.cells as f64;

        // Nudge inward so aligned bounds never pick up the cell next door.
        let nudge = 1e-6 * cell_size;
        let cell = |v: f64| {
            let c = ((v + self.half_extent) / cell_size).floor();
            (c.max(0.0) as usize).min(grid.cells - 1)
        };
        let (x0, x1) = (cell(bounds.min.x + nudge), cell(bounds.max.x - nudge));
        let (y0, y1) = (cell(bounds.min.y + nudge), cell(bounds.max.y - nudge));

        let mut min = f32::INFINITY;
        for y in y0..=y1.max(y0) {
            for x in x0..=x1.max(x0) {
                min = min.min(grid.get(x, y));
            }
        }
        min as f64
    }

    /// Conservative camera-distance proxy for a node: the node centre's
    /// direction at the lowest radius found under the node.
    #[must_use]
    pub fn proxy_position(&self, field: &HeightField, face: CubeFace, bounds: &FaceBounds) -> DVec3 {
        let dir = face.direction(bounds.center(), self.half_extent);
        dir * field.radius_at(self.min_height(face, bounds))
    }
}

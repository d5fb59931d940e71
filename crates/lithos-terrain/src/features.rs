//! Seeded surface features: impact craters and cleave planes.
//!
//! Both lists are drawn once from a ChaCha8 stream seeded by the body seed,
//! so the same [`ShapeConfig`] always produces the same features. The GPU
//! height pass receives the finished lists rather than re-deriving them.

use glam::DVec3;
use lithos_config::ShapeConfig;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// One impact crater on the unit sphere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Crater {
    /// Unit direction of the crater centre.
    pub center: DVec3,
    /// Radius as a chord length on the unit sphere.
    pub radius: f64,
    /// Depth of the bowl at the centre.
    pub depth: f64,
}

/// A plane that shears part of the body away.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CleavePlane {
    /// Unit normal pointing into the lowered side.
    pub normal: DVec3,
    /// Signed distance of the plane from the body centre.
    pub offset: f64,
}

/// All seeded features of one body.
#[derive(Clone, Debug, Default)]
pub struct FeatureSet {
    pub craters: Vec<Crater>,
    pub cleaves: Vec<CleavePlane>,
    rim_height: f64,
    rim_width: f64,
    cleave_depth: f64,
    cleave_width: f64,
}

/// Uniform random unit vector by rejection sampling.
fn random_direction(rng: &mut ChaCha8Rng) -> DVec3 {
    loop {
        let v = DVec3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        );
        let len2 = v.length_squared();
        if len2 > 1e-4 && len2 <= 1.0 {
            return v / len2.sqrt();
        }
    }
}

/// Hermite smoothstep, matching WGSL `smoothstep`.
#[inline]
pub(crate) fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

impl FeatureSet {
    /// Draw the feature lists for a shape.
    #[must_use]
    pub fn generate(shape: &ShapeConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(shape.seed);
        let c = &shape.craters;

        let craters = (0..c.count)
            .map(|_| {
                let center = random_direction(&mut rng);
                let radius = c.min_radius + (c.max_radius - c.min_radius) * rng.random::<f64>();
                let depth = if c.max_radius > 0.0 {
                    c.depth * (radius / c.max_radius)
                } else {
                    0.0
                };
                Crater {
                    center,
                    radius,
                    depth,
                }
            })
            .collect();

        let cleaves = (0..shape.cleave.count)
            .map(|_| CleavePlane {
                normal: random_direction(&mut rng),
                offset: rng.random_range(0.3..0.7),
            })
            .collect();

        Self {
            craters,
            cleaves,
            rim_height: c.rim_height,
            rim_width: c.rim_width.max(1e-6),
            cleave_depth: shape.cleave.depth,
            cleave_width: shape.cleave.width.max(1e-6),
        }
    }

    /// Rim height as a fraction of crater depth.
    #[must_use]
    pub fn rim_height(&self) -> f64 {
        self.rim_height
    }

    /// Rim half-width as a fraction of crater radius.
    #[must_use]
    pub fn rim_width(&self) -> f64 {
        self.rim_width
    }

    #[must_use]
    pub fn cleave_depth(&self) -> f64 {
        self.cleave_depth
    }

    #[must_use]
    pub fn cleave_width(&self) -> f64 {
        self.cleave_width
    }

    /// Summed crater relief at a unit direction: negative inside bowls,
    /// positive on rims, zero elsewhere.
    #[must_use]
    pub fn crater_height(&self, dir: DVec3) -> f64 {
        let mut total = 0.0;
        for crater in &self.craters {
            if crater.radius <= 0.0 {
                continue;
            }
            let x = (dir - crater.center).length() / crater.radius;
            if x >= 1.0 + self.rim_width {
                continue;
            }
            if x < 1.0 {
                total += crater.depth * (x * x - 1.0);
            }
            let y = (x - 1.0) / self.rim_width;
            let bump = (1.0 - y * y).max(0.0);
            total += crater.depth * self.rim_height * bump * bump;
        }
        total
    }

    /// Summed drop past the cleave planes at a unit direction (non-negative).
    #[must_use]
    pub fn cleave_drop(&self, dir: DVec3) -> f64 {
        self.cleaves
            .iter()
            .map(|plane| {
                let s = dir.dot(plane.normal) - plane.offset;
                self.cleave_depth * smoothstep(0.0, self.cleave_width, s)
            })
            .sum()
    }
}

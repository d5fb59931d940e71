//! The procedural height field of a body.

use glam::DVec3;
use lithos_config::ShapeConfig;

use crate::features::FeatureSet;
use crate::noise::{fbm, noise_seed, ridged};

/// Deterministic layered height function over unit directions.
///
/// `height` combines the base fBm layer, the ridge layer, craters and cleave
/// planes into a unitless value (roughly `[-2, 2]`); `radius_at` turns that
/// into a radial distance using the shape's displacement weight and bias.
#[derive(Clone, Debug)]
pub struct HeightField {
    shape: ShapeConfig,
    features: FeatureSet,
    seed: u32,
}

impl HeightField {
    #[must_use]
    pub fn new(shape: ShapeConfig) -> Self {
        let features = FeatureSet::generate(&shape);
        let seed = noise_seed(shape.seed);
        Self {
            shape,
            features,
            seed,
        }
    }

    #[must_use]
    pub fn shape(&self) -> &ShapeConfig {
        &self.shape
    }

    #[must_use]
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// The 32-bit lattice seed shared with the GPU passes.
    #[must_use]
    pub fn noise_seed(&self) -> u32 {
        self.seed
    }

    /// Height at a direction. The direction need not be normalised; the zero
    /// vector yields 0.
    #[must_use]
    pub fn height(&self, direction: DVec3) -> f64 {
        let dir = direction.normalize_or_zero();
        if dir == DVec3::ZERO {
            return 0.0;
        }
        let base = fbm(dir, &self.shape.noise, self.seed);
        let ridge = ridged(dir, &self.shape.ridges, self.seed) - 0.5;
        base + self.shape.ridges.weight * ridge + self.features.crater_height(dir)
            - self.features.cleave_drop(dir)
    }

    /// Radial distance for a height value, before stretch.
    #[inline]
    #[must_use]
    pub fn radius_at(&self, height: f64) -> f64 {
        self.shape.radius + height * self.shape.displacement + self.shape.bias
    }

    /// Per-axis stretch as a vector.
    #[inline]
    #[must_use]
    pub fn stretch(&self) -> DVec3 {
        DVec3::from_array(self.shape.stretch)
    }

    /// Final surface position for a direction: displaced, then stretched.
    #[must_use]
    pub fn surface_point(&self, direction: DVec3) -> DVec3 {
        let dir = direction.normalize_or_zero();
        dir * self.radius_at(self.height(dir)) * self.stretch()
    }
}

/// One-off height evaluation. Rebuilds the feature lists on every call;
/// hold a [`HeightField`] when sampling repeatedly.
#[must_use]
pub fn height(direction: DVec3, shape: &ShapeConfig) -> f64 {
    HeightField::new(shape.clone()).height(direction)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dirs() -> impl Iterator<Item = DVec3> {
        (0..400).map(|i| {
            let t = i as f64 * 0.173;
            DVec3::new(t.sin(), (t * 1.31).cos(), (t * 0.77).sin() + 0.1).normalize()
        })
    }

    #[test]
    fn test_deterministic() {
        let a = HeightField::new(ShapeConfig::default());
        let b = HeightField::new(ShapeConfig::default());
        for dir in sample_dirs() {
            assert_eq!(a.height(dir), b.height(dir));
        }
    }

    #[test]
    fn test_free_function_matches_field() {
        let shape = ShapeConfig::default();
        let field = HeightField::new(shape.clone());
        let dir = DVec3::new(0.3, -0.8, 0.5);
        assert_eq!(height(dir, &shape), field.height(dir));
    }

    #[test]
    fn test_scale_invariant_in_direction() {
        let field = HeightField::new(ShapeConfig::default());
        let dir = DVec3::new(0.2, 0.9, -0.4);
        assert!((field.height(dir) - field.height(dir * 37.0)).abs() < 1e-12);
    }

    #[test]
    fn test_zero_direction() {
        let field = HeightField::new(ShapeConfig::default());
        assert_eq!(field.height(DVec3::ZERO), 0.0);
    }

    #[test]
    fn test_height_bounded() {
        let field = HeightField::new(ShapeConfig::default());
        for dir in sample_dirs() {
            let h = field.height(dir);
            assert!(h.abs() < 4.0, "height {h} unexpectedly large at {dir:?}");
        }
    }

    #[test]
    fn test_surface_point_applies_stretch() {
        let mut shape = ShapeConfig::default();
        shape.displacement = 0.0;
        shape.stretch = [2.0, 1.0, 0.5];
        let field = HeightField::new(shape);
        let p = field.surface_point(DVec3::X);
        assert!((p - DVec3::new(2000.0, 0.0, 0.0)).length() < 1e-9);
        let p = field.surface_point(DVec3::NEG_Z);
        assert!((p - DVec3::new(0.0, 0.0, -500.0)).length() < 1e-9);
    }

    #[test]
    fn test_radius_at() {
        let mut shape = ShapeConfig::default();
        shape.radius = 100.0;
        shape.displacement = 10.0;
        shape.bias = 2.0;
        let field = HeightField::new(shape);
        assert_eq!(field.radius_at(0.5), 107.0);
    }
}

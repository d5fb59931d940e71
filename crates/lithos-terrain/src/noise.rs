//! Hash-based 3D gradient noise and the fractal sums built on it.
//!
//! The lattice hash, gradient table and fade curve are reproduced exactly in
//! `maps.wgsl`, so CPU and GPU samples of the same point agree up to float
//! precision.

use glam::DVec3;
use lithos_config::{NoiseConfig, RidgeConfig};

/// The 12 edge midpoints of a cube.
const GRADIENTS: [[f64; 3]; 12] = [
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0],
    [-1.0, 0.0, 1.0],
    [1.0, 0.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, 1.0, 1.0],
    [0.0, -1.0, 1.0],
    [0.0, 1.0, -1.0],
    [0.0, -1.0, -1.0],
];

/// Per-octave seed increment.
pub const OCTAVE_SEED_STEP: u32 = 0x9e37_79b9;

/// Seed offset separating the ridge layer from the base layer.
pub const RIDGE_SEED_SALT: u32 = 0x68bc_21eb;

/// Fold a 64-bit body seed into the 32-bit seed the lattice hash uses.
#[inline]
#[must_use]
pub fn noise_seed(seed: u64) -> u32 {
    (seed as u32) ^ ((seed >> 32) as u32)
}

/// Integer lattice hash.
#[inline]
#[must_use]
pub fn hash3(x: i32, y: i32, z: i32, seed: u32) -> u32 {
    let mut h = seed
        ^ (x as u32).wrapping_mul(0x8da6_b343)
        ^ (y as u32).wrapping_mul(0xd816_3841)
        ^ (z as u32).wrapping_mul(0xcb1a_b31f);
    h ^= h >> 16;
    h = h.wrapping_mul(0x7feb_352d);
    h ^= h >> 15;
    h = h.wrapping_mul(0x846c_a68b);
    h ^= h >> 16;
    h
}

#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Single-octave gradient noise, roughly in `[-1, 1]`, zero at lattice points.
#[must_use]
pub fn gradient_noise(p: DVec3, seed: u32) -> f64 {
    let cell = p.floor();
    let f = p - cell;
    let (ix, iy, iz) = (cell.x as i32, cell.y as i32, cell.z as i32);

    let corner = |dx: i32, dy: i32, dz: i32| -> f64 {
        let h = hash3(
            ix.wrapping_add(dx),
            iy.wrapping_add(dy),
            iz.wrapping_add(dz),
            seed,
        );
        let g = GRADIENTS[(h % 12) as usize];
        g[0] * (f.x - dx as f64) + g[1] * (f.y - dy as f64) + g[2] * (f.z - dz as f64)
    };

    let (u, v, w) = (fade(f.x), fade(f.y), fade(f.z));

    let x00 = lerp(corner(0, 0, 0), corner(1, 0, 0), u);
    let x10 = lerp(corner(0, 1, 0), corner(1, 1, 0), u);
    let x01 = lerp(corner(0, 0, 1), corner(1, 0, 1), u);
    let x11 = lerp(corner(0, 1, 1), corner(1, 1, 1), u);

    lerp(lerp(x00, x10, v), lerp(x01, x11, v), w)
}

/// Fractal Brownian motion over [`gradient_noise`], normalised by the
/// amplitude sum so the result stays roughly in `[-1, 1]`.
#[must_use]
pub fn fbm(p: DVec3, params: &NoiseConfig, seed: u32) -> f64 {
    let mut total = 0.0;
    let mut norm = 0.0;
    let mut frequency = params.frequency;
    let mut amplitude = 1.0;
    let mut octave_seed = seed;

    for _ in 0..params.octaves {
        total += gradient_noise(p * frequency, octave_seed) * amplitude;
        norm += amplitude;
        frequency *= params.lacunarity;
        amplitude *= params.persistence;
        octave_seed = octave_seed.wrapping_add(OCTAVE_SEED_STEP);
    }

    if norm > 0.0 { total / norm } else { 0.0 }
}

/// Ridged multifractal in `[0, 1]`: sharp crests where the base noise
/// crosses zero.
#[must_use]
pub fn ridged(p: DVec3, params: &RidgeConfig, seed: u32) -> f64 {
    let mut total = 0.0;
    let mut norm = 0.0;
    let mut frequency = params.frequency;
    let mut amplitude = 1.0;
    let mut octave_seed = seed ^ RIDGE_SEED_SALT;

    for _ in 0..params.octaves {
        let r = 1.0 - gradient_noise(p * frequency, octave_seed).abs();
        total += r.max(1e-6).powf(params.sharpness) * amplitude;
        norm += amplitude;
        frequency *= 2.0;
        amplitude *= 0.5;
        octave_seed = octave_seed.wrapping_add(OCTAVE_SEED_STEP);
    }

    if norm > 0.0 { total / norm } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_deterministic() {
        let p = DVec3::new(0.31, -1.7, 2.05);
        assert_eq!(gradient_noise(p, 9), gradient_noise(p, 9));
    }

    #[test]
    fn test_noise_zero_on_lattice() {
        for &(x, y, z) in &[(0, 0, 0), (3, -2, 7), (-5, 1, -1)] {
            let p = DVec3::new(x as f64, y as f64, z as f64);
            assert!(gradient_noise(p, 42).abs() < 1e-12, "non-zero at {p:?}");
        }
    }

    #[test]
    fn test_noise_bounded() {
        for i in 0..2000 {
            let t = i as f64 * 0.0137;
            let p = DVec3::new(t * 3.1, t * -1.3, t * 0.7 + 0.5);
            let n = gradient_noise(p, 1);
            assert!(n.abs() <= 1.2, "noise {n} out of range at {p:?}");
        }
    }

    #[test]
    fn test_noise_continuous() {
        let step = 1e-4;
        for i in 0..1000 {
            let p = DVec3::new(i as f64 * 0.01, 0.5, -0.25);
            let a = gradient_noise(p, 3);
            let b = gradient_noise(p + DVec3::X * step, 3);
            assert!((a - b).abs() < 0.01, "jump at {p:?}: {a} vs {b}");
        }
    }

    #[test]
    fn test_seeds_differ() {
        let p = DVec3::new(0.5, 0.25, 0.125);
        assert_ne!(gradient_noise(p, 1), gradient_noise(p, 2));
    }

    #[test]
    fn test_noise_seed_folds_high_bits() {
        assert_ne!(noise_seed(1), noise_seed(1 | (1 << 40)));
        assert_eq!(noise_seed(7), 7);
    }

    #[test]
    fn test_fbm_normalised() {
        let params = NoiseConfig::default();
        for i in 0..500 {
            let dir = DVec3::new((i as f64).sin(), (i as f64 * 0.7).cos(), 0.3).normalize();
            let h = fbm(dir, &params, 11);
            assert!(h.abs() <= 1.2, "fbm {h} out of range");
        }
    }

    #[test]
    fn test_fbm_zero_octaves() {
        let params = NoiseConfig {
            octaves: 0,
            ..Default::default()
        };
        assert_eq!(fbm(DVec3::ONE, &params, 0), 0.0);
    }

    #[test]
    fn test_ridged_in_unit_range() {
        let params = RidgeConfig::default();
        for i in 0..500 {
            let p = DVec3::new(i as f64 * 0.021, 0.4, -0.9);
            let r = ridged(p, &params, 5);
            assert!((0.0..=1.0 + 1e-9).contains(&r), "ridged {r} out of range");
        }
    }
}

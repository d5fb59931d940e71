//! Split thresholds and proxy sampling.

use glam::DVec3;
use lithos_config::LodConfig;
use lithos_cubesphere::{ChunkAddress, CubeFace, FaceBounds};

/// Subdivision thresholds for one body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodSettings {
    /// A node splits while the camera is closer than `size * split_factor`.
    pub split_factor: f64,
    /// Leaves never get smaller than this.
    pub min_chunk_size: f64,
    /// Keep same-face neighbours within one level of each other.
    pub balance: bool,
}

impl LodSettings {
    /// Whether a node of `size` and `level` at `distance` from the camera
    /// should have children.
    #[inline]
    pub fn should_split(&self, size: f64, level: u8, distance: f64) -> bool {
        level < ChunkAddress::MAX_LEVEL
            && size >= 2.0 * self.min_chunk_size * (1.0 - 1e-9)
            && distance < size * self.split_factor
    }
}

impl Default for LodSettings {
    fn default() -> Self {
        Self::from(&LodConfig::default())
    }
}

impl From<&LodConfig> for LodSettings {
    fn from(config: &LodConfig) -> Self {
        Self {
            split_factor: config.split_factor,
            min_chunk_size: config.min_chunk_size,
            balance: config.balance,
        }
    }
}

/// Supplies the conservative position a node is measured from.
pub trait ProxySource {
    /// Point on or below the surface under `bounds` on `face`.
    fn proxy_position(&self, face: CubeFace, bounds: &FaceBounds) -> DVec3;
}

impl<F> ProxySource for F
where
    F: Fn(CubeFace, &FaceBounds) -> DVec3,
{
    fn proxy_position(&self, face: CubeFace, bounds: &FaceBounds) -> DVec3 {
        self(face, bounds)
    }
}

/// Proxies on a smooth sphere of the face's half extent.
#[derive(Clone, Copy, Debug)]
pub struct SphereProxy {
    /// Sphere radius proxies are placed on.
    pub radius: f64,
}

impl ProxySource for SphereProxy {
    fn proxy_position(&self, face: CubeFace, bounds: &FaceBounds) -> DVec3 {
        face.direction(bounds.center(), self.radius) * self.radius
    }
}

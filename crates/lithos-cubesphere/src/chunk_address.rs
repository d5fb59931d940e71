//! Addresses of quadtree cells on a cube face.

use glam::DVec2;

use crate::CubeFace;

/// Axis-aligned rectangle in face-local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceBounds {
    pub min: DVec2,
    pub max: DVec2,
}

impl FaceBounds {
    #[inline]
    #[must_use]
    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    /// Edge length (cells are square).
    #[inline]
    #[must_use]
    pub fn size(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[must_use]
    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Identifies one quadtree cell on the cube-sphere.
///
/// - `face`: which of the 6 cube faces the cell lies on.
/// - `level`: subdivision depth. Level 0 is the whole face.
/// - `x`, `y`: cell coordinates in the `2^level × 2^level` grid at that
///   level, counted from the south-west corner.
///
/// The address fixes the cell's centre and size exactly, so it doubles as
/// the spatial part of a chunk key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkAddress {
    pub face: CubeFace,
    pub level: u8,
    pub x: u32,
    pub y: u32,
}

impl ChunkAddress {
    /// Deepest supported subdivision level.
    pub const MAX_LEVEL: u8 = 24;

    /// Number of cells along one axis at `level`.
    ///
    /// # Panics
    ///
    /// Panics if `level` exceeds [`Self::MAX_LEVEL`].
    #[must_use]
    pub fn grid_size(level: u8) -> u32 {
        assert!(
            level <= Self::MAX_LEVEL,
            "level {level} exceeds MAX_LEVEL {}",
            Self::MAX_LEVEL
        );
        1 << level
    }

    /// The root cell covering a whole face.
    #[must_use]
    pub fn root(face: CubeFace) -> Self {
        Self {
            face,
            level: 0,
            x: 0,
            y: 0,
        }
    }

    /// Construct an address, validating the cell coordinates.
    ///
    /// # Panics
    ///
    /// Panics if `level` exceeds [`Self::MAX_LEVEL`] or `x`/`y` are out of range.
    #[must_use]
    pub fn new(face: CubeFace, level: u8, x: u32, y: u32) -> Self {
        let size = Self::grid_size(level);
        assert!(x < size, "x={x} out of range for level {level} (max {size})");
        assert!(y < size, "y={y} out of range for level {level} (max {size})");
        Self { face, level, x, y }
    }

    /// Face-local bounds for a face spanning `[-half_extent, half_extent]²`.
    #[must_use]
    pub fn bounds(&self, half_extent: f64) -> FaceBounds {
        let size = self.size(half_extent);
        let min = DVec2::new(
            -half_extent + self.x as f64 * size,
            -half_extent + self.y as f64 * size,
        );
        FaceBounds {
            min,
            max: min + DVec2::splat(size),
        }
    }

    /// Edge length of this cell in face-local units.
    #[inline]
    #[must_use]
    pub fn size(&self, half_extent: f64) -> f64 {
        2.0 * half_extent / Self::grid_size(self.level) as f64
    }

    /// The enclosing cell one level up, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<ChunkAddress> {
        if self.level == 0 {
            return None;
        }
        Some(ChunkAddress {
            face: self.face,
            level: self.level - 1,
            x: self.x / 2,
            y: self.y / 2,
        })
    }

    /// The four children in SW, SE, NW, NE order, or `None` at
    /// [`Self::MAX_LEVEL`].
    #[must_use]
    pub fn children(&self) -> Option<[ChunkAddress; 4]> {
        if self.level >= Self::MAX_LEVEL {
            return None;
        }
        let level = self.level + 1;
        let (cx, cy) = (self.x * 2, self.y * 2);
        Some([
            ChunkAddress::new(self.face, level, cx, cy),
            ChunkAddress::new(self.face, level, cx + 1, cy),
            ChunkAddress::new(self.face, level, cx, cy + 1),
            ChunkAddress::new(self.face, level, cx + 1, cy + 1),
        ])
    }
}

impl std::fmt::Display for ChunkAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:?}, level={}, x={}, y={})",
            self.face, self.level, self.x, self.y
        )
    }
}

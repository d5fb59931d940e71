//! The six faces of a cube-sphere and their face-local frames.

use glam::{DVec2, DVec3};

/// The six faces of the cube that forms the cube-sphere.
///
/// The discriminant is the face index (0–5) used throughout the terrain
/// code; face 0 is the `+X` face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CubeFace {
    /// +X face
    PosX = 0,
    /// −X face
    NegX = 1,
    /// +Y face
    PosY = 2,
    /// −Y face
    NegY = 3,
    /// +Z face
    PosZ = 4,
    /// −Z face
    NegZ = 5,
}

impl CubeFace {
    /// All six faces in index order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PosX,
        CubeFace::NegX,
        CubeFace::PosY,
        CubeFace::NegY,
        CubeFace::PosZ,
        CubeFace::NegZ,
    ];

    /// Face index in `0..6`.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Face for an index in `0..6`.
    #[must_use]
    pub fn from_index(index: usize) -> Option<CubeFace> {
        Self::ALL.get(index).copied()
    }

    /// The opposite face (e.g., `PosX` → `NegX`).
    #[must_use]
    pub fn opposite(self) -> CubeFace {
        match self {
            CubeFace::PosX => CubeFace::NegX,
            CubeFace::NegX => CubeFace::PosX,
            CubeFace::PosY => CubeFace::NegY,
            CubeFace::NegY => CubeFace::PosY,
            CubeFace::PosZ => CubeFace::NegZ,
            CubeFace::NegZ => CubeFace::PosZ,
        }
    }

    /// Outward-pointing unit normal for this face.
    #[must_use]
    pub fn normal(self) -> DVec3 {
        match self {
            CubeFace::PosX => DVec3::X,
            CubeFace::NegX => DVec3::NEG_X,
            CubeFace::PosY => DVec3::Y,
            CubeFace::NegY => DVec3::NEG_Y,
            CubeFace::PosZ => DVec3::Z,
            CubeFace::NegZ => DVec3::NEG_Z,
        }
    }

    /// Direction of increasing face-local `x` (towards the east edge).
    #[must_use]
    pub fn tangent(self) -> DVec3 {
        match self {
            CubeFace::PosX => DVec3::NEG_Z,
            CubeFace::NegX => DVec3::Z,
            CubeFace::PosY => DVec3::X,
            CubeFace::NegY => DVec3::X,
            CubeFace::PosZ => DVec3::X,
            CubeFace::NegZ => DVec3::NEG_X,
        }
    }

    /// Direction of increasing face-local `y` (towards the north edge).
    #[must_use]
    pub fn bitangent(self) -> DVec3 {
        match self {
            CubeFace::PosX => DVec3::Y,
            CubeFace::NegX => DVec3::Y,
            CubeFace::PosY => DVec3::NEG_Z,
            CubeFace::NegY => DVec3::Z,
            CubeFace::PosZ => DVec3::Y,
            CubeFace::NegZ => DVec3::Y,
        }
    }

    /// Map a face-local point to the surface of a cube with the given half extent.
    ///
    /// Face-local coordinates span `[-half_extent, half_extent]` on both axes,
    /// so the face centre `(0, 0)` lands at `normal * half_extent`.
    #[inline]
    #[must_use]
    pub fn cube_point(self, local: DVec2, half_extent: f64) -> DVec3 {
        self.normal() * half_extent + self.tangent() * local.x + self.bitangent() * local.y
    }

    /// Unit direction from the body centre through a face-local point.
    #[inline]
    #[must_use]
    pub fn direction(self, local: DVec2, half_extent: f64) -> DVec3 {
        self.cube_point(local, half_extent).normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip() {
        for (i, face) in CubeFace::ALL.iter().enumerate() {
            assert_eq!(face.index(), i);
            assert_eq!(CubeFace::from_index(i), Some(*face));
        }
        assert_eq!(CubeFace::from_index(6), None);
    }

    #[test]
    fn test_face_zero_is_pos_x() {
        assert_eq!(CubeFace::from_index(0), Some(CubeFace::PosX));
    }

    #[test]
    fn test_tangent_cross_bitangent_equals_normal() {
        for face in CubeFace::ALL {
            let cross = face.tangent().cross(face.bitangent());
            assert!(
                (cross - face.normal()).length() < 1e-12,
                "tangent x bitangent != normal for {face:?}: got {cross:?}"
            );
        }
    }

    #[test]
    fn test_frame_is_orthonormal() {
        for face in CubeFace::ALL {
            let (t, b, n) = (face.tangent(), face.bitangent(), face.normal());
            assert!((t.length() - 1.0).abs() < 1e-12);
            assert!((b.length() - 1.0).abs() < 1e-12);
            assert!(t.dot(n).abs() < 1e-12, "tangent not perpendicular for {face:?}");
            assert!(b.dot(n).abs() < 1e-12, "bitangent not perpendicular for {face:?}");
        }
    }

    #[test]
    fn test_face_center_maps_to_normal() {
        for face in CubeFace::ALL {
            let p = face.cube_point(DVec2::ZERO, 250.0);
            assert!((p - face.normal() * 250.0).length() < 1e-9);
            assert!((face.direction(DVec2::ZERO, 250.0) - face.normal()).length() < 1e-12);
        }
    }

    #[test]
    fn test_cube_points_lie_on_face_plane() {
        for face in CubeFace::ALL {
            for &(x, y) in &[(-1.0, -1.0), (0.3, -0.7), (1.0, 1.0)] {
                let p = face.cube_point(DVec2::new(x, y), 1.0);
                assert!((p.dot(face.normal()) - 1.0).abs() < 1e-12);
                assert!(p.abs().max_element() <= 1.0 + 1e-12);
            }
        }
    }

    #[test]
    fn test_opposite_is_involution() {
        for face in CubeFace::ALL {
            assert_eq!(face.opposite().opposite(), face);
            assert!((face.normal() + face.opposite().normal()).length() < 1e-12);
        }
    }
}

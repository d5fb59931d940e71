//! Cardinal directions on a cube face.

/// Cardinal directions in face-local space.
///
/// North is increasing `y`, east is increasing `x`. The discriminant is the
/// slot index used by per-direction arrays (neighbour links, stitching strides).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FaceDirection {
    /// Increasing `y`.
    North = 0,
    /// Decreasing `y`.
    South = 1,
    /// Increasing `x`.
    East = 2,
    /// Decreasing `x`.
    West = 3,
}

impl FaceDirection {
    /// All four directions in slot order.
    pub const ALL: [FaceDirection; 4] = [
        FaceDirection::North,
        FaceDirection::South,
        FaceDirection::East,
        FaceDirection::West,
    ];

    /// Slot index in `0..4`.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn opposite(self) -> FaceDirection {
        match self {
            FaceDirection::North => FaceDirection::South,
            FaceDirection::South => FaceDirection::North,
            FaceDirection::East => FaceDirection::West,
            FaceDirection::West => FaceDirection::East,
        }
    }

    /// True for the edges that run along the `x` axis (north and south).
    #[inline]
    #[must_use]
    pub fn runs_along_x(self) -> bool {
        matches!(self, FaceDirection::North | FaceDirection::South)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_distinct() {
        let mut seen = [false; 4];
        for dir in FaceDirection::ALL {
            assert!(!seen[dir.index()], "duplicate slot for {dir:?}");
            seen[dir.index()] = true;
        }
    }

    #[test]
    fn test_opposite_is_involution() {
        for dir in FaceDirection::ALL {
            assert_ne!(dir.opposite(), dir);
            assert_eq!(dir.opposite().opposite(), dir);
            assert_eq!(dir.runs_along_x(), dir.opposite().runs_along_x());
        }
    }
}

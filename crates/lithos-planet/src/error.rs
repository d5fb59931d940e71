use lithos_config::ConfigError;
use lithos_cubesphere::FaceDirection;
use lithos_terrain::MapError;

/// Errors from building chunk geometry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("grid resolution must be a power of two >= 2, got {0}")]
    InvalidResolution(u32),

    #[error("{dir:?} stride {stride} does not divide resolution {resolution}")]
    InvalidStride {
        dir: FaceDirection,
        stride: u32,
        resolution: u32,
    },

    #[error("patch width must be positive, got {0}")]
    InvalidWidth(f64),
}

/// Errors surfaced by [`crate::TerrainCube`].
#[derive(Debug, thiserror::Error)]
pub enum TerrainError {
    /// A reconfiguration batch is still in flight.
    #[error("terrain is busy with a previous reconfiguration")]
    Busy,

    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

//! Procedural shape parameters of a body.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Compositional class of the body. Selects the colour ramp row.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SpectralClass {
    /// Carbonaceous: dark, low albedo.
    C,
    /// Silicaceous: stony, reddish grey.
    #[default]
    S,
    /// Metallic: bright grey.
    M,
    /// Basaltic: pale with dark lows.
    V,
    /// Organic-rich: very dark red-brown.
    D,
}

impl SpectralClass {
    pub const ALL: [SpectralClass; 5] = [
        SpectralClass::C,
        SpectralClass::S,
        SpectralClass::M,
        SpectralClass::V,
        SpectralClass::D,
    ];

    /// Row of this class in the colour ramp.
    #[must_use]
    pub fn ramp_row(self) -> u32 {
        match self {
            SpectralClass::C => 0,
            SpectralClass::S => 1,
            SpectralClass::M => 2,
            SpectralClass::V => 3,
            SpectralClass::D => 4,
        }
    }
}

impl std::str::FromStr for SpectralClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "C" => Ok(SpectralClass::C),
            "S" => Ok(SpectralClass::S),
            "M" => Ok(SpectralClass::M),
            "V" => Ok(SpectralClass::V),
            "D" => Ok(SpectralClass::D),
            other => Err(format!("unknown spectral class '{other}'")),
        }
    }
}

/// Base fractal noise layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NoiseConfig {
    /// Frequency of the first octave, in cycles per unit direction.
    pub frequency: f64,
    /// Number of octaves (passes).
    pub octaves: u32,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
}

/// Ridged multifractal layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RidgeConfig {
    /// Contribution of the ridge layer to the combined height.
    pub weight: f64,
    pub frequency: f64,
    pub octaves: u32,
    /// Exponent applied to each ridge; higher is sharper.
    pub sharpness: f64,
}

/// Impact crater layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CraterConfig {
    pub count: u32,
    /// Smallest crater radius as a chord length on the unit sphere.
    pub min_radius: f64,
    /// Largest crater radius as a chord length on the unit sphere.
    pub max_radius: f64,
    /// Bowl depth relative to the other layers.
    pub depth: f64,
    /// Rim height as a fraction of the depth.
    pub rim_height: f64,
    /// Rim width as a fraction of the crater radius.
    pub rim_width: f64,
}

/// Planar fracture layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CleaveConfig {
    pub count: u32,
    /// How far the surface drops past a cleave plane.
    pub depth: f64,
    /// Width of the transition band, in unit-direction units.
    pub width: f64,
}

/// Immutable description of one body's shape.
///
/// Created once per body and shared read-only by the height field, the map
/// generator and the terrain cube.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShapeConfig {
    /// Base radius in world units.
    pub radius: f64,
    /// Per-axis stretch applied after displacement.
    pub stretch: [f64; 3],
    /// World units of displacement per unit of height-field output.
    pub displacement: f64,
    /// Constant radial offset in world units.
    pub bias: f64,
    pub noise: NoiseConfig,
    pub ridges: RidgeConfig,
    pub craters: CraterConfig,
    pub cleave: CleaveConfig,
    pub seed: u64,
    pub spectral_class: SpectralClass,
    /// Chunks use the emissive-capable variant.
    pub emissive: bool,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            frequency: 1.5,
            octaves: 6,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

impl Default for RidgeConfig {
    fn default() -> Self {
        Self {
            weight: 0.35,
            frequency: 2.0,
            octaves: 4,
            sharpness: 2.0,
        }
    }
}

impl Default for CraterConfig {
    fn default() -> Self {
        Self {
            count: 24,
            min_radius: 0.05,
            max_radius: 0.3,
            depth: 0.6,
            rim_height: 0.25,
            rim_width: 0.35,
        }
    }
}

impl Default for CleaveConfig {
    fn default() -> Self {
        Self {
            count: 2,
            depth: 0.8,
            width: 0.15,
        }
    }
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            radius: 1000.0,
            stretch: [1.4, 1.0, 0.8],
            displacement: 120.0,
            bias: 0.0,
            noise: NoiseConfig::default(),
            ridges: RidgeConfig::default(),
            craters: CraterConfig::default(),
            cleave: CleaveConfig::default(),
            seed: 1,
            spectral_class: SpectralClass::default(),
            emissive: false,
        }
    }
}

impl ShapeConfig {
    /// Check that every parameter is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.radius > 0.0) {
            return Err(invalid("shape.radius", format!("must be > 0, got {}", self.radius)));
        }
        if self.stretch.iter().any(|s| !(*s > 0.0)) {
            return Err(invalid(
                "shape.stretch",
                format!("components must be > 0, got {:?}", self.stretch),
            ));
        }
        if self.displacement < 0.0 {
            return Err(invalid("shape.displacement", "must be >= 0".into()));
        }
        if self.craters.min_radius > self.craters.max_radius {
            return Err(invalid(
                "shape.craters",
                "min_radius must not exceed max_radius".into(),
            ));
        }
        if self.cleave.count > 0 && !(self.cleave.width > 0.0) {
            return Err(invalid("shape.cleave.width", "must be > 0".into()));
        }
        Ok(())
    }

    /// The largest radius any surface point can reach before stretch.
    #[must_use]
    pub fn max_extent(&self) -> f64 {
        self.radius + self.bias.abs() + self.displacement * 2.0
    }
}

pub(crate) fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shape_is_valid() {
        ShapeConfig::default().validate().unwrap();
    }

    #[test]
    fn test_negative_radius_rejected() {
        let shape = ShapeConfig {
            radius: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            shape.validate(),
            Err(ConfigError::Invalid { field: "shape.radius", .. })
        ));
    }

    #[test]
    fn test_zero_stretch_rejected() {
        let shape = ShapeConfig {
            stretch: [1.0, 0.0, 1.0],
            ..Default::default()
        };
        assert!(shape.validate().is_err());
    }

    #[test]
    fn test_spectral_class_parse() {
        assert_eq!("m".parse::<SpectralClass>(), Ok(SpectralClass::M));
        assert!("x".parse::<SpectralClass>().is_err());
    }

    #[test]
    fn test_ramp_rows_are_distinct() {
        let mut rows: Vec<u32> = SpectralClass::ALL.iter().map(|c| c.ramp_row()).collect();
        rows.sort();
        rows.dedup();
        assert_eq!(rows.len(), SpectralClass::ALL.len());
    }
}

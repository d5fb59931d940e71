//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::shape::{ShapeConfig, invalid};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Shape of the rendered body.
    pub shape: ShapeConfig,
    /// Quadtree subdivision settings.
    pub lod: LodConfig,
    /// Map generation settings.
    pub maps: MapConfig,
    /// Chunk manager settings.
    pub manager: ManagerConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Quadtree subdivision settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// A node splits while the camera is closer than `size * split_factor`.
    pub split_factor: f64,
    /// Smallest leaf edge length in face-local units.
    pub min_chunk_size: f64,
    /// Grid segments per chunk edge. Must be a power of two.
    pub resolution: u32,
    /// Force-split leaves so same-face neighbours differ by at most one level.
    pub balance: bool,
    /// Cells per face edge in the coarse pre-sampled heightmap.
    pub coarse_resolution: u32,
}

/// Which implementation runs the map generator passes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum MapBackendKind {
    #[default]
    Cpu,
    Gpu,
}

/// Map generation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    pub backend: MapBackendKind,
    /// Extra border texels rendered around each patch for normal filtering.
    /// Zero disables oversampling.
    pub oversample: u32,
}

/// Chunk manager settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ManagerConfig {
    /// Wall-clock budget for map building per frame, in milliseconds.
    pub frame_budget_ms: f64,
    /// Geometry jobs older than this are considered stuck.
    pub job_timeout_ms: u64,
    /// Resubmissions of a failed or stuck job before its chunk is dropped.
    pub max_job_retries: u32,
    /// Background worker threads. Zero picks a count from the CPU.
    pub worker_threads: usize,
    /// Bake displacement into vertex positions and discard the height map.
    pub static_export: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            split_factor: 1.5,
            min_chunk_size: 31.25,
            resolution: 32,
            balance: true,
            coarse_resolution: 64,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            backend: MapBackendKind::Cpu,
            oversample: 1,
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            frame_budget_ms: 4.0,
            job_timeout_ms: 5_000,
            max_job_retries: 2,
            worker_threads: 0,
            static_export: false,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl LodConfig {
    /// Check that every parameter is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.split_factor > 0.0) {
            return Err(invalid("lod.split_factor", "must be > 0".into()));
        }
        if !(self.min_chunk_size > 0.0) {
            return Err(invalid("lod.min_chunk_size", "must be > 0".into()));
        }
        if self.resolution < 2 || !self.resolution.is_power_of_two() {
            return Err(invalid(
                "lod.resolution",
                format!("must be a power of two >= 2, got {}", self.resolution),
            ));
        }
        if self.coarse_resolution == 0 || !self.coarse_resolution.is_power_of_two() {
            return Err(invalid(
                "lod.coarse_resolution",
                format!("must be a power of two, got {}", self.coarse_resolution),
            ));
        }
        Ok(())
    }
}

// --- Load / Save / Reload ---

/// Platform config directory for lithos (e.g. `~/.config/lithos`).
#[must_use]
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lithos")
}

impl Config {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shape.validate()?;
        self.lod.validate()
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.validate()?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
        new_config.validate()?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("radius: 1000.0"));
        assert!(ron_str.contains("split_factor: 1.5"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(shape: (radius: 500.0), debug: ())";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.shape.radius, 500.0);
        assert_eq!(config.shape.noise, crate::NoiseConfig::default());
        assert_eq!(config.lod, LodConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_non_power_of_two_resolution_rejected() {
        let lod = LodConfig {
            resolution: 24,
            ..Default::default()
        };
        assert!(matches!(
            lod.validate(),
            Err(ConfigError::Invalid { field: "lod.resolution", .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.shape.seed = 99;
        config.maps.backend = MapBackendKind::Gpu;
        config.manager.static_export = true;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.ron"), "(lod: (resolution: 3))").unwrap();
        assert!(Config::load_or_create(dir.path()).is_err());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.lod.split_factor = 2.0;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.map(|c| c.lod.split_factor), Some(2.0));
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();
        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }
}

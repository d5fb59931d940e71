//! Command-line argument parsing for the lithos demo.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, MapBackendKind, SpectralClass};

/// Lithos command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "lithos", about = "Procedural small-body terrain")]
pub struct CliArgs {
    /// Base radius of the body.
    #[arg(long)]
    pub radius: Option<f64>,

    /// Generation seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Spectral class (C, S, M, V, D).
    #[arg(long)]
    pub class: Option<SpectralClass>,

    /// Run the map generator passes on the GPU.
    #[arg(long)]
    pub gpu: bool,

    /// Chunk grid resolution (power of two).
    #[arg(long)]
    pub resolution: Option<u32>,

    /// Number of simulated frames to run.
    #[arg(long, default_value_t = 120)]
    pub frames: u32,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(r) = args.radius {
            self.shape.radius = r;
        }
        if let Some(seed) = args.seed {
            self.shape.seed = seed;
        }
        if let Some(class) = args.class {
            self.shape.spectral_class = class;
        }
        if args.gpu {
            self.maps.backend = MapBackendKind::Gpu;
        }
        if let Some(res) = args.resolution {
            self.lod.resolution = res;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            radius: Some(250.0),
            class: Some(SpectralClass::M),
            gpu: true,
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.shape.radius, 250.0);
        assert_eq!(config.shape.spectral_class, SpectralClass::M);
        assert_eq!(config.maps.backend, MapBackendKind::Gpu);
        // Non-overridden fields retain defaults
        assert_eq!(config.shape.seed, 1);
        assert_eq!(config.lod.resolution, 32);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_parse_args() {
        let args =
            CliArgs::try_parse_from(["lithos", "--seed", "7", "--class", "v", "--frames", "10"])
                .unwrap();
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.class, Some(SpectralClass::V));
        assert_eq!(args.frames, 10);
        assert!(!args.gpu);
    }
}

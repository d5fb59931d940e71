//! Configuration for procedural body rendering.
//!
//! Settings persist to disk as RON, tolerate missing sections, support CLI
//! overrides via clap, and can be hot-reloaded.

mod cli;
mod config;
mod error;
mod shape;

pub use cli::CliArgs;
pub use config::{
    Config, DebugConfig, LodConfig, ManagerConfig, MapBackendKind, MapConfig, default_config_dir,
};
pub use error::ConfigError;
pub use shape::{CleaveConfig, CraterConfig, NoiseConfig, RidgeConfig, ShapeConfig, SpectralClass};

//! Headless lithos demo: fly toward a procedural body and report how the
//! terrain refines along the way.

mod flight;
mod gpu_group;

use std::process::ExitCode;

use clap::Parser;
use lithos_config::{CliArgs, Config, default_config_dir};
use tracing::{error, info};

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    lithos_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    info!(
        radius = config.shape.radius,
        seed = config.shape.seed,
        class = ?config.shape.spectral_class,
        backend = ?config.maps.backend,
        resolution = config.lod.resolution,
        frames = args.frames,
        "Starting lithos demo"
    );

    match flight::run(&config, args.frames) {
        Ok(report) => {
            info!(
                frames = report.frames,
                reconfigurations = report.reconfigurations,
                busy_frames = report.busy_frames,
                maps_built = report.maps_built,
                active = report.stats.active_chunks,
                constructed = report.stats.constructed_chunks,
                pooled = report.stats.pooled_chunks,
                min_chunk_size = report.stats.min_chunk_size.unwrap_or(0.0),
                "Flight finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Flight failed");
            ExitCode::FAILURE
        }
    }
}

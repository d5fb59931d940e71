//! Structured logging for lithos.
//!
//! Console output with uptime timestamps and module paths, plus a JSON log
//! file in debug builds. `RUST_LOG` wins over the configured level.

use std::path::{Path, PathBuf};

use lithos_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config sets a level.
pub const DEFAULT_FILTER: &str = "info,wgpu=warn,naga=warn";

/// Name of the JSON log file written in debug builds.
pub const LOG_FILE_NAME: &str = "lithos.log";

/// The filter directive string for a config.
///
/// A bare level such as `debug` keeps GPU backend chatter at `warn`; any
/// string containing a target directive is used verbatim.
#[must_use]
pub fn filter_directive(config: Option<&Config>) -> String {
    let level = config.map(|c| c.debug.log_level.trim()).unwrap_or("");
    if level.is_empty() {
        DEFAULT_FILTER.to_string()
    } else if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("{level},wgpu=warn,naga=warn")
    }
}

/// Where the JSON log file goes, if file logging applies.
#[must_use]
pub fn log_file_path(log_dir: Option<&Path>, debug_build: bool) -> Option<PathBuf> {
    if debug_build {
        log_dir.map(|dir| dir.join(LOG_FILE_NAME))
    } else {
        None
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup. In debug builds with a `log_dir`, events are also
/// written as JSON lines to `log_dir/lithos.log`; failure to create that
/// file falls back to console-only logging.
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let directive = filter_directive(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if let Some(path) = log_file_path(log_dir, debug_build)
        && let Some(dir) = path.parent()
        && std::fs::create_dir_all(dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(&path)
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        tracing::debug!(path = %path.display(), "JSON file logging enabled");
        return;
    }

    subscriber.init();
}

/// An `EnvFilter` built from [`DEFAULT_FILTER`].
#[must_use]
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

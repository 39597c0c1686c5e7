use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

fn parse_level(level: &str) -> Result<LevelFilter, String> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        other => Err(format!(
            "Invalid logging.level '{}'. Valid values: trace, debug, info, warn, error",
            other
        )),
    }
}

/// Installs the global subscriber. `RUST_LOG` directives are layered on top
/// of the configured level; `log` records from dependencies are bridged in.
pub fn init_logging(logging_config: &LoggingConfig) -> Result<(), String> {
    let level_filter = parse_level(&logging_config.level)?;
    let filter_layer = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .from_env_lossy();

    tracing_log::LogTracer::init().map_err(|e| e.to_string())?;

    let registry = tracing_subscriber::registry().with(filter_layer);
    let installed = match logging_config.format.to_lowercase().as_str() {
        "json" => tracing::subscriber::set_global_default(
            registry.with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false),
            ),
        ),
        // Anything else falls back to human-readable console output.
        _ => tracing::subscriber::set_global_default(registry.with(fmt::layer().pretty())),
    };
    installed.map_err(|e| e.to_string())?;

    info!(
        service.name = logging_config.service_name.as_str(),
        service.version = logging_config.service_version.as_str(),
        "logging initialised"
    );
    Ok(())
}

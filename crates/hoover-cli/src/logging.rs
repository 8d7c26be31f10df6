//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use hoover_config::{LogFormat, LoggingSettings};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// `--debug` forces debug level. Otherwise `RUST_LOG` wins over the
/// configured level. An optional log file receives the same events without
/// ANSI colors.
pub fn init(settings: &LoggingSettings, force_debug: bool) -> Result<()> {
    let filter = build_filter(settings, force_debug)?;

    let file = match &settings.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory: {}", parent.display())
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(Mutex::new(file))
        }
        None => None,
    };

    match settings.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .with(file.map(|f| fmt::layer().with_ansi(false).with_writer(f)))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .with(file.map(|f| fmt::layer().with_ansi(false).with_writer(f)))
            .try_init(),
    }
    .context("Failed to initialize logging")
}

fn build_filter(settings: &LoggingSettings, force_debug: bool) -> Result<EnvFilter> {
    if force_debug {
        return Ok(EnvFilter::new("debug"));
    }
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.level)
            .with_context(|| format!("Invalid log level: {}", settings.level)),
    }
}

//! Tracing subscriber setup.
//!
//! Stdout belongs to the terminal display, so logs go to a file when one is
//! configured and to stderr otherwise.

use crate::config::{LogFormat, LoggingConfig};
use std::fs::File;
use std::io;
use std::sync::Arc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Build the filter: `RUST_LOG` if set, else the configured level.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Build a subscriber writing to `writer` in the configured format.
pub fn build_subscriber(
    config: &LoggingConfig,
    writer: BoxMakeWriter,
) -> Box<dyn tracing::Subscriber + Send + Sync> {
    let filter = build_filter(&config.level);
    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => Box::new(registry.with(fmt::layer().json().with_writer(writer))),
        LogFormat::Compact => Box::new(
            registry.with(fmt::layer().compact().with_ansi(false).with_writer(writer)),
        ),
        LogFormat::Pretty => Box::new(registry.with(fmt::layer().with_writer(writer))),
    }
}

/// Install the global subscriber.
///
/// Fails if the log file cannot be created. A second call is a no-op.
pub fn init(config: &LoggingConfig) -> io::Result<()> {
    let writer = match &config.file {
        Some(path) => {
            let file = File::create(path)?;
            BoxMakeWriter::new(Arc::new(file))
        }
        None => BoxMakeWriter::new(io::stderr),
    };
    let subscriber = build_subscriber(config, writer);
    // Already installed (tests, embedding): keep the existing one.
    let _ = tracing::subscriber::set_global_default(subscriber);
    Ok(())
}

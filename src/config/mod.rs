//! Configuration module for serial-term.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_TERM_CONFIG` environment variable (explicit path)
//! 2. `./serial-term.toml` (current directory)
//! 3. `config.toml` in the platform config directory
//!    (`~/.config/serial-term/` on Linux, `%APPDATA%\serial-term\config\` on Windows)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is: `SERIAL_TERM_<SECTION>_<KEY>`
//!
//! - `SERIAL_TERM_SERIAL_DEFAULT_BAUD=9600`
//! - `SERIAL_TERM_DISPLAY_MODE=hex`
//! - `SERIAL_TERM_DISPLAY_TIMESTAMPS=true`
//! - `SERIAL_TERM_DISPLAY_TICK_RATE_HZ=30`
//! - `SERIAL_TERM_TRANSMIT_CHUNK_SIZE=1024`
//! - `SERIAL_TERM_LOGGING_LEVEL=debug`
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_terminal::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//! println!("Default baud: {}", config.serial.default_baud);
//! # Ok::<(), serial_terminal::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{
    Config, DisplayConfig, ExportConfig, LogFormat, LoggingConfig, SerialConfig, TransmitConfig,
};

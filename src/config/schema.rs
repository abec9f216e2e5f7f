//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
use crate::bytes::Timezone;
use crate::display::{DEFAULT_REPAINT_BATCH, DEFAULT_TICK_RATE_HZ};
use crate::port::{DataBits, FlowControl, Parity, PortConfiguration, StopBits};
use crate::render::{DisplayMode, RenderSettings};
use crate::transmit::{DEFAULT_CHUNK_SIZE, DEFAULT_SAFETY_FACTOR};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial line defaults
    pub serial: SerialConfig,
    /// Receive display
    pub display: DisplayConfig,
    /// Bulk and manual transmit
    pub transmit: TransmitConfig,
    /// History export
    pub export: ExportConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.default_baud == 0 {
            return Err(ConfigError::validation(
                "serial.default_baud",
                "must be greater than 0",
            ));
        }
        if self.serial.read_buffer_size == 0 {
            return Err(ConfigError::validation(
                "serial.read_buffer_size",
                "must be greater than 0",
            ));
        }
        if !(1..=1000).contains(&self.display.tick_rate_hz) {
            return Err(ConfigError::validation(
                "display.tick_rate_hz",
                "must be between 1 and 1000",
            ));
        }
        if self.display.repaint_batch_size == 0 {
            return Err(ConfigError::validation(
                "display.repaint_batch_size",
                "must be greater than 0",
            ));
        }
        if self.transmit.chunk_size == 0 {
            return Err(ConfigError::validation(
                "transmit.chunk_size",
                "must be greater than 0",
            ));
        }
        let safety = self.transmit.safety_factor;
        if safety.is_nan() || safety < 1.0 {
            return Err(ConfigError::validation(
                "transmit.safety_factor",
                "must be at least 1.0",
            ));
        }
        Ok(())
    }
}

/// Serial port configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Default baud rate for new connections
    pub default_baud: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Largest single read; one read becomes one chunk
    pub read_buffer_size: usize,
    /// Port aliases for convenience
    #[serde(default)]
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        let line = PortConfiguration::default();
        Self {
            default_baud: line.baud_rate,
            data_bits: line.data_bits,
            parity: line.parity,
            stop_bits: line.stop_bits,
            flow_control: line.flow_control,
            read_buffer_size: 4096,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialConfig {
    /// Line settings for a new connection.
    pub fn port_configuration(&self) -> PortConfiguration {
        PortConfiguration {
            baud_rate: self.default_baud,
            data_bits: self.data_bits,
            flow_control: self.flow_control,
            parity: self.parity,
            stop_bits: self.stop_bits,
        }
    }

    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

/// Display configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// "text" or "hex"
    pub mode: DisplayMode,
    /// Prefix text lines with arrival time
    pub timestamps: bool,
    /// "local" or "utc"
    pub timezone: Timezone,
    /// Display refresh rate in Hz
    pub tick_rate_hz: u32,
    /// Chunks replayed per repaint step
    pub repaint_batch_size: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Text,
            timestamps: false,
            timezone: Timezone::Local,
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            repaint_batch_size: DEFAULT_REPAINT_BATCH,
        }
    }
}

impl DisplayConfig {
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            mode: self.mode,
            timestamps: self.timestamps,
            timezone: self.timezone,
        }
    }
}

/// Transmit configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmitConfig {
    /// Bulk send chunk size in bytes
    pub chunk_size: usize,
    /// Multiplier on the nominal per-chunk line time
    pub safety_factor: f64,
    /// Append CRLF to typed text
    pub append_crlf: bool,
    /// Expand backslash escapes in typed text
    pub expand_escapes: bool,
}

impl Default for TransmitConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            safety_factor: DEFAULT_SAFETY_FACTOR,
            append_crlf: true,
            expand_escapes: true,
        }
    }
}

/// Export configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory exports are written to
    pub directory: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log file path; stderr when unset
    pub file: Option<PathBuf>,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

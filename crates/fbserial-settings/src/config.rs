//! Configuration for fbserial
//!
//! Provides configuration file handling and validation. Supports JSON and
//! TOML file formats stored in the platform configuration directory.
//!
//! Configuration is organized into logical sections:
//! - Connection settings (port, baud rate, framing)
//! - Engine settings (tick period, round-trip timeout, readiness poll)
//! - Parameter settings (persisted values, reconcile on connect)

use crate::error::{ConfigError, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serial flow control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    /// No flow control
    None,
    /// XON/XOFF
    #[default]
    Software,
    /// RTS/CTS
    Hardware,
}

impl std::fmt::Display for FlowControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Software => write!(f, "software"),
            Self::Hardware => write!(f, "hardware"),
        }
    }
}

/// Serial parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit
    #[default]
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

/// Connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Serial device path
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5 to 8)
    pub data_bits: u8,
    /// Stop bits (1 or 2)
    pub stop_bits: u8,
    /// Parity
    pub parity: Parity,
    /// Flow control
    pub flow_control: FlowControl,
    /// Read timeout of one blocking port read in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 115200,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            flow_control: FlowControl::Software,
            read_timeout_ms: 10,
        }
    }
}

impl ConnectionSettings {
    /// Read timeout as a duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Engine timing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Period of the scheduling tick in milliseconds
    pub tick_interval_ms: u64,
    /// Bound on one parameter read/write round-trip in milliseconds
    pub exchange_timeout_ms: u64,
    /// Status register read by the readiness poll
    pub poll_status_id: u16,
    /// Buffer size of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 80,
            exchange_timeout_ms: 2000,
            poll_status_id: 8,
            event_capacity: 100,
        }
    }
}

impl EngineSettings {
    /// Tick period as a duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Round-trip timeout as a duration
    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_millis(self.exchange_timeout_ms)
    }
}

/// Persisted parameter settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSettings {
    /// JSON file holding persisted parameter values
    pub database_path: Option<PathBuf>,
    /// Reconcile parameters right after the port opens
    pub check_on_connect: bool,
}

/// Complete application configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Engine settings
    pub engine: EngineSettings,
    /// Parameter settings
    pub parameters: ParameterSettings,
}

#[derive(Clone, Copy)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string()).into()),
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location: `<config dir>/fbserial/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        let mut path = dirs::config_dir().ok_or_else(|| {
            SettingsError::ConfigDirectory("no configuration directory on this platform".into())
        })?;
        path.push("fbserial");
        path.push("config.toml");
        Ok(path)
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = Format::of(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load config from file, or defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)
                .map_err(|e| SettingsError::SaveError(e.to_string()))?,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        let out_of_range = |key: &str, value: &dyn std::fmt::Display| -> SettingsResult<()> {
            Err(ConfigError::ValueOutOfRange {
                key: key.to_string(),
                value: value.to_string(),
            }
            .into())
        };

        let connection = &self.connection;
        if connection.baud_rate == 0 {
            return out_of_range("connection.baud_rate", &connection.baud_rate);
        }
        if !(5..=8).contains(&connection.data_bits) {
            return out_of_range("connection.data_bits", &connection.data_bits);
        }
        if !(1..=2).contains(&connection.stop_bits) {
            return out_of_range("connection.stop_bits", &connection.stop_bits);
        }

        let engine = &self.engine;
        if engine.tick_interval_ms == 0 {
            return out_of_range("engine.tick_interval_ms", &engine.tick_interval_ms);
        }
        if engine.exchange_timeout_ms == 0 {
            return out_of_range("engine.exchange_timeout_ms", &engine.exchange_timeout_ms);
        }
        if engine.event_capacity == 0 {
            return out_of_range("engine.event_capacity", &engine.event_capacity);
        }

        Ok(())
    }
}

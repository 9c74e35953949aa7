//! Configuration and settings management for pnpkit
//!
//! Provides configuration file handling and validation.
//! Supports JSON and TOML file formats stored in platform-specific directories.
//!
//! Configuration is organized into two sections:
//! - Connection settings (port, framing, per-read timeout)
//! - Driver settings (feed rate, cam geometry, backlash, protocol timeouts)

use crate::error::{ConfigError, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serial parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit
    #[default]
    None,
    /// Even parity
    Even,
    /// Odd parity
    Odd,
}

impl std::fmt::Display for Parity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Even => write!(f, "even"),
            Self::Odd => write!(f, "odd"),
        }
    }
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Serial port name (e.g., "/dev/ttyACM0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5-8)
    pub data_bits: u8,
    /// Stop bits (1 or 2)
    pub stop_bits: u8,
    /// Parity
    pub parity: Parity,
    /// Hardware flow control
    pub flow_control: bool,
    /// Bound on a single blocking line read, in milliseconds
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
            flow_control: false,
            read_timeout_ms: 100,
        }
    }
}

impl ConnectionSettings {
    /// Per-read bound as a duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Machine geometry and protocol timing for the driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    /// Feed rate at speed 1.0, in mm/min
    pub feed_rate_mm_per_minute: f64,
    /// Radius of the vertical cam, in mm
    pub z_cam_radius: f64,
    /// Tool height at cam angle zero, in mm
    pub z_offset: f64,
    /// Overshoot applied when approaching X from above, in mm
    pub backlash_x: f64,
    /// Overshoot applied when approaching Y from below, in mm
    pub backlash_y: f64,
    /// Feed rate for backlash corrective moves, in mm/min
    pub backlash_speed: f64,
    /// Keep the link open when the machine is disabled
    pub connection_keep_alive: bool,
    /// Default response timeout for a command
    pub command_timeout_ms: u64,
    /// Time allowed for observing a position report during connect
    pub connect_timeout_ms: u64,
    /// Wait used while flushing startup chatter
    pub flush_timeout_ms: u64,
    /// Bound on joining the response reader at disconnect
    pub reader_join_timeout_ms: u64,
    /// Response timeout for homing Z
    pub home_z_timeout_ms: u64,
    /// Response timeout for homing X and Y
    pub home_xy_timeout_ms: u64,
    /// Pause that lets the Z spring return after releasing the motors
    pub motor_settle_ms: u64,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            feed_rate_mm_per_minute: 5000.0,
            z_cam_radius: 24.0,
            z_offset: 17.5,
            backlash_x: 2.0,
            backlash_y: 2.0,
            backlash_speed: 2000.0,
            connection_keep_alive: false,
            command_timeout_ms: 5000,
            connect_timeout_ms: 5000,
            flush_timeout_ms: 200,
            reader_join_timeout_ms: 3000,
            home_z_timeout_ms: 10_000,
            home_xy_timeout_ms: 60_000,
            motor_settle_ms: 250,
        }
    }
}

impl DriverSettings {
    /// Response timeout for an ordinary command
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Time allowed for the connect position report
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Quiet period that ends a flush
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    /// Bound on waiting for the reader thread to exit
    pub fn reader_join_timeout(&self) -> Duration {
        Duration::from_millis(self.reader_join_timeout_ms)
    }

    /// Response timeout for Z homing
    pub fn home_z_timeout(&self) -> Duration {
        Duration::from_millis(self.home_z_timeout_ms)
    }

    /// Response timeout for X/Y homing
    pub fn home_xy_timeout(&self) -> Duration {
        Duration::from_millis(self.home_xy_timeout_ms)
    }

    /// Pause after releasing the motors during homing
    pub fn motor_settle(&self) -> Duration {
        Duration::from_millis(self.motor_settle_ms)
    }
}

/// Complete driver configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Driver settings
    pub driver: DriverSettings,
}

enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("<none>").to_string()).into()),
    }
}

fn out_of_range(key: &str, value: impl ToString) -> SettingsError {
    ConfigError::ValueOutOfRange {
        key: key.to_string(),
        value: value.to_string(),
    }
    .into()
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform config location: `<config_dir>/pnpkit/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("pnpkit").join("config.toml"))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no platform config directory".to_string())
            })
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::LoadError(format!("{}: {}", path.display(), e)))?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load config from file, or fall back to defaults when the file is absent
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

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        let conn = &self.connection;
        if conn.baud_rate == 0 {
            return Err(out_of_range("connection.baud_rate", conn.baud_rate));
        }
        if !(5..=8).contains(&conn.data_bits) {
            return Err(out_of_range("connection.data_bits", conn.data_bits));
        }
        if !(1..=2).contains(&conn.stop_bits) {
            return Err(out_of_range("connection.stop_bits", conn.stop_bits));
        }
        if conn.read_timeout_ms == 0 {
            return Err(out_of_range("connection.read_timeout_ms", 0));
        }

        let driver = &self.driver;
        let positive = [
            ("driver.feed_rate_mm_per_minute", driver.feed_rate_mm_per_minute),
            ("driver.z_cam_radius", driver.z_cam_radius),
            ("driver.backlash_speed", driver.backlash_speed),
        ];
        for (key, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(out_of_range(key, value));
            }
        }

        let non_negative = [
            ("driver.backlash_x", driver.backlash_x),
            ("driver.backlash_y", driver.backlash_y),
        ];
        for (key, value) in non_negative {
            if value.is_nan() || value < 0.0 {
                return Err(out_of_range(key, value));
            }
        }

        if !driver.z_offset.is_finite() {
            return Err(out_of_range("driver.z_offset", driver.z_offset));
        }

        let timeouts = [
            ("driver.command_timeout_ms", driver.command_timeout_ms),
            ("driver.connect_timeout_ms", driver.connect_timeout_ms),
            ("driver.flush_timeout_ms", driver.flush_timeout_ms),
            ("driver.reader_join_timeout_ms", driver.reader_join_timeout_ms),
            ("driver.home_z_timeout_ms", driver.home_z_timeout_ms),
            ("driver.home_xy_timeout_ms", driver.home_xy_timeout_ms),
        ];
        for (key, value) in timeouts {
            if value == 0 {
                return Err(out_of_range(key, value));
            }
        }

        Ok(())
    }
}

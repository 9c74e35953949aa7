//! pnpkit Settings Crate
//!
//! Handles driver configuration: serial link parameters, machine geometry,
//! and protocol timeouts, persisted as JSON or TOML.

pub mod config;
pub mod error;

pub use config::{Config, ConnectionSettings, DriverSettings, Parity};
pub use error::{ConfigError, SettingsError, SettingsResult};

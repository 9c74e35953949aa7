//! # pnpkit
//!
//! Serial motion driver for the OpenBuilds two-tool pick-and-place head.
//!
//! ## Architecture
//!
//! pnpkit is organized as a workspace with multiple crates:
//!
//! 1. **pnpkit-core** - Pose and position data model, `DriverTrait`, errors
//! 2. **pnpkit-settings** - Connection and machine configuration, persistence
//! 3. **pnpkit-communication** - Line transport, response reader, command
//!    dispatcher, and the OpenBuilds driver with its kinematics
//! 4. **pnpkit** - Re-exports, logging setup and the command-line entry point

pub use pnpkit_communication::{communication, firmware};

pub use pnpkit_core::{
    ConnectionError, ConnectionState, ControllerError, DriverTrait, Error, Location, Mover,
    MoverKind, PositionState, Result, ToolIndex, Units,
};

pub use pnpkit_communication::{
    list_ports, ConnectionParams, LineTransport, MockTransport, OpenBuildsDriver,
    SerialLineTransport, SerialPortInfo,
};

pub use pnpkit_settings::{Config, ConnectionSettings, DriverSettings, Parity};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output (stderr) with target and thread names
/// - RUST_LOG environment variable support, INFO when unset
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // the reader thread logs every received line, so its name matters
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))?;

    Ok(())
}

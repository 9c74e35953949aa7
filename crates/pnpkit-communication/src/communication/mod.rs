//! Line-oriented communication with the motion controller
//!
//! - [`LineTransport`]: the byte stream, one line at a time
//! - [`ResponseReader`]: background thread publishing received lines
//! - [`CommandDispatcher`]: one command in flight, paired with its response
//! - [`MockTransport`]: in-memory controller for tests and dry runs

pub mod dispatcher;
pub mod mock;
pub mod reader;
pub mod serial;

pub use dispatcher::{CommandDispatcher, ResponseTimeout};
pub use mock::{MockMode, MockTransport};
pub use reader::{ReaderHandle, ResponseChannel, ResponseReader};
pub use serial::{list_ports, SerialLineTransport, SerialPortInfo};

use pnpkit_core::Result;
use pnpkit_settings::{ConnectionSettings, Parity};
use std::time::Duration;

/// Parameters for opening a serial line transport
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionParams {
    /// Port name (e.g., "/dev/ttyACM0", "COM3")
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
    /// Bound on a single blocking read
    pub read_timeout: Duration,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self::from(&ConnectionSettings::default())
    }
}

impl From<&ConnectionSettings> for ConnectionParams {
    fn from(settings: &ConnectionSettings) -> Self {
        Self {
            port: settings.port.clone(),
            baud_rate: settings.baud_rate,
            data_bits: settings.data_bits,
            stop_bits: settings.stop_bits,
            parity: settings.parity,
            flow_control: settings.flow_control,
            read_timeout: settings.read_timeout(),
        }
    }
}

/// Bidirectional line stream to the controller
///
/// Reads and writes happen from different threads: the response reader
/// blocks in [`read_line`](LineTransport::read_line) while the caller writes.
pub trait LineTransport: Send + Sync {
    /// Open the underlying stream
    fn open(&self) -> Result<()>;

    /// Close the underlying stream; closing a closed transport is a no-op
    fn close(&self) -> Result<()>;

    /// Whether the stream is open
    fn is_open(&self) -> bool;

    /// Write one line; the transport appends the line terminator
    fn write_line(&self, line: &str) -> Result<()>;

    /// Block for up to `timeout` for one line.
    ///
    /// `Ok(None)` means no complete line arrived in time. An `Err` is an
    /// unrecoverable stream failure.
    fn read_line(&self, timeout: Duration) -> Result<Option<String>>;
}

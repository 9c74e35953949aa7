//! Serial port line transport
//!
//! Talks to the controller over USB/RS-232 with the `serialport` crate.
//! The port is cloned on open so the response reader and the command writer
//! never contend for the same handle.

use super::{ConnectionParams, LineTransport};
use parking_lot::Mutex;
use pnpkit_core::{ConnectionError, Error, Result};
use pnpkit_settings::Parity;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyACM0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// Serial number if available
    pub serial_number: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            serial_number: None,
            vid: None,
            pid: None,
        }
    }

    /// Set USB details
    pub fn with_usb(mut self, usb: &serialport::UsbPortInfo) -> Self {
        self.vid = Some(usb.vid);
        self.pid = Some(usb.pid);
        self.manufacturer = usb.manufacturer.clone();
        self.serial_number = usb.serial_number.clone();
        self
    }
}

/// List serial ports that look like a motion controller
///
/// Only USB CDC/serial style names are returned:
/// - Windows: COM*
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        Error::other(format!("Failed to enumerate ports: {}", e))
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_candidate_port(&port.port_name))
        .map(|port| {
            let info = SerialPortInfo::new(&port.port_name, port_description(port));
            match &port.port_type {
                serialport::SerialPortType::UsbPort(usb) => info.with_usb(usb),
                _ => info,
            }
        })
        .collect())
}

fn is_candidate_port(port_name: &str) -> bool {
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    port_name.starts_with("/dev/ttyUSB")
        || port_name.starts_with("/dev/ttyACM")
        || port_name.starts_with("/dev/cu.usbserial-")
        || port_name.starts_with("/dev/cu.usbmodem")
}

fn port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb) => format!(
            "USB {} {}",
            usb.manufacturer.as_deref().unwrap_or("Device"),
            usb.product.as_deref().unwrap_or("Serial Port")
        ),
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

fn to_serialport_parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    }
}

struct LineReader {
    port: Box<dyn serialport::SerialPort>,
    pending: Vec<u8>,
}

impl LineReader {
    fn take_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=end).collect();
        let line = String::from_utf8_lossy(&raw[..end]);
        Some(line.trim_end_matches('\r').to_string())
    }
}

/// Line transport over a serial port
pub struct SerialLineTransport {
    params: ConnectionParams,
    writer: Mutex<Option<Box<dyn serialport::SerialPort>>>,
    reader: Mutex<Option<LineReader>>,
}

impl SerialLineTransport {
    /// Create a closed transport for `params`
    pub fn new(params: ConnectionParams) -> Self {
        Self {
            params,
            writer: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    /// The parameters this transport opens with
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    fn failed_to_open(&self, reason: impl Into<String>) -> Error {
        ConnectionError::FailedToOpen {
            port: self.params.port.clone(),
            reason: reason.into(),
        }
        .into()
    }
}

impl LineTransport for SerialLineTransport {
    fn open(&self) -> Result<()> {
        let params = &self.params;
        let data_bits = match params.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            8 => serialport::DataBits::Eight,
            other => {
                return Err(ConnectionError::InvalidParameters {
                    reason: format!("invalid data bits: {}", other),
                }
                .into())
            }
        };
        let stop_bits = match params.stop_bits {
            1 => serialport::StopBits::One,
            2 => serialport::StopBits::Two,
            other => {
                return Err(ConnectionError::InvalidParameters {
                    reason: format!("invalid stop bits: {}", other),
                }
                .into())
            }
        };

        let port = serialport::new(&params.port, params.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(to_serialport_parity(params.parity))
            .flow_control(if params.flow_control {
                serialport::FlowControl::Hardware
            } else {
                serialport::FlowControl::None
            })
            .timeout(params.read_timeout)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", params.port, e);
                match e.kind() {
                    serialport::ErrorKind::NoDevice => ConnectionError::PortNotFound {
                        port: params.port.clone(),
                    }
                    .into(),
                    _ => self.failed_to_open(e.to_string()),
                }
            })?;
        let read_half = port
            .try_clone()
            .map_err(|e| self.failed_to_open(e.to_string()))?;

        *self.reader.lock() = Some(LineReader {
            port: read_half,
            pending: Vec::new(),
        });
        *self.writer.lock() = Some(port);

        tracing::info!("Opened {} at {} baud", params.port, params.baud_rate);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let had_port = self.writer.lock().take().is_some();
        self.reader.lock().take();
        if had_port {
            tracing::info!("Closed {}", self.params.port);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.writer.lock().is_some()
    }

    fn write_line(&self, line: &str) -> Result<()> {
        let mut writer = self.writer.lock();
        let port = writer
            .as_mut()
            .ok_or_else(|| Error::transport_fault("serial port is not open"))?;

        port.write_all(line.as_bytes())
            .and_then(|_| port.write_all(b"\n"))
            .and_then(|_| port.flush())
            .map_err(|e| Error::transport_fault(format!("write failed: {}", e)))
    }

    fn read_line(&self, timeout: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.reader.lock();
        let reader = guard
            .as_mut()
            .ok_or_else(|| Error::transport_fault("serial port is not open"))?;

        let mut buf = [0u8; 256];
        loop {
            if let Some(line) = reader.take_line() {
                return Ok(Some(line));
            }

            match reader.port.read(&mut buf) {
                Ok(0) => return Err(Error::transport_fault("serial port closed")),
                Ok(n) => reader.pending.extend_from_slice(&buf[..n]),
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::transport_fault(format!("read failed: {}", e))),
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }
}

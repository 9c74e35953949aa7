//! Error handling for pnpkit
//!
//! Provides error types for all layers of the driver:
//! - Controller errors (command exchange and device operation)
//! - Connection errors (handshake and transport)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Controller error type
///
/// Represents errors raised while exchanging commands with the motion
/// controller or while running a device operation.
#[derive(Error, Debug, Clone)]
pub enum ControllerError {
    /// Controller is not connected
    #[error("Controller not connected")]
    NotConnected,

    /// Controller is already connected or connecting
    #[error("Controller already connected")]
    AlreadyConnected,

    /// No response arrived within the allotted window
    #[error("Timeout after {timeout_ms}ms waiting for response to {command}")]
    Timeout {
        /// The command text that was awaiting a response, or `<none>` for a plain wait.
        command: String,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Command was rejected by the controller
    #[error("Command {command} rejected: {reason}")]
    CommandRejected {
        /// The command text.
        command: String,
        /// The error line reported by the controller.
        reason: String,
    },

    /// Actuator index has no mapping on this machine
    #[error("No actuator with index {index}")]
    InvalidActuator {
        /// The requested actuator index.
        index: usize,
    },

    /// Generic controller error
    #[error("Controller error: {message}")]
    Other {
        /// The error message.
        message: String,
    },
}

/// Connection error type
///
/// Represents errors related to opening, handshaking with, and reading from
/// the line transport.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Handshake never observed a position report
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// The likely cause.
        reason: String,
    },

    /// The byte stream itself failed
    #[error("Transport fault: {reason}")]
    TransportFault {
        /// The reason reported by the transport.
        reason: String,
    },

    /// Port not found
    #[error("Port not found: {port}")]
    PortNotFound {
        /// The name of the port that was not found.
        port: String,
    },

    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Invalid connection parameters
    #[error("Invalid connection parameters: {reason}")]
    InvalidParameters {
        /// The reason the parameters are invalid.
        reason: String,
    },

    /// Generic connection error
    #[error("Connection error: {message}")]
    Other {
        /// The error message.
        message: String,
    },
}

/// Main error type for pnpkit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Controller error
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Build a timeout error for the given command
    pub fn timeout(command: Option<&str>, timeout_ms: u64) -> Self {
        Error::Controller(ControllerError::Timeout {
            command: command.unwrap_or("<none>").to_string(),
            timeout_ms,
        })
    }

    /// Build a transport fault error
    pub fn transport_fault(reason: impl Into<String>) -> Self {
        Error::Connection(ConnectionError::TransportFault {
            reason: reason.into(),
        })
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Controller(ControllerError::Timeout { .. }))
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if the transport failed underneath the driver
    pub fn is_transport_fault(&self) -> bool {
        matches!(self, Error::Connection(ConnectionError::TransportFault { .. }))
    }

    /// Check if this is a controller error
    pub fn is_controller_error(&self) -> bool {
        matches!(self, Error::Controller(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

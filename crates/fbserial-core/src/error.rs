//! Error handling for fbserial
//!
//! Provides error types for every layer of the driver:
//! - Command errors (caller input rejected before anything is written)
//! - Connection errors (serial link and device round-trips)
//! - Parameter errors (catalog, persistence and reconciliation)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Command error type
///
/// Raised synchronously by the command surface when caller input is
/// invalid. No bytes reach the transport when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Axis name is not one of x, y or z
    #[error("Invalid axis '{axis}': expected one of x, y, z")]
    InvalidAxis {
        /// The rejected axis name.
        axis: String,
    },

    /// Value cannot be coerced into a device boolean
    #[error("Invalid boolean value '{value}': expected one of true, false, 1, 0")]
    InvalidBooleanValue {
        /// The rejected value, rendered as text.
        value: String,
    },

    /// Pin mode is neither analog nor digital
    #[error("Invalid pin mode '{mode}': expected analog or digital")]
    InvalidPinMode {
        /// The rejected pin mode.
        mode: String,
    },

    /// Console command name is not recognised
    #[error("Unknown command: {name}")]
    UnknownCommand {
        /// The command name that was not recognised.
        name: String,
    },

    /// Command arguments are missing, malformed or unsupported
    #[error("Invalid arguments for {command}: {reason}")]
    InvalidArgument {
        /// The command that received the arguments.
        command: String,
        /// Why the arguments were rejected.
        reason: String,
    },
}

/// Connection error type
///
/// Represents errors related to the serial link and to request/reply
/// exchanges with the device.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// The transport reported that the link is gone
    #[error("Connection closed")]
    Closed,

    /// A round-trip got no answer in time
    #[error("Timed out after {timeout_ms}ms waiting for {waiting_for}")]
    Timeout {
        /// What the exchange was waiting for.
        waiting_for: String,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Serial port error
    #[error("Serial port error: {reason}")]
    SerialError {
        /// The reason for the serial port error.
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {reason}")]
    IoError {
        /// The reason for the I/O error.
        reason: String,
    },
}

/// Parameter error type
///
/// Represents errors raised while resolving device parameters or
/// reconciling them with the persisted configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    /// Parameter id is not part of the catalog
    #[error("Unknown parameter id {id}")]
    UnknownParameter {
        /// The unknown parameter id.
        id: u16,
    },

    /// The device answered without a value
    #[error("Device reply for parameter {id} carried no value")]
    MissingReply {
        /// The parameter id that was read.
        id: u16,
    },

    /// The persistence layer failed
    #[error("Parameter persistence failed: {reason}")]
    Persistence {
        /// The reason reported by the persistence layer.
        reason: String,
    },
}

/// Main error type for fbserial
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Command error
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Parameter error
    #[error(transparent)]
    Parameter(#[from] ParameterError),

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

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Connection(ConnectionError::Timeout { .. }))
    }

    /// Check if the link is gone
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Connection(ConnectionError::Closed))
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a caller input error
    pub fn is_command_error(&self) -> bool {
        matches!(self, Error::Command(_))
    }

    /// Check if this is a parameter error
    pub fn is_parameter_error(&self) -> bool {
        matches!(self, Error::Parameter(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display() {
        let err = CommandError::InvalidAxis {
            axis: "q".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid axis 'q': expected one of x, y, z");

        let err = CommandError::InvalidBooleanValue {
            value: "yes".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid boolean value 'yes': expected one of true, false, 1, 0"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = ConnectionError::Timeout {
            waiting_for: "R21 P0".to_string(),
            timeout_ms: 2000,
        };
        assert_eq!(err.to_string(), "Timed out after 2000ms waiting for R21 P0");
    }

    #[test]
    fn test_classifiers() {
        let err: Error = CommandError::InvalidPinMode {
            mode: "pwm".to_string(),
        }
        .into();
        assert!(err.is_command_error());
        assert!(!err.is_connection_error());

        let err: Error = ConnectionError::Closed.into();
        assert!(err.is_closed());
        assert!(err.is_connection_error());

        let err: Error = ConnectionError::Timeout {
            waiting_for: "R02".to_string(),
            timeout_ms: 10,
        }
        .into();
        assert!(err.is_timeout());

        let err: Error = ParameterError::UnknownParameter { id: 99 }.into();
        assert!(err.is_parameter_error());
    }
}

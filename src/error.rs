//! Error types for the WT16 acquisition core
//!
//! Three layers of failure exist:
//!
//! - [`ModbusError`]: anything that goes wrong on a single transport call
//!   (socket, framing, exception responses, malformed payloads).
//! - [`UpdateFailed`]: the one hard failure the coordinator surfaces to its
//!   host once the error window has expired.
//! - [`ConfigError`]: configuration values outside their accepted bounds.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type for transport and protocol operations
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Errors raised by the Modbus transport and client layers
#[derive(Debug, Error)]
pub enum ModbusError {
    /// Raw socket error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Connection could not be established or was lost
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Operation did not complete within its deadline
    #[error("Timeout during {operation} after {timeout_ms} ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Response violated the Modbus protocol
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Malformed MBAP frame
    #[error("Frame error: {message}")]
    Frame { message: String },

    /// Device answered with a Modbus exception response
    #[error("Modbus exception: function {function:02X}, code {code:02X} ({message})")]
    Exception {
        function: u8,
        code: u8,
        message: String,
    },

    /// Unknown or unsupported function code
    #[error("Invalid function code: {code:02X}")]
    InvalidFunction { code: u8 },

    /// Payload could not be interpreted
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Bad connection parameters
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ModbusError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn frame(message: impl Into<String>) -> Self {
        Self::Frame {
            message: message.into(),
        }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    pub fn invalid_function(code: u8) -> Self {
        Self::InvalidFunction { code }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn io(kind: io::ErrorKind, message: impl Into<String>) -> Self {
        Self::Io(io::Error::new(kind, message.into()))
    }

    /// Build an exception error from a function code and exception code.
    pub fn exception(function: u8, code: u8) -> Self {
        Self::Exception {
            function,
            code,
            message: exception_description(code).to_string(),
        }
    }

    /// Whether this error means the socket itself is unusable.
    ///
    /// Connection-class errors (reset, broken pipe, refused, timeouts, lost
    /// connections) are worth a close-and-reopen before the next attempt.
    /// Everything else is a device-level answer and is retried as-is.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::TimedOut
            ),
            Self::Connection { .. } | Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

/// Human-readable description of a Modbus exception code.
pub fn exception_description(code: u8) -> &'static str {
    match code {
        0x01 => "Illegal Function",
        0x02 => "Illegal Data Address",
        0x03 => "Illegal Data Value",
        0x04 => "Server Device Failure",
        0x05 => "Acknowledge",
        0x06 => "Server Device Busy",
        0x08 => "Memory Parity Error",
        0x0A => "Gateway Path Unavailable",
        0x0B => "Gateway Target Device Failed to Respond",
        _ => "Unknown Exception",
    }
}

/// Hard acquisition failure, raised once the error window has expired.
///
/// Before the window expires every failed cycle is hidden from the caller
/// and the last good snapshot is served instead.
#[derive(Debug, Error)]
#[error("Error communicating with Weider WT16 (failing for {}s): {reason}", .failing_for.as_secs())]
pub struct UpdateFailed {
    /// Description of the last failed cycle
    pub reason: String,
    /// How long acquisition had been failing when the error surfaced
    pub failing_for: Duration,
}

/// Configuration values outside their accepted range
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("host must not be empty")]
    EmptyHost,

    #[error("port must be non-zero")]
    InvalidPort,

    #[error("{field} must be between {min} and {max} seconds, got {actual}")]
    OutOfRange {
        field: &'static str,
        min: u64,
        max: u64,
        actual: u64,
    },

    #[error("{field} must be non-zero")]
    ZeroTimeout { field: &'static str },

    #[error("retry pause must not exceed {max_ms} ms")]
    RetryPauseTooLong { max_ms: u64 },
}

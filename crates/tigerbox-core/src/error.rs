//! Error handling for TigerBox
//!
//! Provides error types for every layer of the driver:
//! - Axis errors (letters that are not part of the build configuration)
//! - Argument errors (duplicate axes, empty axis sets, bad call sequences)
//! - Connection errors (serial channel failures and reply timeouts)
//! - Protocol errors (malformed replies and controller error codes)
//! - Firmware errors (card firmware lacking a required module)
//!
//! All error types use `thiserror` for ergonomic error handling. Every variant
//! carries the context a caller needs to log the failure and pick its own
//! retry or abort policy; nothing is retried internally.

use thiserror::Error;

/// Axis error type
///
/// Raised when an axis argument cannot be resolved against the build
/// configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AxisError {
    /// The axis is not present in the build configuration
    #[error("Axis '{axis}' does not exist")]
    Unknown {
        /// The offending axis, uppercased.
        axis: String,
    },

    /// The input is not a single ASCII letter
    #[error("'{input}' is not a valid axis letter")]
    InvalidLetter {
        /// The raw input as supplied by the caller.
        input: String,
    },
}

/// Argument error type
///
/// Represents caller mistakes that are caught before anything is written to
/// the controller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArgumentError {
    /// The same axis was supplied more than once in one call
    #[error("Axis '{axis}' was specified more than once")]
    DuplicateAxis {
        /// The repeated axis.
        axis: String,
    },

    /// No axes were supplied to an operation that does not default to all axes
    #[error("{operation} requires at least one axis")]
    EmptyAxisSet {
        /// The operation name.
        operation: String,
    },

    /// An explicit value was NaN or infinite
    #[error("Value {value} for axis '{axis}' is not finite")]
    NonFiniteValue {
        /// The axis the value was given for.
        axis: String,
        /// The rejected value.
        value: f64,
    },

    /// A value or combination of values is not accepted by the operation
    #[error("{operation}: {reason}")]
    ValueNotPermitted {
        /// The operation name.
        operation: String,
        /// What was wrong with the value.
        reason: String,
    },

    /// The operation depends on a setup step that has not been run
    #[error("Invalid command sequence: {reason}")]
    InvalidSequence {
        /// Which prerequisite is missing.
        reason: String,
    },

    /// Generic argument error
    #[error("Invalid argument: {reason}")]
    Invalid {
        /// The error message.
        reason: String,
    },
}

/// Connection error type
///
/// Represents failures of the serial channel itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Failed to open the port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The port that failed to open.
        port: String,
        /// The reason reported by the OS.
        reason: String,
    },

    /// Writing a command to the channel failed
    #[error("Failed to write {command:?}: {reason}")]
    WriteFailed {
        /// The command being written.
        command: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Outgoing bytes did not leave the OS buffer in time
    #[error("Output for {command:?} not flushed after {timeout_ms}ms")]
    WriteTimeout {
        /// The command being written.
        command: String,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Reading a reply from the channel failed
    #[error("Failed to read reply to {command:?}: {reason}")]
    ReadFailed {
        /// The command awaiting a reply.
        command: String,
        /// The reason for the failure.
        reason: String,
    },

    /// No complete reply arrived before the timeout
    ///
    /// The transport drops owed replies and unread input when this occurs.
    #[error("No reply to {command:?} after {timeout_ms}ms")]
    ReplyTimeout {
        /// The command awaiting a reply.
        command: String,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Invalid connection parameters
    #[error("Invalid connection parameters: {reason}")]
    InvalidParameters {
        /// The reason the parameters are invalid.
        reason: String,
    },
}

/// Protocol error type
///
/// Represents replies that could not be understood or that carry a controller
/// error code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The reply did not match the expected format
    #[error("Malformed reply ({reason}): {raw:?}")]
    MalformedReply {
        /// What did not match.
        reason: String,
        /// The offending raw reply line.
        raw: String,
    },

    /// The controller answered with an error code
    #[error("Controller error :N-{code} ({description}) in reply to {command:?}")]
    DeviceError {
        /// The numeric error code.
        code: u8,
        /// Human-readable description of the code.
        description: String,
        /// The command that produced the error.
        command: String,
    },
}

impl ProtocolError {
    /// Create a malformed-reply error for the given raw line
    pub fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedReply {
            reason: reason.into(),
            raw: raw.into(),
        }
    }
}

/// Firmware error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FirmwareError {
    /// A card lacks firmware modules required by a command
    #[error("Card {card} is missing firmware modules: {}", .modules.join(", "))]
    MissingModules {
        /// The card address.
        card: String,
        /// The missing module names.
        modules: Vec<String>,
    },
}

/// Main error type for TigerBox
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Axis error
    #[error(transparent)]
    Axis(#[from] AxisError),

    /// Argument error
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Protocol error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Firmware error
    #[error(transparent)]
    Firmware(#[from] FirmwareError),

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

    /// Check if this is a reply or output timeout
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Connection(ConnectionError::ReplyTimeout { .. })
                | Error::Connection(ConnectionError::WriteTimeout { .. })
        )
    }

    /// Check if this is an unknown or unparseable axis
    pub fn is_unknown_axis(&self) -> bool {
        matches!(self, Error::Axis(_))
    }

    /// Check if this is a caller argument error
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::Argument(_))
    }

    /// Check if this is a channel failure (timeouts excluded)
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Io(_)) && !self.is_timeout()
    }

    /// Check if this is a protocol error
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    /// The controller error code, if the controller rejected the command
    pub fn device_error_code(&self) -> Option<u8> {
        match self {
            Error::Protocol(ProtocolError::DeviceError { code, .. }) => Some(*code),
            _ => None,
        }
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

//! Transport layer
//!
//! A [`Transport`] writes one command line at a time and, depending on the
//! per-call [`SendOptions`], waits for the bytes to leave the host and for
//! the controller's reply.

pub mod serial;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tigerbox_core::{ConnectionError, Result};

/// Serial parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SerialParity {
    /// No parity
    #[default]
    None,
    /// Even parity
    Even,
    /// Odd parity
    Odd,
}

/// Serial connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Reply and output-drain timeout in milliseconds
    pub timeout_ms: u64,
    /// Data bits (5-8)
    pub data_bits: u8,
    /// Stop bits (1 or 2)
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Hardware flow control
    pub flow_control: bool,
    /// Appended to every outgoing command
    pub command_terminator: String,
    /// Marks the end of one controller reply
    pub reply_terminator: String,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 115_200,
            timeout_ms: 1000,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
            flow_control: false,
            command_terminator: "\r".to_string(),
            reply_terminator: "\r\n".to_string(),
        }
    }
}

impl ConnectionParams {
    /// Default parameters for the given port
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Reject parameters the serial layer cannot honour
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| -> Result<()> {
            Err(ConnectionError::InvalidParameters { reason }.into())
        };
        if self.port.trim().is_empty() {
            return invalid("port name is empty".to_string());
        }
        if self.baud_rate == 0 {
            return invalid("baud rate must be non-zero".to_string());
        }
        if self.timeout_ms == 0 {
            return invalid("timeout must be non-zero".to_string());
        }
        if !(5..=8).contains(&self.data_bits) {
            return invalid(format!("invalid data bits: {}", self.data_bits));
        }
        if !(1..=2).contains(&self.stop_bits) {
            return invalid(format!("invalid stop bits: {}", self.stop_bits));
        }
        if self.command_terminator.is_empty() || self.reply_terminator.is_empty() {
            return invalid("terminators must not be empty".to_string());
        }
        Ok(())
    }
}

/// Per-call reply synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOptions {
    /// Wait until the outgoing bytes have left the host buffer
    pub wait_for_output: bool,
    /// Wait for and return the controller's reply
    pub wait_for_reply: bool,
}

impl SendOptions {
    /// Wait for output and for the reply
    pub const BLOCKING: SendOptions = SendOptions {
        wait_for_output: true,
        wait_for_reply: true,
    };
    /// Return as soon as the bytes are written
    pub const FIRE_AND_FORGET: SendOptions = SendOptions {
        wait_for_output: false,
        wait_for_reply: false,
    };
    /// Wait for the bytes to leave the host, not for the reply
    pub const OUTPUT_ONLY: SendOptions = SendOptions {
        wait_for_output: true,
        wait_for_reply: false,
    };

    /// `BLOCKING` when `wait` is set, `FIRE_AND_FORGET` otherwise
    pub const fn from_wait(wait: bool) -> Self {
        if wait {
            Self::BLOCKING
        } else {
            Self::FIRE_AND_FORGET
        }
    }
}

impl Default for SendOptions {
    fn default() -> Self {
        Self::BLOCKING
    }
}

/// The reply to a command that was sent without waiting, read later
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedReply {
    /// The command the reply belongs to
    pub command: String,
    /// The raw reply text, terminator removed
    pub reply: String,
}

/// Line-oriented command/reply channel
///
/// Replies arrive strictly in command order, so a blocking send first reads
/// the replies of earlier non-blocking sends and sets them aside.
pub trait Transport: Send {
    /// Write `line` and the command terminator.
    ///
    /// Returns the reply when `options.wait_for_reply` is set, `None` otherwise.
    fn send(&mut self, line: &str, options: SendOptions) -> Result<Option<String>>;

    /// Replies drained on behalf of earlier non-blocking sends, oldest first.
    fn take_skipped_replies(&mut self) -> Vec<SkippedReply>;

    /// Discard buffered input and forget replies still owed to earlier sends.
    fn clear_incoming(&mut self) -> Result<()>;

    /// Time since the last write, `None` before the first one.
    fn time_since_last_send(&self) -> Option<Duration>;
}

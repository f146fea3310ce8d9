//! Serial port transport
//!
//! Provides the blocking serial transport used to talk to the controller.
//!
//! Supports:
//! - Port configuration (baud rate, framing, flow control)
//! - Waiting for outgoing bytes to drain
//! - Reading terminator-delimited replies with a deadline
//! - Deferred replies for commands sent without waiting

use super::{ConnectionParams, SendOptions, SerialParity, SkippedReply, Transport};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};
use tigerbox_core::{ConnectionError, Result};

/// Poll interval for serial reads; the overall wait is bounded by the reply timeout
const READ_POLL: Duration = Duration::from_millis(10);

/// Byte channel the transport reads and writes
///
/// Implemented for real serial ports; tests implement it over in-memory
/// buffers.
pub trait SerialChannel: Read + Write + Send {
    /// Bytes written but not yet transmitted
    fn pending_output(&mut self) -> io::Result<u32>;

    /// Drop any bytes received but not yet read
    fn discard_input(&mut self) -> io::Result<()>;

    /// Drop any bytes written but not yet transmitted
    fn discard_output(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Name used in log messages
    fn port_name(&self) -> String;
}

impl SerialChannel for Box<dyn serialport::SerialPort> {
    fn pending_output(&mut self) -> io::Result<u32> {
        serialport::SerialPort::bytes_to_write(&**self).map_err(io::Error::from)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        serialport::SerialPort::clear(&**self, serialport::ClearBuffer::Input)
            .map_err(io::Error::from)
    }

    fn discard_output(&mut self) -> io::Result<()> {
        serialport::SerialPort::clear(&**self, serialport::ClearBuffer::Output)
            .map_err(io::Error::from)
    }

    fn port_name(&self) -> String {
        serialport::SerialPort::name(&**self).unwrap_or_else(|| "serial_port".to_string())
    }
}

fn to_serialport_parity(parity: SerialParity) -> serialport::Parity {
    match parity {
        SerialParity::None => serialport::Parity::None,
        SerialParity::Even => serialport::Parity::Even,
        SerialParity::Odd => serialport::Parity::Odd,
    }
}

fn to_data_bits(bits: u8) -> Result<serialport::DataBits> {
    match bits {
        5 => Ok(serialport::DataBits::Five),
        6 => Ok(serialport::DataBits::Six),
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        _ => Err(ConnectionError::InvalidParameters {
            reason: format!("invalid data bits: {bits}"),
        }
        .into()),
    }
}

fn to_stop_bits(bits: u8) -> Result<serialport::StopBits> {
    match bits {
        1 => Ok(serialport::StopBits::One),
        2 => Ok(serialport::StopBits::Two),
        _ => Err(ConnectionError::InvalidParameters {
            reason: format!("invalid stop bits: {bits}"),
        }
        .into()),
    }
}

/// Blocking command/reply transport over a serial channel
pub struct SerialTransport<C: SerialChannel = Box<dyn serialport::SerialPort>> {
    channel: C,
    timeout: Duration,
    command_terminator: String,
    reply_terminator: Vec<u8>,
    /// Bytes read past the end of the last reply
    read_buffer: Vec<u8>,
    /// Commands sent without waiting whose replies are still unread
    pending_replies: VecDeque<String>,
    skipped_replies: Vec<SkippedReply>,
    last_send: Option<Instant>,
}

impl SerialTransport {
    /// Open the port and clear both OS buffers
    pub fn open(params: &ConnectionParams) -> Result<Self> {
        params.validate()?;

        let builder = serialport::new(&params.port, params.baud_rate)
            .timeout(READ_POLL)
            .data_bits(to_data_bits(params.data_bits)?)
            .stop_bits(to_stop_bits(params.stop_bits)?)
            .parity(to_serialport_parity(params.parity))
            .flow_control(if params.flow_control {
                serialport::FlowControl::Hardware
            } else {
                serialport::FlowControl::None
            });

        let port = builder.open().map_err(|e| {
            tracing::error!("Failed to open serial port {}: {}", params.port, e);
            ConnectionError::FailedToOpen {
                port: params.port.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut transport = Self::from_channel(port, params);
        transport.channel.discard_input().map_err(|e| open_failure(params, e))?;
        transport.channel.discard_output().map_err(|e| open_failure(params, e))?;
        tracing::info!("Opened {} at {} baud", params.port, params.baud_rate);
        Ok(transport)
    }
}

fn open_failure(params: &ConnectionParams, e: io::Error) -> ConnectionError {
    tracing::warn!("Failed to clear buffers on {}: {}", params.port, e);
    ConnectionError::FailedToOpen {
        port: params.port.clone(),
        reason: e.to_string(),
    }
}

impl<C: SerialChannel> SerialTransport<C> {
    /// Wrap an already open channel. Buffers are left untouched.
    pub fn from_channel(channel: C, params: &ConnectionParams) -> Self {
        Self {
            channel,
            timeout: params.timeout(),
            command_terminator: params.command_terminator.clone(),
            reply_terminator: params.reply_terminator.as_bytes().to_vec(),
            read_buffer: Vec::new(),
            pending_replies: VecDeque::new(),
            skipped_replies: Vec::new(),
            last_send: None,
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Number of replies owed to earlier non-blocking sends
    pub fn pending_reply_count(&self) -> usize {
        self.pending_replies.len()
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    fn wait_for_output(&mut self, command: &str) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let pending = self
                .channel
                .pending_output()
                .map_err(|e| ConnectionError::WriteFailed {
                    command: command.to_string(),
                    reason: e.to_string(),
                })?;
            if pending == 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ConnectionError::WriteTimeout {
                    command: command.to_string(),
                    timeout_ms: self.timeout_ms(),
                }
                .into());
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn take_buffered_reply(&mut self) -> Option<String> {
        let term = &self.reply_terminator;
        let end = self
            .read_buffer
            .windows(term.len())
            .position(|w| w == term.as_slice())?;
        let rest = self.read_buffer.split_off(end + term.len());
        let mut line = std::mem::replace(&mut self.read_buffer, rest);
        line.truncate(end);
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Read one terminator-delimited reply for `command`
    fn read_reply(&mut self, command: &str) -> Result<String> {
        let deadline = Instant::now() + self.timeout;
        let mut chunk = [0u8; 256];
        loop {
            if let Some(reply) = self.take_buffered_reply() {
                tracing::debug!("Reply to {:?}: {:?}", command, reply);
                return Ok(reply);
            }
            if Instant::now() >= deadline {
                tracing::debug!("Timed out waiting for reply to {:?}", command);
                return Err(ConnectionError::ReplyTimeout {
                    command: command.to_string(),
                    timeout_ms: self.timeout_ms(),
                }
                .into());
            }
            match self.channel.read(&mut chunk) {
                Ok(0) => thread::sleep(Duration::from_millis(1)),
                Ok(n) => self.read_buffer.extend_from_slice(&chunk[..n]),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => {
                    return Err(ConnectionError::ReadFailed {
                        command: command.to_string(),
                        reason: e.to_string(),
                    }
                    .into())
                }
            }
        }
    }
}

impl<C: SerialChannel> SerialTransport<C> {
    fn read_owed_and_current(&mut self, line: &str) -> Result<String> {
        while let Some(earlier) = self.pending_replies.pop_front() {
            let reply = self.read_reply(&earlier)?;
            self.skipped_replies.push(SkippedReply {
                command: earlier,
                reply,
            });
        }
        self.read_reply(line)
    }

    /// Forget owed replies and partial input after a failed read, so a late
    /// reply is not taken as the answer to the next command
    fn resync(&mut self) {
        let owed = self.pending_replies.len();
        self.pending_replies.clear();
        self.read_buffer.clear();
        if let Err(e) = self.channel.discard_input() {
            tracing::warn!("Failed to discard input on {}: {}", self.channel.port_name(), e);
        }
        tracing::debug!("Resynchronised after failed read, dropped {} owed replies", owed);
    }
}

impl<C: SerialChannel> Transport for SerialTransport<C> {
    fn send(&mut self, line: &str, options: SendOptions) -> Result<Option<String>> {
        tracing::debug!("Sending: {:?}", line);
        let mut bytes = Vec::with_capacity(line.len() + self.command_terminator.len());
        bytes.extend_from_slice(line.as_bytes());
        bytes.extend_from_slice(self.command_terminator.as_bytes());

        self.channel
            .write_all(&bytes)
            .and_then(|_| self.channel.flush())
            .map_err(|e| ConnectionError::WriteFailed {
                command: line.to_string(),
                reason: e.to_string(),
            })?;
        self.last_send = Some(Instant::now());

        if options.wait_for_output {
            self.wait_for_output(line)?;
        }

        if !options.wait_for_reply {
            self.pending_replies.push_back(line.to_string());
            return Ok(None);
        }

        self.read_owed_and_current(line).map(Some).inspect_err(|_| self.resync())
    }

    fn take_skipped_replies(&mut self) -> Vec<SkippedReply> {
        std::mem::take(&mut self.skipped_replies)
    }

    fn clear_incoming(&mut self) -> Result<()> {
        self.pending_replies.clear();
        self.skipped_replies.clear();
        self.read_buffer.clear();
        self.channel.discard_input()?;
        Ok(())
    }

    fn time_since_last_send(&self) -> Option<Duration> {
        self.last_send.map(|t| t.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays canned input in fixed-size chunks and records output
    struct CannedChannel {
        input: VecDeque<u8>,
        chunk: usize,
        output: Vec<u8>,
    }

    impl CannedChannel {
        fn new(input: &str, chunk: usize) -> Self {
            Self {
                input: input.bytes().collect(),
                chunk,
                output: Vec::new(),
            }
        }
    }

    impl Read for CannedChannel {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.input.is_empty() {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "idle"));
            }
            let n = buf.len().min(self.chunk).min(self.input.len());
            for (slot, byte) in buf.iter_mut().zip(self.input.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }
    }

    impl Write for CannedChannel {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SerialChannel for CannedChannel {
        fn pending_output(&mut self) -> io::Result<u32> {
            Ok(0)
        }

        fn discard_input(&mut self) -> io::Result<()> {
            self.input.clear();
            Ok(())
        }

        fn port_name(&self) -> String {
            "canned".to_string()
        }
    }

    fn transport(input: &str, chunk: usize) -> SerialTransport<CannedChannel> {
        let params = ConnectionParams {
            timeout_ms: 50,
            ..ConnectionParams::new("canned")
        };
        SerialTransport::from_channel(CannedChannel::new(input, chunk), &params)
    }

    #[test]
    fn test_reply_assembled_from_partial_reads() {
        let mut t = transport(":A X=1.5 Y=2\r\n", 3);
        let reply = t.send("S X? Y?", SendOptions::BLOCKING).unwrap();
        assert_eq!(reply.as_deref(), Some(":A X=1.5 Y=2"));
        assert_eq!(t.channel().output, b"S X? Y?\r");
    }

    #[test]
    fn test_multi_line_reply_kept_whole() {
        let mut t = transport("Motor Axes: X Y\rHex Addr: 31 31\r\n", 64);
        let reply = t.send("BU X", SendOptions::BLOCKING).unwrap().unwrap();
        assert_eq!(reply, "Motor Axes: X Y\rHex Addr: 31 31");
    }

    #[test]
    fn test_non_blocking_reply_is_skipped_later() {
        let mut t = transport(":A\r\n:A 10 20\r\n", 64);
        assert_eq!(t.send("M X=10", SendOptions::FIRE_AND_FORGET).unwrap(), None);
        assert_eq!(t.pending_reply_count(), 1);

        let reply = t.send("W X Y", SendOptions::BLOCKING).unwrap();
        assert_eq!(reply.as_deref(), Some(":A 10 20"));
        assert_eq!(
            t.take_skipped_replies(),
            vec![SkippedReply {
                command: "M X=10".to_string(),
                reply: ":A".to_string(),
            }]
        );
        assert_eq!(t.pending_reply_count(), 0);
    }

    #[test]
    fn test_missing_terminator_times_out() {
        let mut t = transport(":A X=1", 64);
        let err = t.send("S X?", SendOptions::BLOCKING).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_timeout_drops_owed_replies_and_partial_input() {
        let mut t = transport(":A X=1", 64);
        t.send("M X=1", SendOptions::FIRE_AND_FORGET).unwrap();
        let err = t.send("W X", SendOptions::BLOCKING).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(t.pending_reply_count(), 0);

        t.channel_mut().input.extend(b":A 5\r\n");
        let reply = t.send("W X", SendOptions::BLOCKING).unwrap();
        assert_eq!(reply.as_deref(), Some(":A 5"));
        assert!(t.take_skipped_replies().is_empty());
    }

    #[test]
    fn test_clear_incoming_drops_pending() {
        let mut t = transport(":A\r\n", 64);
        t.send("H X=0", SendOptions::FIRE_AND_FORGET).unwrap();
        t.clear_incoming().unwrap();
        assert_eq!(t.pending_reply_count(), 0);
        assert!(t.channel().input.is_empty());
        assert!(t.time_since_last_send().is_some());
    }
}

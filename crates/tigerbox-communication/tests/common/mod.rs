//! Scripted serial channel shared by the integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use tigerbox_communication::{ConnectionParams, SerialChannel, SerialTransport, TigerController};

pub type Responder = Box<dyn FnMut(&str) -> Option<String> + Send>;

struct Script {
    responder: Responder,
    written: Vec<String>,
    partial: Vec<u8>,
    incoming: VecDeque<u8>,
}

/// In-memory channel that answers each `\r`-terminated line via a closure.
///
/// A responder returning `None` leaves the line unanswered.
#[derive(Clone)]
pub struct ScriptedChannel {
    script: Arc<Mutex<Script>>,
}

impl ScriptedChannel {
    pub fn new(responder: impl FnMut(&str) -> Option<String> + Send + 'static) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                responder: Box::new(responder),
                written: Vec::new(),
                partial: Vec::new(),
                incoming: VecDeque::new(),
            })),
        }
    }

    /// Lines written so far, without terminators
    pub fn written(&self) -> Vec<String> {
        self.script.lock().written.clone()
    }

    pub fn write_count(&self) -> usize {
        self.script.lock().written.len()
    }

    pub fn last_written(&self) -> Option<String> {
        self.script.lock().written.last().cloned()
    }
}

impl Write for ScriptedChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut script = self.script.lock();
        for byte in buf {
            if *byte == b'\r' {
                let line = String::from_utf8_lossy(&script.partial).into_owned();
                script.partial.clear();
                if let Some(reply) = (script.responder)(&line) {
                    script.incoming.extend(reply.bytes());
                    script.incoming.extend(b"\r\n".iter());
                }
                script.written.push(line);
            } else {
                script.partial.push(*byte);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for ScriptedChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut script = self.script.lock();
        if script.incoming.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(script.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(script.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl SerialChannel for ScriptedChannel {
    fn pending_output(&mut self) -> io::Result<u32> {
        Ok(0)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.script.lock().incoming.clear();
        Ok(())
    }

    fn port_name(&self) -> String {
        "scripted".to_string()
    }
}

/// Build configuration reply for axes `X Y Z` on cards 31 and 32
pub const BUILD_CONFIG_REPLY: &str =
    "TIGER_COMM\rMotor Axes: X Y Z\rAxis Types: x x z\rHex Addr: 31 31 32";

/// Answers the construction queries, delegating everything else
pub fn tiger_responder(
    mut rest: impl FnMut(&str) -> Option<String> + Send + 'static,
) -> impl FnMut(&str) -> Option<String> + Send + 'static {
    move |line: &str| match line {
        "BU X" => Some(BUILD_CONFIG_REPLY.to_string()),
        "31BU X" | "32BU X" => Some("SCAN MODULE\rARRAY MODULE".to_string()),
        other => rest(other),
    }
}

pub fn params(timeout_ms: u64) -> ConnectionParams {
    ConnectionParams {
        timeout_ms,
        ..ConnectionParams::new("scripted")
    }
}

/// A controller over a scripted channel, plus a handle on that channel
pub fn scripted_controller(
    timeout_ms: u64,
    rest: impl FnMut(&str) -> Option<String> + Send + 'static,
) -> (TigerController<SerialTransport<ScriptedChannel>>, ScriptedChannel) {
    let channel = ScriptedChannel::new(tiger_responder(rest));
    let transport = SerialTransport::from_channel(channel.clone(), &params(timeout_ms));
    let controller = TigerController::new(transport).expect("construction queries answered");
    (controller, channel)
}

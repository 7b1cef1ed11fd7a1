//! STOMP frame type and encoder

use std::collections::HashMap;

use bytes::{BufMut, Bytes, BytesMut};

use super::command::Command;

/// A single STOMP frame
///
/// Headers are an unordered name-to-value mapping; the last write wins
/// when the wire carries duplicates. The body is opaque bytes and may
/// be empty. Cloning is cheap because the body is reference-counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame command
    pub command: Command,
    /// Header mapping
    pub headers: HashMap<String, String>,
    /// Opaque body bytes
    pub body: Bytes,
}

impl Frame {
    /// Create a frame with no headers and an empty body
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// The CONNECTED reply sent after an accepted CONNECT
    ///
    /// The heart-beat interval is advertised only; the relay does not
    /// enforce the cadence.
    pub fn connected() -> Self {
        Frame::new(Command::Connected)
            .with_header("version", "1.2")
            .with_header("heart-beat", "10000,10000")
    }

    /// A MESSAGE frame addressed to one subscription
    pub fn message(
        topic: impl Into<String>,
        content_type: impl Into<String>,
        subscription: impl Into<String>,
        body: Bytes,
    ) -> Self {
        let length = body.len();
        Frame::new(Command::Message)
            .with_header("content-type", content_type)
            .with_header("subscription", subscription)
            .with_header("destination", topic)
            .with_header("content-length", length.to_string())
            .with_body(body)
    }

    /// Encode the frame for the wire
    ///
    /// Layout: `COMMAND\n`, one `name:value\n` line per header, one
    /// blank line, the body, and a NUL terminator.
    pub fn to_payload(&self) -> Bytes {
        let header_len: usize = self
            .headers
            .iter()
            .map(|(name, value)| name.len() + value.len() + 2)
            .sum();
        let mut buf =
            BytesMut::with_capacity(self.command.as_str().len() + header_len + self.body.len() + 3);

        buf.put_slice(self.command.as_str().as_bytes());
        buf.put_u8(b'\n');
        for (name, value) in &self.headers {
            buf.put_slice(name.as_bytes());
            buf.put_u8(b':');
            buf.put_slice(value.as_bytes());
            buf.put_u8(b'\n');
        }
        buf.put_u8(b'\n');
        buf.put_slice(&self.body);
        buf.put_u8(0x00);

        buf.freeze()
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} headers({}) body({} bytes)",
            self.command,
            self.headers.len(),
            self.body.len()
        )
    }
}

//! Wire decoder for STOMP frames
//!
//! One WebSocket text frame carries exactly one STOMP frame. A frame
//! consisting of a single `\n` is a transport heartbeat and decodes to
//! no frame at all.

use std::collections::HashMap;

use bytes::Bytes;
use thiserror::Error;

use super::command::Command;
use super::frame::Frame;

/// Transport heartbeat payload
const HEARTBEAT: &[u8] = b"\n";

/// Decode failure kinds
///
/// Malformed header lines are deliberately not represented here: a
/// header without `:` stops header parsing and the frame is decoded
/// with whatever headers were accumulated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The payload is too short to carry a command line. A command
    /// token outside the STOMP set is not a decode error; it is
    /// carried through as [`Command::Other`] for the session to
    /// ignore.
    #[error("invalid command ({0})")]
    InvalidCommand(String),

    /// A `content-length` header was present but is not a non-negative
    /// 32-bit integer.
    #[error("invalid content-length ({0})")]
    InvalidContentLength(String),

    /// The declared `content-length` exceeds the bytes actually
    /// carried by the frame.
    #[error("content-length {declared} exceeds body size {available}")]
    ContentLengthMismatch {
        /// Value declared by the header
        declared: usize,
        /// Bytes available before the NUL terminator
        available: usize,
    },
}

/// Decode a single WebSocket text payload into a STOMP frame
///
/// Returns `Ok(None)` for a heartbeat payload.
pub fn decode(payload: &[u8]) -> Result<Option<Frame>, ParseError> {
    if payload == HEARTBEAT {
        return Ok(None);
    }

    let pieces: Vec<&[u8]> = payload.split(|&b| b == b'\n').collect();
    if pieces.len() < 2 {
        return Err(ParseError::InvalidCommand(lossy(payload)));
    }

    let command = Command::from_bytes(pieces[0]);

    let mut headers = HashMap::new();
    // Index of the first piece that belongs to the body remainder.
    let mut body_start = pieces.len();
    for (index, line) in pieces.iter().enumerate().skip(1) {
        if line.is_empty() {
            body_start = index + 1;
            break;
        }

        match split_header(line) {
            Some((name, value)) => {
                headers.insert(name, value);
            }
            None => {
                tracing::warn!(line = %lossy(line), "invalid header, stopping header parse");
                body_start = index;
                break;
            }
        }
    }

    let remainder: Vec<u8> = if body_start < pieces.len() {
        pieces[body_start..].join(&b'\n')
    } else {
        Vec::new()
    };

    let body = match headers.get("content-length") {
        Some(value) => {
            let declared = value
                .parse::<u32>()
                .map_err(|_| ParseError::InvalidContentLength(value.clone()))?
                as usize;

            // One byte of the remainder is the NUL terminator.
            let available = remainder.len().saturating_sub(1);
            if declared > available {
                return Err(ParseError::ContentLengthMismatch {
                    declared,
                    available,
                });
            }

            Bytes::copy_from_slice(&remainder[..declared])
        }
        None => {
            let end = remainder
                .iter()
                .position(|&b| b == 0x00)
                .unwrap_or(remainder.len());
            Bytes::copy_from_slice(&remainder[..end])
        }
    };

    Ok(Some(Frame {
        command,
        headers,
        body,
    }))
}

/// Split a header line on the first `:`, preserving `:` in the value
fn split_header(line: &[u8]) -> Option<(String, String)> {
    let colon = line.iter().position(|&b| b == b':')?;
    Some((lossy(&line[..colon]), lossy(&line[colon + 1..])))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

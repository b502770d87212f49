// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Length-prefix framing for HSMS over TCP.
//!
//! TCP is a stream protocol without message boundaries. HSMS delimits
//! messages with a 4-byte big-endian length followed by the 10-byte header
//! and the body:
//!
//! ```text
//! +----------------+------------------+------------------+
//! | Length (4B BE) | Header (10B)     | Body (L-10 B)    |
//! +----------------+------------------+------------------+
//! ```
//!
//! The length counts header plus body, so any value below 10 is a framing
//! error. Reads arm the T8 inter-character deadline before each frame and
//! clear it after a full frame.

use super::message::{HsmsMessage, MessageHeader, SType, HEADER_SIZE};
use crate::secs2::Item;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// Maximum accepted message size (SEMI E37: 16 MiB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Size of the length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Failures while reading one frame.
///
/// The engine maps these onto its Stream 9 and teardown behavior, so the
/// reader reports *what* went wrong together with any correlating header.
#[derive(Debug)]
pub enum FrameError {
    /// The declared length exceeds [`MAX_MESSAGE_SIZE`]. The header was
    /// still read (and the body drained) so the engine can answer S9F11.
    TooLong {
        header: MessageHeader,
        declared: usize,
    },
    /// The frame or its item tree could not be parsed. The header is
    /// present when enough bytes arrived to decode it.
    Malformed {
        header: Option<MessageHeader>,
        reason: String,
    },
    /// The T8 deadline expired inside a frame read.
    Timeout,
    /// The peer closed the connection.
    Closed,
    /// Any other socket failure.
    Io(io::Error),
}

/// Blocking frame reader with a T8 read deadline.
pub struct FrameReader {
    stream: TcpStream,
    t8: Duration,
}

impl FrameReader {
    /// Wrap a connected stream. `t8` of zero disables the deadline.
    pub fn new(stream: TcpStream, t8: Duration) -> FrameReader {
        FrameReader { stream, t8 }
    }

    /// Read one complete HSMS message.
    pub fn read_message(&mut self) -> Result<HsmsMessage, FrameError> {
        if !self.t8.is_zero() {
            self.stream
                .set_read_timeout(Some(self.t8))
                .map_err(FrameError::Io)?;
        }

        let result = self.read_message_inner();

        // Clear the deadline between frames so a later reconfiguration
        // starts from a clean socket.
        if !self.t8.is_zero() {
            let _ = self.stream.set_read_timeout(None);
        }

        result
    }

    fn read_message_inner(&mut self) -> Result<HsmsMessage, FrameError> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        self.read_exact(&mut prefix)?;
        let declared = u32::from_be_bytes(prefix) as usize;

        if declared < HEADER_SIZE {
            return Err(FrameError::Malformed {
                header: None,
                reason: format!("frame length {} below header size", declared),
            });
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        self.read_exact(&mut header_bytes)?;
        let header = MessageHeader::decode(&header_bytes).map_err(|e| FrameError::Malformed {
            header: None,
            reason: e.to_string(),
        })?;

        let body_len = declared - HEADER_SIZE;

        if declared > MAX_MESSAGE_SIZE {
            // Drain the oversize body so the stream stays in sync, then let
            // the engine answer S9F11.
            self.drain(body_len)?;
            return Err(FrameError::TooLong { header, declared });
        }

        if !SType::is_valid_byte(header.s_type) {
            self.drain(body_len)?;
            return Err(FrameError::Malformed {
                header: Some(header),
                reason: format!("unknown sType {}", header.s_type),
            });
        }

        let mut body_bytes = vec![0u8; body_len];
        self.read_exact(&mut body_bytes)?;

        let body = if header.s_type != 0 {
            // Control messages carry no body; tolerate and drop stray bytes.
            None
        } else if body_bytes.is_empty() {
            None
        } else {
            match Item::from_bytes(&body_bytes) {
                Ok(item) => Some(item),
                Err(e) => {
                    return Err(FrameError::Malformed {
                        header: Some(header),
                        reason: e.to_string(),
                    })
                }
            }
        };

        Ok(HsmsMessage { header, body })
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), FrameError> {
        match self.stream.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(e) => Err(classify(e)),
        }
    }

    fn drain(&mut self, mut remaining: usize) -> Result<(), FrameError> {
        let mut scratch = [0u8; 8192];
        while remaining > 0 {
            let chunk = remaining.min(scratch.len());
            self.read_exact(&mut scratch[..chunk])?;
            remaining -= chunk;
        }
        Ok(())
    }
}

fn classify(e: io::Error) -> FrameError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => FrameError::Timeout,
        io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset => FrameError::Closed,
        _ => FrameError::Io(e),
    }
}

/// Serialize a message into its framed wire form.
pub fn encode_message(msg: &HsmsMessage) -> Vec<u8> {
    let body_bytes = msg.body.as_ref().map(Item::to_bytes).unwrap_or_default();
    let declared = HEADER_SIZE + body_bytes.len();

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + declared);
    frame.extend_from_slice(&(declared as u32).to_be_bytes());
    frame.extend_from_slice(&msg.header.encode());
    frame.extend_from_slice(&body_bytes);
    frame
}

/// Write one message to the stream, flushing it fully.
pub fn write_message(stream: &mut TcpStream, msg: &HsmsMessage) -> io::Result<()> {
    let frame = encode_message(msg);
    stream.write_all(&frame)?;
    stream.flush()
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types shared across the HSMS and GEM layers.

use crate::hsms::message::RejectReason;
use std::fmt;
use std::io;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the HSMS engine and the GEM services.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Session state
    // ========================================================================
    /// No TCP session is established.
    NotConnected,
    /// The HSMS session is connected but not in SELECTED state.
    NotSelected,
    /// The GEM layer has not reached COMMUNICATING state.
    NotCommunicating,
    /// The operation is not valid for the configured device role.
    OperationNotSupported,

    // ========================================================================
    // Wire
    // ========================================================================
    /// A received frame or item tree could not be parsed.
    FramingError(String),
    /// A received frame exceeded the 16 MiB HSMS message limit.
    DataTooLong(usize),
    /// The T8 inter-character timeout expired inside a frame read.
    WireTimeout,
    /// Underlying socket I/O failure.
    Io(io::Error),

    // ========================================================================
    // Transactions
    // ========================================================================
    /// No reply arrived within the T3 reply timeout.
    T3Timeout,
    /// A control transaction (select/deselect/linktest) missed its T6 window.
    T6Timeout,
    /// The connection stayed unselected past the T7 timeout.
    T7Timeout,
    /// The peer answered a transaction with Reject.req.
    Rejected(RejectReason),
    /// The peer reply did not match the request (bad ACK, count mismatch).
    ProtocolMismatch(String),

    // ========================================================================
    // Input
    // ========================================================================
    /// Caller supplied an invalid value (negative identifier, bad id type).
    InvalidArgument(String),
    /// A state machine was asked for a transition its current state forbids.
    InvalidControlTransition {
        action: &'static str,
        state: &'static str,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "hsms: connection not established"),
            Self::NotSelected => write!(f, "hsms: connection not selected"),
            Self::NotCommunicating => write!(f, "gem: not in communicating state"),
            Self::OperationNotSupported => {
                write!(f, "gem: operation not supported for this device type")
            }
            Self::FramingError(msg) => write!(f, "hsms: framing error: {}", msg),
            Self::DataTooLong(len) => {
                write!(f, "hsms: message of {} bytes exceeds 16 MiB limit", len)
            }
            Self::WireTimeout => write!(f, "hsms: T8 inter-character timeout"),
            Self::Io(e) => write!(f, "hsms: i/o error: {}", e),
            Self::T3Timeout => write!(f, "hsms: T3 timeout waiting for reply"),
            Self::T6Timeout => write!(f, "hsms: T6 timeout waiting for control response"),
            Self::T7Timeout => write!(f, "hsms: T7 timeout waiting for selection"),
            Self::Rejected(reason) => write!(f, "hsms: peer rejected message ({})", reason),
            Self::ProtocolMismatch(msg) => write!(f, "protocol mismatch: {}", msg),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::InvalidControlTransition { action, state } => {
                write!(f, "cannot {} while in state {}", action, state)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

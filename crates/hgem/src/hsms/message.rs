// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HSMS message model: the 10-byte header, control messages, data messages.
//!
//! # Header Layout
//!
//! ```text
//! +-----------+-------+-------+--------+--------+---------------+
//! | session   | byte2 | byte3 | pType  | sType  | systemBytes   |
//! | (2B BE)   | (1B)  | (1B)  | (1B)   | (1B)   | (4B BE)       |
//! +-----------+-------+-------+--------+--------+---------------+
//! ```
//!
//! For a data message (sType = 0), `byte2` carries the 7-bit stream code with
//! the W (wait) flag in the high bit, and `byte3` carries the function code.
//! For control messages byte2/byte3 hold type-specific status values.

use crate::error::{Error, Result};
use crate::secs2::Item;
use std::fmt;

/// Size of the HSMS header in bytes.
pub const HEADER_SIZE: usize = 10;

/// The wildcard session id accepted on Select.req.
pub const WILDCARD_SESSION: u16 = 0xFFFF;

/// Control message types, keyed by the header `sType` byte.
///
/// `sType = 0` marks a data message and `8` is unused by the standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SType {
    SelectReq = 1,
    SelectRsp = 2,
    DeselectReq = 3,
    DeselectRsp = 4,
    LinktestReq = 5,
    LinktestRsp = 6,
    RejectReq = 7,
    SeparateReq = 9,
}

impl SType {
    /// Map a header `sType` byte to a control type.
    pub fn from_byte(value: u8) -> Option<SType> {
        match value {
            1 => Some(SType::SelectReq),
            2 => Some(SType::SelectRsp),
            3 => Some(SType::DeselectReq),
            4 => Some(SType::DeselectRsp),
            5 => Some(SType::LinktestReq),
            6 => Some(SType::LinktestRsp),
            7 => Some(SType::RejectReq),
            9 => Some(SType::SeparateReq),
            _ => None,
        }
    }

    /// True when `value` is a valid `sType` byte (data or control).
    pub fn is_valid_byte(value: u8) -> bool {
        value == 0 || SType::from_byte(value).is_some()
    }

    /// Lowercase wire name, used by the wire logger and exclusion filters.
    pub fn name(self) -> &'static str {
        match self {
            SType::SelectReq => "select.req",
            SType::SelectRsp => "select.rsp",
            SType::DeselectReq => "deselect.req",
            SType::DeselectRsp => "deselect.rsp",
            SType::LinktestReq => "linktest.req",
            SType::LinktestRsp => "linktest.rsp",
            SType::RejectReq => "reject.req",
            SType::SeparateReq => "separate.req",
        }
    }
}

impl fmt::Display for SType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Select/Deselect response status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlStatus {
    Accepted,
    Denied,
}

impl ControlStatus {
    /// Wire encoding of the status.
    pub fn code(self) -> u8 {
        match self {
            ControlStatus::Accepted => 0,
            ControlStatus::Denied => 1,
        }
    }
}

/// Reject.req reason codes used by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The message type cannot be serviced right now.
    BusyOrAlreadyActive,
    /// The connection is not in a state that accepts the message.
    NotReady,
    /// Any other reason byte received from a peer.
    Other(u8),
}

impl RejectReason {
    /// Wire encoding of the reason.
    pub fn code(self) -> u8 {
        match self {
            RejectReason::BusyOrAlreadyActive => 2,
            RejectReason::NotReady => 4,
            RejectReason::Other(code) => code,
        }
    }

    /// Decode a reason byte received from the peer.
    pub fn from_byte(code: u8) -> RejectReason {
        match code {
            2 => RejectReason::BusyOrAlreadyActive,
            4 => RejectReason::NotReady,
            other => RejectReason::Other(other),
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::BusyOrAlreadyActive => write!(f, "busy-or-already-active"),
            RejectReason::NotReady => write!(f, "not-ready"),
            RejectReason::Other(code) => write!(f, "reason {}", code),
        }
    }
}

/// The 10-byte HSMS message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub session_id: u16,
    pub byte2: u8,
    pub byte3: u8,
    pub p_type: u8,
    pub s_type: u8,
    pub system_bytes: u32,
}

impl MessageHeader {
    /// Serialize to the wire layout.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..2].copy_from_slice(&self.session_id.to_be_bytes());
        bytes[2] = self.byte2;
        bytes[3] = self.byte3;
        bytes[4] = self.p_type;
        bytes[5] = self.s_type;
        bytes[6..10].copy_from_slice(&self.system_bytes.to_be_bytes());
        bytes
    }

    /// Parse from the wire layout.
    pub fn decode(bytes: &[u8]) -> Result<MessageHeader> {
        if bytes.len() != HEADER_SIZE {
            return Err(Error::FramingError(format!(
                "header must be {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }
        Ok(MessageHeader {
            session_id: u16::from_be_bytes([bytes[0], bytes[1]]),
            byte2: bytes[2],
            byte3: bytes[3],
            p_type: bytes[4],
            s_type: bytes[5],
            system_bytes: u32::from_be_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
        })
    }
}

/// A complete HSMS message: header plus optional SECS-II body.
///
/// Control messages always have an empty body. Data messages may carry an
/// item tree; a missing body encodes as zero body bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct HsmsMessage {
    pub header: MessageHeader,
    pub body: Option<Item>,
}

impl HsmsMessage {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Build a data message. Session id, system bytes and the W flag are
    /// assigned by the send primitives.
    pub fn data(stream: u8, function: u8, body: Option<Item>) -> HsmsMessage {
        HsmsMessage {
            header: MessageHeader {
                session_id: 0,
                byte2: stream & 0x7F,
                byte3: function,
                p_type: 0,
                s_type: 0,
                system_bytes: 0,
            },
            body,
        }
    }

    fn control(s_type: SType, session_id: u16, system_bytes: u32) -> HsmsMessage {
        HsmsMessage {
            header: MessageHeader {
                session_id,
                byte2: 0,
                byte3: 0,
                p_type: 0,
                s_type: s_type as u8,
                system_bytes,
            },
            body: None,
        }
    }

    /// Select.req carrying the requested session id.
    pub fn select_req(session_id: u16, system_bytes: u32) -> HsmsMessage {
        HsmsMessage::control(SType::SelectReq, session_id, system_bytes)
    }

    /// Select.rsp answering `req` with the given status.
    pub fn select_rsp(req: &HsmsMessage, status: ControlStatus) -> HsmsMessage {
        let mut msg = HsmsMessage::control(
            SType::SelectRsp,
            req.header.session_id,
            req.header.system_bytes,
        );
        msg.header.byte3 = status.code();
        msg
    }

    /// Deselect.req for the given session.
    pub fn deselect_req(session_id: u16, system_bytes: u32) -> HsmsMessage {
        HsmsMessage::control(SType::DeselectReq, session_id, system_bytes)
    }

    /// Deselect.rsp answering `req` with the given status.
    pub fn deselect_rsp(req: &HsmsMessage, status: ControlStatus) -> HsmsMessage {
        let mut msg = HsmsMessage::control(
            SType::DeselectRsp,
            req.header.session_id,
            req.header.system_bytes,
        );
        msg.header.byte3 = status.code();
        msg
    }

    /// Linktest.req (session id is always the wildcard).
    pub fn linktest_req(system_bytes: u32) -> HsmsMessage {
        HsmsMessage::control(SType::LinktestReq, WILDCARD_SESSION, system_bytes)
    }

    /// Linktest.rsp answering `req`.
    pub fn linktest_rsp(req: &HsmsMessage) -> HsmsMessage {
        HsmsMessage::control(
            SType::LinktestRsp,
            req.header.session_id,
            req.header.system_bytes,
        )
    }

    /// Separate.req for the given session.
    pub fn separate_req(session_id: u16, system_bytes: u32) -> HsmsMessage {
        HsmsMessage::control(SType::SeparateReq, session_id, system_bytes)
    }

    /// Reject.req answering an offending message. `byte2` carries the
    /// offending sType, `byte3` the reason code.
    pub fn reject_req(offending: &HsmsMessage, reason: RejectReason) -> HsmsMessage {
        let mut msg = HsmsMessage::control(
            SType::RejectReq,
            offending.header.session_id,
            offending.header.system_bytes,
        );
        msg.header.byte2 = offending.header.s_type;
        msg.header.byte3 = reason.code();
        msg
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// True for data messages (sType = 0).
    pub fn is_data(&self) -> bool {
        self.header.s_type == 0
    }

    /// Control type for non-data messages.
    pub fn control_type(&self) -> Option<SType> {
        SType::from_byte(self.header.s_type)
    }

    /// Stream code of a data message.
    pub fn stream(&self) -> u8 {
        self.header.byte2 & 0x7F
    }

    /// Function code of a data message.
    pub fn function(&self) -> u8 {
        self.header.byte3
    }

    /// W flag of a data message.
    pub fn wait_bit(&self) -> bool {
        self.header.byte2 & 0x80 != 0
    }

    /// Set or clear the W flag.
    pub fn set_wait_bit(&mut self, wait: bool) {
        if wait {
            self.header.byte2 |= 0x80;
        } else {
            self.header.byte2 &= 0x7F;
        }
    }

    /// Status byte of Select.rsp / Deselect.rsp (and reason of Reject.req).
    pub fn control_status(&self) -> u8 {
        self.header.byte3
    }

    /// `SxFy` label used in logs.
    pub fn sf_code(&self) -> String {
        format!("S{}F{}", self.stream(), self.function())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = MessageHeader {
            session_id: 0x0100,
            byte2: 0x81,
            byte3: 13,
            p_type: 0,
            s_type: 0,
            system_bytes: 0xDEADBEEF,
        };
        let bytes = header.encode();
        assert_eq!(MessageHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn data_message_stream_function_and_wait() {
        let mut msg = HsmsMessage::data(1, 13, Some(Item::empty()));
        assert!(msg.is_data());
        assert_eq!(msg.stream(), 1);
        assert_eq!(msg.function(), 13);
        assert!(!msg.wait_bit());

        msg.set_wait_bit(true);
        assert!(msg.wait_bit());
        assert_eq!(msg.stream(), 1);
        assert_eq!(msg.sf_code(), "S1F13");

        msg.set_wait_bit(false);
        assert!(!msg.wait_bit());
    }

    #[test]
    fn reject_carries_offending_stype_and_reason() {
        let mut data = HsmsMessage::data(6, 11, None);
        data.header.system_bytes = 42;
        let reject = HsmsMessage::reject_req(&data, RejectReason::NotReady);
        assert_eq!(reject.control_type(), Some(SType::RejectReq));
        assert_eq!(reject.header.byte2, 0);
        assert_eq!(reject.header.byte3, 4);
        assert_eq!(reject.header.system_bytes, 42);
    }

    #[test]
    fn select_rsp_reuses_request_correlation() {
        let req = HsmsMessage::select_req(0x0100, 7);
        let rsp = HsmsMessage::select_rsp(&req, ControlStatus::Denied);
        assert_eq!(rsp.header.session_id, 0x0100);
        assert_eq!(rsp.header.system_bytes, 7);
        assert_eq!(rsp.control_status(), 1);
    }

    #[test]
    fn stype_byte_validation() {
        assert!(SType::is_valid_byte(0));
        for v in 1..=7u8 {
            assert!(SType::is_valid_byte(v));
        }
        assert!(!SType::is_valid_byte(8));
        assert!(SType::is_valid_byte(9));
        assert!(!SType::is_valid_byte(10));
    }
}

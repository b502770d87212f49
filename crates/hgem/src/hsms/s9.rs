// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stream 9 error message synthesis.
//!
//! Stream 9 reports protocol-level failures back to the peer:
//!
//! | Message | Meaning | Body |
//! |---------|---------|------|
//! | S9F3 | Unrecognized Stream | `B[1]` offending stream code |
//! | S9F5 | Unrecognized Function | `B[1]` offending function code |
//! | S9F7 | Illegal Data | empty |
//! | S9F9 | Transaction Timer Timeout | `B[10]` header of the timed-out message |
//! | S9F11 | Data Too Long | empty |
//!
//! A Stream 9 message never provokes another Stream 9 reply.

use super::message::{HsmsMessage, MessageHeader};
use crate::secs2::Item;

/// Streams defined by SEMI E5 that this engine considers recognizable.
/// Anything else is answered with S9F3; a known stream with an unknown
/// function gets S9F5.
pub fn known_stream(stream: u8) -> bool {
    matches!(stream, 1..=10 | 12..=17 | 21)
}

/// S9F3 - Unrecognized Stream.
pub fn unrecognized_stream(stream: u8) -> HsmsMessage {
    HsmsMessage::data(9, 3, Some(Item::binary(vec![stream])))
}

/// S9F5 - Unrecognized Function.
pub fn unrecognized_function(function: u8) -> HsmsMessage {
    HsmsMessage::data(9, 5, Some(Item::binary(vec![function])))
}

/// S9F7 - Illegal Data.
pub fn illegal_data() -> HsmsMessage {
    HsmsMessage::data(9, 7, Some(Item::empty()))
}

/// S9F9 - Transaction Timer Timeout, carrying the stored header of the
/// message whose reply never arrived.
pub fn transaction_timeout(original: &MessageHeader) -> HsmsMessage {
    HsmsMessage::data(9, 9, Some(Item::binary(original.encode().to_vec())))
}

/// S9F11 - Data Too Long.
pub fn data_too_long() -> HsmsMessage {
    HsmsMessage::data(9, 11, Some(Item::empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_table() {
        for s in [1u8, 2, 5, 6, 7, 9, 10, 12, 17, 21] {
            assert!(known_stream(s), "stream {} should be known", s);
        }
        for s in [0u8, 11, 18, 19, 20, 22, 99, 127] {
            assert!(!known_stream(s), "stream {} should be unknown", s);
        }
    }

    #[test]
    fn s9f3_carries_offending_stream() {
        let msg = unrecognized_stream(99);
        assert_eq!(msg.sf_code(), "S9F3");
        assert_eq!(msg.body.as_ref().unwrap().first_byte(), Some(99));
    }

    #[test]
    fn s9f9_body_is_the_original_header() {
        let header = MessageHeader {
            session_id: 0x0100,
            byte2: 0x81,
            byte3: 1,
            p_type: 0,
            s_type: 0,
            system_bytes: 0x12345678,
        };
        let msg = transaction_timeout(&header);
        assert_eq!(msg.sf_code(), "S9F9");
        match msg.body {
            Some(Item::Binary(bytes)) => assert_eq!(bytes, header.encode().to_vec()),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn empty_bodied_errors() {
        assert!(illegal_data().body.unwrap().is_empty());
        assert!(data_too_long().body.unwrap().is_empty());
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HSMS transport engine (SEMI E37).
//!
//! HSMS carries SECS-II messages over TCP with a 4-byte length prefix and a
//! 10-byte header. One side is *active* (dials) and the other *passive*
//! (listens); after the TCP session is up, the active side drives a
//! Select handshake before data traffic may flow.
//!
//! # Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                        HsmsProtocol                          |
//! |  +--------------------------------------------------------+  |
//! |  |  connect thread: dial (backoff) / accept (one session) |  |
//! |  +--------------------------------------------------------+  |
//! |  +--------------------------------------------------------+  |
//! |  |  receive loop: frames under T8 -> control | mailbox |  |  |
//! |  |                handler dispatch | S9 synthesis         |  |
//! |  +--------------------------------------------------------+  |
//! |  +----------------+  +----------------+  +---------------+  |
//! |  | state machine  |  | transactions   |  | linktest loop |  |
//! |  | (T7 timer)     |  | (T3/T6 waits)  |  | (period/T6)   |  |
//! |  +----------------+  +----------------+  +---------------+  |
//! +--------------------------------------------------------------+
//! ```
//!
//! # Timers
//!
//! | Timer | Bounds |
//! |-------|--------|
//! | T3 | reply to a W-bit data message |
//! | T5 | delay between connect attempts |
//! | T6 | control transaction response |
//! | T7 | time allowed in CONNECTED-NOT-SELECTED |
//! | T8 | inter-character gap inside/between frames |
//! | Linktest | period of Linktest.req probes while SELECTED |

pub mod config;
pub mod frame;
pub mod message;
pub mod protocol;
pub mod s9;
pub mod state;
pub mod timeout;
pub(crate) mod timer;
pub mod transaction;
pub mod wirelog;

pub use config::HsmsConfig;
pub use message::{ControlStatus, HsmsMessage, MessageHeader, RejectReason, SType};
pub use protocol::{DataMessageHandler, HsmsProtocol};
pub use state::ConnectionState;
pub use timeout::SecsTimeouts;
pub use wirelog::{LogMode, RotationConfig, WireLogConfig};

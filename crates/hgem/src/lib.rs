// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # HGEM - HSMS transport and GEM services for equipment communication
//!
//! A pure Rust implementation of the SEMI E37 HSMS (High-Speed SECS Message
//! Services) transport and the SEMI E30 GEM (Generic Equipment Model) service
//! layer, designed for factory hosts and production equipment exchanging
//! SECS-II messages over TCP.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hgem::{GemHandler, GemOptions, DeviceType, HsmsConfig};
//! use std::time::Duration;
//!
//! fn main() -> hgem::Result<()> {
//!     let hsms = HsmsConfig::active("127.0.0.1", 5000, 0x0100);
//!     let handler = GemHandler::new(hsms, GemOptions::host(0x0100))?;
//!
//!     handler.enable();
//!     if handler.wait_for_communicating(Duration::from_secs(10)) {
//!         let values = handler.request_status_variables(&[1101u32.into()])?;
//!         println!("SV 1101 = {}", values[0].value);
//!     }
//!     handler.disable();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                        Application Layer                            |
//! |     GemHandler -> host request API / equipment registries           |
//! +---------------------------------------------------------------------+
//! |                           GEM Layer                                 |
//! |  Communication state (S1F13/F14) | Control state (S1F15..F18)       |
//! |  SV/DV/EC registries | Reports & collection events | Alarms/Clock   |
//! +---------------------------------------------------------------------+
//! |                          HSMS Layer                                 |
//! |  Select/Deselect/Linktest/Separate | T3/T5/T6/T7/T8 | Reconnect     |
//! |  Transaction correlation | Stream 9 error synthesis                 |
//! +---------------------------------------------------------------------+
//! |                        Transport Layer                              |
//! |        TCP (length-prefixed frames, 10-byte HSMS header)            |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`HsmsProtocol`] | HSMS connection engine (dial/listen, selection, timers) |
//! | [`GemHandler`] | GEM services on top of an HSMS session |
//! | [`secs2::Item`] | SECS-II item tree carried in data message bodies |
//! | [`gem::VariableId`] | Polymorphic SV/DV/EC/CEID/RPTID/PPID identifier |
//! | [`HsmsConfig`] / [`GemOptions`] | Transport and service configuration |
//!
//! ## Roles
//!
//! One binary can act as either side. [`DeviceType::Host`] drives the
//! establish-communication handshake and the request API; `DeviceType::Equipment`
//! owns the variable/event/alarm registries and answers the canonical message
//! set (S1, S2, S5, S6, S7). Operations invoked on the wrong role fail with
//! [`Error::OperationNotSupported`].

pub mod error;
pub mod gem;
pub mod hsms;
pub mod logging;
pub mod secs2;

pub use error::{Error, Result};
pub use gem::{DeviceType, GemHandler, GemOptions};
pub use hsms::{ConnectionState, HsmsConfig, HsmsProtocol};
pub use secs2::Item;

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SECS-II item trees (SEMI E5).
//!
//! Data message bodies are trees of typed items. This module provides the
//! [`Item`] type, its binary wire codec, and an SML-style rendering used by
//! the wire logger.
//!
//! # Wire Format
//!
//! Each item starts with a format byte `(format_code << 2) | n`, where `n`
//! (1..=3) is the number of big-endian length bytes that follow. For lists
//! the length counts child items; for every other format it counts payload
//! bytes.
//!
//! ```text
//! +-------------+-----------------+------------------+
//! | Format (1B) | Length (1..3 B) | Payload          |
//! +-------------+-----------------+------------------+
//! ```
//!
//! # Example
//!
//! ```
//! use hgem::secs2::Item;
//!
//! let body = Item::list(vec![Item::u4(100), Item::ascii("RUN")]);
//! let bytes = body.to_bytes();
//! let parsed = Item::from_bytes(&bytes).unwrap();
//! assert_eq!(body, parsed);
//! ```

mod codec;
mod item;

pub use item::Item;

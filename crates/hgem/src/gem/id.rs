// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Polymorphic identifiers for SV/DV/EC/CEID/RPTID/PPID values.
//!
//! SEMI E5 permits variable identifiers to be unsigned integers of any
//! width or ASCII names. Internally every identifier canonicalizes to a
//! `(raw, key)` pair where the key is `"N:<uint>"` or `"S:<str>"`; all
//! registry lookups use the key, so `U2 1101` and `U4 1101` address the
//! same variable.

use crate::error::{Error, Result};
use crate::secs2::Item;
use std::fmt;

/// An SV/DV/EC/CEID/RPTID/PPID identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VariableId {
    /// Non-negative integer identifier.
    Uint(u64),
    /// ASCII name identifier.
    Ascii(String),
}

impl VariableId {
    /// Canonical registry key (`"N:<uint>"` or `"S:<str>"`).
    pub fn key(&self) -> String {
        match self {
            VariableId::Uint(value) => format!("N:{}", value),
            VariableId::Ascii(name) => format!("S:{}", name),
        }
    }

    /// Encode for the wire with the minimum unsigned width.
    pub fn to_item(&self) -> Item {
        match self {
            VariableId::Uint(value) => Item::uint_min_width(*value),
            VariableId::Ascii(name) => Item::ascii(name.clone()),
        }
    }

    /// Decode an identifier item received from the peer.
    ///
    /// Unsigned integers of any width are accepted; signed integers must be
    /// non-negative; anything else is an [`Error::InvalidArgument`].
    pub fn from_item(item: &Item) -> Result<VariableId> {
        match item {
            Item::Ascii(name) => Ok(VariableId::Ascii(name.clone())),
            Item::U1(_) | Item::U2(_) | Item::U4(_) | Item::U8(_) => item
                .first_uint()
                .map(VariableId::Uint)
                .ok_or_else(|| Error::InvalidArgument("empty identifier item".into())),
            Item::I1(_) | Item::I2(_) | Item::I4(_) | Item::I8(_) => match item.first_uint() {
                Some(value) => Ok(VariableId::Uint(value)),
                None => Err(Error::InvalidArgument(
                    "negative identifier not supported".into(),
                )),
            },
            other => Err(Error::InvalidArgument(format!(
                "unsupported identifier item type {}",
                other.type_name()
            ))),
        }
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableId::Uint(value) => write!(f, "{}", value),
            VariableId::Ascii(name) => write!(f, "{}", name),
        }
    }
}

macro_rules! impl_from_uint {
    ($($ty:ty),*) => {
        $(impl From<$ty> for VariableId {
            fn from(value: $ty) -> VariableId {
                VariableId::Uint(u64::from(value))
            }
        })*
    };
}

impl_from_uint!(u8, u16, u32, u64);

impl From<&str> for VariableId {
    fn from(value: &str) -> VariableId {
        VariableId::Ascii(value.to_string())
    }
}

impl From<String> for VariableId {
    fn from(value: String) -> VariableId {
        VariableId::Ascii(value)
    }
}

impl TryFrom<i64> for VariableId {
    type Error = Error;

    fn try_from(value: i64) -> Result<VariableId> {
        u64::try_from(value).map(VariableId::Uint).map_err(|_| {
            Error::InvalidArgument(format!("negative identifier {} not supported", value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(VariableId::from(1101u32).key(), "N:1101");
        assert_eq!(VariableId::from("CLOCK").key(), "S:CLOCK");
    }

    #[test]
    fn width_does_not_change_identity() {
        let narrow = VariableId::from_item(&Item::u2(1101)).unwrap();
        let wide = VariableId::from_item(&Item::u4(1101)).unwrap();
        assert_eq!(narrow.key(), wide.key());
    }

    #[test]
    fn negative_identifiers_rejected() {
        assert!(VariableId::try_from(-5i64).is_err());
        assert!(VariableId::from_item(&Item::I4(vec![-1])).is_err());
    }

    #[test]
    fn signed_non_negative_accepted() {
        let id = VariableId::from_item(&Item::I2(vec![42])).unwrap();
        assert_eq!(id, VariableId::Uint(42));
    }

    #[test]
    fn minimum_width_encoding() {
        assert_eq!(VariableId::Uint(0xFF).to_item(), Item::U1(vec![0xFF]));
        assert_eq!(VariableId::Uint(0x100).to_item(), Item::U2(vec![0x100]));
        assert_eq!(
            VariableId::Uint(0x1_0000).to_item(),
            Item::U4(vec![0x1_0000])
        );
    }

    #[test]
    fn unsupported_item_types_rejected() {
        assert!(VariableId::from_item(&Item::empty()).is_err());
        assert!(VariableId::from_item(&Item::F4(vec![1.0])).is_err());
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binary wire codec for SECS-II items (SEMI E5 format bytes).

use super::Item;
use crate::error::{Error, Result};

// 6-bit format codes from SEMI E5 (octal, as printed in the standard).
const FMT_LIST: u8 = 0o00;
const FMT_BINARY: u8 = 0o10;
const FMT_BOOLEAN: u8 = 0o11;
const FMT_ASCII: u8 = 0o20;
const FMT_I8: u8 = 0o30;
const FMT_I1: u8 = 0o31;
const FMT_I2: u8 = 0o32;
const FMT_I4: u8 = 0o34;
const FMT_F8: u8 = 0o40;
const FMT_F4: u8 = 0o44;
const FMT_U8: u8 = 0o50;
const FMT_U1: u8 = 0o51;
const FMT_U2: u8 = 0o52;
const FMT_U4: u8 = 0o54;

/// Recursion guard; real message bodies stay far below this.
const MAX_DEPTH: u32 = 64;

impl Item {
    /// Serialize this item tree into a fresh buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }

    /// Total encoded size in bytes, including format and length bytes.
    pub fn encoded_len(&self) -> usize {
        let wire_len = self.wire_len();
        let header = 1 + length_byte_count(wire_len);
        match self {
            Item::List(items) => header + items.iter().map(Item::encoded_len).sum::<usize>(),
            _ => header + wire_len,
        }
    }

    /// Append the encoded form of this item tree to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        let len = self.wire_len();
        write_header(buf, self.format_code(), len);

        match self {
            Item::List(items) => {
                for item in items {
                    item.encode_into(buf);
                }
            }
            Item::Ascii(s) => buf.extend_from_slice(s.as_bytes()),
            Item::Binary(bytes) => buf.extend_from_slice(bytes),
            Item::Bool(values) => buf.extend(values.iter().map(|&b| u8::from(b))),
            Item::I1(v) => buf.extend(v.iter().map(|x| *x as u8)),
            Item::I2(v) => {
                v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes()));
            }
            Item::I4(v) => {
                v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes()));
            }
            Item::I8(v) => {
                v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes()));
            }
            Item::U1(v) => buf.extend_from_slice(v),
            Item::U2(v) => {
                v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes()));
            }
            Item::U4(v) => {
                v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes()));
            }
            Item::U8(v) => {
                v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes()));
            }
            Item::F4(v) => {
                v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes()));
            }
            Item::F8(v) => {
                v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes()));
            }
        }
    }

    /// Parse a single item tree that must span the whole input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Item> {
        let mut pos = 0usize;
        let item = decode_item(bytes, &mut pos, 0)?;
        if pos != bytes.len() {
            return Err(Error::FramingError(format!(
                "{} trailing bytes after item",
                bytes.len() - pos
            )));
        }
        Ok(item)
    }

    fn format_code(&self) -> u8 {
        match self {
            Item::List(_) => FMT_LIST,
            Item::Ascii(_) => FMT_ASCII,
            Item::Binary(_) => FMT_BINARY,
            Item::Bool(_) => FMT_BOOLEAN,
            Item::I1(_) => FMT_I1,
            Item::I2(_) => FMT_I2,
            Item::I4(_) => FMT_I4,
            Item::I8(_) => FMT_I8,
            Item::U1(_) => FMT_U1,
            Item::U2(_) => FMT_U2,
            Item::U4(_) => FMT_U4,
            Item::U8(_) => FMT_U8,
            Item::F4(_) => FMT_F4,
            Item::F8(_) => FMT_F8,
        }
    }

    /// Wire length field value: child count for lists, payload bytes otherwise.
    fn wire_len(&self) -> usize {
        match self {
            Item::List(items) => items.len(),
            Item::Ascii(s) => s.len(),
            Item::Binary(v) => v.len(),
            Item::Bool(v) => v.len(),
            Item::I1(v) => v.len(),
            Item::I2(v) => v.len() * 2,
            Item::I4(v) => v.len() * 4,
            Item::I8(v) => v.len() * 8,
            Item::U1(v) => v.len(),
            Item::U2(v) => v.len() * 2,
            Item::U4(v) => v.len() * 4,
            Item::U8(v) => v.len() * 8,
            Item::F4(v) => v.len() * 4,
            Item::F8(v) => v.len() * 8,
        }
    }
}

fn length_byte_count(len: usize) -> usize {
    if len <= 0xFF {
        1
    } else if len <= 0xFFFF {
        2
    } else {
        3
    }
}

fn write_header(buf: &mut Vec<u8>, format_code: u8, len: usize) {
    let n = length_byte_count(len);
    buf.push((format_code << 2) | n as u8);
    match n {
        1 => buf.push(len as u8),
        2 => buf.extend_from_slice(&(len as u16).to_be_bytes()),
        // Lengths above 24 bits cannot appear: the frame layer caps whole
        // messages at 16 MiB.
        _ => {
            buf.push((len >> 16) as u8);
            buf.push((len >> 8) as u8);
            buf.push(len as u8);
        }
    }
}

fn take<'a>(bytes: &'a [u8], pos: &mut usize, count: usize) -> Result<&'a [u8]> {
    let end = pos
        .checked_add(count)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| Error::FramingError("item payload truncated".into()))?;
    let slice = &bytes[*pos..end];
    *pos = end;
    Ok(slice)
}

fn decode_item(bytes: &[u8], pos: &mut usize, depth: u32) -> Result<Item> {
    if depth > MAX_DEPTH {
        return Err(Error::FramingError("item nesting too deep".into()));
    }

    let format_byte = take(bytes, pos, 1)?[0];
    let format_code = format_byte >> 2;
    let n_length = (format_byte & 0x03) as usize;
    if n_length == 0 {
        return Err(Error::FramingError(format!(
            "format byte 0x{:02X} has zero length bytes",
            format_byte
        )));
    }

    let mut len = 0usize;
    for &b in take(bytes, pos, n_length)? {
        len = (len << 8) | b as usize;
    }

    match format_code {
        FMT_LIST => {
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(decode_item(bytes, pos, depth + 1)?);
            }
            Ok(Item::List(items))
        }
        FMT_ASCII => {
            let payload = take(bytes, pos, len)?;
            // SECS-II ASCII allows any byte; lossy conversion keeps the parse alive.
            Ok(Item::Ascii(String::from_utf8_lossy(payload).into_owned()))
        }
        FMT_BINARY => Ok(Item::Binary(take(bytes, pos, len)?.to_vec())),
        FMT_BOOLEAN => {
            let payload = take(bytes, pos, len)?;
            Ok(Item::Bool(payload.iter().map(|&b| b != 0).collect()))
        }
        FMT_I1 => {
            let payload = take(bytes, pos, len)?;
            Ok(Item::I1(payload.iter().map(|&b| b as i8).collect()))
        }
        FMT_I2 => decode_numeric(bytes, pos, len, 2, |c| {
            Item::I2(c.iter().map(|b| i16::from_be_bytes([b[0], b[1]])).collect())
        }),
        FMT_I4 => decode_numeric(bytes, pos, len, 4, |c| {
            Item::I4(
                c.iter()
                    .map(|b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
                    .collect(),
            )
        }),
        FMT_I8 => decode_numeric(bytes, pos, len, 8, |c| {
            Item::I8(
                c.iter()
                    .map(|b| i64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                    .collect(),
            )
        }),
        FMT_U1 => Ok(Item::U1(take(bytes, pos, len)?.to_vec())),
        FMT_U2 => decode_numeric(bytes, pos, len, 2, |c| {
            Item::U2(c.iter().map(|b| u16::from_be_bytes([b[0], b[1]])).collect())
        }),
        FMT_U4 => decode_numeric(bytes, pos, len, 4, |c| {
            Item::U4(
                c.iter()
                    .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
                    .collect(),
            )
        }),
        FMT_U8 => decode_numeric(bytes, pos, len, 8, |c| {
            Item::U8(
                c.iter()
                    .map(|b| u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                    .collect(),
            )
        }),
        FMT_F4 => decode_numeric(bytes, pos, len, 4, |c| {
            Item::F4(
                c.iter()
                    .map(|b| f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
                    .collect(),
            )
        }),
        FMT_F8 => decode_numeric(bytes, pos, len, 8, |c| {
            Item::F8(
                c.iter()
                    .map(|b| f64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                    .collect(),
            )
        }),
        other => Err(Error::FramingError(format!(
            "unknown SECS-II format code 0o{:02o}",
            other
        ))),
    }
}

fn decode_numeric(
    bytes: &[u8],
    pos: &mut usize,
    len: usize,
    width: usize,
    build: impl Fn(Vec<&[u8]>) -> Item,
) -> Result<Item> {
    if len % width != 0 {
        return Err(Error::FramingError(format!(
            "numeric payload of {} bytes not divisible by element width {}",
            len, width
        )));
    }
    let payload = take(bytes, pos, len)?;
    Ok(build(payload.chunks_exact(width).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(item: Item) {
        let bytes = item.to_bytes();
        assert_eq!(bytes.len(), item.encoded_len());
        let parsed = Item::from_bytes(&bytes).expect("decode");
        assert_eq!(item, parsed);
    }

    #[test]
    fn roundtrip_all_formats() {
        roundtrip(Item::empty());
        roundtrip(Item::ascii("PP-001"));
        roundtrip(Item::binary(vec![0, 1, 2, 255]));
        roundtrip(Item::Bool(vec![true, false]));
        roundtrip(Item::I1(vec![-1, 127]));
        roundtrip(Item::I2(vec![-300, 300]));
        roundtrip(Item::I4(vec![-70000, 70000]));
        roundtrip(Item::I8(vec![i64::MIN, i64::MAX]));
        roundtrip(Item::U1(vec![0, 255]));
        roundtrip(Item::U2(vec![0, 65535]));
        roundtrip(Item::U4(vec![0, u32::MAX]));
        roundtrip(Item::U8(vec![0, u64::MAX]));
        roundtrip(Item::F4(vec![1.5, -2.25]));
        roundtrip(Item::F8(vec![std::f64::consts::PI]));
    }

    #[test]
    fn roundtrip_nested_list() {
        roundtrip(Item::list(vec![
            Item::u1(1),
            Item::list(vec![Item::u4(4001), Item::list(vec![Item::u4(100), Item::u2(7)])]),
        ]));
    }

    #[test]
    fn two_byte_length_encoding() {
        let item = Item::Ascii("x".repeat(300));
        let bytes = item.to_bytes();
        assert_eq!(bytes[0] & 0x03, 2);
        assert_eq!(&bytes[1..3], &300u16.to_be_bytes());
        roundtrip(item);
    }

    #[test]
    fn truncated_payload_is_framing_error() {
        let mut bytes = Item::U4(vec![1, 2]).to_bytes();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            Item::from_bytes(&bytes),
            Err(Error::FramingError(_))
        ));
    }

    #[test]
    fn zero_length_bytes_rejected() {
        // Format byte claiming zero length bytes is malformed.
        assert!(matches!(
            Item::from_bytes(&[FMT_U1 << 2]),
            Err(Error::FramingError(_))
        ));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = Item::u1(5).to_bytes();
        bytes.push(0);
        assert!(matches!(
            Item::from_bytes(&bytes),
            Err(Error::FramingError(_))
        ));
    }

    #[test]
    fn misaligned_numeric_payload_rejected() {
        // U2 with a 3-byte payload.
        let bytes = [(FMT_U2 << 2) | 1, 3, 0, 1, 2];
        assert!(matches!(
            Item::from_bytes(&bytes),
            Err(Error::FramingError(_))
        ));
    }
}

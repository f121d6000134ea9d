// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Base-128 variable-length integers and field tags, the primitives of the
//! remote-write wire format.

/// Wire type of a tagged field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
}

/// Appends the varint encoding of `value` to `buf`.
///
/// Groups of seven bits are written least significant first, with the
/// continuation bit `0x80` set on every byte except the last.
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    while value >= 0x80 {
        buf.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Number of bytes `encode_varint` writes for `value`.
#[must_use]
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Appends the tag `(field_number << 3) | wire_type`.
pub fn encode_tag(field_number: u32, wire_type: WireType, buf: &mut Vec<u8>) {
    encode_varint((u64::from(field_number) << 3) | wire_type as u64, buf);
}

/// Appends a length-delimited field holding `payload`.
pub fn encode_length_delimited(field_number: u32, payload: &[u8], buf: &mut Vec<u8>) {
    encode_tag(field_number, WireType::LengthDelimited, buf);
    encode_varint(payload.len() as u64, buf);
    buf.extend_from_slice(payload);
}

/// Decodes a varint from the start of `bytes`, returning the value and the
/// number of bytes consumed. Only used to verify the encoder.
#[cfg(test)]
pub(crate) fn decode_varint(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, byte) in bytes.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

//! Utility functions for Distinguished Encoding Rules.


use std::fmt;

use rasn::types::Oid as ArcOid;


/// A problem with the encoding of a length field.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum LengthError {
    /// The input ended before the length was complete.
    Truncated,

    /// The indefinite length form `0x80` was used.
    Indefinite,

    /// The length does not fit into the platform's `usize` or uses more than four length bytes.
    TooLarge,

    /// The length uses more bytes than necessary.
    NonMinimal,
}
impl fmt::Display for LengthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "length field is truncated"),
            Self::Indefinite => write!(f, "indefinite length is not supported"),
            Self::TooLarge => write!(f, "length is too large"),
            Self::NonMinimal => write!(f, "length is not minimally encoded"),
        }
    }
}
impl std::error::Error for LengthError {
}


/// Encode an ASN.1 DER length.
pub fn encode_length(output: &mut Vec<u8>, length: usize) {
    if length < 128 {
        // single-byte encoding
        output.push(length as u8);
    } else {
        // 0b1nnn_nnnn and then n additional bytes that actually specify the length
        // (big-endian)
        let length_bytes = length.to_be_bytes();
        let first_significant = length_bytes.iter()
            .position(|b| *b != 0x00)
            .unwrap_or(length_bytes.len() - 1);
        let trimmed_length_slice = &length_bytes[first_significant..];
        output.push(0b1000_0000 | (trimmed_length_slice.len() as u8));
        output.extend(trimmed_length_slice);
    }
}


/// Decode an ASN.1 DER length.
///
/// The length must be at the beginning of the input slice.
///
/// Returns a tuple `(length, rest)` where `rest` is the rest of the input slice once the length has
/// been removed. Only the minimal encoding of each length is accepted, so that re-encoding a decoded
/// length always yields the original bytes.
pub fn try_decode_length(input: &[u8]) -> Result<(usize, &[u8]), LengthError> {
    let Some(&start_byte) = input.first() else {
        return Err(LengthError::Truncated);
    };
    let start_lower_bits = start_byte & 0b0111_1111;
    if start_byte & 0b1000_0000 == 0 {
        return Ok((start_lower_bits.into(), &input[1..]));
    }

    // multiple bytes
    let length_byte_count: usize = start_lower_bits.into();
    if length_byte_count == 0 {
        return Err(LengthError::Indefinite);
    }
    if length_byte_count > 4 {
        return Err(LengthError::TooLarge);
    }
    if length_byte_count > input.len() - 1 {
        // that will never fit
        return Err(LengthError::Truncated);
    }
    let length_bytes = &input[1..1+length_byte_count];
    if length_bytes[0] == 0x00 {
        return Err(LengthError::NonMinimal);
    }

    let mut length: usize = 0;
    for length_byte in length_bytes {
        length = length.checked_mul(256)
            .and_then(|l| l.checked_add(usize::from(*length_byte)))
            .ok_or(LengthError::TooLarge)?;
    }
    if length < 128 {
        // would have fit into the short form
        return Err(LengthError::NonMinimal);
    }
    Ok((length, &input[1+length_byte_count..]))
}


/// Encode an object identifier given as arcs into its DER content bytes.
///
/// No tag or length is encoded, only the actual value. The arcs of a `rasn` object identifier are
/// validated on construction, so every one of them has an encoding.
pub fn oid_to_der_bytes(oid: &ArcOid) -> Vec<u8> {
    const SEVEN_BIT_MASK: u64 = 0b0111_1111;
    const TOP_BIT: u8 = 0b1000_0000;

    fn encode_arc(ret: &mut Vec<u8>, arc: u64) {
        // base-128, most significant group first, continuation bit on all but the last
        let mut groups = [0u8; 10];
        let mut count = 0;
        let mut rest = arc;
        loop {
            groups[count] = (rest & SEVEN_BIT_MASK) as u8;
            count += 1;
            rest >>= 7;
            if rest == 0 {
                break;
            }
        }
        for i in (0..count).rev() {
            let continuation = if i > 0 { TOP_BIT } else { 0 };
            ret.push(groups[i] | continuation);
        }
    }

    let mut ret = Vec::new();
    let first = oid.first().copied().unwrap_or(0);
    let second = oid.get(1).copied().unwrap_or(0);
    encode_arc(&mut ret, u64::from(first) * 40 + u64::from(second));

    for arc in oid.iter().skip(2) {
        encode_arc(&mut ret, (*arc).into());
    }

    ret
}


/// Decode the DER content bytes of an object identifier into its arcs.
pub fn der_bytes_to_arcs(bytes: &[u8]) -> Option<Vec<u32>> {
    let mut arcs = Vec::new();
    let mut current: u32 = 0;
    let mut in_arc = false;
    for (i, b) in bytes.iter().enumerate() {
        if !in_arc && *b == 0x80 {
            // leading zero group
            return None;
        }
        current = current.checked_mul(128)?.checked_add(u32::from(b & 0x7F))?;
        in_arc = b & 0x80 != 0;
        if !in_arc {
            if i == 0 || arcs.is_empty() {
                let (first, second) = match current {
                    0..=39 => (0, current),
                    40..=79 => (1, current - 40),
                    _ => (2, current - 80),
                };
                arcs.push(first);
                arcs.push(second);
            } else {
                arcs.push(current);
            }
            current = 0;
        }
    }
    if in_arc || arcs.is_empty() {
        return None;
    }
    Some(arcs)
}


/// Encodes a big-endian unsigned integer as the content bytes of a DER INTEGER.
///
/// Leading zero bytes are stripped and a single zero byte is prepended if the top bit would
/// otherwise mark the value as negative.
pub fn unsigned_integer_content(be_bytes: &[u8]) -> Vec<u8> {
    let first_significant = be_bytes.iter()
        .position(|b| *b != 0x00)
        .unwrap_or(be_bytes.len());
    let trimmed = &be_bytes[first_significant..];
    let mut ret = Vec::with_capacity(trimmed.len() + 1);
    if trimmed.first().map(|b| b & 0x80 != 0).unwrap_or(true) {
        ret.push(0x00);
    }
    ret.extend(trimmed);
    ret
}


#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_length_round_trip() {
        for length in [0usize, 1, 127, 128, 255, 256, 65535, 65536] {
            let mut encoded = Vec::new();
            encode_length(&mut encoded, length);
            let (decoded, rest) = try_decode_length(&encoded).unwrap();
            assert_eq!(decoded, length);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn test_length_rejects() {
        assert_eq!(try_decode_length(&[]), Err(LengthError::Truncated));
        assert_eq!(try_decode_length(&[0x80]), Err(LengthError::Indefinite));
        assert_eq!(try_decode_length(&[0x82, 0x01]), Err(LengthError::Truncated));
        assert_eq!(try_decode_length(&[0x81, 0x05]), Err(LengthError::NonMinimal));
        assert_eq!(try_decode_length(&[0x82, 0x00, 0x80]), Err(LengthError::NonMinimal));
        assert_eq!(try_decode_length(&[0x85, 1, 2, 3, 4, 5]), Err(LengthError::TooLarge));
    }

    #[test]
    fn test_oid_encoding() {
        let arcs = ArcOid::const_new(&[0, 4, 0, 127, 0, 7, 2, 2, 3, 2, 2]);
        let bytes = oid_to_der_bytes(arcs);
        assert_eq!(bytes, hex!("04 00 7F 00 07 02 02 03 02 02"));
        assert_eq!(der_bytes_to_arcs(&bytes).unwrap(), arcs.to_vec());

        let ec_public_key = ArcOid::const_new(&[1, 2, 840, 10045, 2, 1]);
        assert_eq!(oid_to_der_bytes(ec_public_key), hex!("2A 86 48 CE 3D 02 01"));
    }

    #[test]
    fn test_unsigned_integer_content() {
        assert_eq!(unsigned_integer_content(&[0x00, 0x00, 0x05]), vec![0x05]);
        assert_eq!(unsigned_integer_content(&[0x80]), vec![0x00, 0x80]);
        assert_eq!(unsigned_integer_content(&[]), vec![0x00]);
    }
}

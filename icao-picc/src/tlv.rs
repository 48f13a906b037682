//! BER-TLV data objects as used in ISO/IEC 7816-4 command and response payloads.
//!
//! A [`Tlv`] is either primitive (tag and raw value) or constructed (tag and an ordered list of
//! child objects). Which of the two a tag denotes is fixed by bit 6 of its first byte; the
//! constructors refuse combinations that would not survive an encode/decode cycle.
//!
//! Only the DER subset of BER is accepted when decoding (definite, minimally encoded lengths and
//! minimally encoded tags), so that decoding and re-encoding any accepted input reproduces it
//! byte for byte.


use std::fmt;

use crate::der_util::{encode_length, try_decode_length, LengthError};


/// The maximum number of constructed data objects that may enclose a data object when decoding.
pub const MAX_NESTING_DEPTH: usize = 32;


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Error {
    /// The input ended in the middle of a data object.
    Truncated,

    /// A length used the indefinite form.
    IndefiniteLength,

    /// A length was too large to be represented.
    LengthTooLarge,

    /// A length was not minimally encoded.
    NonMinimalLength,

    /// A multi-byte tag was not minimally encoded.
    NonMinimalTag,

    /// A tag consisted of more than four bytes.
    TagTooLong,

    /// Bytes remained after the expected data object(s).
    TrailingData,

    /// The constructed bit of the tag disagrees with the kind of data object being built.
    TagMismatch { tag: Tag },

    /// The value is not a valid tag encoding.
    InvalidTag { value: u32 },

    /// Constructed data objects were nested more than [`MAX_NESTING_DEPTH`] levels deep.
    NestingTooDeep,
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "data object is truncated"),
            Self::IndefiniteLength => write!(f, "indefinite length is not supported"),
            Self::LengthTooLarge => write!(f, "length is too large"),
            Self::NonMinimalLength => write!(f, "length is not minimally encoded"),
            Self::NonMinimalTag => write!(f, "tag is not minimally encoded"),
            Self::TagTooLong => write!(f, "tag is longer than four bytes"),
            Self::TrailingData => write!(f, "trailing data after data object"),
            Self::TagMismatch { tag } => write!(f, "tag {} does not match the kind of data object", tag),
            Self::InvalidTag { value } => write!(f, "0x{:X} is not a valid tag", value),
            Self::NestingTooDeep => write!(f, "data objects nested more than {} levels deep", MAX_NESTING_DEPTH),
        }
    }
}
impl std::error::Error for Error {
}
impl From<LengthError> for Error {
    fn from(value: LengthError) -> Self {
        match value {
            LengthError::Truncated => Self::Truncated,
            LengthError::Indefinite => Self::IndefiniteLength,
            LengthError::TooLarge => Self::LengthTooLarge,
            LengthError::NonMinimal => Self::NonMinimalLength,
        }
    }
}


/// The class of a tag (bits 8 and 7 of its first byte).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum TagClass {
    Universal,
    Application,
    ContextSpecific,
    Private,
}


/// A BER tag, stored as the big-endian interpretation of its encoded bytes (e.g. `0x7F49`).
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Tag(u32);
impl Tag {
    pub const INTEGER: Self = Self(0x02);
    pub const BIT_STRING: Self = Self(0x03);
    pub const OCTET_STRING: Self = Self(0x04);
    pub const OID: Self = Self(0x06);
    pub const SEQUENCE: Self = Self(0x30);
    pub const SET: Self = Self(0x31);

    pub const CONTEXT_80: Self = Self(0x80);
    pub const CONTEXT_81: Self = Self(0x81);
    pub const CONTEXT_82: Self = Self(0x82);
    pub const CONTEXT_84: Self = Self(0x84);
    pub const CONTEXT_86: Self = Self(0x86);

    /// Dynamic authentication data (General Authenticate).
    pub const DYNAMIC_AUTHENTICATION_DATA: Self = Self(0x7C);

    /// Public key template (ISO/IEC 7816-8 / BSI TR-03110).
    pub const PUBLIC_KEY: Self = Self(0x7F49);

    /// Secure Messaging: padding-content indicator followed by a cryptogram.
    pub const SM_CRYPTOGRAM: Self = Self(0x87);

    /// Secure Messaging: cryptographic checksum.
    pub const SM_CHECKSUM: Self = Self(0x8E);

    /// Secure Messaging: expected response length.
    pub const SM_LE: Self = Self(0x97);

    /// Secure Messaging: processing status.
    pub const SM_STATUS: Self = Self(0x99);

    /// Creates a tag from the big-endian interpretation of its encoding, verifying that the
    /// encoding is well-formed and minimal.
    pub fn new(value: u32) -> Result<Self, Error> {
        let bytes = Self(value).to_bytes();
        let (tag, rest) = Self::decode(&bytes)
            .map_err(|_| Error::InvalidTag { value })?;
        if !rest.is_empty() || tag.0 != value {
            return Err(Error::InvalidTag { value });
        }
        Ok(tag)
    }

    pub const fn value(&self) -> u32 { self.0 }

    fn first_byte(&self) -> u8 {
        self.to_bytes()[0]
    }

    pub fn class(&self) -> TagClass {
        match self.first_byte() >> 6 {
            0b00 => TagClass::Universal,
            0b01 => TagClass::Application,
            0b10 => TagClass::ContextSpecific,
            _ => TagClass::Private,
        }
    }

    pub fn is_constructed(&self) -> bool {
        self.first_byte() & 0b0010_0000 != 0
    }

    /// The encoded bytes of this tag.
    pub fn to_bytes(&self) -> Vec<u8> {
        let bytes = self.0.to_be_bytes();
        let first_significant = bytes.iter()
            .position(|b| *b != 0x00)
            .unwrap_or(bytes.len() - 1);
        bytes[first_significant..].to_vec()
    }

    /// Decodes a tag from the start of the input, returning it and the remaining input.
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), Error> {
        let Some(&first) = input.first() else {
            return Err(Error::Truncated);
        };
        let mut value = u32::from(first);
        let mut rest = &input[1..];
        if first & 0b0001_1111 != 0b0001_1111 {
            return Ok((Self(value), rest));
        }

        // subsequent bytes; bit 8 set means "more to come"
        let mut subsequent_count = 0;
        loop {
            let Some(&b) = rest.first() else {
                return Err(Error::Truncated);
            };
            if subsequent_count == 0 && (b == 0x80 || b < 0x1F) {
                // leading zero group, or a number that would have fit into the first byte
                return Err(Error::NonMinimalTag);
            }
            subsequent_count += 1;
            if subsequent_count > 3 {
                return Err(Error::TagTooLong);
            }
            value = (value << 8) | u32::from(b);
            rest = &rest[1..];
            if b & 0b1000_0000 == 0 {
                break;
            }
        }
        Ok((Self(value), rest))
    }
}
impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag(0x{:02X})", self.0)
    }
}
impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", self.0)
    }
}


/// A BER-TLV data object.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Tlv {
    Primitive {
        tag: Tag,
        value: Vec<u8>,
    },
    Constructed {
        tag: Tag,
        children: Vec<Tlv>,
    },
}
impl Tlv {
    /// Creates a primitive data object. Fails if the tag is marked as constructed.
    pub fn primitive(tag: Tag, value: impl Into<Vec<u8>>) -> Result<Self, Error> {
        if tag.is_constructed() {
            return Err(Error::TagMismatch { tag });
        }
        Ok(Self::Primitive { tag, value: value.into() })
    }

    /// Creates a constructed data object. Fails if the tag is marked as primitive.
    pub fn constructed(tag: Tag, children: Vec<Tlv>) -> Result<Self, Error> {
        if !tag.is_constructed() {
            return Err(Error::TagMismatch { tag });
        }
        Ok(Self::Constructed { tag, children })
    }

    pub fn tag(&self) -> Tag {
        match self {
            Self::Primitive { tag, .. } => *tag,
            Self::Constructed { tag, .. } => *tag,
        }
    }

    /// The value of a primitive data object; `None` for constructed ones.
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            Self::Primitive { value, .. } => Some(value.as_slice()),
            Self::Constructed { .. } => None,
        }
    }

    /// The children of a constructed data object; empty for primitive ones.
    pub fn children(&self) -> &[Tlv] {
        match self {
            Self::Primitive { .. } => &[],
            Self::Constructed { children, .. } => children.as_slice(),
        }
    }

    /// Finds a descendant by following the given path of tags, starting with this object's
    /// children.
    ///
    /// At each level, the first child with the matching tag is taken.
    pub fn find(&self, path: &[Tag]) -> Option<&Tlv> {
        find_in(self.children(), path)
    }

    /// The encoded value field (children concatenated for constructed objects).
    pub fn value_bytes(&self) -> Vec<u8> {
        match self {
            Self::Primitive { value, .. } => value.clone(),
            Self::Constructed { children, .. } => {
                let mut ret = Vec::new();
                for child in children {
                    child.write_bytes(&mut ret);
                }
                ret
            },
        }
    }

    /// Appends the encoding of this data object to `output`.
    pub fn write_bytes(&self, output: &mut Vec<u8>) {
        output.extend(self.tag().to_bytes());
        let value = self.value_bytes();
        encode_length(output, value.len());
        output.extend(value);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut ret = Vec::new();
        self.write_bytes(&mut ret);
        ret
    }

    /// Decodes exactly one data object spanning the whole input.
    pub fn parse(input: &[u8]) -> Result<Self, Error> {
        let (tlv, rest) = Self::parse_prefix(input)?;
        if !rest.is_empty() {
            return Err(Error::TrailingData);
        }
        Ok(tlv)
    }

    /// Decodes one data object from the start of the input, returning it and the remaining input.
    pub fn parse_prefix(input: &[u8]) -> Result<(Self, &[u8]), Error> {
        Self::parse_prefix_at_depth(input, 0)
    }

    fn parse_prefix_at_depth(input: &[u8], depth: usize) -> Result<(Self, &[u8]), Error> {
        let (tag, after_tag) = Tag::decode(input)?;
        let (length, after_length) = try_decode_length(after_tag)?;
        if length > after_length.len() {
            return Err(Error::Truncated);
        }
        let (value, rest) = after_length.split_at(length);

        let tlv = if tag.is_constructed() {
            if depth >= MAX_NESTING_DEPTH {
                return Err(Error::NestingTooDeep);
            }
            Self::Constructed {
                tag,
                children: parse_all_at_depth(value, depth + 1)?,
            }
        } else {
            Self::Primitive {
                tag,
                value: value.to_vec(),
            }
        };
        Ok((tlv, rest))
    }
}
impl fmt::Display for Tlv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive { tag, value } => {
                write!(f, "{}:", tag)?;
                for b in value {
                    write!(f, "{:02X}", b)?;
                }
                Ok(())
            },
            Self::Constructed { tag, children } => {
                write!(f, "{}[", tag)?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, "]")
            },
        }
    }
}


/// Decodes a concatenation of data objects spanning the whole input.
pub fn parse_all(input: &[u8]) -> Result<Vec<Tlv>, Error> {
    parse_all_at_depth(input, 0)
}

fn parse_all_at_depth(mut input: &[u8], depth: usize) -> Result<Vec<Tlv>, Error> {
    let mut ret = Vec::new();
    while !input.is_empty() {
        let (tlv, rest) = Tlv::parse_prefix_at_depth(input, depth)?;
        ret.push(tlv);
        input = rest;
    }
    Ok(ret)
}


/// Encodes a concatenation of data objects.
pub fn serialize_all(objects: &[Tlv]) -> Vec<u8> {
    let mut ret = Vec::new();
    for object in objects {
        object.write_bytes(&mut ret);
    }
    ret
}


/// Finds a data object in a list of objects by following the given path of tags.
///
/// The first tag is matched against the objects in the list, each further tag against the children
/// of the previous match. An empty path never matches.
pub fn find_in<'t>(objects: &'t [Tlv], path: &[Tag]) -> Option<&'t Tlv> {
    let (first, rest) = path.split_first()?;
    let found = objects.iter().find(|o| o.tag() == *first)?;
    if rest.is_empty() {
        Some(found)
    } else {
        find_in(found.children(), rest)
    }
}

//! Byte-valued object identifiers.
//!
//! Card objects and protocol selectors carry object identifiers as the raw DER content bytes
//! (without tag and length). Keeping them as bytes makes prefix matching against a generic
//! protocol family (e.g. "any `id-CA-ECDH` variant") a plain slice comparison.


use std::fmt;

use rasn::types::Oid as ArcOid;

use crate::der_util::{der_bytes_to_arcs, oid_to_der_bytes};


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Error {
    /// An object identifier must consist of at least one byte.
    Empty,
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "object identifier is empty"),
        }
    }
}
impl std::error::Error for Error {
}


/// An object identifier, represented by its DER content bytes.
///
/// Equality, ordering and hashing only consider the bytes.
#[derive(Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Oid(Vec<u8>);
impl Oid {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.is_empty() {
            return Err(Error::Empty);
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Converts an object identifier given as arcs.
    pub fn from_arcs(arcs: &ArcOid) -> Self {
        // the first two arcs always occupy at least one byte
        Self(oid_to_der_bytes(arcs))
    }

    pub fn as_bytes(&self) -> &[u8] { &self.0 }

    pub fn len(&self) -> usize { self.0.len() }

    /// Whether this object identifier begins with the bytes of `prefix`.
    ///
    /// An empty prefix matches every object identifier.
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.0.starts_with(prefix)
    }

    /// Whether `generic` is a prefix of this object identifier.
    pub fn specializes(&self, generic: &Oid) -> bool {
        self.starts_with(generic.as_bytes())
    }

    /// The arcs of this object identifier, if its bytes are a valid encoding.
    pub fn arcs(&self) -> Option<Vec<u32>> {
        der_bytes_to_arcs(&self.0)
    }
}
impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}
impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.arcs() {
            Some(arcs) => {
                for (i, arc) in arcs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", arc)?;
                }
                Ok(())
            },
            None => {
                // not a valid encoding; show the raw bytes instead
                write!(f, "#")?;
                for b in &self.0 {
                    write!(f, "{:02X}", b)?;
                }
                Ok(())
            },
        }
    }
}
impl TryFrom<&[u8]> for Oid {
    type Error = Error;
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> { Self::from_bytes(value) }
}
impl AsRef<[u8]> for Oid {
    fn as_ref(&self) -> &[u8] { &self.0 }
}

//! Cryptographic functionality.


pub mod cipher_mac;
pub mod dh;
pub mod elliptic;
pub mod kdf;


use std::fmt;

use crypto_bigint::BoxedUint;
use digest::Digest;
use rand::{CryptoRng, RngCore};
use sha1::Sha1;
use tracing::trace;
use zeroize::Zeroizing;
use zeroize_derive::ZeroizeOnDrop;

use crate::crypt::dh::ModularGroup;
use crate::crypt::elliptic::{AffinePoint, PrimeWeierstrassCurve};
use crate::der_util::unsigned_integer_content;
use crate::oid::Oid;
use crate::oids;
use crate::tlv::{self, Tag, Tlv};


/// An error during a key operation.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum KeyError {
    /// The key material does not describe a valid key for the domain parameters.
    MalformedKeyMaterial,

    /// The operation cannot be performed with the given combination of parameters and keys.
    UnsupportedOperation(&'static str),
}
impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedKeyMaterial => write!(f, "malformed key material"),
            Self::UnsupportedOperation(what) => write!(f, "unsupported operation: {}", what),
        }
    }
}
impl std::error::Error for KeyError {
}
impl From<tlv::Error> for KeyError {
    fn from(_value: tlv::Error) -> Self {
        Self::UnsupportedOperation("data object construction failed")
    }
}


/// The family of a key agreement algorithm.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum KeyAgreement {
    DiffieHellman,
    EllipticCurveDiffieHellman,
}
impl KeyAgreement {
    pub fn algorithm_name(&self) -> &'static str {
        match self {
            Self::DiffieHellman => "DH",
            Self::EllipticCurveDiffieHellman => "ECDH",
        }
    }
}


/// A public key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PublicKey {
    /// The public value `y = g**x mod p` of classic Diffie-Hellman.
    DiffieHellman(BoxedUint),

    /// A point on an elliptic curve.
    EllipticCurve(AffinePoint),
}


/// A private key (a scalar for elliptic curves, an exponent for classic Diffie-Hellman).
#[derive(Clone, ZeroizeOnDrop)]
pub struct PrivateKey(BoxedUint);
impl PrivateKey {
    /// Decodes a private key from its big-endian representation.
    pub fn from_be_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }
        let bits = u32::try_from(8 * bytes.len()).ok()?;
        let value = BoxedUint::from_be_slice(bytes, bits).ok()?;
        if bool::from(value.is_zero()) {
            return None;
        }
        Some(Self(value))
    }

    pub(crate) fn as_uint(&self) -> &BoxedUint { &self.0 }
}
impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrivateKey")
            .field(&"<redacted>")
            .finish()
    }
}


/// The domain parameters of a key agreement algorithm.
///
/// For classic Diffie-Hellman, public keys and shared secrets are unsigned integers serialized in
/// big-endian byte order with the same length as the prime.
///
/// For elliptic-curve Diffie-Hellman, public keys are points serialized in uncompressed form:
/// 1. the byte `0x04` to signify uncompressed coordinates
/// 2. the x coordinate as an unsigned integer in big-endian byte order
/// 3. the y coordinate as an unsigned integer in big-endian byte order
/// Both coordinates are encoded with the same length as the prime. The shared secret is the x
/// coordinate of the resulting point, encoded the same way.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DomainParameters {
    DiffieHellman(ModularGroup),
    PrimeWeierstrassEllipticDiffieHellman(PrimeWeierstrassCurve),
}
impl DomainParameters {
    pub fn key_agreement(&self) -> KeyAgreement {
        match self {
            Self::DiffieHellman(_) => KeyAgreement::DiffieHellman,
            Self::PrimeWeierstrassEllipticDiffieHellman(_) => KeyAgreement::EllipticCurveDiffieHellman,
        }
    }

    /// The name of the key agreement algorithm, e.g. for logging.
    pub fn key_agreement_algorithm(&self) -> &'static str {
        self.key_agreement().algorithm_name()
    }

    /// The identifier of these parameters among the standardized domain parameters, if they are
    /// one of them.
    pub fn standardized_id(&self) -> Option<u8> {
        match self {
            Self::DiffieHellman(group) => dh::standardized_id(group),
            Self::PrimeWeierstrassEllipticDiffieHellman(curve) => elliptic::curves::standardized_id(curve),
        }
    }

    /// Reconstructs a public key from its raw encoding.
    pub fn reconstruct_public_key(&self, bytes: &[u8]) -> Result<PublicKey, KeyError> {
        match self {
            Self::DiffieHellman(group) => group.decode_public_key(bytes)
                .map(PublicKey::DiffieHellman)
                .ok_or(KeyError::MalformedKeyMaterial),
            Self::PrimeWeierstrassEllipticDiffieHellman(curve) => curve.decode_point(bytes)
                .map(PublicKey::EllipticCurve)
                .ok_or(KeyError::MalformedKeyMaterial),
        }
    }

    /// Encodes a public key into its raw encoding.
    pub fn encode_public_key(&self, public_key: &PublicKey) -> Result<Vec<u8>, KeyError> {
        match (self, public_key) {
            (Self::DiffieHellman(group), PublicKey::DiffieHellman(y)) => {
                fixed_width_be_bytes(y, group.prime_len_bytes())
                    .map(|b| b.to_vec())
                    .ok_or(KeyError::MalformedKeyMaterial)
            },
            (Self::PrimeWeierstrassEllipticDiffieHellman(curve), PublicKey::EllipticCurve(point)) => {
                curve.encode_point(point)
                    .map(|b| b.to_vec())
                    .ok_or(KeyError::MalformedKeyMaterial)
            },
            _ => Err(KeyError::UnsupportedOperation("public key does not belong to domain parameters")),
        }
    }

    /// Computes the compressed representation of a public key.
    ///
    /// For elliptic curves, this is the x coordinate; for classic Diffie-Hellman, the SHA-1 hash of
    /// the public value.
    pub fn compress(&self, public_key: &PublicKey) -> Result<Vec<u8>, KeyError> {
        match (self, public_key) {
            (Self::DiffieHellman(group), PublicKey::DiffieHellman(y)) => {
                let encoded = fixed_width_be_bytes(y, group.prime_len_bytes())
                    .ok_or(KeyError::MalformedKeyMaterial)?;
                Ok(Sha1::digest(encoded.as_slice()).to_vec())
            },
            (Self::PrimeWeierstrassEllipticDiffieHellman(curve), PublicKey::EllipticCurve(point)) => {
                fixed_width_be_bytes(point.x(), curve.field_len_bytes())
                    .map(|b| b.to_vec())
                    .ok_or(KeyError::MalformedKeyMaterial)
            },
            _ => Err(KeyError::UnsupportedOperation("public key does not belong to domain parameters")),
        }
    }

    /// Calculates the public key belonging to the given private key.
    pub fn calculate_public_key(&self, private_key: &PrivateKey) -> Result<PublicKey, KeyError> {
        match self {
            Self::DiffieHellman(group) => group.calculate_public_key(private_key.as_uint())
                .map(PublicKey::DiffieHellman)
                .ok_or(KeyError::MalformedKeyMaterial),
            Self::PrimeWeierstrassEllipticDiffieHellman(curve) => curve.calculate_public_key(private_key.as_uint())
                .map(PublicKey::EllipticCurve)
                .ok_or(KeyError::MalformedKeyMaterial),
        }
    }

    /// Generates a random private key.
    ///
    /// The key is drawn from integers at least one byte shorter than the group order, so it is
    /// always smaller than the order.
    pub fn generate_private_key<R: CryptoRng + RngCore>(&self, rng: &mut R) -> Result<PrivateKey, KeyError> {
        let order = match self {
            Self::DiffieHellman(group) => group.order(),
            Self::PrimeWeierstrassEllipticDiffieHellman(curve) => curve.order(),
        };
        let length = usize::try_from(order.bits().saturating_sub(1) / 8)
            .map_err(|_| KeyError::UnsupportedOperation("group order too large"))?;
        if length == 0 {
            return Err(KeyError::UnsupportedOperation("group order too small"));
        }

        let mut bytes = Zeroizing::new(vec![0u8; length]);
        loop {
            rng.fill_bytes(&mut bytes);
            if let Some(private_key) = PrivateKey::from_be_slice(&bytes) {
                return Ok(private_key);
            }
        }
    }

    /// Performs the key agreement between our private key and the other party's public key,
    /// returning the shared secret.
    pub fn agree(&self, private_key: &PrivateKey, other_public_key: &PublicKey) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        let secret = match (self, other_public_key) {
            (Self::DiffieHellman(group), PublicKey::DiffieHellman(y)) => {
                group.diffie_hellman(private_key.as_uint(), y)
                    .ok_or(KeyError::MalformedKeyMaterial)?
            },
            (Self::PrimeWeierstrassEllipticDiffieHellman(curve), PublicKey::EllipticCurve(point)) => {
                let shared_point = curve.diffie_hellman(private_key.as_uint(), point)
                    .ok_or(KeyError::MalformedKeyMaterial)?;
                fixed_width_be_bytes(shared_point.x(), curve.field_len_bytes())
                    .ok_or(KeyError::UnsupportedOperation("shared secret exceeds field length"))?
            },
            _ => return Err(KeyError::UnsupportedOperation("public key does not belong to domain parameters")),
        };
        trace!("{} shared secret: {}", self.key_agreement_algorithm(), crate::hex(&secret));
        Ok(secret)
    }

    /// The data object carrying a public key within a public key template (tag `0x7F49`).
    pub fn public_key_data_object(&self, public_key: &PublicKey) -> Result<Tlv, KeyError> {
        let encoded = self.encode_public_key(public_key)?;
        let tag = match self {
            Self::DiffieHellman(_) => Tag::CONTEXT_84, // Diffie-Hellman public value
            Self::PrimeWeierstrassEllipticDiffieHellman(_) => Tag::CONTEXT_86, // elliptic curve point
        };
        Ok(Tlv::primitive(tag, encoded)?)
    }

    /// The algorithm identifier of these domain parameters.
    ///
    /// Standardized domain parameters are referenced by their identifier; all others are encoded
    /// explicitly.
    pub fn algorithm_identifier(&self) -> Result<Tlv, KeyError> {
        if let Some(id) = self.standardized_id() {
            return Ok(Tlv::constructed(Tag::SEQUENCE, vec![
                Tlv::primitive(Tag::OID, Oid::from_arcs(oids::STANDARDIZED_DOMAIN_PARAMETERS).as_bytes())?,
                Tlv::primitive(Tag::INTEGER, unsigned_integer_content(&[id]))?,
            ])?);
        }

        match self {
            Self::DiffieHellman(group) => group.explicit_algorithm_identifier(),
            Self::PrimeWeierstrassEllipticDiffieHellman(curve) => curve.explicit_algorithm_identifier(),
        }
    }

    /// The `subjectPublicKey` BIT STRING of a SubjectPublicKeyInfo structure.
    pub fn subject_public_key(&self, public_key: &PublicKey) -> Result<Tlv, KeyError> {
        let encoded = self.encode_public_key(public_key)?;
        let key_bytes = match self {
            Self::DiffieHellman(_) => {
                // the public value is wrapped into an INTEGER
                Tlv::primitive(Tag::INTEGER, unsigned_integer_content(&encoded))?
                    .to_bytes()
            },
            Self::PrimeWeierstrassEllipticDiffieHellman(_) => encoded,
        };

        // no unused bits
        let mut bit_string = Vec::with_capacity(key_bytes.len() + 1);
        bit_string.push(0x00);
        bit_string.extend(key_bytes);
        Ok(Tlv::primitive(Tag::BIT_STRING, bit_string)?)
    }
}


/// A long-term key pair of the chip.
#[derive(Clone, Debug)]
pub struct StaticKeyPair {
    domain_parameters: DomainParameters,
    private_key: PrivateKey,
    public_key: PublicKey,
}
impl StaticKeyPair {
    /// Creates a key pair from domain parameters and a private key, calculating the public key.
    pub fn new(domain_parameters: DomainParameters, private_key: PrivateKey) -> Result<Self, KeyError> {
        let public_key = domain_parameters.calculate_public_key(&private_key)?;
        Ok(Self {
            domain_parameters,
            private_key,
            public_key,
        })
    }

    /// Creates a key pair from domain parameters and the big-endian bytes of a private key.
    pub fn from_private_key_bytes(domain_parameters: DomainParameters, private_key: &[u8]) -> Result<Self, KeyError> {
        let private_key = PrivateKey::from_be_slice(private_key)
            .ok_or(KeyError::MalformedKeyMaterial)?;
        Self::new(domain_parameters, private_key)
    }

    pub fn domain_parameters(&self) -> &DomainParameters { &self.domain_parameters }
    pub fn private_key(&self) -> &PrivateKey { &self.private_key }
    pub fn public_key(&self) -> &PublicKey { &self.public_key }
}


/// Decodes an unsigned big-endian integer with the given precision.
///
/// Returns `None` if the slice is empty or the value does not fit.
pub fn boxed_uint_from_be_slice(slice: &[u8], bits_precision: u32) -> Option<BoxedUint> {
    if slice.is_empty() {
        return None;
    }
    let first_significant = slice.iter()
        .position(|b| *b != 0x00)
        .unwrap_or(slice.len());
    let trimmed = &slice[first_significant..];
    if trimmed.is_empty() {
        return Some(BoxedUint::zero_with_precision(bits_precision));
    }
    let needed_bytes = usize::try_from(bits_precision.div_ceil(8)).ok()?;
    if trimmed.len() > needed_bytes {
        return None;
    }
    BoxedUint::from_be_slice(trimmed, bits_precision).ok()
}


/// Encodes an unsigned integer in big-endian byte order with exactly the given width.
///
/// Returns `None` if the value does not fit.
pub fn fixed_width_be_bytes(value: &BoxedUint, width: usize) -> Option<Zeroizing<Vec<u8>>> {
    let raw = Zeroizing::new(value.to_be_bytes());
    let first_significant = raw.iter()
        .position(|b| *b != 0x00)
        .unwrap_or(raw.len());
    let significant = &raw[first_significant..];
    if significant.len() > width {
        return None;
    }
    let mut ret = Zeroizing::new(vec![0u8; width]);
    ret[width - significant.len()..].copy_from_slice(significant);
    Some(ret)
}

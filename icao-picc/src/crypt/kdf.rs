//! Key Derivation Function for session keys.


use digest::Digest;
use sha1::Sha1;
use sha2::Sha256;
use zeroize::Zeroizing;


/// Counter value when deriving an encryption key.
pub const ENCRYPTION_COUNTER: u32 = 1;

/// Counter value when deriving a MAC key.
pub const MAC_COUNTER: u32 = 2;


/// The key derivation function for a given symmetric key length.
///
/// The KDF is equivalent to:
/// ```plain
/// keydata = hash(secret || nonce || counter)[0..key_length]
/// ```
/// where `counter` is a 32-bit big-endian integer and `hash` is SHA-1 for key lengths up to 16
/// bytes (3DES, AES-128) and SHA-256 otherwise (AES-192, AES-256).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Kdf {
    key_length: usize,
}
impl Kdf {
    /// Creates a key derivation function for keys of the given length in bytes.
    ///
    /// Returns `None` if the key length is zero or exceeds the output of SHA-256.
    pub fn new(key_length: usize) -> Option<Self> {
        if key_length == 0 || key_length > 32 {
            None
        } else {
            Some(Self { key_length })
        }
    }

    pub fn key_length(&self) -> usize { self.key_length }

    /// The key derivation function itself.
    pub fn derive(&self, secret: &[u8], nonce: &[u8], counter: u32) -> Zeroizing<Vec<u8>> {
        let digest = if self.key_length <= 16 {
            let mut hasher = Sha1::new();
            hasher.update(secret);
            hasher.update(nonce);
            hasher.update(counter.to_be_bytes());
            Zeroizing::new(hasher.finalize().to_vec())
        } else {
            let mut hasher = Sha256::new();
            hasher.update(secret);
            hasher.update(nonce);
            hasher.update(counter.to_be_bytes());
            Zeroizing::new(hasher.finalize().to_vec())
        };
        Zeroizing::new(digest[0..self.key_length].to_vec())
    }

    /// The key derivation function for encryption purposes.
    pub fn derive_encryption_key(&self, secret: &[u8], nonce: &[u8]) -> Zeroizing<Vec<u8>> {
        self.derive(secret, nonce, ENCRYPTION_COUNTER)
    }

    /// The key derivation function for message authentication purposes.
    pub fn derive_mac_key(&self, secret: &[u8], nonce: &[u8]) -> Zeroizing<Vec<u8>> {
        self.derive(secret, nonce, MAC_COUNTER)
    }
}

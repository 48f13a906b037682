//! Cipher and MAC (message authentication code) combinations.


use std::fmt;

use aes::{Aes128, Aes192, Aes256};
use block_padding::NoPadding;
use cipher::{BlockCipher, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit};
use cmac::Cmac;
use des::TdesEde2;
use digest::Mac;
use retail_mac::RetailMac;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;


/// An error during a cipher or MAC operation.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Error {
    /// The key or IV does not have the length required by the algorithm.
    InvalidKeyLength,

    /// The data is not a nonzero multiple of the block size.
    InvalidBlockAlignment,
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyLength => write!(f, "invalid key or IV length"),
            Self::InvalidBlockAlignment => write!(f, "data is not aligned to the block size"),
        }
    }
}
impl std::error::Error for Error {
}


/// The symmetric cipher suites that can be negotiated via Chip Authentication.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum CipherSuite {
    TripleDesCbcCbc,
    AesCbcCmac128,
    AesCbcCmac192,
    AesCbcCmac256,
}
impl CipherSuite {
    /// The implementation of this suite.
    pub fn cipher_and_mac(&self) -> &'static dyn CipherAndMac {
        match self {
            Self::TripleDesCbcCbc => &Cam3Des,
            Self::AesCbcCmac128 => &CamAes128,
            Self::AesCbcCmac192 => &CamAes192,
            Self::AesCbcCmac256 => &CamAes256,
        }
    }

    /// Length of the session keys in bytes.
    pub fn key_length(&self) -> usize {
        self.cipher_and_mac().cipher_key_size()
    }
}
impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TripleDesCbcCbc => write!(f, "3DES-CBC-CBC"),
            Self::AesCbcCmac128 => write!(f, "AES-CBC-CMAC-128"),
            Self::AesCbcCmac192 => write!(f, "AES-CBC-CMAC-192"),
            Self::AesCbcCmac256 => write!(f, "AES-CBC-CMAC-256"),
        }
    }
}


/// A combination of cipher and MAC usable during authentication and Secure Messaging.
pub trait CipherAndMac: fmt::Debug + Send + Sync {
    /// Size of the cipher key in bytes.
    fn cipher_key_size(&self) -> usize;

    /// Block size of the cipher in bytes.
    fn cipher_block_size(&self) -> usize;

    /// Block size of the MAC in bytes.
    ///
    /// If this is greater than 1, data must be padded before being passed to
    /// [`CipherAndMac::mac_padded_data`].
    fn mac_block_size(&self) -> usize;

    /// Decrypts data in-place using the given key and CBC IV.
    ///
    /// Does not strip padding.
    fn decrypt_padded_data(&self, data: &mut [u8], key: &[u8], iv: &[u8]) -> Result<(), Error>;

    /// Encrypts pre-padded data in-place using the given key and CBC IV.
    fn encrypt_padded_data(&self, data: &mut [u8], key: &[u8], iv: &[u8]) -> Result<(), Error>;

    /// Generates an 8-byte MAC (message authentication code) for the given pre-padded data and key.
    fn mac_padded_data(&self, data: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error>;

    /// Verifies whether the given data fits the given MAC (message authentication code).
    fn verify_mac_padded_data(&self, data: &[u8], key: &[u8], expected_mac: &[u8]) -> Result<bool, Error> {
        let computed_mac = self.mac_padded_data(data, key)?;
        Ok(computed_mac.as_slice().ct_eq(expected_mac).into())
    }

    /// Pads the data as required by the MAC and calculates the MAC.
    fn mac_data(&self, data: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        if self.mac_block_size() > 1 {
            let padded = pad_iso9797_m2(data, self.mac_block_size());
            self.mac_padded_data(&padded, key)
        } else {
            self.mac_padded_data(data, key)
        }
    }
}


/// Pads data using ISO/IEC 9797-1 padding method 2: a single 1 bit, then as many 0 bits as
/// necessary to reach a multiple of the block size.
pub fn pad_iso9797_m2(data: &[u8], block_size: usize) -> Vec<u8> {
    let padded_length = (data.len() / block_size + 1) * block_size;
    let mut ret = Vec::with_capacity(padded_length);
    ret.extend_from_slice(data);
    ret.push(0x80);
    ret.resize(padded_length, 0x00);
    ret
}


fn cbc_encrypt<C>(data: &mut [u8], key: &[u8], iv: &[u8]) -> Result<(), Error>
    where C: BlockEncryptMut + BlockCipher + KeyInit {
    let encryptor = cbc::Encryptor::<C>::new_from_slices(key, iv)
        .map_err(|_| Error::InvalidKeyLength)?;
    let data_length = data.len();
    encryptor.encrypt_padded_mut::<NoPadding>(data, data_length)
        .map_err(|_| Error::InvalidBlockAlignment)?;
    Ok(())
}

fn cbc_decrypt<C>(data: &mut [u8], key: &[u8], iv: &[u8]) -> Result<(), Error>
    where C: BlockDecryptMut + BlockCipher + KeyInit {
    let decryptor = cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|_| Error::InvalidKeyLength)?;
    decryptor.decrypt_padded_mut::<NoPadding>(data)
        .map_err(|_| Error::InvalidBlockAlignment)?;
    Ok(())
}

fn check_alignment(data: &[u8], block_size: usize) -> Result<(), Error> {
    if data.is_empty() || data.len() % block_size != 0 {
        Err(Error::InvalidBlockAlignment)
    } else {
        Ok(())
    }
}


/// 3DES-based cipher and MAC.
///
/// 3DES is used in EDE two-key mode:
/// ```plain
/// encrypt((K1, K2), D) = encrypt(K1, decrypt(K2, encrypt(K1, D)))
/// ```
/// The block mode of operation is Cipher Block Chaining (CBC).
///
/// The MAC is Retail MAC (ISO/IEC 9797-1 algorithm 3) with DES, zero IV and padding method 2 (bit 1
/// and then as many zero bits as necessary).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Cam3Des;
impl CipherAndMac for Cam3Des {
    fn cipher_key_size(&self) -> usize { 16 }
    fn cipher_block_size(&self) -> usize { 8 }
    fn mac_block_size(&self) -> usize { 8 }

    fn decrypt_padded_data(&self, data: &mut [u8], key: &[u8], iv: &[u8]) -> Result<(), Error> {
        check_alignment(data, self.cipher_block_size())?;
        cbc_decrypt::<TdesEde2>(data, key, iv)
    }

    fn encrypt_padded_data(&self, data: &mut [u8], key: &[u8], iv: &[u8]) -> Result<(), Error> {
        check_alignment(data, self.cipher_block_size())?;
        cbc_encrypt::<TdesEde2>(data, key, iv)
    }

    fn mac_padded_data(&self, data: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        if key.len() != self.cipher_key_size() {
            return Err(Error::InvalidKeyLength);
        }
        check_alignment(data, self.mac_block_size())?;

        let mut retail_mac = <RetailMac<des09::Des> as retail_mac::KeyInit>::new_from_slice(key)
            .map_err(|_| Error::InvalidKeyLength)?;
        retail_mac::Mac::update(&mut retail_mac, data);
        Ok(Zeroizing::new(retail_mac::Mac::finalize(retail_mac).into_bytes().to_vec()))
    }

    fn verify_mac_padded_data(&self, data: &[u8], key: &[u8], expected_mac: &[u8]) -> Result<bool, Error> {
        if key.len() != self.cipher_key_size() {
            return Err(Error::InvalidKeyLength);
        }
        check_alignment(data, self.mac_block_size())?;

        let mut retail_mac = <RetailMac<des09::Des> as retail_mac::KeyInit>::new_from_slice(key)
            .map_err(|_| Error::InvalidKeyLength)?;
        retail_mac::Mac::update(&mut retail_mac, data);
        Ok(retail_mac::Mac::verify_slice(retail_mac, expected_mac).is_ok())
    }
}


/// Truncates a full CMAC value to the initial 8 bytes.
fn truncate_cmac(full_mac: &[u8]) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(full_mac[0..8].to_vec())
}


/// AES-128-based cipher and MAC.
///
/// The block mode of operation is Cipher Block Chaining (CBC).
///
/// The MAC is CMAC with AES-128 truncated to the initial 8 bytes.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CamAes128;
impl CipherAndMac for CamAes128 {
    fn cipher_key_size(&self) -> usize { 16 }
    fn cipher_block_size(&self) -> usize { 16 }
    fn mac_block_size(&self) -> usize { 1 }

    fn decrypt_padded_data(&self, data: &mut [u8], key: &[u8], iv: &[u8]) -> Result<(), Error> {
        check_alignment(data, self.cipher_block_size())?;
        cbc_decrypt::<Aes128>(data, key, iv)
    }

    fn encrypt_padded_data(&self, data: &mut [u8], key: &[u8], iv: &[u8]) -> Result<(), Error> {
        check_alignment(data, self.cipher_block_size())?;
        cbc_encrypt::<Aes128>(data, key, iv)
    }

    fn mac_padded_data(&self, data: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        let mut mac = <Cmac<Aes128> as KeyInit>::new_from_slice(key)
            .map_err(|_| Error::InvalidKeyLength)?;
        Mac::update(&mut mac, data);
        let full_mac = Zeroizing::new(mac.finalize().into_bytes().to_vec());
        Ok(truncate_cmac(&full_mac))
    }
}


/// AES-192-based cipher and MAC.
///
/// The block mode of operation is Cipher Block Chaining (CBC).
///
/// The MAC is CMAC with AES-192 truncated to the initial 8 bytes.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CamAes192;
impl CipherAndMac for CamAes192 {
    fn cipher_key_size(&self) -> usize { 24 }
    fn cipher_block_size(&self) -> usize { 16 }
    fn mac_block_size(&self) -> usize { 1 }

    fn decrypt_padded_data(&self, data: &mut [u8], key: &[u8], iv: &[u8]) -> Result<(), Error> {
        check_alignment(data, self.cipher_block_size())?;
        cbc_decrypt::<Aes192>(data, key, iv)
    }

    fn encrypt_padded_data(&self, data: &mut [u8], key: &[u8], iv: &[u8]) -> Result<(), Error> {
        check_alignment(data, self.cipher_block_size())?;
        cbc_encrypt::<Aes192>(data, key, iv)
    }

    fn mac_padded_data(&self, data: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        let mut mac = <Cmac<Aes192> as KeyInit>::new_from_slice(key)
            .map_err(|_| Error::InvalidKeyLength)?;
        Mac::update(&mut mac, data);
        let full_mac = Zeroizing::new(mac.finalize().into_bytes().to_vec());
        Ok(truncate_cmac(&full_mac))
    }
}


/// AES-256-based cipher and MAC.
///
/// The block mode of operation is Cipher Block Chaining (CBC).
///
/// The MAC is CMAC with AES-256 truncated to the initial 8 bytes.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CamAes256;
impl CipherAndMac for CamAes256 {
    fn cipher_key_size(&self) -> usize { 32 }
    fn cipher_block_size(&self) -> usize { 16 }
    fn mac_block_size(&self) -> usize { 1 }

    fn decrypt_padded_data(&self, data: &mut [u8], key: &[u8], iv: &[u8]) -> Result<(), Error> {
        check_alignment(data, self.cipher_block_size())?;
        cbc_decrypt::<Aes256>(data, key, iv)
    }

    fn encrypt_padded_data(&self, data: &mut [u8], key: &[u8], iv: &[u8]) -> Result<(), Error> {
        check_alignment(data, self.cipher_block_size())?;
        cbc_encrypt::<Aes256>(data, key, iv)
    }

    fn mac_padded_data(&self, data: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        let mut mac = <Cmac<Aes256> as KeyInit>::new_from_slice(key)
            .map_err(|_| Error::InvalidKeyLength)?;
        Mac::update(&mut mac, data);
        let full_mac = Zeroizing::new(mac.finalize().into_bytes().to_vec());
        Ok(truncate_cmac(&full_mac))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_padding() {
        assert_eq!(pad_iso9797_m2(&[], 8), hex!("80 00 00 00 00 00 00 00"));
        assert_eq!(pad_iso9797_m2(&hex!("01 02 03"), 8), hex!("01 02 03 80 00 00 00 00"));
        assert_eq!(
            pad_iso9797_m2(&hex!("01 02 03 04 05 06 07 08"), 8),
            hex!("01 02 03 04 05 06 07 08 80 00 00 00 00 00 00 00"),
        );
    }

    #[test]
    fn test_retail_mac_icao_doc9303_part11_appendix_d4() {
        let key = hex!("F1CB1F1F B5ADF208 806B89DC 579DC1F8");
        let mac = Cam3Des.mac_data(&hex!("887022120C06C2270CA4020C800000008709016375432908C044F6"), &key).unwrap();
        assert_eq!(mac.as_slice(), &hex!("BF8B92D635FF24F8"));

        let mac = Cam3Des.mac_data(&hex!("887022120C06C22899029000"), &key).unwrap();
        assert_eq!(mac.as_slice(), &hex!("FA855A5D4C50A8ED"));

        let padded = pad_iso9797_m2(&hex!("887022120C06C22899029000"), 8);
        assert!(Cam3Des.verify_mac_padded_data(&padded, &key, &hex!("FA855A5D4C50A8ED")).unwrap());
        assert!(!Cam3Des.verify_mac_padded_data(&padded, &key, &hex!("FA855A5D4C50A8EE")).unwrap());
        assert!(!Cam3Des.verify_mac_padded_data(&padded, &key, &hex!("FA855A5D4C50A8")).unwrap());
    }

    #[test]
    fn test_aes_cmac_rfc4493() {
        let key = hex!("2b7e1516 28aed2a6 abf71588 09cf4f3c");
        assert_eq!(CamAes128.mac_data(&[], &key).unwrap().as_slice(), &hex!("bb1d6929 e9593728"));
        assert_eq!(
            CamAes128.mac_data(&hex!("6bc1bee2 2e409f96 e93d7e11 7393172a"), &key).unwrap().as_slice(),
            &hex!("070a16b4 6b4d4144"),
        );
    }

    #[test]
    fn test_aes_cbc_fips197() {
        let key = hex!("00010203 04050607 08090a0b 0c0d0e0f");
        let iv = [0u8; 16];
        let mut data = hex!("00112233 44556677 8899aabb ccddeeff");
        CamAes128.encrypt_padded_data(&mut data, &key, &iv).unwrap();
        assert_eq!(data, hex!("69c4e0d8 6a7b0430 d8cdb780 70b4c55a"));
        CamAes128.decrypt_padded_data(&mut data, &key, &iv).unwrap();
        assert_eq!(data, hex!("00112233 44556677 8899aabb ccddeeff"));
    }

    #[test]
    fn test_errors() {
        let mut unaligned = [0u8; 15];
        assert_eq!(
            CamAes128.encrypt_padded_data(&mut unaligned, &[0u8; 16], &[0u8; 16]),
            Err(Error::InvalidBlockAlignment),
        );
        let mut aligned = [0u8; 16];
        assert_eq!(
            CamAes256.encrypt_padded_data(&mut aligned, &[0u8; 16], &[0u8; 16]),
            Err(Error::InvalidKeyLength),
        );
        assert_eq!(Cam3Des.mac_padded_data(&[0u8; 8], &[0u8; 8]), Err(Error::InvalidKeyLength));
        assert_eq!(CipherSuite::AesCbcCmac192.key_length(), 24);
        assert_eq!(CipherSuite::TripleDesCbcCbc.to_string(), "3DES-CBC-CBC");
    }
}

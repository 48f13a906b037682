//! Secure Messaging on the chip side, keyed by the session keys established during Chip
//! Authentication.
//!
//! Protected commands carry their (encrypted) data in data object `0x87`, the expected response
//! length in `0x97` and a cryptographic checksum in `0x8E`; protected responses carry encrypted
//! data in `0x87`, the status word in `0x99` and the checksum in `0x8E`.


use std::fmt;

use tracing::trace;
use zeroize::Zeroizing;
use zeroize_derive::ZeroizeOnDrop;

use crate::crypt::cipher_mac::{self, pad_iso9797_m2, CipherAndMac, CipherSuite};
use crate::iso7816::apdu::{CommandApdu, CommandHeader, Data, ResponseApdu};
use crate::tlv::{self, Tag, Tlv};


/// Bits of the class byte signalling a command protected by Secure Messaging (header included in
/// the checksum).
const CLA_SECURE_MESSAGING: u8 = 0b0000_1100;

/// Padding-content indicator for ISO/IEC 7816-4 padding.
const PADDING_ISO7816: u8 = 0x01;


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Error {
    KeyLength { expected: usize, obtained: usize },
    Cipher(cipher_mac::Error),
    NotProtected,
    DataObjectFormat,
    UnexpectedDataObject { tag: Tag },
    MissingChecksum,
    ChecksumMismatch,
    UnknownPadding { padding_mode: u8 },
    InvalidPadding,
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyLength { expected, obtained }
                => write!(f, "session key has length {}, expected {}", obtained, expected),
            Self::Cipher(e)
                => write!(f, "cipher error: {}", e),
            Self::NotProtected
                => write!(f, "command is not protected by Secure Messaging"),
            Self::DataObjectFormat
                => write!(f, "Secure Messaging data objects are malformed"),
            Self::UnexpectedDataObject { tag }
                => write!(f, "unexpected Secure Messaging data object with tag {}", tag),
            Self::MissingChecksum
                => write!(f, "command does not contain a cryptographic checksum"),
            Self::ChecksumMismatch
                => write!(f, "cryptographic checksum incorrect"),
            Self::UnknownPadding { padding_mode }
                => write!(f, "command payload has unknown padding mode {}", padding_mode),
            Self::InvalidPadding
                => write!(f, "command payload has invalid padding"),
        }
    }
}
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Cipher(e) => Some(e),
            _ => None,
        }
    }
}
impl From<cipher_mac::Error> for Error {
    fn from(value: cipher_mac::Error) -> Self { Self::Cipher(value) }
}
impl From<tlv::Error> for Error {
    fn from(_value: tlv::Error) -> Self { Self::DataObjectFormat }
}


/// The keys and the send sequence counter of a Secure Messaging channel.
///
/// The send sequence counter is one cipher block long and starts at zero.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SmDataProvider {
    #[zeroize(skip)]
    cipher_suite: CipherSuite,
    encryption_key: Vec<u8>,
    mac_key: Vec<u8>,
    send_sequence_counter: Vec<u8>,
}
impl SmDataProvider {
    pub fn new(cipher_suite: CipherSuite, encryption_key: &[u8], mac_key: &[u8]) -> Result<Self, Error> {
        let block_size = cipher_suite.cipher_and_mac().cipher_block_size();
        Self::new_with_send_sequence_counter(cipher_suite, encryption_key, mac_key, &vec![0u8; block_size])
    }

    /// Creates a channel whose send sequence counter starts at the given value.
    pub fn new_with_send_sequence_counter(
        cipher_suite: CipherSuite,
        encryption_key: &[u8],
        mac_key: &[u8],
        send_sequence_counter: &[u8],
    ) -> Result<Self, Error> {
        let cipher = cipher_suite.cipher_and_mac();
        let expected = cipher.cipher_key_size();
        for key in [encryption_key, mac_key] {
            if key.len() != expected {
                return Err(Error::KeyLength { expected, obtained: key.len() });
            }
        }
        if send_sequence_counter.len() != cipher.cipher_block_size() {
            return Err(Error::Cipher(cipher_mac::Error::InvalidBlockAlignment));
        }

        Ok(Self {
            cipher_suite,
            encryption_key: encryption_key.to_vec(),
            mac_key: mac_key.to_vec(),
            send_sequence_counter: send_sequence_counter.to_vec(),
        })
    }

    pub fn cipher_suite(&self) -> CipherSuite { self.cipher_suite }
    pub fn encryption_key(&self) -> &[u8] { &self.encryption_key }
    pub fn mac_key(&self) -> &[u8] { &self.mac_key }
    pub fn send_sequence_counter(&self) -> &[u8] { &self.send_sequence_counter }

    fn cipher(&self) -> &'static dyn CipherAndMac {
        self.cipher_suite.cipher_and_mac()
    }

    fn increment_send_sequence_counter(&mut self) {
        for b in self.send_sequence_counter.iter_mut().rev() {
            if *b == 0xFF {
                *b = 0x00;
                // carry; keep going
            } else {
                *b += 1;
                break;
            }
        }
    }

    /// The IV for encryption and decryption with the current send sequence counter.
    ///
    /// 3DES always uses a zero IV; AES uses the send sequence counter encrypted with the
    /// encryption key.
    fn derive_iv(&self) -> Result<Zeroizing<Vec<u8>>, Error> {
        let cipher = self.cipher();
        let block_size = cipher.cipher_block_size();
        let mut iv = Zeroizing::new(vec![0u8; block_size]);
        if block_size > 8 {
            iv.copy_from_slice(&self.send_sequence_counter);
            cipher.encrypt_padded_data(&mut iv, &self.encryption_key, &vec![0u8; block_size])?;
        }
        Ok(iv)
    }

    /// The padded input of the cryptographic checksum: send sequence counter and the given data.
    fn checksum_input(&self, data: &[u8]) -> Vec<u8> {
        let mut input = self.send_sequence_counter.clone();
        input.extend_from_slice(data);
        pad_iso9797_m2(&input, self.cipher().cipher_block_size())
    }

    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        let cipher = self.cipher();
        let mut padded = pad_iso9797_m2(data, cipher.cipher_block_size());
        let iv = self.derive_iv()?;
        cipher.encrypt_padded_data(&mut padded, &self.encryption_key, &iv)?;
        Ok(padded)
    }

    fn decrypt(&self, cryptogram: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        let cipher = self.cipher();
        let mut data = Zeroizing::new(cryptogram.to_vec());
        let iv = self.derive_iv()?;
        cipher.decrypt_padded_data(&mut data, &self.encryption_key, &iv)?;

        // strip padding
        while data.last() == Some(&0x00) {
            data.pop();
        }
        if data.last() != Some(&0x80) {
            return Err(Error::InvalidPadding);
        }
        data.pop();
        Ok(data)
    }

    /// Verifies and decrypts a protected command APDU, returning the plain command.
    pub fn unwrap_command(&mut self, command: &CommandApdu) -> Result<CommandApdu, Error> {
        if command.header.cla & CLA_SECURE_MESSAGING != CLA_SECURE_MESSAGING {
            return Err(Error::NotProtected);
        }
        let objects = tlv::parse_all(command.request_data())?;

        self.increment_send_sequence_counter();

        // the padded header and all data objects except the checksum are authenticated
        let mut authenticated = pad_iso9797_m2(&command.header.to_bytes(), self.cipher().cipher_block_size());
        let mut cryptogram = None;
        let mut expected_length = None;
        let mut checksum = None;
        for object in &objects {
            let tag = object.tag();
            if tag == Tag::SM_CRYPTOGRAM {
                cryptogram = object.value();
                object.write_bytes(&mut authenticated);
            } else if tag == Tag::SM_LE {
                expected_length = object.value();
                object.write_bytes(&mut authenticated);
            } else if tag == Tag::SM_CHECKSUM {
                checksum = object.value();
            } else {
                return Err(Error::UnexpectedDataObject { tag });
            }
        }

        let checksum = checksum.ok_or(Error::MissingChecksum)?;
        let checksum_input = self.checksum_input(&authenticated);
        if !self.cipher().verify_mac_padded_data(&checksum_input, &self.mac_key, checksum)? {
            return Err(Error::ChecksumMismatch);
        }

        let request_data = match cryptogram {
            None => Zeroizing::new(Vec::new()),
            Some(value) => {
                let (padding_mode, encrypted) = value.split_first()
                    .ok_or(Error::DataObjectFormat)?;
                if *padding_mode != PADDING_ISO7816 {
                    return Err(Error::UnknownPadding { padding_mode: *padding_mode });
                }
                self.decrypt(encrypted)?
            },
        };
        let response_data_length = match expected_length {
            None => None,
            Some([le]) => Some(if *le == 0 { 256 } else { usize::from(*le) }),
            Some([le_msb, le_lsb]) => {
                let le = u16::from_be_bytes([*le_msb, *le_lsb]);
                Some(if le == 0 { 65536 } else { usize::from(le) })
            },
            Some(_) => return Err(Error::DataObjectFormat),
        };

        let header = CommandHeader::new(
            command.header.cla & !CLA_SECURE_MESSAGING,
            command.header.ins,
            command.header.p1,
            command.header.p2,
        );
        let data = Data::new(request_data.to_vec(), response_data_length)
            .ok_or(Error::DataObjectFormat)?;
        trace!("unwrapped command: {:?} {:?}", header, data);
        Ok(CommandApdu { header, data })
    }

    /// Encrypts and authenticates a plain response APDU.
    pub fn wrap_response(&mut self, response: &ResponseApdu) -> Result<ResponseApdu, Error> {
        self.increment_send_sequence_counter();

        let mut body = Vec::new();
        if !response.data.is_empty() {
            let mut value = vec![PADDING_ISO7816];
            value.extend(self.encrypt(&response.data)?);
            Tlv::primitive(Tag::SM_CRYPTOGRAM, value)?.write_bytes(&mut body);
        }
        Tlv::primitive(Tag::SM_STATUS, response.status.to_bytes())?.write_bytes(&mut body);

        let checksum_input = self.checksum_input(&body);
        let checksum = self.cipher().mac_padded_data(&checksum_input, &self.mac_key)?;
        Tlv::primitive(Tag::SM_CHECKSUM, checksum.as_slice())?.write_bytes(&mut body);

        Ok(ResponseApdu::new(body, response.status))
    }
}
impl fmt::Debug for SmDataProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmDataProvider")
            .field("cipher_suite", &self.cipher_suite)
            .field("encryption_key", &"<redacted>")
            .field("mac_key", &"<redacted>")
            .field("send_sequence_counter", &crate::hex(&self.send_sequence_counter))
            .finish()
    }
}

//! Chip Authentication, chip side.
//!
//! The terminal first selects a protocol and (optionally) a key using `MSE:Set AT`, then sends its
//! ephemeral public key using `General Authenticate`. The chip checks that the terminal committed
//! to this key during Terminal Authentication, performs the key agreement with its static key,
//! derives new session keys and answers with a nonce and an authentication token. The session keys
//! then replace the Secure Messaging keys in use.


pub mod asn1;
pub mod sec_infos;
pub mod token;


use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;
use tracing::{debug, instrument, trace};
use zeroize::Zeroizing;

use crate::card::{CardObject, CardObjectStore, KeyObject};
use crate::crypt::{KeyAgreement, KeyError, StaticKeyPair};
use crate::crypt::cipher_mac::CipherSuite;
use crate::crypt::kdf::Kdf;
use crate::iso7816::apdu::{CommandApdu, ResponseApdu};
use crate::iso7816::status::StatusWord;
use crate::oid::Oid;
use crate::oids;
use crate::protocol::{ProcessingResult, ProtocolEffect};
use crate::sec_status::{ChipAuthenticationMechanism, MechanismKind, SecContext, SecMechanism, SecurityStatus};
use crate::secure_messaging::SmDataProvider;
use crate::tlv::{self, find_in, Tag, Tlv};


/// `MANAGE SECURITY ENVIRONMENT`
pub const INS_MANAGE_SECURITY_ENVIRONMENT: u8 = 0x22;

/// P1-P2 of `MSE:Set AT` for computation, decipherment, internal authentication and key agreement.
pub const P1P2_SET_AUTHENTICATION_TEMPLATE: u16 = 0x41A4;

/// `GENERAL AUTHENTICATE`
pub const INS_GENERAL_AUTHENTICATE: u8 = 0x86;

/// Length of the chip's nonce in bytes.
pub const NONCE_LENGTH: usize = 8;

/// Version of Chip Authentication advertised in `ChipAuthenticationInfo`.
pub const CA_VERSION: u8 = 2;


/// An error while processing a Chip Authentication command.
///
/// Every error maps onto a status word; no further detail is returned to the terminal.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ProcessingError {
    /// The command data is not structured as expected.
    MalformedInput,

    /// The object identifier does not denote a Chip Authentication protocol.
    InvalidOid,

    /// No card object matches the key reference.
    ReferenceNotFound,

    /// The referenced card object cannot be used for Chip Authentication.
    ReferenceNotUsable,

    /// The referenced key may not be used with the selected protocol.
    ConditionsOfUseNotSatisfied,

    /// The terminal's public key is not valid for the domain parameters.
    MalformedKeyMaterial,

    /// No Terminal Authentication has been performed.
    SecurityStateMismatch,

    /// The terminal's public key is not the one it committed to during Terminal Authentication.
    AuthenticationDataMismatch,

    /// An internal failure.
    UnsupportedOperation(&'static str),

    /// The command is not allowed in the current state of the protocol.
    CommandNotAllowed,

    /// The command is not part of Chip Authentication.
    InstructionNotSupported,
}
impl ProcessingError {
    pub fn status_word(&self) -> StatusWord {
        match self {
            Self::MalformedInput|Self::InvalidOid|Self::MalformedKeyMaterial
                => StatusWord::WRONG_DATA,
            Self::ReferenceNotFound
                => StatusWord::REFERENCE_NOT_FOUND,
            Self::ReferenceNotUsable|Self::AuthenticationDataMismatch
                => StatusWord::REFERENCE_DATA_NOT_USABLE,
            Self::ConditionsOfUseNotSatisfied|Self::CommandNotAllowed
                => StatusWord::CONDITIONS_OF_USE_NOT_SATISFIED,
            Self::SecurityStateMismatch
                => StatusWord::SECURITY_STATUS_NOT_SATISFIED,
            Self::UnsupportedOperation(_)
                => StatusWord::NO_PRECISE_DIAGNOSIS,
            Self::InstructionNotSupported
                => StatusWord::INSTRUCTION_NOT_SUPPORTED,
        }
    }
}
impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedInput
                => write!(f, "malformed command data"),
            Self::InvalidOid
                => write!(f, "object identifier does not denote Chip Authentication"),
            Self::ReferenceNotFound
                => write!(f, "referenced key not found"),
            Self::ReferenceNotUsable
                => write!(f, "referenced object is not a key"),
            Self::ConditionsOfUseNotSatisfied
                => write!(f, "key may not be used with the selected protocol"),
            Self::MalformedKeyMaterial
                => write!(f, "malformed ephemeral public key"),
            Self::SecurityStateMismatch
                => write!(f, "Terminal Authentication has not been performed"),
            Self::AuthenticationDataMismatch
                => write!(f, "ephemeral public key does not match the one from Terminal Authentication"),
            Self::UnsupportedOperation(what)
                => write!(f, "unsupported operation: {}", what),
            Self::CommandNotAllowed
                => write!(f, "command not allowed in the current protocol state"),
            Self::InstructionNotSupported
                => write!(f, "instruction not supported"),
        }
    }
}
impl std::error::Error for ProcessingError {
}
impl From<KeyError> for ProcessingError {
    fn from(value: KeyError) -> Self {
        match value {
            KeyError::MalformedKeyMaterial => Self::MalformedKeyMaterial,
            KeyError::UnsupportedOperation(what) => Self::UnsupportedOperation(what),
        }
    }
}
impl From<tlv::Error> for ProcessingError {
    fn from(_value: tlv::Error) -> Self {
        Self::MalformedInput
    }
}


/// An object identifier of one of the Chip Authentication protocols (`id-CA-DH-*` or
/// `id-CA-ECDH-*`).
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CaOid {
    oid: Oid,
    key_agreement: KeyAgreement,
    cipher_suite: CipherSuite,
}
impl CaOid {
    pub fn oid(&self) -> &Oid { &self.oid }
    pub fn key_agreement(&self) -> KeyAgreement { self.key_agreement }
    pub fn cipher_suite(&self) -> CipherSuite { self.cipher_suite }

    /// Length of the session keys in bytes.
    pub fn key_length(&self) -> usize { self.cipher_suite.key_length() }

    /// The object identifier of the protocol family (`id-CA-DH` or `id-CA-ECDH`).
    pub fn generic_oid(&self) -> Oid {
        let family = match self.key_agreement {
            KeyAgreement::DiffieHellman => oids::CA_DH,
            KeyAgreement::EllipticCurveDiffieHellman => oids::CA_ECDH,
        };
        Oid::from_arcs(family)
    }

    /// The object identifier of the matching public key info (`id-PK-DH` or `id-PK-ECDH`).
    pub fn public_key_oid(&self) -> Oid {
        let family = match self.key_agreement {
            KeyAgreement::DiffieHellman => oids::PK_DH,
            KeyAgreement::EllipticCurveDiffieHellman => oids::PK_ECDH,
        };
        Oid::from_arcs(family)
    }

    /// The name of the protocol, e.g. `id-CA-ECDH-AES-CBC-CMAC-128`.
    pub fn name(&self) -> String {
        format!("id-CA-{}-{}", self.key_agreement.algorithm_name(), self.cipher_suite)
    }
}
impl TryFrom<&Oid> for CaOid {
    type Error = ProcessingError;

    fn try_from(oid: &Oid) -> Result<Self, Self::Error> {
        let prefix = Oid::from_arcs(oids::CA_OID_PREFIX);
        let bytes = oid.as_bytes();
        if !oid.specializes(&prefix) || bytes.len() != prefix.len() + 2 {
            return Err(ProcessingError::InvalidOid);
        }
        let key_agreement = match bytes[prefix.len()] {
            1 => KeyAgreement::DiffieHellman,
            2 => KeyAgreement::EllipticCurveDiffieHellman,
            _ => return Err(ProcessingError::InvalidOid),
        };
        let cipher_suite = match bytes[prefix.len() + 1] {
            1 => CipherSuite::TripleDesCbcCbc,
            2 => CipherSuite::AesCbcCmac128,
            3 => CipherSuite::AesCbcCmac192,
            4 => CipherSuite::AesCbcCmac256,
            _ => return Err(ProcessingError::InvalidOid),
        };
        Ok(Self {
            oid: oid.clone(),
            key_agreement,
            cipher_suite,
        })
    }
}
impl TryFrom<Oid> for CaOid {
    type Error = ProcessingError;
    fn try_from(oid: Oid) -> Result<Self, Self::Error> { Self::try_from(&oid) }
}
impl fmt::Display for CaOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.oid)
    }
}


/// The protocol and key selected by `MSE:Set AT`.
#[derive(Clone, Debug)]
pub struct SelectedTemplate {
    ca_oid: CaOid,
    key_reference: u32,
    key_pair: StaticKeyPair,
}
impl SelectedTemplate {
    pub fn ca_oid(&self) -> &CaOid { &self.ca_oid }
    pub fn key_reference(&self) -> u32 { self.key_reference }
    pub fn key_pair(&self) -> &StaticKeyPair { &self.key_pair }
}


/// The session keys derived by a successful Chip Authentication.
#[derive(Clone)]
pub struct SessionKeys {
    cipher_suite: CipherSuite,
    encryption_key: Zeroizing<Vec<u8>>,
    mac_key: Zeroizing<Vec<u8>>,
}
impl SessionKeys {
    pub fn cipher_suite(&self) -> CipherSuite { self.cipher_suite }
    pub fn encryption_key(&self) -> &[u8] { &self.encryption_key }
    pub fn mac_key(&self) -> &[u8] { &self.mac_key }
}
impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("cipher_suite", &self.cipher_suite)
            .field("encryption_key", &"<redacted>")
            .field("mac_key", &"<redacted>")
            .finish()
    }
}


/// The state of a Chip Authentication session.
#[derive(Clone, Debug, Default)]
pub enum CaSession {
    #[default]
    Idle,

    /// A protocol and key have been selected.
    AtSelected(SelectedTemplate),

    /// The key agreement has been performed and session keys derived.
    Authenticated {
        template: SelectedTemplate,
        session_keys: SessionKeys,
    },
}
impl CaSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn template(&self) -> Option<&SelectedTemplate> {
        match self {
            Self::Idle => None,
            Self::AtSelected(template) => Some(template),
            Self::Authenticated { template, .. } => Some(template),
        }
    }

    pub fn session_keys(&self) -> Option<&SessionKeys> {
        match self {
            Self::Authenticated { session_keys, .. } => Some(session_keys),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}


/// The Chip Authentication protocol handler for a card.
#[derive(Clone, Copy)]
pub struct ChipAuthentication<'c> {
    card: &'c dyn CardObjectStore,
}
impl<'c> ChipAuthentication<'c> {
    pub fn new(card: &'c dyn CardObjectStore) -> Self {
        Self {
            card,
        }
    }

    /// Processes a command, dispatching it to the matching handler.
    #[instrument(skip_all)]
    pub fn process(&self, session: &mut CaSession, sec_status: &dyn SecurityStatus, command: &CommandApdu) -> ProcessingResult {
        let header = &command.header;
        if header.ins == INS_MANAGE_SECURITY_ENVIRONMENT && header.p1p2() == P1P2_SET_AUTHENTICATION_TEMPLATE {
            self.set_authentication_template(session, command.request_data())
        } else if header.ins == INS_GENERAL_AUTHENTICATE {
            self.general_authenticate(session, sec_status, command.request_data())
        } else {
            debug!("instruction {:02X} with P1-P2 {:04X} is not part of Chip Authentication", header.ins, header.p1p2());
            ProcessingResult::status_only(ProcessingError::InstructionNotSupported.status_word())
        }
    }

    /// Handles `MSE:Set AT`, selecting the protocol and the chip's static key.
    ///
    /// On failure, the session remains unchanged.
    #[instrument(skip_all)]
    pub fn set_authentication_template(&self, session: &mut CaSession, data: &[u8]) -> ProcessingResult {
        if session.is_authenticated() {
            return failure(ProcessingError::CommandNotAllowed);
        }
        match self.select_template(data) {
            Ok(template) => {
                debug!(
                    "selected {} with key reference {}",
                    template.ca_oid, template.key_reference,
                );
                *session = CaSession::AtSelected(template);
                ProcessingResult::status_only(StatusWord::SUCCESS)
            },
            Err(e) => failure(e),
        }
    }

    /// Handles `General Authenticate` with a freshly generated nonce.
    pub fn general_authenticate(&self, session: &mut CaSession, sec_status: &dyn SecurityStatus, data: &[u8]) -> ProcessingResult {
        let mut nonce = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce);
        self.general_authenticate_with_nonce(session, sec_status, data, &nonce)
    }

    /// Handles `General Authenticate` using the given nonce.
    ///
    /// The protocol completes regardless of the outcome. On success, the session becomes
    /// authenticated, the mechanism is recorded and the session keys are installed for Secure
    /// Messaging.
    #[instrument(skip_all)]
    pub fn general_authenticate_with_nonce(
        &self,
        session: &mut CaSession,
        sec_status: &dyn SecurityStatus,
        data: &[u8],
        nonce: &[u8; NONCE_LENGTH],
    ) -> ProcessingResult {
        let CaSession::AtSelected(template) = &*session else {
            return failure(ProcessingError::CommandNotAllowed);
        };
        match authenticate(template, sec_status, data, nonce) {
            Ok(outcome) => {
                let Authentication { response_data, session_keys, secure_messaging, mechanism } = outcome;
                let template = template.clone();
                *session = CaSession::Authenticated {
                    template,
                    session_keys,
                };
                ProcessingResult::new(
                    ResponseApdu::new(response_data, StatusWord::SUCCESS),
                    vec![
                        ProtocolEffect::InstallSecureMessaging(secure_messaging),
                        ProtocolEffect::UpdateSecStatus {
                            context: SecContext::Application,
                            mechanism: SecMechanism::ChipAuthentication(mechanism),
                        },
                        ProtocolEffect::ProtocolCompleted,
                    ],
                )
            },
            Err(e) => failure(e),
        }
    }

    fn select_template(&self, data: &[u8]) -> Result<SelectedTemplate, ProcessingError> {
        let objects = tlv::parse_all(data)?;

        let oid_bytes = find_in(&objects, &[Tag::CONTEXT_80])
            .and_then(|o| o.value())
            .ok_or(ProcessingError::InvalidOid)?;
        let oid = Oid::from_bytes(oid_bytes)
            .map_err(|_| ProcessingError::InvalidOid)?;
        let ca_oid = CaOid::try_from(oid)?;

        let key = match find_in(&objects, &[Tag::CONTEXT_84]) {
            Some(reference) => {
                let key_reference = decode_key_reference(reference)?;
                match self.card.lookup(key_reference) {
                    None => return Err(ProcessingError::ReferenceNotFound),
                    Some(CardObject::Other { .. }) => return Err(ProcessingError::ReferenceNotUsable),
                    Some(CardObject::Key(key)) => {
                        if !key.matches_oid(ca_oid.oid()) {
                            return Err(ProcessingError::ConditionsOfUseNotSatisfied);
                        }
                        key
                    },
                }
            },
            None => self.find_implicit_key(&ca_oid)
                .ok_or(ProcessingError::ReferenceNotFound)?,
        };

        if key.key_pair().domain_parameters().key_agreement() != ca_oid.key_agreement() {
            return Err(ProcessingError::ConditionsOfUseNotSatisfied);
        }
        let key_reference = key.key_reference()
            .ok_or(ProcessingError::ReferenceNotUsable)?;

        Ok(SelectedTemplate {
            ca_oid,
            key_reference,
            key_pair: key.key_pair().clone(),
        })
    }

    /// The first referenced key in tree order usable with the given protocol.
    fn find_implicit_key(&self, ca_oid: &CaOid) -> Option<&'c KeyObject> {
        self.card.objects()
            .filter_map(|o| o.as_key())
            .find(|k| k.key_reference().is_some() && k.matches_oid(ca_oid.oid()))
    }
}


struct Authentication {
    response_data: Vec<u8>,
    session_keys: SessionKeys,
    secure_messaging: SmDataProvider,
    mechanism: ChipAuthenticationMechanism,
}


fn authenticate(
    template: &SelectedTemplate,
    sec_status: &dyn SecurityStatus,
    data: &[u8],
    nonce: &[u8; NONCE_LENGTH],
) -> Result<Authentication, ProcessingError> {
    let objects = tlv::parse_all(data)?;
    let ephemeral_public_key_bytes = find_in(&objects, &[Tag::DYNAMIC_AUTHENTICATION_DATA, Tag::CONTEXT_80])
        .and_then(|o| o.value())
        .ok_or(ProcessingError::MalformedInput)?;

    let domain_parameters = template.key_pair.domain_parameters();
    let ephemeral_public_key = domain_parameters.reconstruct_public_key(ephemeral_public_key_bytes)?;

    // the terminal must use the key it committed to during Terminal Authentication
    let committed_key = find_terminal_authentication(sec_status)
        .ok_or(ProcessingError::SecurityStateMismatch)?;
    let compressed_key = domain_parameters.compress(&ephemeral_public_key)?;
    debug!("compressed ephemeral public key: {}", crate::hex(&compressed_key));
    if !bool::from(compressed_key.ct_eq(committed_key)) {
        return Err(ProcessingError::AuthenticationDataMismatch);
    }

    let shared_secret = domain_parameters.agree(template.key_pair.private_key(), &ephemeral_public_key)?;

    let ca_oid = &template.ca_oid;
    let kdf = Kdf::new(ca_oid.key_length())
        .ok_or(ProcessingError::UnsupportedOperation("no key derivation for key length"))?;
    let k_session_enc = kdf.derive_encryption_key(&shared_secret, nonce);
    let k_session_mac = kdf.derive_mac_key(&shared_secret, nonce);
    trace!("session encryption key: {}", crate::hex(&k_session_enc));
    trace!("session MAC key: {}", crate::hex(&k_session_mac));

    let token = token::authentication_token(ca_oid, domain_parameters, &ephemeral_public_key, &k_session_mac)?;
    debug!("nonce: {}, authentication token: {}", crate::hex(nonce), crate::hex(&token));

    let secure_messaging = SmDataProvider::new(ca_oid.cipher_suite(), &k_session_enc, &k_session_mac)
        .map_err(|_| ProcessingError::UnsupportedOperation("secure messaging keys rejected"))?;

    let response = Tlv::constructed(Tag::DYNAMIC_AUTHENTICATION_DATA, vec![
        Tlv::primitive(Tag::CONTEXT_81, nonce.to_vec())?,
        Tlv::primitive(Tag::CONTEXT_82, token.to_vec())?,
    ])?;

    Ok(Authentication {
        response_data: response.to_bytes(),
        session_keys: SessionKeys {
            cipher_suite: ca_oid.cipher_suite(),
            encryption_key: k_session_enc,
            mac_key: k_session_mac,
        },
        secure_messaging,
        mechanism: ChipAuthenticationMechanism::new(
            ca_oid.oid().clone(),
            template.key_reference,
            ephemeral_public_key_bytes.to_vec(),
        ),
    })
}


/// The compressed ephemeral public key recorded by Terminal Authentication for the current
/// application.
fn find_terminal_authentication(sec_status: &dyn SecurityStatus) -> Option<&[u8]> {
    match sec_status.find_mechanism(SecContext::Application, MechanismKind::TerminalAuthentication) {
        Some(SecMechanism::TerminalAuthentication { compressed_ephemeral_public_key })
            => Some(compressed_ephemeral_public_key.as_slice()),
        _ => None,
    }
}


/// Decodes a key reference (a big-endian unsigned integer of up to four bytes).
fn decode_key_reference(object: &Tlv) -> Result<u32, ProcessingError> {
    let bytes = object.value()
        .ok_or(ProcessingError::MalformedInput)?;
    if bytes.is_empty() || bytes.len() > 4 {
        return Err(ProcessingError::MalformedInput);
    }
    Ok(bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
}


/// Converts an error into a status-only response that ends the protocol.
fn failure(error: ProcessingError) -> ProcessingResult {
    let status = error.status_word();
    debug!("Chip Authentication failed with {}: {}", status, error);
    ProcessingResult::new(
        ResponseApdu::status_only(status),
        vec![ProtocolEffect::ProtocolCompleted],
    )
}


#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_ca_oid_parsing() {
        let ca_oid = CaOid::try_from(Oid::from_arcs(oids::CA_ECDH_AES_CBC_CMAC_192)).unwrap();
        assert_eq!(ca_oid.key_agreement(), KeyAgreement::EllipticCurveDiffieHellman);
        assert_eq!(ca_oid.cipher_suite(), CipherSuite::AesCbcCmac192);
        assert_eq!(ca_oid.key_length(), 24);
        assert_eq!(ca_oid.generic_oid(), Oid::from_arcs(oids::CA_ECDH));
        assert_eq!(ca_oid.generic_oid().as_bytes(), &ca_oid.oid().as_bytes()[..9]);
        assert_eq!(ca_oid.public_key_oid(), Oid::from_arcs(oids::PK_ECDH));
        assert_eq!(ca_oid.name(), "id-CA-ECDH-AES-CBC-CMAC-192");

        let dh = CaOid::try_from(Oid::from_arcs(oids::CA_DH_3DES_CBC_CBC)).unwrap();
        assert_eq!(dh.key_agreement(), KeyAgreement::DiffieHellman);
        assert_eq!(dh.key_length(), 16);
        assert_eq!(dh.name(), "id-CA-DH-3DES-CBC-CBC");
    }

    #[test]
    fn test_ca_oid_rejects() {
        for bytes in [
            &hex!("04 00 7F 00 07 02 02 03 02")[..], // generic family
            &hex!("04 00 7F 00 07 02 02 03 03 01")[..],
            &hex!("04 00 7F 00 07 02 02 03 02 05")[..],
            &hex!("04 00 7F 00 07 02 02 03 02 02 01")[..],
            &hex!("04 00 7F 00 07 02 02 04 02 02")[..], // PACE
        ] {
            let oid = Oid::from_bytes(bytes).unwrap();
            assert_eq!(CaOid::try_from(oid), Err(ProcessingError::InvalidOid));
        }
    }

    #[test]
    fn test_status_words() {
        assert_eq!(ProcessingError::MalformedInput.status_word().to_word(), 0x6A80);
        assert_eq!(ProcessingError::InvalidOid.status_word().to_word(), 0x6A80);
        assert_eq!(ProcessingError::MalformedKeyMaterial.status_word().to_word(), 0x6A80);
        assert_eq!(ProcessingError::ReferenceNotFound.status_word().to_word(), 0x6A88);
        assert_eq!(ProcessingError::ReferenceNotUsable.status_word().to_word(), 0x6984);
        assert_eq!(ProcessingError::AuthenticationDataMismatch.status_word().to_word(), 0x6984);
        assert_eq!(ProcessingError::ConditionsOfUseNotSatisfied.status_word().to_word(), 0x6985);
        assert_eq!(ProcessingError::CommandNotAllowed.status_word().to_word(), 0x6985);
        assert_eq!(ProcessingError::SecurityStateMismatch.status_word().to_word(), 0x6982);
        assert_eq!(ProcessingError::UnsupportedOperation("x").status_word().to_word(), 0x6FFF);
        assert_eq!(ProcessingError::InstructionNotSupported.status_word().to_word(), 0x6D00);

        assert_eq!(ProcessingError::from(KeyError::MalformedKeyMaterial), ProcessingError::MalformedKeyMaterial);
        assert_eq!(ProcessingError::from(tlv::Error::Truncated), ProcessingError::MalformedInput);
    }

    #[test]
    fn test_key_reference_decoding() {
        let reference = |value: &[u8]| Tlv::primitive(Tag::CONTEXT_84, value.to_vec()).unwrap();
        assert_eq!(decode_key_reference(&reference(&[0x01])), Ok(1));
        assert_eq!(decode_key_reference(&reference(&[0x01, 0x00])), Ok(256));
        assert_eq!(decode_key_reference(&reference(&[0xFF; 4])), Ok(u32::MAX));
        assert_eq!(decode_key_reference(&reference(&[])), Err(ProcessingError::MalformedInput));
        assert_eq!(decode_key_reference(&reference(&[0x01; 5])), Err(ProcessingError::MalformedInput));
    }

    #[test]
    fn test_session_accessors() {
        let session = CaSession::new();
        assert!(session.template().is_none());
        assert!(session.session_keys().is_none());
        assert!(!session.is_authenticated());
    }
}

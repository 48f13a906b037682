//! Security infos advertising the chip's Chip Authentication keys.
//!
//! Three kinds of security info are generated per key:
//! ```plain
//! ChipAuthenticationInfo ::= SEQUENCE {
//!     protocol OBJECT IDENTIFIER, -- id-CA-*
//!     version INTEGER,            -- 2
//!     keyId INTEGER
//! }
//! ChipAuthenticationDomainParameterInfo ::= SEQUENCE {
//!     protocol OBJECT IDENTIFIER, -- id-CA-DH or id-CA-ECDH
//!     domainParameter AlgorithmIdentifier,
//!     keyId INTEGER
//! }
//! ChipAuthenticationPublicKeyInfo ::= SEQUENCE {
//!     protocol OBJECT IDENTIFIER, -- id-PK-DH or id-PK-ECDH
//!     chipAuthenticationPublicKey SubjectPublicKeyInfo,
//!     keyId INTEGER
//! }
//! ```
//!
//! Infos of keys reserved for privileged terminals are collected into a `PrivilegedTerminalInfo`:
//! ```plain
//! PrivilegedTerminalInfo ::= SEQUENCE {
//!     protocol OBJECT IDENTIFIER, -- id-PT
//!     privilegedTerminalInfos SecurityInfos
//! }
//! ```


use tracing::debug;

use crate::ca::{CaOid, CA_VERSION};
use crate::card::{CardObjectStore, KeyObject};
use crate::crypt::KeyError;
use crate::der_util::unsigned_integer_content;
use crate::oid::Oid;
use crate::oids;
use crate::tlv::{Tag, Tlv};


/// Who the security infos are generated for.
///
/// Public keys are only disclosed to authenticated terminals; the public keys of privileged keys
/// only to privileged terminals.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum SecInfoPublicity {
    /// Readable without authentication (e.g. EF.CardAccess).
    Plain,

    /// Readable by authenticated terminals (e.g. EF.CardSecurity).
    Authenticated,

    /// Readable by privileged terminals (e.g. EF.ChipSecurity).
    Privileged,
}


fn integer(value: u32) -> Result<Tlv, KeyError> {
    Ok(Tlv::primitive(Tag::INTEGER, unsigned_integer_content(&value.to_be_bytes()))?)
}

fn oid(oid: &Oid) -> Result<Tlv, KeyError> {
    Ok(Tlv::primitive(Tag::OID, oid.as_bytes())?)
}


/// The security infos for a single key.
struct KeyInfos {
    infos: Vec<Tlv>,
    public_key_info: Option<Tlv>,
}

fn key_infos(key: &KeyObject, key_id: u32, publicity: SecInfoPublicity) -> Result<Option<KeyInfos>, KeyError> {
    let prefix = Oid::from_arcs(oids::CA_OID_PREFIX);
    let ca_oids: Vec<CaOid> = key.oids_with_prefix(&prefix)
        .filter_map(|o| match CaOid::try_from(o) {
            Ok(ca_oid) => Some(ca_oid),
            Err(_) => {
                debug!("key {}: not advertising unknown Chip Authentication variant {}", key_id, o);
                None
            },
        })
        .collect();
    let Some(last_ca_oid) = ca_oids.last() else {
        return Ok(None);
    };

    let mut infos = Vec::with_capacity(ca_oids.len() + 1);
    for ca_oid in &ca_oids {
        infos.push(Tlv::constructed(Tag::SEQUENCE, vec![
            oid(ca_oid.oid())?,
            integer(CA_VERSION.into())?,
            integer(key_id)?,
        ])?);
    }

    let domain_parameters = key.key_pair().domain_parameters();
    infos.push(Tlv::constructed(Tag::SEQUENCE, vec![
        oid(&last_ca_oid.generic_oid())?,
        domain_parameters.algorithm_identifier()?,
        integer(key_id)?,
    ])?);

    let public_key_info = if publicity >= SecInfoPublicity::Authenticated {
        let subject_public_key_info = Tlv::constructed(Tag::SEQUENCE, vec![
            domain_parameters.algorithm_identifier()?,
            domain_parameters.subject_public_key(key.key_pair().public_key())?,
        ])?;
        Some(Tlv::constructed(Tag::SEQUENCE, vec![
            oid(&last_ca_oid.public_key_oid())?,
            subject_public_key_info,
            integer(key_id)?,
        ])?)
    } else {
        None
    };

    Ok(Some(KeyInfos {
        infos,
        public_key_info,
    }))
}


/// Generates the security infos of all Chip Authentication keys on the card, in tree order.
///
/// Keys without a key reference are skipped. Infos of unprivileged keys come first, followed by
/// their public key infos, followed by a `PrivilegedTerminalInfo` if any privileged key is
/// present.
pub fn sec_infos(publicity: SecInfoPublicity, card: &dyn CardObjectStore) -> Result<Vec<Tlv>, KeyError> {
    let mut infos = Vec::new();
    let mut public_key_infos = Vec::new();
    let mut privileged_infos = Vec::new();
    let mut privileged_public_key_infos = Vec::new();

    for key in card.objects().filter_map(|o| o.as_key()) {
        let Some(key_id) = key.key_reference() else {
            continue;
        };
        let Some(key_infos) = key_infos(key, key_id, publicity)? else {
            continue;
        };
        debug!(
            "advertising Chip Authentication key {}{}",
            key_id, if key.privileged_only() { " (privileged)" } else { "" },
        );

        if key.privileged_only() {
            privileged_infos.extend(key_infos.infos);
            privileged_public_key_infos.extend(key_infos.public_key_info);
        } else {
            infos.extend(key_infos.infos);
            public_key_infos.extend(key_infos.public_key_info);
        }
    }

    infos.extend(public_key_infos);

    if !privileged_infos.is_empty() || !privileged_public_key_infos.is_empty() {
        if publicity == SecInfoPublicity::Privileged {
            privileged_infos.extend(privileged_public_key_infos);
        }
        infos.push(Tlv::constructed(Tag::SEQUENCE, vec![
            oid(&Oid::from_arcs(oids::PRIVILEGED_TERMINAL_INFO))?,
            Tlv::constructed(Tag::SET, privileged_infos)?,
        ])?);
    }

    Ok(infos)
}


/// Encodes the security infos as a `SecurityInfos` structure (`SET OF SecurityInfo`).
pub fn encode_sec_infos(publicity: SecInfoPublicity, card: &dyn CardObjectStore) -> Result<Vec<u8>, KeyError> {
    let infos = sec_infos(publicity, card)?;
    Ok(Tlv::constructed(Tag::SET, infos)?.to_bytes())
}

//! ASN.1 structures of the security infos relevant to Chip Authentication.
//!
//! These mirror the structures generated by [`sec_infos`](crate::ca::sec_infos) and allow them to
//! be decoded, e.g. by a terminal or in tests.


use rasn::{AsnType, Decode, Encode};
use rasn::error::DecodeError;
use rasn::types::{Any, BitString, Integer, ObjectIdentifier, SetOf};


/// Advertises support of a Chip Authentication protocol with a given key.
///
/// Specified in ICAO Doc 9303 Part 11 § 9.2.5.
#[derive(AsnType, Clone, Debug, Decode, Encode, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ChipAuthenticationInfo {
    pub protocol: ObjectIdentifier,
    pub version: Integer,
    pub key_id: Option<Integer>,
}
impl ChipAuthenticationInfo {
    pub fn new(
        protocol: ObjectIdentifier,
        version: Integer,
        key_id: Option<Integer>,
    ) -> Self {
        Self {
            protocol,
            version,
            key_id,
        }
    }
}


/// The domain parameters of a Chip Authentication key.
///
/// Specified in ICAO Doc 9303 Part 11 § 9.2.6.
#[derive(AsnType, Clone, Debug, Decode, Encode, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ChipAuthenticationDomainParameterInfo {
    pub protocol: ObjectIdentifier,
    pub domain_parameter: AlgorithmIdentifier,
    pub key_id: Option<Integer>,
}


/// The public key of a Chip Authentication key.
///
/// Specified in ICAO Doc 9303 Part 11 § 9.2.7.
#[derive(AsnType, Clone, Debug, Decode, Encode, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ChipAuthenticationPublicKeyInfo {
    pub protocol: ObjectIdentifier,
    pub chip_authentication_public_key: SubjectPublicKeyInfo,
    pub key_id: Option<Integer>,
}


/// An identifier of a cryptographic algorithm along with its parameters.
///
/// For standardized domain parameters, `parameters` is the INTEGER identifier; otherwise it
/// contains the explicit parameters (ANSI X9.42 for Diffie-Hellman, BSI TR-03111 for
/// Elliptic-Curve Diffie-Hellman).
#[derive(AsnType, Clone, Debug, Decode, Encode, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AlgorithmIdentifier {
    pub algorithm: ObjectIdentifier,
    pub parameters: Any,
}


/// A public key along with the algorithm it belongs to.
#[derive(AsnType, Clone, Debug, Decode, Encode, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SubjectPublicKeyInfo {
    pub algorithm: AlgorithmIdentifier,
    pub subject_public_key: BitString,
}


/// Security infos only available to privileged terminals.
///
/// `privileged_terminal_infos` is itself a `SecurityInfos` structure and can be passed to
/// [`decode_security_infos`].
#[derive(AsnType, Clone, Debug, Decode, Encode, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PrivilegedTerminalInfo {
    pub protocol: ObjectIdentifier,
    pub privileged_terminal_infos: Any,
}


/// Decodes a `SecurityInfos` structure (SET OF SecurityInfo) into its undecoded entries.
pub fn decode_security_infos(bytes: &[u8]) -> Result<Vec<Any>, DecodeError> {
    let security_infos: SetOf<Any> = rasn::der::decode(bytes)?;
    Ok(security_infos.to_vec().into_iter()
        .map(|security_info| Any::new(security_info.as_bytes().to_vec()))
        .collect())
}


/// Returns the protocol object identifier of a security info, which is always its first member.
pub fn security_info_protocol(security_info: &Any) -> Option<ObjectIdentifier> {
    let members: Vec<Any> = rasn::der::decode(security_info.as_bytes()).ok()?;
    let first = members.first()?;
    rasn::der::decode(first.as_bytes()).ok()
}


#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use crate::oids;

    #[test]
    fn test_decode_chip_authentication_info() {
        let info: ChipAuthenticationInfo = rasn::der::decode(
            &hex!("30 12 06 0A 04 00 7F 00 07 02 02 03 02 02 02 01 02 02 01 01"),
        ).unwrap();
        assert_eq!(&*info.protocol, oids::CA_ECDH_AES_CBC_CMAC_128);
        assert_eq!(info.version, Integer::from(2));
        assert_eq!(info.key_id, Some(Integer::from(1)));
    }

    #[test]
    fn test_decode_domain_parameter_info() {
        let info: ChipAuthenticationDomainParameterInfo = rasn::der::decode(&hex!("
            30 1C
                06 09 04 00 7F 00 07 02 02 03 02
                30 0C 06 07 04 00 7F 00 07 01 02 02 01 0D
                02 01 01
        ")).unwrap();
        assert_eq!(&*info.domain_parameter.algorithm, oids::STANDARDIZED_DOMAIN_PARAMETERS);
        let id: Integer = rasn::der::decode(info.domain_parameter.parameters.as_bytes()).unwrap();
        assert_eq!(id, Integer::from(13));
    }

    #[test]
    fn test_security_info_protocols() {
        let infos = decode_security_infos(&hex!("
            31 16
                30 00
                30 12 06 0A 04 00 7F 00 07 02 02 03 02 02 02 01 02 02 01 01
        ")).unwrap();
        assert_eq!(infos.len(), 2);
        let protocols: Vec<Option<ObjectIdentifier>> = infos.iter()
            .map(security_info_protocol)
            .collect();
        assert_eq!(protocols.iter().filter(|p| p.is_none()).count(), 1);
        assert!(protocols.iter().any(|p| p.as_deref() == Some(oids::CA_ECDH_AES_CBC_CMAC_128)));
    }
}

//! The authentication token with which the chip proves knowledge of the session keys.


use zeroize::Zeroizing;

use crate::ca::{CaOid, ProcessingError};
use crate::crypt::{DomainParameters, PublicKey};
use crate::tlv::{Tag, Tlv};


/// Length of the authentication token in bytes.
pub const TOKEN_LENGTH: usize = 8;


/// Builds the input to the authentication token: the terminal's ephemeral public key as a public
/// key template.
///
/// ```plain
/// 7F49 LL
///     06 LL protocol_oid
///     86 LL ec_point   (or 84 LL dh_public_value)
/// ```
pub fn token_input(ca_oid: &CaOid, domain_parameters: &DomainParameters, public_key: &PublicKey) -> Result<Vec<u8>, ProcessingError> {
    let template = Tlv::constructed(Tag::PUBLIC_KEY, vec![
        Tlv::primitive(Tag::OID, ca_oid.oid().as_bytes())?,
        domain_parameters.public_key_data_object(public_key)?,
    ])?;
    Ok(template.to_bytes())
}


/// Calculates the authentication token over the terminal's ephemeral public key using the session
/// MAC key.
pub fn authentication_token(
    ca_oid: &CaOid,
    domain_parameters: &DomainParameters,
    public_key: &PublicKey,
    k_session_mac: &[u8],
) -> Result<Zeroizing<Vec<u8>>, ProcessingError> {
    let input = token_input(ca_oid, domain_parameters, public_key)?;
    let mut mac = ca_oid.cipher_suite().cipher_and_mac()
        .mac_data(&input, k_session_mac)
        .map_err(|_| ProcessingError::UnsupportedOperation("token MAC calculation failed"))?;
    mac.truncate(TOKEN_LENGTH);
    Ok(mac)
}


#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use crate::crypt::cipher_mac::CipherSuite;
    use crate::crypt::elliptic::curves::get_brainpool_p256r1;
    use crate::oid::Oid;
    use crate::oids;

    fn terminal_key() -> (DomainParameters, PublicKey) {
        let params = DomainParameters::PrimeWeierstrassEllipticDiffieHellman(get_brainpool_p256r1());
        let public_key = params.reconstruct_public_key(&hex!("
            04
            7ACF3EFC 982EC455 65A4B155 129EFBC7 4650DCBF A6362D89 6FC70262 E0C2CC5E
            544552DC B6725218 799115B5 5C9BAA6D 9F6BC3A9 618E70C2 5AF71777 A9C4922D
        ")).unwrap();
        (params, public_key)
    }

    #[test]
    fn test_token_input_layout() {
        let (params, public_key) = terminal_key();
        let ca_oid = CaOid::try_from(Oid::from_arcs(oids::CA_ECDH_AES_CBC_CMAC_128)).unwrap();
        let input = token_input(&ca_oid, &params, &public_key).unwrap();

        // 7F49 (2) + length (1) + OID (2 + 10) + point (2 + 65)
        assert_eq!(input.len(), 3 + 12 + 67);
        assert_eq!(&input[0..3], &hex!("7F 49 4F"));
        assert_eq!(&input[3..15], &hex!("06 0A 04 00 7F 00 07 02 02 03 02 02"));
        assert_eq!(&input[15..18], &hex!("86 41 04"));
    }

    #[test]
    fn test_token_matches_suite_mac() {
        let (params, public_key) = terminal_key();
        for (arcs, suite) in [
            (oids::CA_ECDH_3DES_CBC_CBC, CipherSuite::TripleDesCbcCbc),
            (oids::CA_ECDH_AES_CBC_CMAC_256, CipherSuite::AesCbcCmac256),
        ] {
            let ca_oid = CaOid::try_from(Oid::from_arcs(arcs)).unwrap();
            let key = vec![0x5A; suite.key_length()];
            let token = authentication_token(&ca_oid, &params, &public_key, &key).unwrap();
            assert_eq!(token.len(), TOKEN_LENGTH);

            let input = token_input(&ca_oid, &params, &public_key).unwrap();
            let expected = suite.cipher_and_mac().mac_data(&input, &key).unwrap();
            assert_eq!(token.as_slice(), &expected[..TOKEN_LENGTH]);
        }
    }

    #[test]
    fn test_wrong_key_length() {
        let (params, public_key) = terminal_key();
        let ca_oid = CaOid::try_from(Oid::from_arcs(oids::CA_ECDH_AES_CBC_CMAC_128)).unwrap();
        assert!(matches!(
            authentication_token(&ca_oid, &params, &public_key, &[0x00; 5]),
            Err(ProcessingError::UnsupportedOperation(_)),
        ));
    }
}

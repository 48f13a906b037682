use digest::Digest;
use hex_literal::hex;
use icao_picc::ca::{CaOid, CaSession, ChipAuthentication, NONCE_LENGTH};
use icao_picc::card::{CardObject, KeyObject, MasterFile};
use icao_picc::crypt::{DomainParameters, StaticKeyPair};
use icao_picc::crypt::cipher_mac::CipherSuite;
use icao_picc::crypt::dh::ModularGroup;
use icao_picc::crypt::elliptic::curves::StandardizedCurve;
use icao_picc::iso7816::apdu::{CommandApdu, CommandHeader, Data};
use icao_picc::oid::Oid;
use icao_picc::oids;
use icao_picc::protocol::{CardState, ProtocolEffect};
use icao_picc::sec_status::{MechanismKind, SecContext, SecMechanism, SecStatus, SecurityStatus};
use icao_picc::tlv::{Tag, Tlv};
use sha1::Sha1;


// brainpoolP256r1 key pairs from ICAO Doc 9303 Part 11 Appendix G.1
const CHIP_EC_PRIVATE_KEY: [u8; 32] = hex!("498FF49756F2DC1587840041839A85982BE7761D14715FB091EFA7BCE9058560");
const TERMINAL_EC_PRIVATE_KEY: [u8; 32] = hex!("7F4EF07B9EA82FD78AD689B38D0BC78CF21F249D953BC46F4C6E19259C010F99");
const TERMINAL_EC_PUBLIC_KEY: [u8; 65] = hex!("
    04
    7ACF3EFC982EC45565A4B155129EFBC74650DCBFA6362D896FC70262E0C2CC5E
    544552DCB6725218799115B55C9BAA6D9F6BC3A9618E70C25AF71777A9C4922D
");
const EC_SHARED_SECRET: [u8; 32] = hex!("60332EF2450B5D247EF6D3868397D398852ED6E8CAF6FFEEF6BF85CA57057FD5");

// 1024-bit MODP group key pairs from ICAO Doc 9303 Part 11 Appendix G.2
const CHIP_DH_PRIVATE_KEY: [u8; 20] = hex!("66DDAFEAC1609CB5B963BB0CB3FF8B3E047F336C");
const TERMINAL_DH_PUBLIC_KEY: [u8; 128] = hex!("
    23FB3749EA030D2A25B278D2A562047ADE3F01B74F17A15402CB7352CA7D2B3E
    B71C343DB13D1DEBCE9A3666DBCFC920B49174A602CB47965CAA73DC702489A4
    4D41DB914DE9613DC5E98C94160551C0DF86274B9359BC0490D01B03AD54022D
    CB4F57FAD6322497D7A1E28D46710F461AFE710FBBBC5F8BA166F4311975EC6C
");
const DH_SHARED_SECRET: [u8; 128] = hex!("
    5BABEBEF5B74E5BA94B5C063FDA15F1F1CDE94873EE0A5D3A2FCAB49F258D07F
    544F13CB66658C3AFEE9E727389BE3F6CBBBD32128A8C21DD6EEA3CF7091CDDF
    B08B8D007D40318DCCA4FFBF51208790FB4BD111E5A968ED6B6F08B26CA87C41
    0B3CE0C310CE104EABD16629AA48620C1279270CB0750C0D37C57FFFE302AE7F
");

const NONCE: [u8; NONCE_LENGTH] = hex!("0102030405060708");


fn ec_parameters() -> DomainParameters {
    let curve = StandardizedCurve::BrainpoolP256r1.curve()
        .expect("brainpoolP256r1 is well-formed");
    DomainParameters::PrimeWeierstrassEllipticDiffieHellman(curve)
}

fn dh_parameters() -> DomainParameters {
    let group = ModularGroup::modp_1024_160()
        .expect("MODP group is well-formed");
    DomainParameters::DiffieHellman(group)
}

fn oid(arcs: &'static rasn::types::Oid) -> Oid {
    Oid::from_arcs(arcs)
}

/// A card with:
/// 1. an ECDH key for AES-128
/// 2. a non-key object
/// 3. an ECDH key for AES-256
/// 4. an ECDH key erroneously marked as DH
/// 5. a DH key for AES-128
fn make_card() -> MasterFile {
    let ec_key = StaticKeyPair::from_private_key_bytes(ec_parameters(), &CHIP_EC_PRIVATE_KEY)
        .expect("chip EC key is valid");
    let dh_key = StaticKeyPair::from_private_key_bytes(dh_parameters(), &CHIP_DH_PRIVATE_KEY)
        .expect("chip DH key is valid");

    MasterFile::new()
        .with(CardObject::Key(KeyObject::new(ec_key.clone(), Some(1), vec![oid(oids::CA_ECDH_AES_CBC_CMAC_128)], false))).unwrap()
        .with(CardObject::Other { key_reference: Some(2), description: "PIN".to_owned() }).unwrap()
        .with(CardObject::Key(KeyObject::new(ec_key.clone(), Some(3), vec![oid(oids::CA_ECDH_AES_CBC_CMAC_256)], false))).unwrap()
        .with(CardObject::Key(KeyObject::new(ec_key, Some(4), vec![oid(oids::CA_DH_3DES_CBC_CBC)], false))).unwrap()
        .with(CardObject::Key(KeyObject::new(dh_key, Some(5), vec![oid(oids::CA_DH_AES_CBC_CMAC_128)], false))).unwrap()
}

/// Card state after a Terminal Authentication in which the terminal committed to the given
/// compressed ephemeral public key.
fn terminal_authenticated(compressed_ephemeral_public_key: &[u8]) -> CardState {
    let mut sec_status = SecStatus::new();
    sec_status.publish(
        SecContext::Application,
        SecMechanism::TerminalAuthentication {
            compressed_ephemeral_public_key: compressed_ephemeral_public_key.to_vec(),
        },
    );
    CardState::new(sec_status)
}

fn set_at(ca_oid: &'static rasn::types::Oid, key_reference: Option<&[u8]>) -> CommandApdu {
    let mut data = Tlv::primitive(Tag::CONTEXT_80, oid(ca_oid).as_bytes()).unwrap().to_bytes();
    if let Some(key_reference) = key_reference {
        data.extend(Tlv::primitive(Tag::CONTEXT_84, key_reference).unwrap().to_bytes());
    }
    CommandApdu {
        header: CommandHeader::new(0x00, 0x22, 0x41, 0xA4),
        data: Data::new(data, None).unwrap(),
    }
}

fn general_authenticate_data(ephemeral_public_key: &[u8]) -> Vec<u8> {
    Tlv::constructed(Tag::DYNAMIC_AUTHENTICATION_DATA, vec![
        Tlv::primitive(Tag::CONTEXT_80, ephemeral_public_key).unwrap(),
    ]).unwrap().to_bytes()
}

fn general_authenticate(ephemeral_public_key: &[u8]) -> CommandApdu {
    CommandApdu {
        header: CommandHeader::new(0x00, 0x86, 0x00, 0x00),
        data: Data::new(general_authenticate_data(ephemeral_public_key), Some(256)).unwrap(),
    }
}

/// Key derivation as performed by the terminal (SHA-1 for 128-bit keys).
fn terminal_kdf_128(secret: &[u8], nonce: &[u8], counter: u32) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(secret);
    hasher.update(nonce);
    hasher.update(counter.to_be_bytes());
    hasher.finalize()[0..16].to_vec()
}

/// The token as calculated by the terminal.
fn terminal_token(ca_oid: &'static rasn::types::Oid, key_tag: Tag, ephemeral_public_key: &[u8], k_mac: &[u8]) -> Vec<u8> {
    let input = Tlv::constructed(Tag::PUBLIC_KEY, vec![
        Tlv::primitive(Tag::OID, oid(ca_oid).as_bytes()).unwrap(),
        Tlv::primitive(key_tag, ephemeral_public_key).unwrap(),
    ]).unwrap().to_bytes();
    let mac = CipherSuite::AesCbcCmac128.cipher_and_mac()
        .mac_data(&input, k_mac)
        .unwrap();
    mac[0..8].to_vec()
}


#[test]
fn test_ecdh_chip_authentication() {
    let card = make_card();
    let ca = ChipAuthentication::new(&card);
    let mut session = CaSession::new();
    let mut state = terminal_authenticated(&TERMINAL_EC_PUBLIC_KEY[1..33]);

    let result = ca.process(&mut session, &state.sec_status, &set_at(oids::CA_ECDH_AES_CBC_CMAC_128, Some(&[0x01][..])));
    assert!(result.effects.is_empty());
    let response = result.apply(&mut state);
    assert_eq!(response.to_bytes(), hex!("90 00"));
    assert_eq!(session.template().unwrap().key_reference(), 1);

    let result = ca.general_authenticate_with_nonce(
        &mut session,
        &state.sec_status,
        &general_authenticate_data(&TERMINAL_EC_PUBLIC_KEY),
        &NONCE,
    );
    assert!(result.is_success());
    assert!(result.completes_protocol());
    let response = result.apply(&mut state);

    // the terminal's side of things
    let terminal_key = StaticKeyPair::from_private_key_bytes(ec_parameters(), &TERMINAL_EC_PRIVATE_KEY).unwrap();
    let chip_key = StaticKeyPair::from_private_key_bytes(ec_parameters(), &CHIP_EC_PRIVATE_KEY).unwrap();
    let secret = ec_parameters().agree(terminal_key.private_key(), chip_key.public_key()).unwrap();
    assert_eq!(secret.as_slice(), &EC_SHARED_SECRET);
    let k_enc = terminal_kdf_128(&EC_SHARED_SECRET, &NONCE, 1);
    let k_mac = terminal_kdf_128(&EC_SHARED_SECRET, &NONCE, 2);

    let response_data = Tlv::parse(&response.data).unwrap();
    assert_eq!(response_data.tag(), Tag::DYNAMIC_AUTHENTICATION_DATA);
    assert_eq!(response_data.find(&[Tag::CONTEXT_81]).unwrap().value(), Some(&NONCE[..]));
    let expected_token = terminal_token(oids::CA_ECDH_AES_CBC_CMAC_128, Tag::CONTEXT_86, &TERMINAL_EC_PUBLIC_KEY, &k_mac);
    assert_eq!(response_data.find(&[Tag::CONTEXT_82]).unwrap().value(), Some(expected_token.as_slice()));
    assert_eq!(response.status.to_word(), 0x9000);

    // effects
    assert!(state.completed);
    let sm = state.secure_messaging.as_ref().expect("secure messaging installed");
    assert_eq!(sm.cipher_suite(), CipherSuite::AesCbcCmac128);
    assert_eq!(sm.encryption_key(), k_enc.as_slice());
    assert_eq!(sm.mac_key(), k_mac.as_slice());
    assert_eq!(sm.send_sequence_counter(), &[0u8; 16]);

    let Some(SecMechanism::ChipAuthentication(mechanism)) = state.sec_status.find_mechanism(SecContext::Application, MechanismKind::ChipAuthentication) else {
        panic!("Chip Authentication not recorded");
    };
    assert_eq!(mechanism.ca_oid(), &oid(oids::CA_ECDH_AES_CBC_CMAC_128));
    assert_eq!(mechanism.key_reference(), 1);
    assert_eq!(mechanism.ephemeral_public_key(), &TERMINAL_EC_PUBLIC_KEY);

    assert!(session.is_authenticated());
    assert_eq!(session.session_keys().unwrap().mac_key(), k_mac.as_slice());

    // no second round
    let result = ca.general_authenticate_with_nonce(
        &mut session,
        &state.sec_status,
        &general_authenticate_data(&TERMINAL_EC_PUBLIC_KEY),
        &NONCE,
    );
    assert_eq!(result.response.to_bytes(), hex!("69 85"));
    let result = ca.process(&mut session, &state.sec_status, &set_at(oids::CA_ECDH_AES_CBC_CMAC_128, Some(&[0x01][..])));
    assert_eq!(result.response.to_bytes(), hex!("69 85"));
}


#[test]
fn test_dh_chip_authentication() {
    let card = make_card();
    let ca = ChipAuthentication::new(&card);
    let mut session = CaSession::new();
    let compressed = Sha1::digest(TERMINAL_DH_PUBLIC_KEY);
    let mut state = terminal_authenticated(&compressed);

    let result = ca.process(&mut session, &state.sec_status, &set_at(oids::CA_DH_AES_CBC_CMAC_128, Some(&[0x05][..])));
    assert_eq!(result.apply(&mut state).to_bytes(), hex!("90 00"));

    let result = ca.general_authenticate_with_nonce(
        &mut session,
        &state.sec_status,
        &general_authenticate_data(&TERMINAL_DH_PUBLIC_KEY),
        &NONCE,
    );
    let response = result.apply(&mut state);
    assert_eq!(response.status.to_word(), 0x9000);

    let k_enc = terminal_kdf_128(&DH_SHARED_SECRET, &NONCE, 1);
    let k_mac = terminal_kdf_128(&DH_SHARED_SECRET, &NONCE, 2);
    let sm = state.secure_messaging.as_ref().expect("secure messaging installed");
    assert_eq!(sm.encryption_key(), k_enc.as_slice());
    assert_eq!(sm.mac_key(), k_mac.as_slice());

    let response_data = Tlv::parse(&response.data).unwrap();
    let expected_token = terminal_token(oids::CA_DH_AES_CBC_CMAC_128, Tag::CONTEXT_84, &TERMINAL_DH_PUBLIC_KEY, &k_mac);
    assert_eq!(response_data.find(&[Tag::CONTEXT_82]).unwrap().value(), Some(expected_token.as_slice()));
}


#[test]
fn test_random_nonce() {
    let card = make_card();
    let ca = ChipAuthentication::new(&card);
    let mut session = CaSession::new();
    let mut state = terminal_authenticated(&TERMINAL_EC_PUBLIC_KEY[1..33]);

    ca.process(&mut session, &state.sec_status, &set_at(oids::CA_ECDH_AES_CBC_CMAC_128, None))
        .apply(&mut state);
    let response = ca.process(&mut session, &state.sec_status, &general_authenticate(&TERMINAL_EC_PUBLIC_KEY))
        .apply(&mut state);
    assert_eq!(response.status.to_word(), 0x9000);

    let response_data = Tlv::parse(&response.data).unwrap();
    let nonce = response_data.find(&[Tag::CONTEXT_81]).unwrap().value().unwrap();
    assert_eq!(nonce.len(), NONCE_LENGTH);
    let k_mac = terminal_kdf_128(&EC_SHARED_SECRET, nonce, 2);
    assert_eq!(state.secure_messaging.as_ref().unwrap().mac_key(), k_mac.as_slice());
}


#[test]
fn test_binding_failures() {
    let card = make_card();
    let ca = ChipAuthentication::new(&card);

    let run = |state: &CardState, public_key: &[u8]| {
        let mut session = CaSession::new();
        let set_at_result = ca.process(&mut session, &state.sec_status, &set_at(oids::CA_ECDH_AES_CBC_CMAC_128, Some(&[0x01][..])));
        assert!(set_at_result.is_success());
        let result = ca.general_authenticate_with_nonce(&mut session, &state.sec_status, &general_authenticate_data(public_key), &NONCE);
        assert!(result.completes_protocol());
        assert!(result.secure_messaging().is_none());
        assert!(!result.effects.iter().any(|e| matches!(e, ProtocolEffect::UpdateSecStatus { .. })));
        // the session remains as before the failing command
        assert!(!session.is_authenticated());
        assert!(session.template().is_some());
        result.response.to_bytes()
    };

    // no Terminal Authentication
    assert_eq!(run(&CardState::default(), &TERMINAL_EC_PUBLIC_KEY), hex!("69 82"));

    // Terminal Authentication with a different key
    let mut other_key = TERMINAL_EC_PUBLIC_KEY[1..33].to_vec();
    other_key[31] ^= 0x01;
    assert_eq!(run(&terminal_authenticated(&other_key), &TERMINAL_EC_PUBLIC_KEY), hex!("69 84"));

    // a point that is not on the curve
    let mut off_curve = TERMINAL_EC_PUBLIC_KEY;
    off_curve[64] ^= 0x01;
    assert_eq!(run(&terminal_authenticated(&TERMINAL_EC_PUBLIC_KEY[1..33]), &off_curve), hex!("6A 80"));

    // a compressed point
    assert_eq!(run(&terminal_authenticated(&TERMINAL_EC_PUBLIC_KEY[1..33]), &TERMINAL_EC_PUBLIC_KEY[0..33]), hex!("6A 80"));
}


#[test]
fn test_global_terminal_authentication_does_not_bind() {
    let card = make_card();
    let ca = ChipAuthentication::new(&card);
    let mut sec_status = SecStatus::new();
    sec_status.publish(SecContext::Global, SecMechanism::TerminalAuthentication {
        compressed_ephemeral_public_key: TERMINAL_EC_PUBLIC_KEY[1..33].to_vec(),
    });
    let mut state = CardState::new(sec_status);
    let mut session = CaSession::new();

    ca.process(&mut session, &state.sec_status, &set_at(oids::CA_ECDH_AES_CBC_CMAC_128, Some(&[0x01][..])))
        .apply(&mut state);
    let result = ca.general_authenticate_with_nonce(&mut session, &state.sec_status, &general_authenticate_data(&TERMINAL_EC_PUBLIC_KEY), &NONCE);

    // only a record for the current application counts
    assert!(matches!(result.effects.as_slice(), [ProtocolEffect::ProtocolCompleted]));
    let response = result.apply(&mut state);
    assert_eq!(response.to_bytes(), hex!("69 82"));
    assert!(state.secure_messaging.is_none());
    assert!(state.sec_status.find_mechanism(SecContext::Application, MechanismKind::ChipAuthentication).is_none());
    assert!(!session.is_authenticated());
}


#[test]
fn test_deeply_nested_command_data() {
    let card = make_card();
    let ca = ChipAuthentication::new(&card);
    let state = terminal_authenticated(&TERMINAL_EC_PUBLIC_KEY[1..33]);

    // nested dynamic authentication data filling an extended-length command (built back to front)
    let mut data = Vec::new();
    while data.len() < 65_000 {
        let header: Vec<u8> = if data.len() < 0x80 {
            vec![0x7C, data.len() as u8]
        } else if data.len() < 0x100 {
            vec![0x7C, 0x81, data.len() as u8]
        } else {
            vec![0x7C, 0x82, (data.len() >> 8) as u8, data.len() as u8]
        };
        data.extend(header.iter().rev());
    }
    data.reverse();

    let mut session = CaSession::new();
    let set_at_command = CommandApdu {
        header: CommandHeader::new(0x00, 0x22, 0x41, 0xA4),
        data: Data::new(data.clone(), None).unwrap(),
    };
    let result = ca.process(&mut session, &state.sec_status, &set_at_command);
    assert_eq!(result.response.to_bytes(), hex!("6A 80"));
    assert!(session.template().is_none());

    assert!(ca.process(&mut session, &state.sec_status, &set_at(oids::CA_ECDH_AES_CBC_CMAC_128, Some(&[0x01][..]))).is_success());
    let general_authenticate_command = CommandApdu {
        header: CommandHeader::new(0x00, 0x86, 0x00, 0x00),
        data: Data::new(data, Some(256)).unwrap(),
    };
    let result = ca.process(&mut session, &state.sec_status, &general_authenticate_command);
    assert_eq!(result.response.to_bytes(), hex!("6A 80"));
    assert!(result.secure_messaging().is_none());
}


#[test]
fn test_malformed_general_authenticate() {
    let card = make_card();
    let ca = ChipAuthentication::new(&card);
    let state = terminal_authenticated(&TERMINAL_EC_PUBLIC_KEY[1..33]);

    for data in [
        &[0u8; 0][..],
        &hex!("7C 00")[..],
        &hex!("80 01 04")[..],
        &hex!("7C 03 81 01 04")[..],
        &hex!("7C 05 80 01 04")[..],
    ] {
        let mut session = CaSession::new();
        assert!(ca.process(&mut session, &state.sec_status, &set_at(oids::CA_ECDH_AES_CBC_CMAC_128, Some(&[0x01][..]))).is_success());
        let result = ca.general_authenticate_with_nonce(&mut session, &state.sec_status, data, &NONCE);
        assert_eq!(result.response.to_bytes(), hex!("6A 80"), "data {:02X?}", data);
    }
}


#[test]
fn test_set_authentication_template_failures() {
    let card = make_card();
    let ca = ChipAuthentication::new(&card);
    let state = CardState::default();

    let run = |command: &CommandApdu| {
        let mut session = CaSession::new();
        let result = ca.process(&mut session, &state.sec_status, command);
        assert!(session.template().is_none());
        assert!(result.completes_protocol());
        result.response.to_bytes()
    };

    // unknown key reference
    assert_eq!(run(&set_at(oids::CA_ECDH_AES_CBC_CMAC_128, Some(&[0x09][..]))), hex!("6A 88"));
    // not a key
    assert_eq!(run(&set_at(oids::CA_ECDH_AES_CBC_CMAC_128, Some(&[0x02][..]))), hex!("69 84"));
    // key not usable with this protocol
    assert_eq!(run(&set_at(oids::CA_ECDH_AES_CBC_CMAC_128, Some(&[0x03][..]))), hex!("69 85"));
    // EC key registered for a DH protocol
    assert_eq!(run(&set_at(oids::CA_DH_3DES_CBC_CBC, Some(&[0x04][..]))), hex!("69 85"));
    // no implicit key for this protocol
    assert_eq!(run(&set_at(oids::CA_ECDH_AES_CBC_CMAC_192, None)), hex!("6A 88"));
    // not a Chip Authentication protocol
    assert_eq!(run(&set_at(oids::PK_ECDH, Some(&[0x01][..]))), hex!("6A 80"));
    // key reference too long
    assert_eq!(run(&set_at(oids::CA_ECDH_AES_CBC_CMAC_128, Some(&[0x00; 5][..]))), hex!("6A 80"));

    // no protocol at all
    let no_oid = CommandApdu::from_slice(&hex!("00 22 41 A4 03 84 01 01")).unwrap();
    assert_eq!(run(&no_oid), hex!("6A 80"));
    // garbage
    let garbage = CommandApdu::from_slice(&hex!("00 22 41 A4 02 80 05")).unwrap();
    assert_eq!(run(&garbage), hex!("6A 80"));
}


#[test]
fn test_implicit_key_and_reselection() {
    let card = make_card();
    let ca = ChipAuthentication::new(&card);
    let state = CardState::default();
    let mut session = CaSession::new();

    assert!(ca.process(&mut session, &state.sec_status, &set_at(oids::CA_ECDH_AES_CBC_CMAC_256, None)).is_success());
    let template = session.template().unwrap();
    assert_eq!(template.key_reference(), 3);
    assert_eq!(template.ca_oid(), &CaOid::try_from(oid(oids::CA_ECDH_AES_CBC_CMAC_256)).unwrap());

    // selecting again replaces the template
    assert!(ca.process(&mut session, &state.sec_status, &set_at(oids::CA_ECDH_AES_CBC_CMAC_128, Some(&[0x00, 0x01][..]))).is_success());
    assert_eq!(session.template().unwrap().key_reference(), 1);

    // a failed selection keeps the previous one
    let result = ca.process(&mut session, &state.sec_status, &set_at(oids::CA_ECDH_AES_CBC_CMAC_128, Some(&[0x09][..])));
    assert_eq!(result.response.to_bytes(), hex!("6A 88"));
    assert_eq!(session.template().unwrap().key_reference(), 1);
}


#[test]
fn test_command_routing() {
    let card = make_card();
    let ca = ChipAuthentication::new(&card);
    let state = terminal_authenticated(&TERMINAL_EC_PUBLIC_KEY[1..33]);
    let mut session = CaSession::new();

    // General Authenticate before MSE:Set AT
    let result = ca.process(&mut session, &state.sec_status, &general_authenticate(&TERMINAL_EC_PUBLIC_KEY));
    assert_eq!(result.response.to_bytes(), hex!("69 85"));

    // READ BINARY is not ours
    let read_binary = CommandApdu::from_slice(&hex!("00 B0 00 00 04")).unwrap();
    let result = ca.process(&mut session, &state.sec_status, &read_binary);
    assert_eq!(result.response.to_bytes(), hex!("6D 00"));
    assert!(result.effects.is_empty());

    // MSE with other parameters is not ours either
    let mse_set_kat = CommandApdu::from_slice(&hex!("00 22 41 A6 03 84 01 01")).unwrap();
    let result = ca.process(&mut session, &state.sec_status, &mse_set_kat);
    assert_eq!(result.response.to_bytes(), hex!("6D 00"));
}

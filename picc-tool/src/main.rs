use clap::{Args, Parser, Subcommand, ValueEnum};
use icao_picc::ca::{CaOid, CaSession, ChipAuthentication};
use icao_picc::ca::asn1::{
    ChipAuthenticationDomainParameterInfo, ChipAuthenticationInfo, ChipAuthenticationPublicKeyInfo,
    decode_security_infos, PrivilegedTerminalInfo, security_info_protocol,
};
use icao_picc::ca::sec_infos::{encode_sec_infos, SecInfoPublicity};
use icao_picc::ca::token::authentication_token;
use icao_picc::card::{CardObject, KeyObject, MasterFile};
use icao_picc::crypt::{DomainParameters, KeyAgreement, StaticKeyPair};
use icao_picc::crypt::dh::ModularGroup;
use icao_picc::crypt::elliptic::curves::StandardizedCurve;
use icao_picc::crypt::kdf::Kdf;
use icao_picc::iso7816::apdu::{CommandApdu, CommandHeader, Data, ResponseApdu};
use icao_picc::oid::Oid;
use icao_picc::oids;
use icao_picc::protocol::CardState;
use icao_picc::sec_status::{MechanismKind, SecContext, SecMechanism, SecStatus, SecurityStatus};
use icao_picc::tlv::{self, Tag, Tlv};
use rand::rngs::OsRng;
use rasn::types::Any;
use subtle::ConstantTimeEq;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;


#[derive(Clone, Debug, Eq, Hash, Parser, PartialEq)]
#[command(about = "Emulates the chip side of Chip Authentication")]
struct Opts {
    /// Tracing filter directives, e.g. "debug" or "icao_picc=trace"; overrides RUST_LOG.
    #[arg(short, long = "log-level")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, Subcommand)]
enum Mode {
    /// Outputs the Chip Authentication security infos of a freshly generated key.
    SecInfos(SecInfosOpts),

    /// Runs Chip Authentication between the emulated chip and a simulated terminal.
    Demo(KeyOpts),
}

#[derive(Args, Clone, Debug, Eq, Hash, PartialEq)]
struct KeyOpts {
    /// Standardized domain parameters: "modp1024" or a curve name such as "brainpoolP256r1".
    #[arg(short, long = "curve", default_value = "brainpoolP256r1", value_parser = parse_domain_parameter_id)]
    pub domain_parameter_id: u8,

    #[arg(short, long, value_enum, default_value = "aes128")]
    pub suite: Suite,

    #[arg(short, long = "key-id", default_value = "1")]
    pub key_id: u32,

    /// Only advertise the key to privileged terminals.
    #[arg(short, long)]
    pub privileged: bool,
}

#[derive(Args, Clone, Debug, Eq, Hash, PartialEq)]
struct SecInfosOpts {
    #[command(flatten)]
    pub key: KeyOpts,

    #[arg(short = 'u', long, value_enum, default_value = "plain")]
    pub publicity: Publicity,
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, ValueEnum)]
enum Suite {
    #[value(name = "3des")]
    TripleDes,
    Aes128,
    Aes192,
    Aes256,
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, ValueEnum)]
enum Publicity {
    Plain,
    Authenticated,
    Privileged,
}
impl From<Publicity> for SecInfoPublicity {
    fn from(value: Publicity) -> Self {
        match value {
            Publicity::Plain => SecInfoPublicity::Plain,
            Publicity::Authenticated => SecInfoPublicity::Authenticated,
            Publicity::Privileged => SecInfoPublicity::Privileged,
        }
    }
}


/// Name of the 1024-bit MODP group with 160-bit prime order subgroup.
const MODP_1024_NAME: &str = "modp1024";

fn parse_domain_parameter_id(name: &str) -> Result<u8, String> {
    if name.eq_ignore_ascii_case(MODP_1024_NAME) {
        return Ok(0);
    }
    StandardizedCurve::ALL.into_iter()
        .find(|curve| curve.name().eq_ignore_ascii_case(name))
        .map(|curve| curve.id())
        .ok_or_else(|| {
            let known: Vec<&str> = StandardizedCurve::ALL.iter()
                .map(|curve| curve.name())
                .collect();
            format!("unknown domain parameters {:?}; known: {}, {}", name, MODP_1024_NAME, known.join(", "))
        })
}

fn domain_parameters(id: u8) -> DomainParameters {
    if id == 0 {
        let group = ModularGroup::modp_1024_160()
            .expect("failed to assemble MODP group");
        return DomainParameters::DiffieHellman(group);
    }
    let Some(curve) = StandardizedCurve::from_id(id) else {
        panic!("unsupported standardized domain parameters {}", id)
    };
    let curve = curve.curve()
        .expect("failed to assemble curve");
    DomainParameters::PrimeWeierstrassEllipticDiffieHellman(curve)
}

fn ca_oid(key_agreement: KeyAgreement, suite: Suite) -> CaOid {
    let arcs = match (key_agreement, suite) {
        (KeyAgreement::DiffieHellman, Suite::TripleDes) => oids::CA_DH_3DES_CBC_CBC,
        (KeyAgreement::DiffieHellman, Suite::Aes128) => oids::CA_DH_AES_CBC_CMAC_128,
        (KeyAgreement::DiffieHellman, Suite::Aes192) => oids::CA_DH_AES_CBC_CMAC_192,
        (KeyAgreement::DiffieHellman, Suite::Aes256) => oids::CA_DH_AES_CBC_CMAC_256,
        (KeyAgreement::EllipticCurveDiffieHellman, Suite::TripleDes) => oids::CA_ECDH_3DES_CBC_CBC,
        (KeyAgreement::EllipticCurveDiffieHellman, Suite::Aes128) => oids::CA_ECDH_AES_CBC_CMAC_128,
        (KeyAgreement::EllipticCurveDiffieHellman, Suite::Aes192) => oids::CA_ECDH_AES_CBC_CMAC_192,
        (KeyAgreement::EllipticCurveDiffieHellman, Suite::Aes256) => oids::CA_ECDH_AES_CBC_CMAC_256,
    };
    CaOid::try_from(Oid::from_arcs(arcs))
        .expect("known Chip Authentication OID not recognized")
}

fn generate_key_pair(params: &DomainParameters) -> StaticKeyPair {
    let private_key = params.generate_private_key(&mut OsRng)
        .expect("failed to generate private key");
    StaticKeyPair::new(params.clone(), private_key)
        .expect("failed to calculate public key")
}

/// Assembles a card holding a single Chip Authentication key.
fn make_card(opts: &KeyOpts) -> (MasterFile, CaOid, StaticKeyPair) {
    let params = domain_parameters(opts.domain_parameter_id);
    let ca_oid = ca_oid(params.key_agreement(), opts.suite);
    let key_pair = generate_key_pair(&params);
    let key = KeyObject::new(key_pair.clone(), Some(opts.key_id), vec![ca_oid.oid().clone()], opts.privileged);
    let card = MasterFile::new()
        .with(CardObject::Key(key))
        .expect("failed to store key");
    (card, ca_oid, key_pair)
}

/// Encodes a key reference with as few bytes as possible.
fn key_reference_bytes(key_reference: u32) -> Vec<u8> {
    let bytes = key_reference.to_be_bytes();
    let first_significant = bytes.iter()
        .position(|b| *b != 0x00)
        .unwrap_or(bytes.len() - 1);
    bytes[first_significant..].to_vec()
}

fn exchange(
    ca: &ChipAuthentication,
    session: &mut CaSession,
    state: &mut CardState,
    command: &CommandApdu,
) -> ResponseApdu {
    let command_bytes = command.to_bytes()
        .expect("failed to serialize command");
    println!(">> command:");
    print!("{}", icao_picc::hexdump(&command_bytes));

    let sec_status = state.sec_status.clone();
    let response = ca.process(session, &sec_status, command)
        .apply(state);

    println!("<< response ({}):", response.status);
    print!("{}", icao_picc::hexdump(&response.to_bytes()));
    response
}


fn sec_infos(opts: &SecInfosOpts) {
    let (card, ca_oid, _key_pair) = make_card(&opts.key);
    info!("generated {} key with reference {}", ca_oid, opts.key.key_id);

    let encoded = encode_sec_infos(opts.publicity.into(), &card)
        .expect("failed to encode security infos");
    print!("{}", icao_picc::hexdump(&encoded));

    let infos = decode_security_infos(&encoded)
        .expect("failed to decode security infos");
    for info in &infos {
        print_security_info(info, 0);
    }
}

fn print_security_info(info: &Any, depth: usize) {
    let indent = "  ".repeat(depth);
    let Some(protocol_arcs) = security_info_protocol(info) else {
        println!("{}(unknown structure)", indent);
        return;
    };
    let protocol = Oid::from_arcs(&protocol_arcs);

    if &*protocol_arcs == oids::PRIVILEGED_TERMINAL_INFO {
        println!("{}PrivilegedTerminalInfo", indent);
        let privileged: PrivilegedTerminalInfo = rasn::der::decode(info.as_bytes())
            .expect("failed to decode PrivilegedTerminalInfo");
        let inner = decode_security_infos(privileged.privileged_terminal_infos.as_bytes())
            .expect("failed to decode privileged security infos");
        for inner_info in &inner {
            print_security_info(inner_info, depth + 1);
        }
    } else if let Ok(ca_info) = rasn::der::decode::<ChipAuthenticationInfo>(info.as_bytes()) {
        println!("{}ChipAuthenticationInfo {} version {:?} key {:?}", indent, protocol, ca_info.version, ca_info.key_id);
    } else if let Ok(pk_info) = rasn::der::decode::<ChipAuthenticationPublicKeyInfo>(info.as_bytes()) {
        println!(
            "{}ChipAuthenticationPublicKeyInfo {} ({} key bytes) key {:?}",
            indent, protocol, pk_info.chip_authentication_public_key.subject_public_key.as_raw_slice().len(), pk_info.key_id,
        );
    } else if let Ok(dp_info) = rasn::der::decode::<ChipAuthenticationDomainParameterInfo>(info.as_bytes()) {
        println!(
            "{}ChipAuthenticationDomainParameterInfo {} algorithm {} key {:?}",
            indent, protocol, Oid::from_arcs(&dp_info.domain_parameter.algorithm), dp_info.key_id,
        );
    } else {
        println!("{}{}", indent, protocol);
    }
}


fn demo(opts: &KeyOpts) {
    let (card, ca_oid, chip_key) = make_card(opts);
    let params = chip_key.domain_parameters();
    println!("chip key: {} ({}), reference {}", ca_oid.name(), params.key_agreement_algorithm(), opts.key_id);

    // Terminal Authentication has already taken place; the terminal committed to this key
    let terminal_key = generate_key_pair(params);
    let terminal_public_key = params.encode_public_key(terminal_key.public_key())
        .expect("failed to encode terminal public key");
    let compressed = params.compress(terminal_key.public_key())
        .expect("failed to compress terminal public key");
    let mut sec_status = SecStatus::new();
    sec_status.publish(
        SecContext::Application,
        SecMechanism::TerminalAuthentication {
            compressed_ephemeral_public_key: compressed,
        },
    );
    let mut state = CardState::new(sec_status);

    let ca = ChipAuthentication::new(&card);
    let mut session = CaSession::new();

    // MSE:Set AT
    let set_at_data = tlv::serialize_all(&[
        Tlv::primitive(Tag::CONTEXT_80, ca_oid.oid().as_bytes()).expect("failed to encode OID"),
        Tlv::primitive(Tag::CONTEXT_84, key_reference_bytes(opts.key_id)).expect("failed to encode key reference"),
    ]);
    let set_at = CommandApdu {
        header: CommandHeader::new(0x00, 0x22, 0x41, 0xA4),
        data: Data::new(set_at_data, None).expect("failed to assemble MSE:Set AT"),
    };
    let response = exchange(&ca, &mut session, &mut state, &set_at);
    if !response.status.is_success() {
        panic!("MSE:Set AT failed with {}", response.status);
    }

    // General Authenticate
    let general_authenticate_data = Tlv::constructed(Tag::DYNAMIC_AUTHENTICATION_DATA, vec![
        Tlv::primitive(Tag::CONTEXT_80, terminal_public_key).expect("failed to encode public key"),
    ]).expect("failed to encode dynamic authentication data");
    let general_authenticate = CommandApdu {
        header: CommandHeader::new(0x00, 0x86, 0x00, 0x00),
        data: Data::new(general_authenticate_data.to_bytes(), Some(256)).expect("failed to assemble General Authenticate"),
    };
    let response = exchange(&ca, &mut session, &mut state, &general_authenticate);
    if !response.status.is_success() {
        panic!("General Authenticate failed with {}", response.status);
    }

    // verify the chip from the terminal's point of view
    let objects = tlv::parse_all(&response.data)
        .expect("failed to parse General Authenticate response");
    let nonce = tlv::find_in(&objects, &[Tag::DYNAMIC_AUTHENTICATION_DATA, Tag::CONTEXT_81])
        .and_then(|o| o.value())
        .expect("nonce missing from response");
    let token = tlv::find_in(&objects, &[Tag::DYNAMIC_AUTHENTICATION_DATA, Tag::CONTEXT_82])
        .and_then(|o| o.value())
        .expect("authentication token missing from response");

    let secret = params.agree(terminal_key.private_key(), chip_key.public_key())
        .expect("terminal failed to agree on shared secret");
    let kdf = Kdf::new(ca_oid.key_length())
        .expect("unsupported key length");
    let k_mac = kdf.derive_mac_key(&secret, nonce);
    let k_enc = kdf.derive_encryption_key(&secret, nonce);
    let expected_token = authentication_token(&ca_oid, params, terminal_key.public_key(), &k_mac)
        .expect("terminal failed to calculate authentication token");
    debug!("expected token {}", icao_picc::hex(&expected_token));

    let token_valid = bool::from(expected_token.as_slice().ct_eq(token));
    println!("authentication token valid: {}", token_valid);

    let keys_match = state.secure_messaging.as_ref()
        .map(|sm| sm.encryption_key() == k_enc.as_slice() && sm.mac_key() == k_mac.as_slice())
        .unwrap_or(false);
    println!("session keys match:         {}", keys_match);
    println!("protocol completed:         {}", state.completed);
    if let Some(mechanism) = state.sec_status.find_mechanism(SecContext::Application, MechanismKind::ChipAuthentication) {
        println!("recorded mechanism:         {:?}", mechanism.kind());
    }
}


fn main() {
    let opts = Opts::parse();

    let filter = match &opts.log_level {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match &opts.mode {
        Mode::SecInfos(sec_infos_opts) => sec_infos(sec_infos_opts),
        Mode::Demo(key_opts) => demo(key_opts),
    }
}

//! Object identifiers relevant to Chip Authentication and its capability descriptors.


use rasn::types::Oid as ArcOid;


macro_rules! bsi_oid {
    ($name:ident $(, $number:expr)* $(,)?) => {
        pub const $name: &'static ArcOid = ArcOid::const_new(&[0, 4, 0, 127, 0, 7 $(, $number)*]);
    };
}

macro_rules! ca_oid {
    ($name:ident $(, $number:expr)* $(,)?) => {
        bsi_oid!($name, 2, 2, 3 $(, $number)*);
    };
}

bsi_oid!(STANDARDIZED_DOMAIN_PARAMETERS, 1, 2);

bsi_oid!(PK_DH,                         2, 2, 1, 1);
bsi_oid!(PK_ECDH,                       2, 2, 1, 2);

bsi_oid!(PRIVILEGED_TERMINAL_INFO,      2, 2, 8);

ca_oid!(CA_OID_PREFIX);

ca_oid!(CA_DH,                          1);
ca_oid!(CA_DH_3DES_CBC_CBC,             1, 1);
ca_oid!(CA_DH_AES_CBC_CMAC_128,         1, 2);
ca_oid!(CA_DH_AES_CBC_CMAC_192,         1, 3);
ca_oid!(CA_DH_AES_CBC_CMAC_256,         1, 4);

ca_oid!(CA_ECDH,                        2);
ca_oid!(CA_ECDH_3DES_CBC_CBC,           2, 1);
ca_oid!(CA_ECDH_AES_CBC_CMAC_128,       2, 2);
ca_oid!(CA_ECDH_AES_CBC_CMAC_192,       2, 3);
ca_oid!(CA_ECDH_AES_CBC_CMAC_256,       2, 4);

/// `id-ecPublicKey` (ANSI X9.62)
pub const EC_PUBLIC_KEY: &'static ArcOid = ArcOid::const_new(&[1, 2, 840, 10045, 2, 1]);

/// `prime-field` (ANSI X9.62)
pub const PRIME_FIELD: &'static ArcOid = ArcOid::const_new(&[1, 2, 840, 10045, 1, 1]);

/// `dhpublicnumber` (ANSI X9.42)
pub const DH_PUBLIC_NUMBER: &'static ArcOid = ArcOid::const_new(&[1, 2, 840, 10046, 2, 1]);

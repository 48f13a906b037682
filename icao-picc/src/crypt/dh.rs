//! Classic Diffie-Hellman over a prime-order subgroup of the multiplicative group modulo a prime.


use crypto_bigint::{BoxedUint, Odd};
use crypto_bigint::modular::{BoxedMontyForm, BoxedMontyParams};
use hex_literal::hex;
use zeroize::Zeroizing;

use crate::crypt::{boxed_uint_from_be_slice, fixed_width_be_bytes, KeyError};
use crate::der_util::unsigned_integer_content;
use crate::oid::Oid;
use crate::oids;
use crate::tlv::{Tag, Tlv};


/// The 1024-bit MODP group with 160-bit prime order subgroup (RFC 5114 Section 2.1), standardized
/// domain parameters with identifier 0.
const MODP_1024_160: [&[u8]; 3] = [
    &hex!("
        B10B8F96 A080E01D DE92DE5E AE5D54EC 52C99FBC FB06A3C6 9A6A9DCA 52D23B61
        6073E286 75A23D18 9838EF1E 2EE652C0 13ECB4AE A9061123 24975C3C D49B83BF
        ACCBDD7D 90C4BD70 98488E9C 219A7372 4EFFD6FA E5644738 FAA31A4F F55BCCC0
        A151AF5F 0DC8B4BD 45BF37DF 365C1A65 E68CFDA7 6D4DA708 DF1FB2BC 2E4A4371
    "),
    &hex!("
        A4D1CBD5 C3FD3412 6765A442 EFB99905 F8104DD2 58AC507F D6406CFF 14266D31
        266FEA1E 5C41564B 777E690F 5504F213 160217B4 B01B886A 5E91547F 9E2749F4
        D7FBD7D3 B9A92EE1 909D0D22 63F80A76 A6A24C08 7A091F53 1DBF0A01 69B6A28A
        D662A4D1 8E73AFA3 2D779D59 18D08BC8 858F4DCE F97C2A24 855E6EEB 22B3B2E5
    "),
    &hex!("F518AA87 81A8DF27 8ABA4E7D 64B7CB9D 49462353"),
];


/// Diffie-Hellman domain parameters: a prime modulus, a generator and the order of the subgroup
/// it generates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ModularGroup {
    /// The prime or modulus.
    prime: BoxedUint,

    /// The generator or base.
    generator: BoxedUint,

    /// The order of the subgroup generated by the generator.
    order: BoxedUint,
}
impl ModularGroup {
    /// Assembles a group from the big-endian encodings of its parameters.
    pub fn from_be_slices(prime: &[u8], generator: &[u8], order: &[u8]) -> Option<Self> {
        let prime_bits = u32::try_from(8 * prime.len()).ok()?;
        let prime = boxed_uint_from_be_slice(prime, prime_bits)?;
        let generator = boxed_uint_from_be_slice(generator, prime.bits_precision())?;
        let order_bits = u32::try_from(8 * order.len()).ok()?;
        let order = boxed_uint_from_be_slice(order, order_bits)?;
        Some(Self {
            prime,
            generator,
            order,
        })
    }

    /// The 1024-bit MODP group with 160-bit prime order subgroup.
    pub fn modp_1024_160() -> Option<Self> {
        Self::from_be_slices(MODP_1024_160[0], MODP_1024_160[1], MODP_1024_160[2])
    }

    pub fn prime(&self) -> &BoxedUint { &self.prime }
    pub fn generator(&self) -> &BoxedUint { &self.generator }
    pub fn order(&self) -> &BoxedUint { &self.order }

    /// The number of bytes of an encoded group element.
    pub fn prime_len_bytes(&self) -> usize {
        usize::try_from(self.prime.bits().div_ceil(8))
            .unwrap_or(usize::MAX)
    }

    fn monty_params(&self) -> Option<BoxedMontyParams> {
        let odd_prime = Option::<Odd<BoxedUint>>::from(self.prime.to_odd())?;
        Some(BoxedMontyParams::new(odd_prime))
    }

    fn pow(&self, base: &BoxedUint, exponent: &BoxedUint) -> Option<BoxedUint> {
        let params = self.monty_params()?;
        let base_monty = BoxedMontyForm::new(base.clone(), params);
        Some(base_monty.pow(exponent).retrieve())
    }

    /// Decodes the other party's public value.
    ///
    /// The value may be at most as long as the prime and must satisfy `1 < y < p - 1`.
    pub fn decode_public_key(&self, bytes: &[u8]) -> Option<BoxedUint> {
        if bytes.is_empty() || bytes.len() > self.prime_len_bytes() {
            return None;
        }
        let value = boxed_uint_from_be_slice(bytes, self.prime.bits_precision())?;
        let one = BoxedUint::one_with_precision(self.prime.bits_precision());
        let prime_minus_one = self.prime.wrapping_sub(&one);
        if value <= one || value >= prime_minus_one {
            return None;
        }
        Some(value)
    }

    /// Calculates the public value `g**x mod p` for the private exponent `x`.
    pub fn calculate_public_key(&self, private_key: &BoxedUint) -> Option<BoxedUint> {
        self.pow(&self.generator, private_key)
    }

    /// Calculates the shared secret `y**x mod p`, encoded with the length of the prime.
    pub fn diffie_hellman(&self, private_key: &BoxedUint, other_public_key: &BoxedUint) -> Option<Zeroizing<Vec<u8>>> {
        let secret = Zeroizing::new(self.pow(other_public_key, private_key)?);
        fixed_width_be_bytes(&secret, self.prime_len_bytes())
    }

    /// Encodes the group as X9.42 `DomainParameters` within an algorithm identifier.
    pub fn explicit_algorithm_identifier(&self) -> Result<Tlv, KeyError> {
        let integer = |value: &BoxedUint| {
            let bytes = value.to_be_bytes();
            Tlv::primitive(Tag::INTEGER, unsigned_integer_content(&bytes))
        };
        Ok(Tlv::constructed(Tag::SEQUENCE, vec![
            Tlv::primitive(Tag::OID, Oid::from_arcs(oids::DH_PUBLIC_NUMBER).as_bytes())?,
            Tlv::constructed(Tag::SEQUENCE, vec![
                integer(&self.prime)?,
                integer(&self.generator)?,
                integer(&self.order)?,
            ])?,
        ])?)
    }
}


/// Returns the standardized domain parameter identifier of the given group, if it is one of the
/// standardized groups.
pub fn standardized_id(group: &ModularGroup) -> Option<u8> {
    if ModularGroup::modp_1024_160().as_ref() == Some(group) {
        Some(0)
    } else {
        None
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypt::{DomainParameters, PrivateKey, StaticKeyPair};

    #[test]
    fn icao_doc9303_part11_secg2_key_agreement() {
        let group = ModularGroup::modp_1024_160().unwrap();
        let params = DomainParameters::DiffieHellman(group.clone());
        assert_eq!(params.standardized_id(), Some(0));

        let chip = StaticKeyPair::new(
            params.clone(),
            PrivateKey::from_be_slice(&hex!("66DDAFEA C1609CB5 B963BB0C B3FF8B3E 047F336C")).unwrap(),
        ).unwrap();
        let chip_public = params.encode_public_key(chip.public_key()).unwrap();
        assert_eq!(chip_public, hex!("
            78879F57 225AA808 0D52ED0F C890A4B2 5336F699 AA89A2D3 A189654A F70729E6
            23EA5738 B26381E4 DA19E004 706FACE7 B235C2DB F2F38748 312F3C98 C2DD4882
            A41947B3 24AA1259 AC22579D B93F7085 655AF308 89DBB845 D9E6783F E42C9F24
            49400306 254C8AE8 EE9DD812 A804C0B6 6E8CAFC1 4F84D825 8950A91B 44126EE6
        "));

        let terminal_public = params.reconstruct_public_key(&hex!("
            23FB3749 EA030D2A 25B278D2 A562047A DE3F01B7 4F17A154 02CB7352 CA7D2B3E
            B71C343D B13D1DEB CE9A3666 DBCFC920 B49174A6 02CB4796 5CAA73DC 702489A4
            4D41DB91 4DE9613D C5E98C94 160551C0 DF86274B 9359BC04 90D01B03 AD54022D
            CB4F57FA D6322497 D7A1E28D 46710F46 1AFE710F BBBC5F8B A166F431 1975EC6C
        ")).unwrap();
        let secret = params.agree(chip.private_key(), &terminal_public).unwrap();
        assert_eq!(secret.as_slice(), &hex!("
            5BABEBEF 5B74E5BA 94B5C063 FDA15F1F 1CDE9487 3EE0A5D3 A2FCAB49 F258D07F
            544F13CB 66658C3A FEE9E727 389BE3F6 CBBBD321 28A8C21D D6EEA3CF 7091CDDF
            B08B8D00 7D40318D CCA4FFBF 51208790 FB4BD111 E5A968ED 6B6F08B2 6CA87C41
            0B3CE0C3 10CE104E ABD16629 AA48620C 1279270C B0750C0D 37C57FFF E302AE7F
        ")[..]);

        // compression is the SHA-1 hash of the public value
        assert_eq!(params.compress(&terminal_public).unwrap().len(), 20);
        assert_eq!(params.public_key_data_object(&terminal_public).unwrap().tag(), Tag::CONTEXT_84);
        assert_eq!(params.key_agreement_algorithm(), "DH");
    }

    #[test]
    fn test_public_value_range() {
        let group = ModularGroup::modp_1024_160().unwrap();
        assert!(group.decode_public_key(&[]).is_none());
        assert!(group.decode_public_key(&[0x00]).is_none());
        assert!(group.decode_public_key(&[0x01]).is_none());
        assert!(group.decode_public_key(&[0x02]).is_some());

        let mut prime_minus_one = MODP_1024_160[0].to_vec();
        prime_minus_one[127] -= 1;
        assert!(group.decode_public_key(&prime_minus_one).is_none());
        prime_minus_one[127] -= 1;
        assert!(group.decode_public_key(&prime_minus_one).is_some());

        let too_long = [0x01; 129];
        assert!(group.decode_public_key(&too_long).is_none());
    }

    #[test]
    fn test_explicit_identifier() {
        let group = ModularGroup::from_be_slices(&[0x17], &[0x05], &[0x0B]).unwrap();
        assert_eq!(standardized_id(&group), None);
        let identifier = DomainParameters::DiffieHellman(group).algorithm_identifier().unwrap();
        assert_eq!(
            identifier.to_bytes(),
            hex!("30 14 06 07 2A 86 48 CE 3E 02 01 30 09 02 01 17 02 01 05 02 01 0B"),
        );
    }
}

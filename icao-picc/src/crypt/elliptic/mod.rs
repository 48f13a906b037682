//! Elliptic-curve cryptography over prime fields.


pub mod curves;


use std::ops::{Add, Mul};

use crypto_bigint::{BoxedUint, Integer, Odd};
use crypto_bigint::modular::{BoxedMontyForm, BoxedMontyParams};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq, CtOption};
use zeroize::Zeroizing;

use crate::crypt::{boxed_uint_from_be_slice, fixed_width_be_bytes, KeyError};
use crate::der_util::unsigned_integer_content;
use crate::oid::Oid;
use crate::oids;
use crate::tlv::{Tag, Tlv};


/// A point in affine coordinates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AffinePoint {
    x: BoxedUint,
    y: BoxedUint,
}
impl AffinePoint {
    pub const fn new(x: BoxedUint, y: BoxedUint) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> &BoxedUint { &self.x }
    pub fn y(&self) -> &BoxedUint { &self.y }

    /// Serializes the point in uncompressed form with the given number of bytes per coordinate.
    pub fn to_be_bytes(&self, bytes_per_component: usize) -> Option<Zeroizing<Vec<u8>>> {
        let mut ret = Zeroizing::new(Vec::with_capacity(1 + 2*bytes_per_component));
        ret.push(0x04); // uncompressed coordinates
        ret.extend(fixed_width_be_bytes(&self.x, bytes_per_component)?.as_slice());
        ret.extend(fixed_width_be_bytes(&self.y, bytes_per_component)?.as_slice());
        Some(ret)
    }
}


/// A point in projective coordinates in Montgomery form.
#[derive(Clone, Debug, Eq, PartialEq)]
struct MontyProjectivePoint {
    x: BoxedMontyForm,
    y: BoxedMontyForm,
    z: BoxedMontyForm,
}

#[derive(Clone, Debug)]
struct MontyKnowledge {
    params: BoxedMontyParams,
    a: BoxedMontyForm,
    b: BoxedMontyForm,
}

/// An elliptic curve of the form `y**2 ≡ x**3 + ax + b` modulo a prime number.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrimeWeierstrassCurve {
    /// The prime (modulus) of the curve.
    prime: BoxedUint,

    /// Coefficient `a` in the curve's formula.
    coefficient_a: BoxedUint,

    /// Coefficient `b` in the curve's formula.
    coefficient_b: BoxedUint,

    /// The coordinates of the generator point of the curve.
    generator: AffinePoint,

    /// The order of the group generated by the generator point.
    order: BoxedUint,

    /// The cofactor of the curve.
    ///
    /// The number of points on the curve is the order multiplied by the cofactor.
    cofactor: u8,
}
impl PrimeWeierstrassCurve {
    /// Assembles a curve from the big-endian encodings of its parameters.
    ///
    /// All field elements are decoded with the precision of the prime. Returns `None` if a value
    /// cannot be decoded; use [`Self::validate`] to check the mathematical consistency.
    pub fn from_be_slices(
        prime: &[u8],
        coefficient_a: &[u8],
        coefficient_b: &[u8],
        generator_x: &[u8],
        generator_y: &[u8],
        order: &[u8],
        cofactor: u8,
    ) -> Option<Self> {
        let prime_bits = u32::try_from(8 * prime.len()).ok()?;
        let prime = boxed_uint_from_be_slice(prime, prime_bits)?;
        let precision = prime.bits_precision();
        let order_bits = u32::try_from(8 * order.len()).ok()?;
        Some(Self {
            coefficient_a: boxed_uint_from_be_slice(coefficient_a, precision)?,
            coefficient_b: boxed_uint_from_be_slice(coefficient_b, precision)?,
            generator: AffinePoint::new(
                boxed_uint_from_be_slice(generator_x, precision)?,
                boxed_uint_from_be_slice(generator_y, precision)?,
            ),
            order: boxed_uint_from_be_slice(order, order_bits)?,
            prime,
            cofactor,
        })
    }

    pub fn prime(&self) -> &BoxedUint { &self.prime }
    pub fn coefficient_a(&self) -> &BoxedUint { &self.coefficient_a }
    pub fn coefficient_b(&self) -> &BoxedUint { &self.coefficient_b }
    pub fn generator(&self) -> &AffinePoint { &self.generator }
    pub fn order(&self) -> &BoxedUint { &self.order }
    pub fn cofactor(&self) -> u8 { self.cofactor }

    /// The number of bytes of an encoded field element (coordinate).
    pub fn field_len_bytes(&self) -> usize {
        usize::try_from(self.prime.bits().div_ceil(8))
            .unwrap_or(usize::MAX)
    }

    /// Checks that the prime is odd, that the coefficients and generator coordinates are field
    /// elements and that the generator lies on the curve.
    pub fn validate(&self) -> bool {
        if !bool::from(self.prime.is_odd()) {
            return false;
        }
        let field_elements = [
            &self.coefficient_a,
            &self.coefficient_b,
            &self.generator.x,
            &self.generator.y,
        ];
        if field_elements.iter().any(|e| *e >= &self.prime) {
            return false;
        }
        bool::from(self.is_on_curve_affine(&self.generator))
    }

    /// Returns important curve parameters for operations in Montgomery form.
    fn monty_knowledge(&self) -> Option<MontyKnowledge> {
        let odd_prime = Option::<Odd<BoxedUint>>::from(self.prime.to_odd())?;
        let monty_params = BoxedMontyParams::new(odd_prime);
        Some(MontyKnowledge {
            params: monty_params.clone(),
            a: BoxedMontyForm::new(self.coefficient_a.clone(), monty_params.clone()),
            b: BoxedMontyForm::new(self.coefficient_b.clone(), monty_params),
        })
    }

    fn internal_is_on_curve(monty: &MontyKnowledge, point: &MontyProjectivePoint) -> Choice {
        let inverse_option = point.z.invert();
        let inverse_alternative = point.z.clone();
        let inverse = Option::from(inverse_option.clone()).unwrap_or(inverse_alternative);

        let x = (&point.x).mul(&inverse);
        let y = (&point.y).mul(&inverse);

        let y_squared = (&y).mul(&y);
        let x_cubed = (&x).mul(&x).mul(&x);
        let ax = (&x).mul(&monty.a);
        let rhs = (&x_cubed).add(&ax).add(&monty.b);
        let are_equal = y_squared.retrieve().ct_eq(&rhs.retrieve());
        Choice::conditional_select(&Choice::from(0), &are_equal, inverse_option.is_some())
    }

    fn internal_affine_to_monty_projective(monty: &MontyKnowledge, point: &AffinePoint) -> MontyProjectivePoint {
        let x = BoxedMontyForm::new(point.x.clone(), monty.params.clone());
        let y = BoxedMontyForm::new(point.y.clone(), monty.params.clone());
        let z = BoxedMontyForm::one(monty.params.clone());
        MontyProjectivePoint { x, y, z }
    }

    fn internal_monty_projective_to_affine(point: &MontyProjectivePoint) -> CtOption<AffinePoint> {
        let inverse_option = point.z.invert();
        let inverse_alternative = point.z.clone();
        let inverse = Option::from(inverse_option.clone()).unwrap_or(inverse_alternative);

        let x = (&point.x).mul(&inverse);
        let y = (&point.y).mul(&inverse);

        CtOption::new(AffinePoint::new(x.retrieve(), y.retrieve()), inverse_option.is_some())
    }

    fn internal_double_point(monty: &MontyKnowledge, point: &MontyProjectivePoint) -> MontyProjectivePoint {
        // Renes/Costello/Batina 2015 (https://eprint.iacr.org/2015/1060), Algorithm 3
        let b3 = (&monty.b).add(&monty.b).add(&monty.b);

        // 1. t0 ← X · X
        let mut t0 = (&point.x).mul(&point.x);
        // 2. t1 ← Y · Y
        let t1 = (&point.y).mul(&point.y);
        // 3. t2 ← Z · Z
        let mut t2 = (&point.z).mul(&point.z);
        // 4. t3 ← X · Y
        let mut t3 = (&point.x).mul(&point.y);
        // 5. t3 ← t3 + t3
        t3 = (&t3).add(&t3);
        // 6. Z3 ← X · Z
        let mut z3 = (&point.x).mul(&point.z);
        // 7. Z3 ← Z3 + Z3
        z3 = (&z3).add(&z3);
        // 8. X3 ← a · Z3
        let mut x3 = (&monty.a).mul(&z3);
        // 9. Y3 ← b3 · t2
        let mut y3 = (&b3).mul(&t2);
        // 10. Y3 ← X3 + Y3
        y3 = (&x3).add(&y3);
        // 11. X3 ← t1 − Y3
        x3 = (&t1).sub(&y3);
        // 12. Y3 ← t1 + Y3
        y3 = (&t1).add(&y3);
        // 13. Y3 ← X3 · Y3
        y3 = (&x3).mul(&y3);
        // 14. X3 ← t3 · X3
        x3 = (&t3).mul(&x3);
        // 15. Z3 ← b3 · Z3
        z3 = (&b3).mul(&z3);
        // 16. t2 ← a · t2
        t2 = (&monty.a).mul(&t2);
        // 17. t3 ← t0 − t2
        t3 = (&t0).sub(&t2);
        // 18. t3 ← a · t3
        t3 = (&monty.a).mul(&t3);
        // 19. t3 ← t3 + Z3
        t3 = (&t3).add(&z3);
        // 20. Z3 ← t0 + t0
        z3 = (&t0).add(&t0);
        // 21. t0 ← Z3 + t0
        t0 = (&z3).add(&t0);
        // 22. t0 ← t0 + t2
        t0 = (&t0).add(&t2);
        // 23. t0 ← t0 · t3
        t0 = (&t0).mul(&t3);
        // 24. Y3 ← Y3 + t0
        y3 = (&y3).add(&t0);
        // 25. t2 ← Y · Z
        t2 = (&point.y).mul(&point.z);
        // 26. t2 ← t2 + t2
        t2 = (&t2).add(&t2);
        // 27. t0 ← t2 · t3
        t0 = (&t2).mul(&t3);
        // 28. X3 ← X3 − t0
        x3 = (&x3).sub(&t0);
        // 29. Z3 ← t2 · t1
        z3 = (&t2).mul(&t1);
        // 30. Z3 ← Z3 + Z3
        z3 = (&z3).add(&z3);
        // 31. Z3 ← Z3 + Z3
        z3 = (&z3).add(&z3);
        MontyProjectivePoint { x: x3, y: y3, z: z3 }
    }

    fn internal_add_points(monty: &MontyKnowledge, lhs: &MontyProjectivePoint, rhs: &MontyProjectivePoint) -> MontyProjectivePoint {
        // Renes/Costello/Batina 2015 (https://eprint.iacr.org/2015/1060), Algorithm 1
        let b3 = (&monty.b).add(&monty.b).add(&monty.b);

        // 1. t0 ← X1 · X2
        let mut t0 = (&lhs.x).mul(&rhs.x);
        // 2. t1 ← Y1 · Y2
        let mut t1 = (&lhs.y).mul(&rhs.y);
        // 3. t2 ← Z1 · Z2
        let mut t2 = (&lhs.z).mul(&rhs.z);
        // 4. t3 ← X1 + Y1
        let mut t3 = (&lhs.x).add(&lhs.y);
        // 5. t4 ← X2 + Y2
        let mut t4 = (&rhs.x).add(&rhs.y);
        // 6. t3 ← t3 · t4
        t3 = (&t3).mul(&t4);
        // 7. t4 ← t0 + t1
        t4 = (&t0).add(&t1);
        // 8. t3 ← t3 − t4
        t3 = (&t3).sub(&t4);
        // 9. t4 ← X1 + Z1
        t4 = (&lhs.x).add(&lhs.z);
        // 10. t5 ← X2 + Z2
        let mut t5 = (&rhs.x).add(&rhs.z);
        // 11. t4 ← t4 · t5
        t4 = (&t4).mul(&t5);
        // 12. t5 ← t0 + t2
        t5 = (&t0).add(&t2);
        // 13. t4 ← t4 − t5
        t4 = (&t4).sub(&t5);
        // 14. t5 ← Y1 + Z1
        t5 = (&lhs.y).add(&lhs.z);
        // 15. X3 ← Y2 + Z2
        let mut x3 = (&rhs.y).add(&rhs.z);
        // 16. t5 ← t5 · X3
        t5 = (&t5).mul(&x3);
        // 17. X3 ← t1 + t2
        x3 = (&t1).add(&t2);
        // 18. t5 ← t5 − X3
        t5 = (&t5).sub(&x3);
        // 19. Z3 ← a · t4
        let mut z3 = (&monty.a).mul(&t4);
        // 20. X3 ← b3 · t2
        x3 = (&b3).mul(&t2);
        // 21. Z3 ← X3 + Z3
        z3 = (&x3).add(&z3);
        // 22. X3 ← t1 − Z3
        x3 = (&t1).sub(&z3);
        // 23. Z3 ← t1 + Z3
        z3 = (&t1).add(&z3);
        // 24. Y3 ← X3 · Z3
        let mut y3 = (&x3).mul(&z3);
        // 25. t1 ← t0 + t0
        t1 = (&t0).add(&t0);
        // 26. t1 ← t1 + t0
        t1 = (&t1).add(&t0);
        // 27. t2 ← a · t2
        t2 = (&monty.a).mul(&t2);
        // 28. t4 ← b3 · t4
        t4 = (&b3).mul(&t4);
        // 29. t1 ← t1 + t2
        t1 = (&t1).add(&t2);
        // 30. t2 ← t0 − t2
        t2 = (&t0).sub(&t2);
        // 31. t2 ← a · t2
        t2 = (&monty.a).mul(&t2);
        // 32. t4 ← t4 + t2
        t4 = (&t4).add(&t2);
        // 33. t0 ← t1 · t4
        t0 = (&t1).mul(&t4);
        // 34. Y3 ← Y3 + t0
        y3 = (&y3).add(&t0);
        // 35. t0 ← t5 · t4
        t0 = (&t5).mul(&t4);
        // 36. X3 ← t3 · X3
        x3 = (&t3).mul(&x3);
        // 37. X3 ← X3 − t0
        x3 = (&x3).sub(&t0);
        // 38. t0 ← t3 · t1
        t0 = (&t3).mul(&t1);
        // 39. Z3 ← t5 · Z3
        z3 = (&t5).mul(&z3);
        // 40. Z3 ← Z3 + t0
        z3 = (&z3).add(&t0);
        MontyProjectivePoint { x: x3, y: y3, z: z3 }
    }

    fn internal_point_at_infinity(monty: &MontyKnowledge) -> MontyProjectivePoint {
        let x = BoxedMontyForm::zero(monty.params.clone());
        let y = BoxedMontyForm::one(monty.params.clone());
        let z = BoxedMontyForm::zero(monty.params.clone());
        MontyProjectivePoint { x, y, z }
    }

    /// Multiplies a point with a scalar. The result may be the point at infinity.
    fn internal_multiply_scalar_with_point(monty: &MontyKnowledge, scalar: &BoxedUint, point: &MontyProjectivePoint) -> MontyProjectivePoint {
        let mut result = Self::internal_point_at_infinity(monty);

        if bool::from(scalar.is_zero()) {
            return result;
        }

        let mut double_me = point.clone();
        for i in 0..scalar.bits() {
            let sum = Self::internal_add_points(monty, &result, &double_me);
            result = if bool::from(scalar.bit(i)) { sum } else { result };
            double_me = Self::internal_double_point(monty, &double_me);
        }

        result
    }

    pub fn is_on_curve_affine(&self, point: &AffinePoint) -> Choice {
        let Some(monty) = self.monty_knowledge() else {
            return Choice::from(0);
        };
        let projective = Self::internal_affine_to_monty_projective(&monty, point);
        Self::internal_is_on_curve(&monty, &projective)
    }

    /// Decodes a point from its uncompressed encoding.
    ///
    /// Both coordinates must have exactly the length of a field element, be less than the prime and
    /// describe a point on the curve.
    pub fn decode_point(&self, bytes: &[u8]) -> Option<AffinePoint> {
        let coordinate_length = self.field_len_bytes();
        if bytes.len() != 1 + 2*coordinate_length {
            return None;
        }
        if bytes[0] != 0x04 {
            // we only support the uncompressed representation
            return None;
        }

        let precision = self.prime.bits_precision();
        let x = boxed_uint_from_be_slice(&bytes[1..1+coordinate_length], precision)?;
        let y = boxed_uint_from_be_slice(&bytes[1+coordinate_length..], precision)?;
        if x >= self.prime || y >= self.prime {
            return None;
        }

        let point = AffinePoint::new(x, y);
        if !bool::from(self.is_on_curve_affine(&point)) {
            return None;
        }
        Some(point)
    }

    /// Encodes a point in uncompressed form.
    pub fn encode_point(&self, point: &AffinePoint) -> Option<Zeroizing<Vec<u8>>> {
        point.to_be_bytes(self.field_len_bytes())
    }

    /// Calculates a public key from a private key.
    ///
    /// Returns `None` if the private key is a multiple of the order.
    pub fn calculate_public_key(&self, private_key: &BoxedUint) -> Option<AffinePoint> {
        // public_key = private_key * generator
        let monty = self.monty_knowledge()?;
        let generator = Self::internal_affine_to_monty_projective(&monty, &self.generator);
        let product = Self::internal_multiply_scalar_with_point(&monty, private_key, &generator);
        Option::from(Self::internal_monty_projective_to_affine(&product))
    }

    /// Multiplies the other party's public key with our private key.
    ///
    /// Returns `None` if the public key is not on the curve or the result is the point at infinity.
    pub fn diffie_hellman(&self, private_key: &BoxedUint, other_public_key: &AffinePoint) -> Option<AffinePoint> {
        // secret_key = private_key * other_public_key
        let monty = self.monty_knowledge()?;
        let other_pub = Self::internal_affine_to_monty_projective(&monty, other_public_key);

        // defend against skullduggery: check if other public key is on the curve
        if !bool::from(Self::internal_is_on_curve(&monty, &other_pub)) {
            return None;
        }

        let product = Self::internal_multiply_scalar_with_point(&monty, private_key, &other_pub);
        Option::from(Self::internal_monty_projective_to_affine(&product))
    }

    /// Encodes the curve as explicit `ECParameters` (ANSI X9.62) within an algorithm identifier.
    pub fn explicit_algorithm_identifier(&self) -> Result<Tlv, KeyError> {
        let field_len = self.field_len_bytes();
        let field_element = |value: &BoxedUint| {
            fixed_width_be_bytes(value, field_len)
                .map(|b| b.to_vec())
                .ok_or(KeyError::UnsupportedOperation("curve parameter exceeds field length"))
        };
        let integer = |value: &BoxedUint| {
            let bytes = Zeroizing::new(value.to_be_bytes());
            Tlv::primitive(Tag::INTEGER, unsigned_integer_content(&bytes))
        };
        let generator = self.encode_point(&self.generator)
            .ok_or(KeyError::UnsupportedOperation("generator exceeds field length"))?;

        let ec_parameters = Tlv::constructed(Tag::SEQUENCE, vec![
            // version: ecpVer1
            Tlv::primitive(Tag::INTEGER, vec![0x01])?,
            // fieldID
            Tlv::constructed(Tag::SEQUENCE, vec![
                Tlv::primitive(Tag::OID, Oid::from_arcs(oids::PRIME_FIELD).as_bytes())?,
                integer(&self.prime)?,
            ])?,
            // curve
            Tlv::constructed(Tag::SEQUENCE, vec![
                Tlv::primitive(Tag::OCTET_STRING, field_element(&self.coefficient_a)?)?,
                Tlv::primitive(Tag::OCTET_STRING, field_element(&self.coefficient_b)?)?,
            ])?,
            // base
            Tlv::primitive(Tag::OCTET_STRING, generator.to_vec())?,
            // order
            integer(&self.order)?,
            // cofactor
            Tlv::primitive(Tag::INTEGER, unsigned_integer_content(&[self.cofactor]))?,
        ])?;

        Ok(Tlv::constructed(Tag::SEQUENCE, vec![
            Tlv::primitive(Tag::OID, Oid::from_arcs(oids::EC_PUBLIC_KEY).as_bytes())?,
            ec_parameters,
        ])?)
    }
}

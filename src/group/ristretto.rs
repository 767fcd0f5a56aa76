// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! ristretto255 (RFC 9496) over edwards25519, with the element-derivation
//! map of RFC 9380 Appendix B / RFC 9496 §4.3.4.
//!
//! Points are kept in extended twisted-Edwards coordinates (X : Y : Z : T)
//! with the complete a = -1 addition formulas; the ristretto codec and the
//! one-way map follow the RFC pseudocode, with square roots resolved
//! through `SQRT_RATIO_M1`.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use once_cell::sync::Lazy;
use subtle::Choice;

use crate::errors::ProtocolError;
use crate::group::expand::expand_message_xmd;
use crate::group::field;
use crate::group::Group;
use crate::hash::Hash;

const FE_LEN: usize = 32;

struct RistrettoParams {
    p: BigUint,
    d: BigUint,
    two_d: BigUint,
    sqrt_m1: BigUint,
    sqrt_ad_minus_one: BigUint,
    invsqrt_a_minus_d: BigUint,
    one_minus_d_sq: BigUint,
    d_minus_one_sq: BigUint,
    n: BigUint,
    base: ExtPoint,
}

fn from_dec(s: &str) -> BigUint {
    BigUint::parse_bytes(s.as_bytes(), 10).expect("valid curve constant")
}

static PARAMS: Lazy<RistrettoParams> = Lazy::new(|| {
    // p = 2^255 - 19
    let p = (BigUint::one() << 255usize) - 19u32;
    // d = -121665 / 121666
    let d = field::mul(
        &field::neg(&BigUint::from(121665u32), &p),
        &field::inv0(&BigUint::from(121666u32), &p),
        &p,
    );
    // The remaining field constants are the ones RFC 9496 §4.1 fixes,
    // including their sign choices.
    let sqrt_m1 = from_dec(
        "19681161376707505956807079304988542015446066515923890162744021073123829784752",
    );
    let sqrt_ad_minus_one = from_dec(
        "25063068953384623474111414158702152701244531502492656460079210482610430750235",
    );
    let invsqrt_a_minus_d = from_dec(
        "54469307008909316920995813868745141605393597292927456921205312896311721017578",
    );
    let one_minus_d_sq = from_dec(
        "1159843021668779879193775521855586647937357759715417654439879720876111806838",
    );
    let d_minus_one_sq = from_dec(
        "40440834346308536858101042469323190826248399146238708352240133220865137265952",
    );
    // n = 2^252 + 27742317777372353535851937790883648493
    let n = (BigUint::one() << 252usize)
        + from_dec("27742317777372353535851937790883648493");

    // Base point: y = 4/5 with the even square root for x.
    let base_y = field::mul(
        &BigUint::from(4u32),
        &field::inv0(&BigUint::from(5u32), &p),
        &p,
    );
    let y_sq = field::sqr(&base_y, &p);
    let u = field::sub(&y_sq, &BigUint::one(), &p);
    let v = field::add(&field::mul(&d, &y_sq, &p), &BigUint::one(), &p);
    let (_, base_x) = sqrt_ratio_m1_raw(&u, &v, &p, &sqrt_m1);
    let base = ExtPoint {
        t: field::mul(&base_x, &base_y, &p),
        x: base_x,
        y: base_y,
        z: BigUint::one(),
    };

    RistrettoParams {
        two_d: field::add(&d, &d, &p),
        p,
        d,
        sqrt_m1,
        sqrt_ad_minus_one,
        invsqrt_a_minus_d,
        one_minus_d_sq,
        d_minus_one_sq,
        n,
        base,
    }
});

/// An edwards25519 point in extended coordinates. Equality is ristretto
/// equality, so coset representatives compare equal.
#[derive(Clone, Debug)]
pub struct ExtPoint {
    x: BigUint,
    y: BigUint,
    z: BigUint,
    t: BigUint,
}

impl PartialEq for ExtPoint {
    fn eq(&self, other: &Self) -> bool {
        // CT_EQ from RFC 9496 §4.3.3: x1*y2 == y1*x2 or y1*y2 == x1*x2.
        let p = &PARAMS.p;
        let xy = field::mul(&self.x, &other.y, p);
        let yx = field::mul(&self.y, &other.x, p);
        let yy = field::mul(&self.y, &other.y, p);
        let xx = field::mul(&self.x, &other.x, p);
        bool::from(field::ct_eq(&xy, &yx, FE_LEN) | field::ct_eq(&yy, &xx, FE_LEN))
    }
}

impl Eq for ExtPoint {}

impl ExtPoint {
    fn identity() -> Self {
        ExtPoint {
            x: BigUint::zero(),
            y: BigUint::one(),
            z: BigUint::one(),
            t: BigUint::zero(),
        }
    }

    /// Complete addition (a = -1 extended formulas).
    fn add(&self, other: &ExtPoint) -> ExtPoint {
        let p = &PARAMS.p;
        let a = field::mul(
            &field::sub(&self.y, &self.x, p),
            &field::sub(&other.y, &other.x, p),
            p,
        );
        let b = field::mul(
            &field::add(&self.y, &self.x, p),
            &field::add(&other.y, &other.x, p),
            p,
        );
        let c = field::mul(&field::mul(&self.t, &PARAMS.two_d, p), &other.t, p);
        let d = field::mul(
            &field::add(&self.z, &self.z, p),
            &other.z,
            p,
        );
        let e = field::sub(&b, &a, p);
        let f = field::sub(&d, &c, p);
        let g = field::add(&d, &c, p);
        let h = field::add(&b, &a, p);
        ExtPoint {
            x: field::mul(&e, &f, p),
            y: field::mul(&g, &h, p),
            z: field::mul(&f, &g, p),
            t: field::mul(&e, &h, p),
        }
    }

    fn scalar_mul(&self, scalar: &BigUint) -> ExtPoint {
        let k = scalar % &PARAMS.n;
        let mut acc = ExtPoint::identity();
        for i in (0..k.bits()).rev() {
            acc = acc.add(&acc);
            if k.bit(i) {
                acc = acc.add(self);
            }
        }
        acc
    }
}

fn is_negative(x: &BigUint) -> Choice {
    Choice::from(x.bit(0) as u8)
}

fn ct_abs(x: &BigUint, p: &BigUint) -> BigUint {
    field::ct_select(x, &field::neg(x, p), is_negative(x), FE_LEN)
}

/// `SQRT_RATIO_M1(u, v)` (RFC 9496 §4.2): returns `(was_square, r)` with
/// `r = ct_abs(sqrt(u/v))` when `u/v` is square, else
/// `r = ct_abs(sqrt(SQRT_M1 * u/v))`.
fn sqrt_ratio_m1_raw(
    u: &BigUint,
    v: &BigUint,
    p: &BigUint,
    sqrt_m1: &BigUint,
) -> (Choice, BigUint) {
    let v3 = field::mul(&field::sqr(v, p), v, p);
    let v7 = field::mul(&field::sqr(&v3, p), v, p);
    // r = (u * v^3) * (u * v^7)^((p - 5) / 8)
    let exp = (p - 5u32) >> 3;
    let mut r = field::mul(
        &field::mul(u, &v3, p),
        &field::pow(&field::mul(u, &v7, p), &exp, p),
        p,
    );
    let check = field::mul(v, &field::sqr(&r, p), p);

    let neg_u = field::neg(u, p);
    let correct_sign = field::ct_eq(&check, u, FE_LEN);
    let flipped_sign = field::ct_eq(&check, &neg_u, FE_LEN);
    let flipped_sign_i = field::ct_eq(&check, &field::mul(&neg_u, sqrt_m1, p), FE_LEN);

    let r_prime = field::mul(sqrt_m1, &r, p);
    r = field::ct_select(&r, &r_prime, flipped_sign | flipped_sign_i, FE_LEN);
    r = ct_abs(&r, p);

    (correct_sign | flipped_sign, r)
}

fn sqrt_ratio_m1(u: &BigUint, v: &BigUint) -> (Choice, BigUint) {
    sqrt_ratio_m1_raw(u, v, &PARAMS.p, &PARAMS.sqrt_m1)
}

/// Canonical 32-byte little-endian encoding of a point (RFC 9496 §4.3.2).
fn encode(point: &ExtPoint) -> Vec<u8> {
    let p = &PARAMS.p;
    let one = BigUint::one();

    let u1 = field::mul(
        &field::add(&point.z, &point.y, p),
        &field::sub(&point.z, &point.y, p),
        p,
    );
    let u2 = field::mul(&point.x, &point.y, p);
    let (_, invsqrt) = sqrt_ratio_m1(&one, &field::mul(&u1, &field::sqr(&u2, p), p));

    let den1 = field::mul(&invsqrt, &u1, p);
    let den2 = field::mul(&invsqrt, &u2, p);
    let z_inv = field::mul(&field::mul(&den1, &den2, p), &point.t, p);

    let ix0 = field::mul(&point.x, &PARAMS.sqrt_m1, p);
    let iy0 = field::mul(&point.y, &PARAMS.sqrt_m1, p);
    let enchanted_denominator = field::mul(&den1, &PARAMS.invsqrt_a_minus_d, p);

    let rotate = is_negative(&field::mul(&point.t, &z_inv, p));

    let x = field::ct_select(&point.x, &iy0, rotate, FE_LEN);
    let mut y = field::ct_select(&point.y, &ix0, rotate, FE_LEN);
    let den_inv = field::ct_select(&den2, &enchanted_denominator, rotate, FE_LEN);

    y = field::ct_select(&y, &field::neg(&y, p), is_negative(&field::mul(&x, &z_inv, p)), FE_LEN);

    let s = ct_abs(&field::mul(&den_inv, &field::sub(&point.z, &y, p), p), p);

    let mut out = s.to_bytes_le();
    out.resize(FE_LEN, 0);
    out
}

/// Decodes and validates a canonical encoding (RFC 9496 §4.3.1).
fn decode(bytes: &[u8]) -> Result<ExtPoint, ProtocolError> {
    if bytes.len() != FE_LEN {
        return Err(ProtocolError::InvalidPoint);
    }
    let p = &PARAMS.p;
    let one = BigUint::one();

    let s = BigUint::from_bytes_le(bytes);
    // Canonical and non-negative.
    if &s >= p || bool::from(is_negative(&s)) {
        return Err(ProtocolError::InvalidPoint);
    }

    let ss = field::sqr(&s, p);
    let u1 = field::sub(&one, &ss, p);
    let u2 = field::add(&one, &ss, p);
    let u2_sqr = field::sqr(&u2, p);

    // v = -(D * u1^2) - u2_sqr
    let v = field::sub(
        &field::neg(&field::mul(&PARAMS.d, &field::sqr(&u1, p), p), p),
        &u2_sqr,
        p,
    );
    let (was_square, invsqrt) = sqrt_ratio_m1(&one, &field::mul(&v, &u2_sqr, p));

    let den_x = field::mul(&invsqrt, &u2, p);
    let den_y = field::mul(&field::mul(&invsqrt, &den_x, p), &v, p);

    let x = ct_abs(&field::mul(&field::add(&s, &s, p), &den_x, p), p);
    let y = field::mul(&u1, &den_y, p);
    let t = field::mul(&x, &y, p);

    if !bool::from(was_square) || bool::from(is_negative(&t)) || y.is_zero() {
        return Err(ProtocolError::InvalidPoint);
    }
    Ok(ExtPoint {
        x,
        y,
        z: one,
        t,
    })
}

/// The one-way map of RFC 9496 §4.3.4, taking one 32-byte string.
fn map(bytes: &[u8]) -> ExtPoint {
    let p = &PARAMS.p;
    let one = BigUint::one();

    // Interpret as little-endian, mask the high bit, reduce.
    let mut masked = bytes.to_vec();
    masked[31] &= 0x7f;
    let t = BigUint::from_bytes_le(&masked) % p;

    let r = field::mul(&PARAMS.sqrt_m1, &field::sqr(&t, p), p);
    let u = field::mul(&field::add(&r, &one, p), &PARAMS.one_minus_d_sq, p);
    // v = (-1 - r*D) * (r + D)
    let v = field::mul(
        &field::neg(&field::add(&one, &field::mul(&r, &PARAMS.d, p), p), p),
        &field::add(&r, &PARAMS.d, p),
        p,
    );

    let (was_square, s) = sqrt_ratio_m1(&u, &v);
    let s_prime = field::neg(&ct_abs(&field::mul(&s, &t, p), p), p);
    let s = field::ct_select(&s_prime, &s, was_square, FE_LEN);
    let c = field::ct_select(&r, &field::neg(&one, p), was_square, FE_LEN);

    // N = c * (r - 1) * D_MINUS_ONE_SQ - v
    let n = field::sub(
        &field::mul(
            &field::mul(&c, &field::sub(&r, &one, p), p),
            &PARAMS.d_minus_one_sq,
            p,
        ),
        &v,
        p,
    );

    let s_sq = field::sqr(&s, p);
    let w0 = field::mul(&field::add(&s, &s, p), &v, p);
    let w1 = field::mul(&n, &PARAMS.sqrt_ad_minus_one, p);
    let w2 = field::sub(&one, &s_sq, p);
    let w3 = field::add(&one, &s_sq, p);

    ExtPoint {
        x: field::mul(&w0, &w3, p),
        y: field::mul(&w2, &w1, p),
        z: field::mul(&w1, &w3, p),
        t: field::mul(&w0, &w2, p),
    }
}

/// The ristretto255 group.
pub struct Ristretto255;

impl Group for Ristretto255 {
    const ELEM_LEN: usize = 32;
    const SCALAR_LEN: usize = 32;
    const UNIFORM_BYTES_LEN: usize = 64;

    type Elem = ExtPoint;

    fn order() -> &'static BigUint {
        &PARAMS.n
    }

    fn hash_to_group<D: Hash>(msg: &[&[u8]], dst: &[u8]) -> Result<Self::Elem, ProtocolError> {
        let uniform = expand_message_xmd::<D>(msg, dst, 64)?;
        let p0 = map(&uniform[..32]);
        let p1 = map(&uniform[32..]);
        Ok(p0.add(&p1))
    }

    fn hash_to_scalar<D: Hash>(msg: &[&[u8]], dst: &[u8]) -> Result<BigUint, ProtocolError> {
        let uniform = expand_message_xmd::<D>(msg, dst, 64)?;
        // Wide little-endian reduction mod the group order.
        Ok(BigUint::from_bytes_le(&uniform) % &PARAMS.n)
    }

    fn scalar_mul(scalar: &BigUint, element: &Self::Elem) -> Self::Elem {
        element.scalar_mul(scalar)
    }

    fn base_mul(scalar: &BigUint) -> Self::Elem {
        PARAMS.base.scalar_mul(scalar)
    }

    fn serialize_elem(element: &Self::Elem) -> Vec<u8> {
        encode(element)
    }

    fn deserialize_elem(bytes: &[u8]) -> Result<Self::Elem, ProtocolError> {
        let point = decode(bytes)?;
        // The identity (the all-zero string) is not a valid protocol
        // element.
        if point == ExtPoint::identity() {
            return Err(ProtocolError::InvalidPoint);
        }
        Ok(point)
    }

    /// Scalars are encoded little-endian, unlike the Weierstrass groups.
    fn serialize_scalar(scalar: &BigUint) -> Result<Vec<u8>, ProtocolError> {
        if scalar >= Self::order() {
            return Err(ProtocolError::InvalidConfiguration);
        }
        let mut out = scalar.to_bytes_le();
        out.resize(Self::SCALAR_LEN, 0);
        Ok(out)
    }

    fn deserialize_scalar(bytes: &[u8]) -> Result<BigUint, ProtocolError> {
        if bytes.len() != Self::SCALAR_LEN {
            return Err(ProtocolError::InvalidLength);
        }
        let scalar = BigUint::from_bytes_le(bytes);
        if &scalar >= Self::order() {
            return Err(ProtocolError::InvalidConfiguration);
        }
        Ok(scalar)
    }
}

#[cfg(test)]
mod tests {
    use sha2::Sha512;

    use super::*;

    #[test]
    fn field_constants_are_consistent() {
        let p = &PARAMS.p;
        let one = BigUint::one();
        // d = -121665/121666
        let d_check = field::mul(
            &field::neg(&BigUint::from(121665u32), p),
            &field::inv0(&BigUint::from(121666u32), p),
            p,
        );
        assert_eq!(PARAMS.d, d_check);
        // sqrt(-1)^2 == -1
        assert_eq!(
            field::sqr(&PARAMS.sqrt_m1, p),
            field::neg(&one, p)
        );
        assert_eq!(
            PARAMS.one_minus_d_sq,
            field::sub(&one, &field::sqr(&PARAMS.d, p), p)
        );
        assert_eq!(
            PARAMS.d_minus_one_sq,
            field::sqr(&field::sub(&PARAMS.d, &one, p), p)
        );
        // sqrt_ad_minus_one^2 == a*d - 1 == -(d + 1)
        assert_eq!(
            field::sqr(&PARAMS.sqrt_ad_minus_one, p),
            field::neg(&field::add(&PARAMS.d, &one, p), p)
        );
        // invsqrt_a_minus_d^2 * (a - d) == 1
        let a_minus_d = field::neg(&field::add(&one, &PARAMS.d, p), p);
        assert_eq!(
            field::mul(&field::sqr(&PARAMS.invsqrt_a_minus_d, p), &a_minus_d, p),
            one
        );
    }

    #[test]
    fn generator_encoding() {
        let encoded = Ristretto255::serialize_elem(&Ristretto255::base_mul(&BigUint::one()));
        assert_eq!(
            hex::encode(encoded),
            "e2f2ae0a6abc4e71a884a961c500515f58e30b6aa582dd8db6a65945e08d2d76"
        );
    }

    #[test]
    fn zero_and_order_multiples_encode_as_zeros() {
        let zeros = vec![0u8; 32];
        assert_eq!(
            Ristretto255::serialize_elem(&Ristretto255::base_mul(&BigUint::zero())),
            zeros
        );
        assert_eq!(
            Ristretto255::serialize_elem(&Ristretto255::base_mul(Ristretto255::order())),
            zeros
        );
    }

    #[test]
    fn h2c_empty_message() {
        const DST: &[u8] = b"QUUX-V01-CS02-with-ristretto255_XMD:SHA-512_R255MAP_RO_";
        let elem = Ristretto255::hash_to_group::<Sha512>(&[b""], DST).unwrap();
        assert_eq!(
            hex::encode(Ristretto255::serialize_elem(&elem)),
            "3066f82a1a747d45120d1740f14358531a8f04bbffe6a819f86dfe50f44a0a46"
        );
    }

    #[test]
    fn codec_roundtrip_and_rejection() {
        let point = Ristretto255::base_mul(&BigUint::from(42u32));
        let bytes = Ristretto255::serialize_elem(&point);
        assert_eq!(bytes.len(), 32);
        assert_eq!(Ristretto255::deserialize_elem(&bytes).unwrap(), point);

        // Identity is rejected.
        assert_eq!(
            Ristretto255::deserialize_elem(&[0u8; 32]),
            Err(ProtocolError::InvalidPoint)
        );
        // Negative s (flip to p - s) is rejected.
        let s = BigUint::from_bytes_le(&bytes);
        let mut negated = field::neg(&s, &PARAMS.p).to_bytes_le();
        negated.resize(32, 0);
        assert_eq!(
            Ristretto255::deserialize_elem(&negated),
            Err(ProtocolError::InvalidPoint)
        );
        // Non-canonical: p itself.
        let mut p_bytes = PARAMS.p.to_bytes_le();
        p_bytes.resize(32, 0);
        assert_eq!(
            Ristretto255::deserialize_elem(&p_bytes),
            Err(ProtocolError::InvalidPoint)
        );
    }

    #[test]
    fn addition_matches_scalar_mul() {
        let b = &PARAMS.base;
        let two_b = b.add(b);
        assert_eq!(two_b, Ristretto255::base_mul(&BigUint::from(2u32)));
        let five_b = two_b.add(&two_b).add(b);
        assert_eq!(five_b, Ristretto255::base_mul(&BigUint::from(5u32)));
    }
}

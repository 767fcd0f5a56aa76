// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! NIST P-256, suite `P256_XMD:SHA-256_SSWU_RO_` (RFC 9380 §8.2).

use num_bigint::BigUint;
use once_cell::sync::Lazy;

use crate::errors::ProtocolError;
use crate::group::weierstrass::{CurveParams, Point};
use crate::group::Group;
use crate::hash::Hash;

fn from_hex(s: &str) -> BigUint {
    BigUint::parse_bytes(s.as_bytes(), 16).expect("valid curve constant")
}

static PARAMS: Lazy<CurveParams> = Lazy::new(|| {
    let p = from_hex("ffffffff00000001000000000000000000000000ffffffffffffffffffffffff");
    CurveParams {
        a: &p - 3u32,
        b: from_hex("5ac635d8aa3a93e7b3ebbd55769886bc651d06b0cc53b0f63bce3c3e27d2604b"),
        n: from_hex("ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551"),
        gx: from_hex("6b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296"),
        gy: from_hex("4fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5"),
        z: &p - 10u32,
        fe_len: 32,
        l: 48,
        iso: None,
        p,
    }
});

pub(crate) fn p256_params() -> &'static CurveParams {
    &PARAMS
}

/// The NIST P-256 group.
pub struct NistP256;

impl Group for NistP256 {
    const ELEM_LEN: usize = 33;
    const SCALAR_LEN: usize = 32;
    const UNIFORM_BYTES_LEN: usize = 48;

    type Elem = Point;

    fn order() -> &'static BigUint {
        &p256_params().n
    }

    fn hash_to_group<D: Hash>(msg: &[&[u8]], dst: &[u8]) -> Result<Self::Elem, ProtocolError> {
        PARAMS.hash_to_curve::<D>(msg, dst)
    }

    fn hash_to_scalar<D: Hash>(msg: &[&[u8]], dst: &[u8]) -> Result<BigUint, ProtocolError> {
        PARAMS.hash_to_scalar::<D>(msg, dst)
    }

    fn scalar_mul(scalar: &BigUint, element: &Self::Elem) -> Self::Elem {
        PARAMS.scalar_mul(scalar, element)
    }

    fn base_mul(scalar: &BigUint) -> Self::Elem {
        PARAMS.scalar_mul(scalar, &PARAMS.generator())
    }

    fn serialize_elem(element: &Self::Elem) -> Vec<u8> {
        PARAMS
            .serialize(element)
            .expect("group elements are never the identity")
    }

    fn deserialize_elem(bytes: &[u8]) -> Result<Self::Elem, ProtocolError> {
        PARAMS.deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use sha2::Sha256;

    use super::*;

    // RFC 9380 J.1.1, suite P256_XMD:SHA-256_SSWU_RO_.
    const DST: &[u8] = b"QUUX-V01-CS02-with-P256_XMD:SHA-256_SSWU_RO_";

    fn assert_h2c(msg: &[u8], expected_x: &str, expected_y: &str) {
        let point = NistP256::hash_to_group::<Sha256>(&[msg], DST).unwrap();
        match point {
            Point::Affine { x, y } => {
                assert_eq!(x, from_hex(expected_x));
                assert_eq!(y, from_hex(expected_y));
            }
            Point::Infinity => panic!("hash_to_curve returned the identity"),
        }
    }

    #[test]
    fn h2c_empty_message() {
        assert_h2c(
            b"",
            "2c15230b26dbc6fc9a37051158c95b79656e17a1a920b11394ca91c44247d3e4",
            "8a7a74985cc5c776cdfe4b1f19884970453912e9d31528c060be9ab5c43e8415",
        );
    }

    #[test]
    fn h2c_abc() {
        assert_h2c(
            b"abc",
            "0bb8b87485551aa43ed54f009230450b492fead5f1cc91658775dac4a3388a0f",
            "5c41b3d0731a27a7b14bc0bf0ccded2d8751f83493404c84a88e71ffd424212e",
        );
    }

    #[test]
    fn h2c_abcdef() {
        assert_h2c(
            b"abcdef0123456789",
            "65038ac8f2b1def042a5df0b33b1f4eca6bff7cb0f9c6c1526811864e544ed80",
            "cad44d40a656e7aff4002a8de287abc8ae0482b5ae825822bb870d6df9b56ca3",
        );
    }

    #[test]
    fn generator_encoding() {
        let one = BigUint::from(1u32);
        let encoded = NistP256::serialize_elem(&NistP256::base_mul(&one));
        assert_eq!(
            hex::encode(encoded),
            "036b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296"
        );
    }

    #[test]
    fn scalar_codec_rejects_unreduced() {
        let n = NistP256::order().clone();
        assert_eq!(
            NistP256::serialize_scalar(&n),
            Err(ProtocolError::InvalidConfiguration)
        );
        let bytes = NistP256::serialize_scalar(&(n - 1u32)).unwrap();
        assert_eq!(bytes.len(), 32);
        NistP256::deserialize_scalar(&bytes).unwrap();
        assert_eq!(
            NistP256::deserialize_scalar(&[0xffu8; 32]),
            Err(ProtocolError::InvalidConfiguration)
        );
    }
}

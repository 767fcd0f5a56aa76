// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! NIST P-521, suite `P521_XMD:SHA-512_SSWU_RO_` (RFC 9380 §8.4).

use num_bigint::BigUint;
use num_traits::One;
use once_cell::sync::Lazy;

use crate::errors::ProtocolError;
use crate::group::weierstrass::{CurveParams, Point};
use crate::group::Group;
use crate::hash::Hash;

fn from_hex(s: &str) -> BigUint {
    BigUint::parse_bytes(s.as_bytes(), 16).expect("valid curve constant")
}

static PARAMS: Lazy<CurveParams> = Lazy::new(|| {
    // p = 2^521 - 1
    let p = (BigUint::one() << 521usize) - 1u32;
    CurveParams {
        a: &p - 3u32,
        b: from_hex(
            "0051953eb9618e1c9a1f929a21a0b68540eea2da725b99b315f3b8b489918ef109e156193951ec7e937b1652c0bd3bb1bf073573df883d2c34f1ef451fd46b503f00",
        ),
        n: from_hex(
            "01fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffa51868783bf2f966b7fcc0148f709a5d03bb5c9b8899c47aebb6fb71e91386409",
        ),
        gx: from_hex(
            "00c6858e06b70404e9cd9e3ecb662395b4429c648139053fb521f828af606b4d3dbaa14b5e77efe75928fe1dc127a2ffa8de3348b3c1856a429bf97e7e31c2e5bd66",
        ),
        gy: from_hex(
            "011839296a789a3bc0045c8a5fb42c7d1bd998f54449579b446817afbd17273e662c97ee72995ef42640c550b9013fad0761353c7086a272c24088be94769fd16650",
        ),
        z: &p - 4u32,
        fe_len: 66,
        l: 98,
        iso: None,
        p,
    }
});

pub(crate) fn p521_params() -> &'static CurveParams {
    &PARAMS
}

/// The NIST P-521 group.
pub struct NistP521;

impl Group for NistP521 {
    const ELEM_LEN: usize = 67;
    const SCALAR_LEN: usize = 66;
    const UNIFORM_BYTES_LEN: usize = 98;

    type Elem = Point;

    fn order() -> &'static BigUint {
        &p521_params().n
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

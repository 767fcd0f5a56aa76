// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! NIST P-384, suite `P384_XMD:SHA-384_SSWU_RO_` (RFC 9380 §8.3).

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
    let p = from_hex(
        "fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffeffffffff0000000000000000ffffffff",
    );
    CurveParams {
        a: &p - 3u32,
        b: from_hex(
            "b3312fa7e23ee7e4988e056be3f82d19181d9c6efe8141120314088f5013875ac656398d8a2ed19d2a85c8edd3ec2aef",
        ),
        n: from_hex(
            "ffffffffffffffffffffffffffffffffffffffffffffffffc7634d81f4372ddf581a0db248b0a77aecec196accc52973",
        ),
        gx: from_hex(
            "aa87ca22be8b05378eb1c71ef320ad746e1d3b628ba79b9859f741e082542a385502f25dbf55296c3a545e3872760ab7",
        ),
        gy: from_hex(
            "3617de4a96262c6f5d9e98bf9292dc29f8f41dbd289a147ce9da3113b5f0b8c00a60b1ce1d7e819d7a431d7c90ea0e5f",
        ),
        z: &p - 12u32,
        fe_len: 48,
        l: 72,
        iso: None,
        p,
    }
});

pub(crate) fn p384_params() -> &'static CurveParams {
    &PARAMS
}

/// The NIST P-384 group.
pub struct NistP384;

impl Group for NistP384 {
    const ELEM_LEN: usize = 49;
    const SCALAR_LEN: usize = 48;
    const UNIFORM_BYTES_LEN: usize = 72;

    type Elem = Point;

    fn order() -> &'static BigUint {
        &p384_params().n
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

// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! secp256k1, suite `secp256k1_XMD:SHA-256_SSWU_RO_` (RFC 9380 §8.7).
//!
//! Because secp256k1 has j-invariant 0, the SSWU map runs on the
//! isogenous curve E' and the result is carried through the 3-isogeny of
//! RFC 9380 Appendix E. This group is exposed for hash-to-curve use only;
//! there is no OPRF/OPAQUE cipher suite over it.

use num_bigint::BigUint;
use num_traits::Zero;
use once_cell::sync::Lazy;

use crate::errors::ProtocolError;
use crate::group::weierstrass::{CurveParams, Isogeny, Point};
use crate::group::Group;
use crate::hash::Hash;

fn from_hex(s: &str) -> BigUint {
    BigUint::parse_bytes(s.as_bytes(), 16).expect("valid curve constant")
}

static PARAMS: Lazy<CurveParams> = Lazy::new(|| {
    let p = from_hex("fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f");
    let iso = Isogeny {
        a: from_hex("3f8731abdd661adca08a5558f0f5d272e953d363cb6f0e5d405447c01a444533"),
        b: BigUint::from(1771u32),
        x_num: [
            from_hex("8e38e38e38e38e38e38e38e38e38e38e38e38e38e38e38e38e38e38daaaaa8c7"),
            from_hex("07d3d4c80bc321d5b9f315cea7fd44c5d595d2fc0bf63b92dfff1044f17c6581"),
            from_hex("534c328d23f234e6e2a413deca25caece4506144037c40314ecbd0b53d9dd262"),
            from_hex("8e38e38e38e38e38e38e38e38e38e38e38e38e38e38e38e38e38e38daaaaa88c"),
        ],
        x_den: [
            from_hex("d35771193d94918a9ca34ccbb7b640dd86cd409542f8487d9fe6b745781eb49b"),
            from_hex("edadc6f64383dc1df7c4b2d51b54225406d36b641f5e41bbc52a56612a8c6d14"),
        ],
        y_num: [
            from_hex("4bda12f684bda12f684bda12f684bda12f684bda12f684bda12f684b8e38e23c"),
            from_hex("c75e0c32d5cb7c0fa9d0a54b12a0a6d5647ab046d686da6fdffc90fc201d71a3"),
            from_hex("29a6194691f91a73715209ef6512e576722830a201be2018a765e85a9ecee931"),
            from_hex("2f684bda12f684bda12f684bda12f684bda12f684bda12f684bda12f38e38d84"),
        ],
        y_den: [
            from_hex("fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffff93b"),
            from_hex("7a06534bb8bdb49fd5e9e6632722c2989467c1bfc8e8d978dfb425d2685c2573"),
            from_hex("6484aa716545ca2cf3a70c3fa8fe337e0a3d21162f0d6299a7bf8192bfd2a76f"),
        ],
    };
    CurveParams {
        a: BigUint::zero(),
        b: BigUint::from(7u32),
        n: from_hex("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141"),
        gx: from_hex("79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"),
        gy: from_hex("483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8"),
        z: &p - 11u32,
        fe_len: 32,
        l: 48,
        iso: Some(iso),
        p,
    }
});

pub(crate) fn secp256k1_params() -> &'static CurveParams {
    &PARAMS
}

/// The secp256k1 group (hash-to-curve only).
pub struct Secp256k1;

impl Group for Secp256k1 {
    const ELEM_LEN: usize = 33;
    const SCALAR_LEN: usize = 32;
    const UNIFORM_BYTES_LEN: usize = 48;

    type Elem = Point;

    fn order() -> &'static BigUint {
        &secp256k1_params().n
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

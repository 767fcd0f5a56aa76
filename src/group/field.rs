// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Prime-field arithmetic over [`BigUint`].
//!
//! This is the correctness-grade tier the rest of the group stack is built
//! on: plain big-integer arithmetic, with constant-time selection and
//! comparison done over fixed-width byte encodings. Callers never touch
//! `BigUint` values across a module boundary, so this module can be swapped
//! for a constant-time field implementation without changing the group
//! seam.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

use crate::errors::ProtocolError;

/// `(a + b) mod p`. Inputs must already be reduced.
pub(crate) fn add(a: &BigUint, b: &BigUint, p: &BigUint) -> BigUint {
    (a + b) % p
}

/// `(a - b) mod p`. Inputs must already be reduced.
pub(crate) fn sub(a: &BigUint, b: &BigUint, p: &BigUint) -> BigUint {
    ((a + p) - b) % p
}

/// `(a * b) mod p`.
pub(crate) fn mul(a: &BigUint, b: &BigUint, p: &BigUint) -> BigUint {
    (a * b) % p
}

/// `a^2 mod p`.
pub(crate) fn sqr(a: &BigUint, p: &BigUint) -> BigUint {
    (a * a) % p
}

/// `-a mod p`. Input must already be reduced.
pub(crate) fn neg(a: &BigUint, p: &BigUint) -> BigUint {
    (p - a) % p
}

/// `a^e mod p`.
pub(crate) fn pow(a: &BigUint, e: &BigUint, p: &BigUint) -> BigUint {
    a.modpow(e, p)
}

/// `inv0(a)`: the multiplicative inverse of `a` mod the prime `p`, with
/// `inv0(0) = 0` as required by the RFC 9380 map-to-curve routines.
pub(crate) fn inv0(a: &BigUint, p: &BigUint) -> BigUint {
    // Fermat: a^(p-2) mod p; evaluates to 0 for a = 0.
    a.modpow(&(p - 2u32), p)
}

/// Whether `a` is a quadratic residue mod the odd prime `p`, by Euler's
/// criterion. Zero counts as square.
pub(crate) fn is_square(a: &BigUint, p: &BigUint) -> bool {
    if a.is_zero() {
        return true;
    }
    let exp = (p - 1u32) >> 1;
    a.modpow(&exp, p).is_one()
}

/// Square root mod a prime `p ≡ 3 (mod 4)`: `a^((p+1)/4)`.
///
/// The caller is responsible for knowing `a` is square (via
/// [`is_square`]); on non-square input the result is a root of `-a`.
pub(crate) fn sqrt_3mod4(a: &BigUint, p: &BigUint) -> BigUint {
    let exp = (p + 1u32) >> 2;
    a.modpow(&exp, p)
}

/// OS2IP: big-endian bytes to integer.
pub(crate) fn os2ip(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// I2OSP: fixed-width big-endian encoding. Fails with `InvalidLength` if
/// `x >= 256^len`.
pub(crate) fn i2osp(x: &BigUint, len: usize) -> Result<Vec<u8>, ProtocolError> {
    let raw = x.to_bytes_be();
    if raw.len() > len {
        return Err(ProtocolError::InvalidLength);
    }
    let mut out = vec![0u8; len];
    out[len - raw.len()..].copy_from_slice(&raw);
    Ok(out)
}

/// Constant-time select over `len`-byte encodings: returns `a` when
/// `choice` is 0 and `b` when `choice` is 1.
///
/// Both inputs must fit in `len` bytes; the panic on oversize input is a
/// programmer error, not an attacker-reachable path.
pub(crate) fn ct_select(a: &BigUint, b: &BigUint, choice: Choice, len: usize) -> BigUint {
    let a_bytes = i2osp(a, len).expect("ct_select: input exceeds field width");
    let b_bytes = i2osp(b, len).expect("ct_select: input exceeds field width");
    let mut out = vec![0u8; len];
    for i in 0..len {
        out[i] = u8::conditional_select(&a_bytes[i], &b_bytes[i], choice);
    }
    os2ip(&out)
}

/// Constant-time equality over `len`-byte encodings.
pub(crate) fn ct_eq(a: &BigUint, b: &BigUint, len: usize) -> Choice {
    let a_bytes = i2osp(a, len).expect("ct_eq: input exceeds field width");
    let b_bytes = i2osp(b, len).expect("ct_eq: input exceeds field width");
    a_bytes.ct_eq(&b_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p() -> BigUint {
        // Small prime with p ≡ 3 (mod 4).
        BigUint::from(10007u32)
    }

    #[test]
    fn modular_identities() {
        let p = p();
        let a = BigUint::from(1234u32);
        let b = BigUint::from(9999u32);
        assert_eq!(add(&a, &neg(&a, &p), &p), BigUint::zero());
        assert_eq!(sub(&a, &a, &p), BigUint::zero());
        assert_eq!(mul(&a, &inv0(&a, &p), &p), BigUint::one());
        assert_eq!(sqr(&b, &p), mul(&b, &b, &p));
        assert_eq!(inv0(&BigUint::zero(), &p), BigUint::zero());
    }

    #[test]
    fn sqrt_roundtrip() {
        let p = p();
        let a = BigUint::from(4321u32);
        let square = sqr(&a, &p);
        assert!(is_square(&square, &p));
        let root = sqrt_3mod4(&square, &p);
        assert_eq!(sqr(&root, &p), square);
    }

    #[test]
    fn i2osp_os2ip_roundtrip() {
        let x = BigUint::from(0xdeadbeefu32);
        let bytes = i2osp(&x, 8).unwrap();
        assert_eq!(bytes, [0, 0, 0, 0, 0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(os2ip(&bytes), x);
        assert_eq!(i2osp(&x, 3), Err(ProtocolError::InvalidLength));
    }

    #[test]
    fn ct_select_picks_by_choice() {
        let a = BigUint::from(17u32);
        let b = BigUint::from(99u32);
        assert_eq!(ct_select(&a, &b, Choice::from(0), 4), a);
        assert_eq!(ct_select(&a, &b, Choice::from(1), 4), b);
        assert!(bool::from(ct_eq(&a, &a, 4)));
        assert!(!bool::from(ct_eq(&a, &b, 4)));
    }
}

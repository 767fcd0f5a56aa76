// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The prime-order group abstraction the OPRF and OPAQUE layers are
//! written against, together with its per-curve implementations.
//!
//! Each supported curve is a unit marker type implementing [`Group`], so
//! all size and arithmetic dispatch resolves at compile time once a cipher
//! suite is chosen.

use num_bigint::BigUint;
use num_traits::Zero;
use rand::{CryptoRng, RngCore};

use crate::errors::ProtocolError;
use crate::hash::Hash;

pub(crate) mod expand;
pub(crate) mod field;
mod p256;
mod p384;
mod p521;
mod ristretto;
mod secp256k1;
mod weierstrass;

pub use p256::NistP256;
pub use p384::NistP384;
pub use p521::NistP521;
pub use ristretto::Ristretto255;
pub use secp256k1::Secp256k1;

/// A prime-order group together with its hash-to-group and hash-to-scalar
/// routines.
///
/// Scalars are integers in `[0, n)` carried as [`BigUint`]; their wire
/// encoding (width and endianness) is the group's business. Elements are
/// opaque curve-specific values validated on deserialization.
pub trait Group: 'static + Sized {
    /// The size of a serialized group element in bytes.
    const ELEM_LEN: usize;
    /// The size of a serialized scalar in bytes.
    const SCALAR_LEN: usize;
    /// The `expand_message` output length per field element (`L` in
    /// RFC 9380 §5.2), in bytes.
    const UNIFORM_BYTES_LEN: usize;

    /// A group element. Guaranteed non-identity when produced by
    /// [`Group::deserialize_elem`].
    type Elem: Clone + PartialEq + core::fmt::Debug;

    /// The prime order `n` of the group.
    fn order() -> &'static BigUint;

    /// Hashes `msg` to a uniformly distributed group element
    /// (RFC 9380 `hash_to_curve` in the `_RO_` variant).
    fn hash_to_group<D: Hash>(msg: &[&[u8]], dst: &[u8]) -> Result<Self::Elem, ProtocolError>;

    /// Hashes `msg` to a uniformly distributed scalar in `[0, n)`.
    fn hash_to_scalar<D: Hash>(msg: &[&[u8]], dst: &[u8]) -> Result<BigUint, ProtocolError>;

    /// `scalar * element`.
    fn scalar_mul(scalar: &BigUint, element: &Self::Elem) -> Self::Elem;

    /// `scalar * G` for the fixed generator `G`.
    fn base_mul(scalar: &BigUint) -> Self::Elem;

    /// Serializes an element to its fixed-width wire form.
    fn serialize_elem(element: &Self::Elem) -> Vec<u8>;

    /// Deserializes and fully validates an element.
    ///
    /// Fails with [`ProtocolError::InvalidPoint`] on wrong length, a
    /// non-canonical or off-curve encoding, or the identity element.
    fn deserialize_elem(bytes: &[u8]) -> Result<Self::Elem, ProtocolError>;

    /// Uniform random scalar in `[1, n)` by rejection sampling over
    /// `ceil(log2(n))` bits.
    fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> BigUint {
        let n = Self::order();
        let bits = n.bits() as usize;
        let len = (bits + 7) / 8;
        let top_mask = if bits % 8 == 0 {
            0xff
        } else {
            (1u8 << (bits % 8)) - 1
        };
        loop {
            let mut buf = vec![0u8; len];
            rng.fill_bytes(&mut buf);
            buf[0] &= top_mask;
            let candidate = BigUint::from_bytes_be(&buf);
            if !candidate.is_zero() && &candidate < n {
                return candidate;
            }
        }
    }

    /// The multiplicative inverse of a scalar mod `n`. Fails on zero.
    fn invert_scalar(scalar: &BigUint) -> Result<BigUint, ProtocolError> {
        if scalar.is_zero() {
            return Err(ProtocolError::InvalidConfiguration);
        }
        let n = Self::order();
        Ok(scalar.modpow(&(n - 2u32), n))
    }

    /// Fixed-width scalar encoding. Fails if `scalar >= n`.
    fn serialize_scalar(scalar: &BigUint) -> Result<Vec<u8>, ProtocolError> {
        if scalar >= Self::order() {
            return Err(ProtocolError::InvalidConfiguration);
        }
        field::i2osp(scalar, Self::SCALAR_LEN)
    }

    /// Parses a fixed-width scalar encoding. Fails if the value is not
    /// fully reduced.
    fn deserialize_scalar(bytes: &[u8]) -> Result<BigUint, ProtocolError> {
        if bytes.len() != Self::SCALAR_LEN {
            return Err(ProtocolError::InvalidLength);
        }
        let scalar = field::os2ip(bytes);
        if &scalar >= Self::order() {
            return Err(ProtocolError::InvalidConfiguration);
        }
        Ok(scalar)
    }
}

// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Key pairs over a prime-order group, used for the server's long-term
//! AKE keys, the client's envelope-derived keys, and the ephemeral
//! key shares of the key exchange.

use derive_where::derive_where;
use num_bigint::BigUint;
use num_traits::Zero;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::errors::ProtocolError;
use crate::group::Group;

/// A serialized-form public key, validated on construction.
#[derive_where(Clone, Debug, Eq, PartialEq; G::Elem)]
pub struct PublicKey<G: Group>(pub(crate) G::Elem);

/// A private key scalar, held in its fixed-width serialized form so it can
/// be zeroed on drop. Transient big-integer copies are made at the point
/// of use.
#[derive_where(Clone)]
pub struct PrivateKey<G: Group> {
    bytes: Zeroizing<Vec<u8>>,
    marker: core::marker::PhantomData<G>,
}

impl<G: Group> core::fmt::Debug for PrivateKey<G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// A private/public key pair.
#[derive_where(Clone; G::Elem)]
#[derive_where(Debug; G::Elem)]
pub struct KeyPair<G: Group> {
    private: PrivateKey<G>,
    public: PublicKey<G>,
}

impl<G: Group> PublicKey<G> {
    pub fn serialize(&self) -> Vec<u8> {
        G::serialize_elem(&self.0)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(PublicKey(G::deserialize_elem(bytes)?))
    }
}

impl<G: Group> PrivateKey<G> {
    pub(crate) fn from_scalar(scalar: &BigUint) -> Result<Self, ProtocolError> {
        if scalar.is_zero() {
            return Err(ProtocolError::InvalidConfiguration);
        }
        Ok(PrivateKey {
            bytes: Zeroizing::new(G::serialize_scalar(scalar)?),
            marker: core::marker::PhantomData,
        })
    }

    pub(crate) fn to_scalar(&self) -> Result<BigUint, ProtocolError> {
        G::deserialize_scalar(&self.bytes)
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let scalar = G::deserialize_scalar(bytes)?;
        Self::from_scalar(&scalar)
    }

    /// Recomputes the matching public key.
    pub fn public_key(&self) -> Result<PublicKey<G>, ProtocolError> {
        Ok(PublicKey(G::base_mul(&self.to_scalar()?)))
    }
}

impl<G: Group> KeyPair<G> {
    /// Generates a fresh random key pair.
    pub fn generate_random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let scalar = G::random_scalar(rng);
        KeyPair {
            private: PrivateKey::from_scalar(&scalar)
                .expect("random scalars are nonzero and reduced"),
            public: PublicKey(G::base_mul(&scalar)),
        }
    }

    pub(crate) fn from_scalar(scalar: &BigUint) -> Result<Self, ProtocolError> {
        let private = PrivateKey::from_scalar(scalar)?;
        let public = PublicKey(G::base_mul(scalar));
        Ok(KeyPair { private, public })
    }

    /// Reconstructs a key pair from a serialized private key.
    pub fn from_private_key_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let private = PrivateKey::<G>::deserialize(bytes)?;
        let public = private.public_key()?;
        Ok(KeyPair { private, public })
    }

    pub fn private(&self) -> &PrivateKey<G> {
        &self.private
    }

    pub fn public(&self) -> &PublicKey<G> {
        &self.public
    }
}

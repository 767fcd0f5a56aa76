// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The OPRF protocol of RFC 9497, mode 0 (base mode).
//!
//! The client blinds its input, the server evaluates the blinded element
//! under its key, and the client unblinds and hashes the result. Neither
//! side learns the other's secret.

use core::marker::PhantomData;

use derive_where::derive_where;
use digest::Digest;
use num_bigint::BigUint;
use num_traits::Zero;
use rand::{CryptoRng, RngCore};

use crate::ciphersuite::CipherSuite;
use crate::errors::ProtocolError;
use crate::group::Group;
use crate::serialization::{i2osp_1, i2osp_2};

/// The element type of a suite's group.
pub(crate) type GroupElem<CS> = <<CS as CipherSuite>::Group as Group>::Elem;

const STR_FINALIZE: &[u8] = b"Finalize";
const MODE_OPRF: u8 = 0x00;

/// `"OPRFV1-" || I2OSP(mode, 1) || "-" || ID`
pub(crate) fn context_string<CS: CipherSuite>() -> Vec<u8> {
    let mut out = b"OPRFV1-".to_vec();
    out.push(MODE_OPRF);
    out.push(b'-');
    out.extend_from_slice(CS::ID.as_bytes());
    out
}

pub(crate) fn dst_hash_to_group<CS: CipherSuite>() -> Vec<u8> {
    let mut out = b"HashToGroup-".to_vec();
    out.extend_from_slice(&context_string::<CS>());
    out
}

// Note the missing separator: RFC 9497 concatenates "DeriveKeyPair"
// directly with the context string.
pub(crate) fn dst_derive_key_pair<CS: CipherSuite>() -> Vec<u8> {
    let mut out = b"DeriveKeyPair".to_vec();
    out.extend_from_slice(&context_string::<CS>());
    out
}

/// A blinded input element, sent from client to server.
#[derive_where(Clone, Debug, Eq, PartialEq; GroupElem<CS>)]
pub struct BlindedElement<CS: CipherSuite>(pub(crate) GroupElem<CS>);

/// An evaluated element, sent from server to client.
#[derive_where(Clone, Debug, Eq, PartialEq; GroupElem<CS>)]
pub struct EvaluationElement<CS: CipherSuite>(pub(crate) GroupElem<CS>);

impl<CS: CipherSuite> BlindedElement<CS> {
    pub fn serialize(&self) -> Vec<u8> {
        CS::Group::serialize_elem(&self.0)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self(CS::Group::deserialize_elem(bytes)?))
    }
}

impl<CS: CipherSuite> EvaluationElement<CS> {
    pub fn serialize(&self) -> Vec<u8> {
        CS::Group::serialize_elem(&self.0)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self(CS::Group::deserialize_elem(bytes)?))
    }
}

/// The client state between [`OprfClient::blind`] and
/// [`OprfClient::finalize`]: the blinding scalar.
#[derive_where(Clone, Debug)]
pub struct OprfClient<CS: CipherSuite> {
    pub(crate) blind: BigUint,
    marker: PhantomData<CS>,
}

/// The output of [`OprfClient::blind`].
#[derive_where(Clone, Debug)]
pub struct OprfClientBlindResult<CS: CipherSuite> {
    pub state: OprfClient<CS>,
    pub message: BlindedElement<CS>,
}

impl<CS: CipherSuite> OprfClient<CS> {
    pub(crate) fn from_blind(blind: BigUint) -> Self {
        OprfClient {
            blind,
            marker: PhantomData,
        }
    }

    /// Blinds `input` with a fresh random scalar.
    pub fn blind<R: RngCore + CryptoRng>(
        input: &[u8],
        rng: &mut R,
    ) -> Result<OprfClientBlindResult<CS>, ProtocolError> {
        let blind = CS::Group::random_scalar(rng);
        Self::blind_with(input, blind)
    }

    /// Blinds `input` with a caller-supplied scalar. Exists for
    /// test-vector reproduction; the scalar must be uniform for the
    /// protocol's privacy guarantees to hold.
    #[cfg(feature = "danger")]
    pub fn deterministic_blind_unchecked(
        input: &[u8],
        blind: BigUint,
    ) -> Result<OprfClientBlindResult<CS>, ProtocolError> {
        Self::blind_with(input, blind)
    }

    pub(crate) fn blind_with(
        input: &[u8],
        blind: BigUint,
    ) -> Result<OprfClientBlindResult<CS>, ProtocolError> {
        if blind.is_zero() || &blind >= CS::Group::order() {
            return Err(ProtocolError::InvalidConfiguration);
        }
        let element = CS::Group::hash_to_group::<CS::Hash>(&[input], &dst_hash_to_group::<CS>())?;
        let blinded = CS::Group::scalar_mul(&blind, &element);
        Ok(OprfClientBlindResult {
            state: OprfClient {
                blind,
                marker: PhantomData,
            },
            message: BlindedElement(blinded),
        })
    }

    /// Unblinds the server's evaluation and hashes it down to the `Nh`-byte
    /// OPRF output.
    pub fn finalize(
        &self,
        input: &[u8],
        evaluation: &EvaluationElement<CS>,
    ) -> Result<Vec<u8>, ProtocolError> {
        let inverted = CS::Group::invert_scalar(&self.blind)?;
        let unblinded = CS::Group::scalar_mul(&inverted, &evaluation.0);
        let unblinded_bytes = CS::Group::serialize_elem(&unblinded);

        let mut hasher = CS::Hash::new();
        hasher.update(i2osp_2(input.len())?);
        hasher.update(input);
        hasher.update(i2osp_2(unblinded_bytes.len())?);
        hasher.update(&unblinded_bytes);
        hasher.update(STR_FINALIZE);
        Ok(hasher.finalize().to_vec())
    }
}

/// The server's long-term OPRF key.
#[derive_where(Clone, Debug)]
pub struct OprfServer<CS: CipherSuite> {
    pub(crate) key: BigUint,
    marker: PhantomData<CS>,
}

impl<CS: CipherSuite> OprfServer<CS> {
    /// Creates a server with a fresh random key.
    pub fn new<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        OprfServer {
            key: CS::Group::random_scalar(rng),
            marker: PhantomData,
        }
    }

    /// Restores a server from a serialized key.
    pub fn new_with_key(key: &[u8]) -> Result<Self, ProtocolError> {
        let key = CS::Group::deserialize_scalar(key)?;
        if key.is_zero() {
            return Err(ProtocolError::InvalidConfiguration);
        }
        Ok(OprfServer {
            key,
            marker: PhantomData,
        })
    }

    /// Derives a server key from a seed, per RFC 9497 §3.2.1.
    pub fn new_from_seed(seed: &[u8], info: &[u8]) -> Result<Self, ProtocolError> {
        Ok(OprfServer {
            key: derive_key_pair::<CS>(seed, info)?,
            marker: PhantomData,
        })
    }

    /// The serialized key, e.g. for persistence.
    pub fn serialize_key(&self) -> Vec<u8> {
        CS::Group::serialize_scalar(&self.key).expect("key is always reduced")
    }

    /// Evaluates a blinded element under the server key.
    pub fn blind_evaluate(&self, blinded: &BlindedElement<CS>) -> EvaluationElement<CS> {
        EvaluationElement(CS::Group::scalar_mul(&self.key, &blinded.0))
    }
}

/// DeriveKeyPair from RFC 9497 §3.2: rejection-samples a nonzero scalar
/// from `seed` and `info`. The secret key is returned; the public key is
/// a single base mult away when needed.
pub(crate) fn derive_key_pair<CS: CipherSuite>(
    seed: &[u8],
    info: &[u8],
) -> Result<BigUint, ProtocolError> {
    let dst = dst_derive_key_pair::<CS>();
    let info_len = i2osp_2(info.len())?;
    for counter in 0u16..=255 {
        let counter_byte = i2osp_1(counter as usize)?;
        let sk = CS::Group::hash_to_scalar::<CS::Hash>(
            &[seed, &info_len[..], info, &counter_byte[..]],
            &dst,
        )?;
        if !sk.is_zero() {
            return Ok(sk);
        }
    }
    Err(ProtocolError::DeriveKeyPairError)
}

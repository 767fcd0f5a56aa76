// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The OPAQUE-3DH authenticated key exchange (RFC 9807 §4.2): message
//! types, the transcript preamble, the triple Diffie-Hellman input keying
//! material, and the TLS-style key schedule.

use derive_where::derive_where;
use hmac::Mac;
use num_bigint::BigUint;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::ciphersuite::CipherSuite;
use crate::errors::utils::check_slice_size;
use crate::errors::ProtocolError;
use crate::group::Group;
use crate::hash::{output_size, Hash, HkdfHash, HmacHash};
use crate::keypair::PublicKey;
use crate::messages::{CredentialRequest, CredentialResponse};
use crate::serialization::{i2osp_1, i2osp_2, lv};

/// Nonce length `Nn`, fixed across all suites.
pub(crate) const NONCE_LEN: usize = 32;

const STR_OPAQUE_VERSION: &[u8] = b"OPAQUEv1-";
const STR_LABEL_PREFIX: &[u8] = b"OPAQUE-";
const STR_HANDSHAKE_SECRET: &[u8] = b"HandshakeSecret";
const STR_SESSION_KEY: &[u8] = b"SessionKey";
const STR_SERVER_MAC: &[u8] = b"ServerMAC";
const STR_CLIENT_MAC: &[u8] = b"ClientMAC";

/// The first key-exchange message: the credential request together with
/// the client's nonce and ephemeral key share.
#[derive_where(Clone, Debug, Eq, PartialEq; crate::oprf::GroupElem<CS>)]
pub struct Ke1<CS: CipherSuite> {
    pub(crate) credential_request: CredentialRequest<CS>,
    pub(crate) client_nonce: [u8; NONCE_LEN],
    pub(crate) client_public_keyshare: PublicKey<CS::Group>,
}

/// The second key-exchange message: the credential response, the server's
/// nonce and ephemeral key share, and the server MAC.
#[derive_where(Clone, Debug, Eq, PartialEq; crate::oprf::GroupElem<CS>)]
pub struct Ke2<CS: CipherSuite> {
    pub(crate) credential_response: CredentialResponse<CS>,
    pub(crate) server_nonce: [u8; NONCE_LEN],
    pub(crate) server_public_keyshare: PublicKey<CS::Group>,
    pub(crate) server_mac: Vec<u8>,
}

/// The third key-exchange message: the client MAC.
#[derive_where(Clone, Debug, Eq, PartialEq)]
pub struct Ke3<CS: CipherSuite> {
    pub(crate) client_mac: Vec<u8>,
    marker: core::marker::PhantomData<CS>,
}

impl<CS: CipherSuite> Ke1<CS> {
    pub(crate) fn len() -> usize {
        CredentialRequest::<CS>::len() + NONCE_LEN + <CS::Group as Group>::ELEM_LEN
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.credential_request.serialize();
        out.extend_from_slice(&self.client_nonce);
        out.extend_from_slice(&self.client_public_keyshare.serialize());
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let checked = check_slice_size(bytes, Self::len())?;
        let request_len = CredentialRequest::<CS>::len();
        let credential_request = CredentialRequest::deserialize(&checked[..request_len])?;
        let mut client_nonce = [0; NONCE_LEN];
        client_nonce.copy_from_slice(&checked[request_len..request_len + NONCE_LEN]);
        let client_public_keyshare =
            PublicKey::deserialize(&checked[request_len + NONCE_LEN..])?;
        Ok(Ke1 {
            credential_request,
            client_nonce,
            client_public_keyshare,
        })
    }
}

impl<CS: CipherSuite> Ke2<CS> {
    pub(crate) fn len() -> usize {
        CredentialResponse::<CS>::len()
            + NONCE_LEN
            + <CS::Group as Group>::ELEM_LEN
            + output_size::<CS::Hash>()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.credential_response.serialize();
        out.extend_from_slice(&self.server_nonce);
        out.extend_from_slice(&self.server_public_keyshare.serialize());
        out.extend_from_slice(&self.server_mac);
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let checked = check_slice_size(bytes, Self::len())?;
        let response_len = CredentialResponse::<CS>::len();
        let elem_len = <CS::Group as Group>::ELEM_LEN;

        let credential_response = CredentialResponse::deserialize(&checked[..response_len])?;
        let mut server_nonce = [0; NONCE_LEN];
        server_nonce.copy_from_slice(&checked[response_len..response_len + NONCE_LEN]);
        let key_share_offset = response_len + NONCE_LEN;
        let server_public_keyshare =
            PublicKey::deserialize(&checked[key_share_offset..key_share_offset + elem_len])?;
        let server_mac = checked[key_share_offset + elem_len..].to_vec();
        Ok(Ke2 {
            credential_response,
            server_nonce,
            server_public_keyshare,
            server_mac,
        })
    }
}

impl<CS: CipherSuite> Ke3<CS> {
    pub(crate) fn new(client_mac: Vec<u8>) -> Self {
        Ke3 {
            client_mac,
            marker: core::marker::PhantomData,
        }
    }

    pub(crate) fn len() -> usize {
        output_size::<CS::Hash>()
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.client_mac.clone()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let checked = check_slice_size(bytes, Self::len())?;
        Ok(Self::new(checked.to_vec()))
    }
}

/// The transcript preamble both sides must compute bit-identically
/// (RFC 9807 §4.2.2).
pub(crate) fn preamble(
    context: &[u8],
    client_identity: &[u8],
    ke1_serialized: &[u8],
    server_identity: &[u8],
    credential_response_serialized: &[u8],
    server_nonce: &[u8],
    server_public_keyshare: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::new();
    out.extend_from_slice(STR_OPAQUE_VERSION);
    out.extend_from_slice(&lv(context)?);
    out.extend_from_slice(&lv(client_identity)?);
    out.extend_from_slice(ke1_serialized);
    out.extend_from_slice(&lv(server_identity)?);
    out.extend_from_slice(credential_response_serialized);
    out.extend_from_slice(server_nonce);
    out.extend_from_slice(server_public_keyshare);
    Ok(out)
}

/// The concatenated, compressed-form shared secrets of the triple DH.
pub(crate) fn triple_dh_ikm<G: Group>(
    parts: [(&BigUint, &G::Elem); 3],
) -> Zeroizing<Vec<u8>> {
    let mut ikm = Zeroizing::new(Vec::new());
    for (scalar, element) in parts {
        ikm.extend_from_slice(&G::serialize_elem(&G::scalar_mul(scalar, element)));
    }
    ikm
}

/// `HKDF-Expand-Label(secret, label, context, length)` with the
/// `"OPAQUE-"` label prefix (RFC 9807 §4.2.1).
fn expand_label<D: Hash>(
    hkdf: &HkdfHash<D>,
    label: &[u8],
    context: &[u8],
    length: usize,
) -> Result<Zeroizing<Vec<u8>>, ProtocolError> {
    let length_bytes = i2osp_2(length)?;
    let label_len = i2osp_1(STR_LABEL_PREFIX.len() + label.len())?;
    let context_len = i2osp_1(context.len())?;
    let mut okm = Zeroizing::new(vec![0; length]);
    hkdf.expand_multi_info(
        &[
            &length_bytes[..],
            &label_len[..],
            STR_LABEL_PREFIX,
            label,
            &context_len[..],
            context,
        ],
        &mut okm,
    )
    .map_err(|_| ProtocolError::InvalidLength)?;
    Ok(okm)
}

/// The derived secrets of one key-exchange run.
pub(crate) struct SessionSecrets {
    pub(crate) session_key: Vec<u8>,
    pub(crate) server_mac: Vec<u8>,
    pub(crate) client_mac: Vec<u8>,
}

/// Runs the key schedule over the triple-DH output and the preamble,
/// producing the session key and both MACs.
pub(crate) fn derive_session_secrets<D: Hash>(
    ikm: &[u8],
    preamble: &[u8],
) -> Result<SessionSecrets, ProtocolError> {
    let nh = output_size::<D>();
    let preamble_hash = D::new().chain_update(preamble).finalize().to_vec();

    let (_, prk) = HkdfHash::<D>::extract(None, ikm);
    let handshake_secret = expand_label::<D>(&prk, STR_HANDSHAKE_SECRET, &preamble_hash, nh)?;
    let session_key = expand_label::<D>(&prk, STR_SESSION_KEY, &preamble_hash, nh)?;

    let handshake_hkdf =
        HkdfHash::<D>::from_prk(&handshake_secret).map_err(|_| ProtocolError::InvalidLength)?;
    let km2 = expand_label::<D>(&handshake_hkdf, STR_SERVER_MAC, b"", nh)?;
    let km3 = expand_label::<D>(&handshake_hkdf, STR_CLIENT_MAC, b"", nh)?;

    let server_mac = compute_mac::<D>(&km2, &preamble_hash)?;
    // The client MAC covers the server MAC through a re-hash of the
    // extended transcript, not by concatenating digests.
    let client_transcript_hash = D::new()
        .chain_update(preamble)
        .chain_update(&server_mac)
        .finalize()
        .to_vec();
    let client_mac = compute_mac::<D>(&km3, &client_transcript_hash)?;

    Ok(SessionSecrets {
        session_key: session_key.to_vec(),
        server_mac,
        client_mac,
    })
}

pub(crate) fn compute_mac<D: Hash>(
    key: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    let mut mac =
        HmacHash::<D>::new_from_slice(key).map_err(|_| ProtocolError::InvalidLength)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Constant-time tag comparison, mapping any mismatch to
/// `AuthenticationFailed`.
pub(crate) fn verify_mac(expected: &[u8], actual: &[u8]) -> Result<(), ProtocolError> {
    if expected.len() == actual.len() && bool::from(expected.ct_eq(actual)) {
        Ok(())
    } else {
        Err(ProtocolError::AuthenticationFailed)
    }
}

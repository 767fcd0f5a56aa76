// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The envelope mechanism of RFC 9807 §4.1: the client's long-term key
//! pair is not stored but re-derived from the randomized password, and the
//! envelope authenticates that derivation together with both parties'
//! identities.
//!
//! Note that earlier versions of this protocol encrypted key material
//! under an RKR-secure cipher; the internal key mode used here replaces
//! the ciphertext with a seed-derived key pair, so the envelope carries
//! only a nonce and an authentication tag.

use derive_where::derive_where;
use hmac::Mac;
use zeroize::Zeroizing;

use crate::ciphersuite::CipherSuite;
use crate::errors::utils::check_slice_size;
use crate::errors::ProtocolError;
use crate::hash::{output_size, HkdfHash, HmacHash};
use crate::key_exchange::NONCE_LEN;
use crate::keypair::{KeyPair, PublicKey};
use crate::opaque::{bytestrings_from_identifiers, Identifiers};
use crate::oprf::derive_key_pair;
use crate::serialization::lv;

// Constant strings used as HKDF info and derive-key-pair contexts.
const STR_AUTH_KEY: &[u8] = b"AuthKey";
const STR_EXPORT_KEY: &[u8] = b"ExportKey";
const STR_PRIVATE_KEY: &[u8] = b"PrivateKey";
pub(crate) const STR_DERIVE_DIFFIE_HELLMAN: &[u8] = b"OPAQUE-DeriveDiffieHellmanKeyPair";

/// The seed length for the client's derived key pair is fixed by the RFC
/// independently of the suite.
const SEED_LEN: usize = 32;

/// The envelope stored in a registration record: a nonce and an HMAC tag
/// over the cleartext credentials.
#[derive_where(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Envelope<CS: CipherSuite> {
    pub(crate) nonce: [u8; NONCE_LEN],
    pub(crate) auth_tag: Vec<u8>,
    marker: core::marker::PhantomData<CS>,
}

/// The client-side result of sealing an envelope.
pub(crate) struct SealedEnvelope<CS: CipherSuite> {
    pub(crate) envelope: Envelope<CS>,
    pub(crate) client_public_key: PublicKey<CS::Group>,
    pub(crate) export_key: Zeroizing<Vec<u8>>,
}

/// The client-side result of recovering an envelope.
#[derive_where(Debug)]
pub(crate) struct OpenedEnvelope<CS: CipherSuite> {
    pub(crate) client_keypair: KeyPair<CS::Group>,
    pub(crate) export_key: Zeroizing<Vec<u8>>,
}

impl<CS: CipherSuite> Envelope<CS> {
    /// Derives the client key pair and authentication material from the
    /// randomized password and seals the envelope over the cleartext
    /// credentials.
    pub(crate) fn seal(
        randomized_pwd: &HkdfHash<CS::Hash>,
        nonce: [u8; NONCE_LEN],
        server_public_key: &PublicKey<CS::Group>,
        ids: Identifiers<'_>,
    ) -> Result<SealedEnvelope<CS>, ProtocolError> {
        let client_keypair = derive_auth_key_pair::<CS>(randomized_pwd, &nonce)?;
        let export_key = expand_envelope_key::<CS>(randomized_pwd, &nonce, STR_EXPORT_KEY)?;

        let aad = cleartext_credentials::<CS>(server_public_key, client_keypair.public(), ids)?;
        let auth_tag = compute_tag::<CS>(randomized_pwd, &nonce, &aad)?;

        Ok(SealedEnvelope {
            envelope: Envelope {
                nonce,
                auth_tag,
                marker: core::marker::PhantomData,
            },
            client_public_key: client_keypair.public().clone(),
            export_key,
        })
    }

    /// Re-derives the client key pair and verifies the tag. A mismatch in
    /// password, server key, or identities all fail identically.
    pub(crate) fn open(
        &self,
        randomized_pwd: &HkdfHash<CS::Hash>,
        server_public_key: &PublicKey<CS::Group>,
        ids: Identifiers<'_>,
    ) -> Result<OpenedEnvelope<CS>, ProtocolError> {
        let client_keypair = derive_auth_key_pair::<CS>(randomized_pwd, &self.nonce)?;
        let export_key = expand_envelope_key::<CS>(randomized_pwd, &self.nonce, STR_EXPORT_KEY)?;

        let aad = cleartext_credentials::<CS>(server_public_key, client_keypair.public(), ids)?;

        let auth_key = expand_envelope_key::<CS>(randomized_pwd, &self.nonce, STR_AUTH_KEY)?;
        let mut mac = HmacHash::<CS::Hash>::new_from_slice(&auth_key)
            .map_err(|_| ProtocolError::InvalidLength)?;
        mac.update(&self.nonce);
        mac.update(&aad);
        mac.verify_slice(&self.auth_tag)
            .map_err(|_| ProtocolError::AuthenticationFailed)?;

        Ok(OpenedEnvelope {
            client_keypair,
            export_key,
        })
    }

    /// The all-zero envelope used by the user-enumeration defense.
    pub(crate) fn dummy() -> Self {
        Envelope {
            nonce: [0; NONCE_LEN],
            auth_tag: vec![0; output_size::<CS::Hash>()],
            marker: core::marker::PhantomData,
        }
    }

    pub(crate) fn len() -> usize {
        NONCE_LEN + output_size::<CS::Hash>()
    }

    pub(crate) fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.auth_tag);
        out
    }

    pub(crate) fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let checked = check_slice_size(bytes, Self::len())?;
        let mut nonce = [0; NONCE_LEN];
        nonce.copy_from_slice(&checked[..NONCE_LEN]);
        Ok(Envelope {
            nonce,
            auth_tag: checked[NONCE_LEN..].to_vec(),
            marker: core::marker::PhantomData,
        })
    }
}

/// `Expand(randomized_pwd, nonce || label, Nh)`.
fn expand_envelope_key<CS: CipherSuite>(
    randomized_pwd: &HkdfHash<CS::Hash>,
    nonce: &[u8],
    label: &[u8],
) -> Result<Zeroizing<Vec<u8>>, ProtocolError> {
    let mut okm = Zeroizing::new(vec![0; output_size::<CS::Hash>()]);
    randomized_pwd
        .expand_multi_info(&[nonce, label], &mut okm)
        .map_err(|_| ProtocolError::InvalidLength)?;
    Ok(okm)
}

/// Derives the client's long-term key pair from the envelope seed
/// (RFC 9807 §4.1.2).
fn derive_auth_key_pair<CS: CipherSuite>(
    randomized_pwd: &HkdfHash<CS::Hash>,
    nonce: &[u8],
) -> Result<KeyPair<CS::Group>, ProtocolError> {
    let mut seed = Zeroizing::new(vec![0; SEED_LEN]);
    randomized_pwd
        .expand_multi_info(&[nonce, STR_PRIVATE_KEY], &mut seed)
        .map_err(|_| ProtocolError::InvalidLength)?;
    let scalar = derive_key_pair::<CS>(&seed, STR_DERIVE_DIFFIE_HELLMAN)?;
    KeyPair::from_scalar(&scalar)
}

/// Serialized `CleartextCredentials`: the server public key followed by
/// the length-prefixed server and client identities.
pub(crate) fn cleartext_credentials<CS: CipherSuite>(
    server_public_key: &PublicKey<CS::Group>,
    client_public_key: &PublicKey<CS::Group>,
    ids: Identifiers<'_>,
) -> Result<Vec<u8>, ProtocolError> {
    let server_pk_bytes = server_public_key.serialize();
    let client_pk_bytes = client_public_key.serialize();
    let (client_identity, server_identity) =
        bytestrings_from_identifiers(ids, &client_pk_bytes, &server_pk_bytes);

    let mut out = Vec::new();
    out.extend_from_slice(&server_pk_bytes);
    out.extend_from_slice(&lv(&server_identity)?);
    out.extend_from_slice(&lv(&client_identity)?);
    Ok(out)
}

fn compute_tag<CS: CipherSuite>(
    randomized_pwd: &HkdfHash<CS::Hash>,
    nonce: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    let auth_key = expand_envelope_key::<CS>(randomized_pwd, nonce, STR_AUTH_KEY)?;
    let mut mac = HmacHash::<CS::Hash>::new_from_slice(&auth_key)
        .map_err(|_| ProtocolError::InvalidLength)?;
    mac.update(nonce);
    mac.update(aad);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use hkdf::Hkdf;
    use hmac::SimpleHmac;

    use super::*;
    use crate::ciphersuite::P256Sha256;

    type Suite = P256Sha256;

    fn randomized_pwd(secret: &[u8]) -> HkdfHash<<Suite as CipherSuite>::Hash> {
        let (_, hkdf) = Hkdf::<_, SimpleHmac<_>>::extract(None, secret);
        hkdf
    }

    fn server_pk() -> PublicKey<<Suite as CipherSuite>::Group> {
        let mut rng = rand::rngs::OsRng;
        KeyPair::generate_random(&mut rng).public().clone()
    }

    #[test]
    fn seal_open_roundtrip() {
        let rw = randomized_pwd(b"password material");
        let pk = server_pk();
        let nonce = [3u8; NONCE_LEN];

        let sealed = Envelope::<Suite>::seal(&rw, nonce, &pk, Identifiers::default()).unwrap();
        let opened = sealed
            .envelope
            .open(&rw, &pk, Identifiers::default())
            .unwrap();
        assert_eq!(opened.client_keypair.public(), &sealed.client_public_key);
        assert_eq!(opened.export_key.to_vec(), sealed.export_key.to_vec());
    }

    #[test]
    fn open_fails_on_wrong_password() {
        let rw = randomized_pwd(b"password material");
        let pk = server_pk();
        let sealed =
            Envelope::<Suite>::seal(&rw, [3; NONCE_LEN], &pk, Identifiers::default()).unwrap();

        let wrong = randomized_pwd(b"other material");
        assert_eq!(
            sealed
                .envelope
                .open(&wrong, &pk, Identifiers::default())
                .unwrap_err(),
            ProtocolError::AuthenticationFailed
        );
    }

    #[test]
    fn open_fails_on_identity_mismatch() {
        let rw = randomized_pwd(b"password material");
        let pk = server_pk();
        let ids = Identifiers {
            client: Some(b"alice"),
            server: Some(b"example.com"),
        };
        let sealed = Envelope::<Suite>::seal(&rw, [3; NONCE_LEN], &pk, ids).unwrap();

        sealed.envelope.open(&rw, &pk, ids).unwrap();
        assert_eq!(
            sealed
                .envelope
                .open(&rw, &pk, Identifiers::default())
                .unwrap_err(),
            ProtocolError::AuthenticationFailed
        );
    }

    #[test]
    fn tampered_tag_is_rejected() {
        let rw = randomized_pwd(b"password material");
        let pk = server_pk();
        let sealed =
            Envelope::<Suite>::seal(&rw, [3; NONCE_LEN], &pk, Identifiers::default()).unwrap();

        let mut tampered = sealed.envelope.serialize();
        *tampered.last_mut().unwrap() ^= 1;
        let envelope = Envelope::<Suite>::deserialize(&tampered).unwrap();
        assert_eq!(
            envelope.open(&rw, &pk, Identifiers::default()).unwrap_err(),
            ProtocolError::AuthenticationFailed
        );
    }
}

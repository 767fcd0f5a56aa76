// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Provides the main OPAQUE API: registration and login state machines
//! for both client and server, credential-response masking, and the
//! user-enumeration defense.
//!
//! All state objects are one-shot: the `finish` calls take `self` by
//! value, so a state cannot be replayed. Passwords, blinds, and ephemeral
//! private keys are zeroed when a state is dropped.

use derive_where::derive_where;
use hkdf::Hkdf;
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::ciphersuite::CipherSuite;
use crate::envelope::{Envelope, STR_DERIVE_DIFFIE_HELLMAN};
use crate::errors::utils::{check_slice_size, check_slice_size_atleast};
use crate::errors::ProtocolError;
use crate::group::Group;
use crate::hash::{output_size, HkdfHash};
use crate::key_exchange::{
    derive_session_secrets, preamble, triple_dh_ikm, verify_mac, Ke1, Ke2, Ke3, NONCE_LEN,
};
use crate::keypair::{KeyPair, PublicKey};
use crate::ksf::Ksf;
use crate::messages::{
    masked_response_len, CredentialRequest, CredentialResponse, RegistrationRequest,
    RegistrationResponse, RegistrationUpload,
};
use crate::oprf::{derive_key_pair, EvaluationElement, OprfClient};
use crate::serialization::xor_in_place;

// Constant strings used as HKDF info.
const STR_MASKING_KEY: &[u8] = b"MaskingKey";
const STR_CREDENTIAL_RESPONSE_PAD: &[u8] = b"CredentialResponsePad";
const STR_OPRF_KEY: &[u8] = b"OprfKey";
const STR_OPAQUE_DERIVE_KEY_PAIR: &[u8] = b"OPAQUE-DeriveKeyPair";
const STR_FAKE_CLIENT_KEY: &[u8] = b"FakeClientKey";
const STR_FAKE_MASKING_KEY: &[u8] = b"FakeMaskingKey";

/// Optional client and server identities bound into the envelope and the
/// key-exchange transcript. When absent, the respective public keys are
/// used.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Identifiers<'a> {
    pub client: Option<&'a [u8]>,
    pub server: Option<&'a [u8]>,
}

/// Resolves identities to their on-the-wire byte strings, defaulting to
/// the serialized public keys.
pub(crate) fn bytestrings_from_identifiers(
    ids: Identifiers<'_>,
    client_public_key: &[u8],
    server_public_key: &[u8],
) -> (Vec<u8>, Vec<u8>) {
    let client_identity = ids.client.unwrap_or(client_public_key).to_vec();
    let server_identity = ids.server.unwrap_or(server_public_key).to_vec();
    (client_identity, server_identity)
}

//////////////////
// Server setup //
//////////////////

/// The server's static material: the OPRF seed every per-credential key is
/// derived from, and the server's long-term AKE key pair.
#[derive_where(Clone; <CS::Group as Group>::Elem)]
pub struct ServerSetup<CS: CipherSuite> {
    oprf_seed: Zeroizing<Vec<u8>>,
    keypair: KeyPair<CS::Group>,
}

impl<CS: CipherSuite> ServerSetup<CS> {
    /// Generates a fresh OPRF seed and key pair.
    pub fn new<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut oprf_seed = Zeroizing::new(vec![0; output_size::<CS::Hash>()]);
        rng.fill_bytes(&mut oprf_seed);
        ServerSetup {
            oprf_seed,
            keypair: KeyPair::generate_random(rng),
        }
    }

    pub fn keypair(&self) -> &KeyPair<CS::Group> {
        &self.keypair
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.oprf_seed.to_vec();
        out.extend_from_slice(&self.keypair.private().serialize());
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let nh = output_size::<CS::Hash>();
        let checked = check_slice_size(bytes, nh + <CS::Group as Group>::SCALAR_LEN)?;
        Ok(ServerSetup {
            oprf_seed: Zeroizing::new(checked[..nh].to_vec()),
            keypair: KeyPair::from_private_key_slice(&checked[nh..])?,
        })
    }
}

/// The per-credential OPRF key: `DeriveKeyPair(Expand(oprf_seed,
/// credential_identifier || "OprfKey", Nsk), "OPAQUE-DeriveKeyPair")`.
fn derive_credential_oprf_key<CS: CipherSuite>(
    oprf_seed: &[u8],
    credential_identifier: &[u8],
) -> Result<BigUint, ProtocolError> {
    let hkdf =
        HkdfHash::<CS::Hash>::from_prk(oprf_seed).map_err(|_| ProtocolError::InvalidLength)?;
    let mut ikm = Zeroizing::new(vec![0; <CS::Group as Group>::SCALAR_LEN]);
    hkdf.expand_multi_info(&[credential_identifier, STR_OPRF_KEY], &mut ikm)
        .map_err(|_| ProtocolError::InvalidLength)?;
    derive_key_pair::<CS>(&ikm, STR_OPAQUE_DERIVE_KEY_PAIR)
}

/////////////////////////////////////
// Randomized password derivation  //
/////////////////////////////////////

/// `HKDF-Extract("", oprf_output || KSF(oprf_output))`, returned as an
/// HKDF context ready for expansion.
fn randomized_pwd_hkdf<CS: CipherSuite>(
    oprf_output: &[u8],
    ksf: Option<&CS::Ksf>,
) -> Result<HkdfHash<CS::Hash>, ProtocolError> {
    let nh = output_size::<CS::Hash>();
    let stretched = Zeroizing::new(match ksf {
        Some(ksf) => ksf.stretch(oprf_output, nh)?,
        None => CS::Ksf::default().stretch(oprf_output, nh)?,
    });
    let mut ikm = Zeroizing::new(oprf_output.to_vec());
    ikm.extend_from_slice(&stretched);
    let (_, hkdf) = Hkdf::extract(None, &ikm);
    Ok(hkdf)
}

/// `Expand(randomized_pwd, "MaskingKey", Nh)`.
fn derive_masking_key<CS: CipherSuite>(
    randomized_pwd: &HkdfHash<CS::Hash>,
) -> Result<Zeroizing<Vec<u8>>, ProtocolError> {
    let mut masking_key = Zeroizing::new(vec![0; output_size::<CS::Hash>()]);
    randomized_pwd
        .expand(STR_MASKING_KEY, &mut masking_key)
        .map_err(|_| ProtocolError::InvalidLength)?;
    Ok(masking_key)
}

//////////////
// Masking  //
//////////////

fn credential_response_pad<CS: CipherSuite>(
    masking_key: &[u8],
    masking_nonce: &[u8],
) -> Result<Zeroizing<Vec<u8>>, ProtocolError> {
    let hkdf =
        HkdfHash::<CS::Hash>::from_prk(masking_key).map_err(|_| ProtocolError::InvalidLength)?;
    let mut pad = Zeroizing::new(vec![0; masked_response_len::<CS>()]);
    hkdf.expand_multi_info(&[masking_nonce, STR_CREDENTIAL_RESPONSE_PAD], &mut pad)
        .map_err(|_| ProtocolError::InvalidLength)?;
    Ok(pad)
}

/// One-time-pads `server_public_key || envelope` under the masking key.
fn mask_response<CS: CipherSuite>(
    masking_key: &[u8],
    masking_nonce: &[u8],
    server_public_key: &PublicKey<CS::Group>,
    envelope: &Envelope<CS>,
) -> Result<Vec<u8>, ProtocolError> {
    let mut plaintext = server_public_key.serialize();
    plaintext.extend_from_slice(&envelope.serialize());
    let pad = credential_response_pad::<CS>(masking_key, masking_nonce)?;
    xor_in_place(&mut plaintext, &pad)?;
    Ok(plaintext)
}

/// Inverse of [`mask_response`], parsing the recovered plaintext.
fn unmask_response<CS: CipherSuite>(
    masking_key: &[u8],
    masking_nonce: &[u8],
    masked_response: &[u8],
) -> Result<(PublicKey<CS::Group>, Envelope<CS>), ProtocolError> {
    let mut unmasked = masked_response.to_vec();
    let pad = credential_response_pad::<CS>(masking_key, masking_nonce)?;
    xor_in_place(&mut unmasked, &pad)?;
    let elem_len = <CS::Group as Group>::ELEM_LEN;
    let server_public_key = PublicKey::deserialize(&unmasked[..elem_len])?;
    let envelope = Envelope::deserialize(&unmasked[elem_len..])?;
    Ok((server_public_key, envelope))
}

///////////////////////////
// Client registration   //
///////////////////////////

/// The client's registration state: the blind and the password, both
/// zeroed on drop. Consumed by [`ClientRegistration::finish`].
#[derive_where(Clone)]
pub struct ClientRegistration<CS: CipherSuite> {
    blind: Zeroizing<Vec<u8>>,
    password: Zeroizing<Vec<u8>>,
    marker: core::marker::PhantomData<CS>,
}

impl<CS: CipherSuite> core::fmt::Debug for ClientRegistration<CS> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("ClientRegistration(..)")
    }
}

/// The output of [`ClientRegistration::start`].
#[derive_where(Clone; <CS::Group as Group>::Elem)]
pub struct ClientRegistrationStartResult<CS: CipherSuite> {
    pub message: RegistrationRequest<CS>,
    pub state: ClientRegistration<CS>,
}

/// Optional parameters for [`ClientRegistration::finish`].
pub struct ClientRegistrationFinishParameters<'a, CS: CipherSuite> {
    /// Identities to bind into the envelope; defaults to the public keys.
    pub identifiers: Identifiers<'a>,
    /// KSF instance to stretch the OPRF output with; defaults to
    /// `CS::Ksf::default()`.
    pub ksf: Option<&'a CS::Ksf>,
}

impl<CS: CipherSuite> Default for ClientRegistrationFinishParameters<'_, CS> {
    fn default() -> Self {
        Self {
            identifiers: Identifiers::default(),
            ksf: None,
        }
    }
}

/// The output of [`ClientRegistration::finish`].
#[derive_where(Clone; <CS::Group as Group>::Elem)]
pub struct ClientRegistrationFinishResult<CS: CipherSuite> {
    /// The record to upload to the server.
    pub message: RegistrationUpload<CS>,
    /// The client-only export key.
    pub export_key: Vec<u8>,
}

impl<CS: CipherSuite> ClientRegistration<CS> {
    /// Blinds the password and produces the registration request.
    pub fn start<R: RngCore + CryptoRng>(
        rng: &mut R,
        password: &[u8],
    ) -> Result<ClientRegistrationStartResult<CS>, ProtocolError> {
        Self::start_with_blind(password, CS::Group::random_scalar(rng))
    }

    /// Deterministic variant of [`ClientRegistration::start`] for
    /// test-vector reproduction.
    #[cfg(feature = "danger")]
    pub fn deterministic_start(
        password: &[u8],
        blind: &[u8],
    ) -> Result<ClientRegistrationStartResult<CS>, ProtocolError> {
        Self::start_with_blind(password, CS::Group::deserialize_scalar(blind)?)
    }

    pub(crate) fn start_with_blind(
        password: &[u8],
        blind: BigUint,
    ) -> Result<ClientRegistrationStartResult<CS>, ProtocolError> {
        let result = OprfClient::<CS>::blind_with(password, blind)?;
        Ok(ClientRegistrationStartResult {
            message: RegistrationRequest {
                blinded_element: result.message,
            },
            state: ClientRegistration {
                blind: Zeroizing::new(CS::Group::serialize_scalar(&result.state.blind)?),
                password: Zeroizing::new(password.to_vec()),
                marker: core::marker::PhantomData,
            },
        })
    }

    /// Unblinds the server's response, seals the envelope, and produces
    /// the registration record.
    pub fn finish<R: RngCore + CryptoRng>(
        self,
        rng: &mut R,
        response: RegistrationResponse<CS>,
        params: ClientRegistrationFinishParameters<'_, CS>,
    ) -> Result<ClientRegistrationFinishResult<CS>, ProtocolError> {
        let mut envelope_nonce = [0; NONCE_LEN];
        rng.fill_bytes(&mut envelope_nonce);
        self.finish_with_nonce(response, params, envelope_nonce)
    }

    /// Deterministic variant of [`ClientRegistration::finish`] for
    /// test-vector reproduction.
    #[cfg(feature = "danger")]
    pub fn deterministic_finish(
        self,
        response: RegistrationResponse<CS>,
        params: ClientRegistrationFinishParameters<'_, CS>,
        envelope_nonce: [u8; NONCE_LEN],
    ) -> Result<ClientRegistrationFinishResult<CS>, ProtocolError> {
        self.finish_with_nonce(response, params, envelope_nonce)
    }

    pub(crate) fn finish_with_nonce(
        self,
        response: RegistrationResponse<CS>,
        params: ClientRegistrationFinishParameters<'_, CS>,
        envelope_nonce: [u8; NONCE_LEN],
    ) -> Result<ClientRegistrationFinishResult<CS>, ProtocolError> {
        let oprf_client = OprfClient::<CS>::from_blind(CS::Group::deserialize_scalar(&self.blind)?);
        let oprf_output =
            Zeroizing::new(oprf_client.finalize(&self.password, &response.evaluation_element)?);
        let randomized_pwd = randomized_pwd_hkdf::<CS>(&oprf_output, params.ksf)?;

        let sealed = Envelope::<CS>::seal(
            &randomized_pwd,
            envelope_nonce,
            &response.server_public_key,
            params.identifiers,
        )?;
        let masking_key = derive_masking_key::<CS>(&randomized_pwd)?;

        Ok(ClientRegistrationFinishResult {
            message: RegistrationUpload {
                client_public_key: sealed.client_public_key,
                masking_key: masking_key.to_vec(),
                envelope: sealed.envelope,
            },
            export_key: sealed.export_key.to_vec(),
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.blind.to_vec();
        out.extend_from_slice(&self.password);
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let scalar_len = <CS::Group as Group>::SCALAR_LEN;
        let checked = check_slice_size_atleast(bytes, scalar_len)?;
        // Validate the scalar eagerly so a corrupted state fails here.
        CS::Group::deserialize_scalar(&checked[..scalar_len])?;
        Ok(ClientRegistration {
            blind: Zeroizing::new(checked[..scalar_len].to_vec()),
            password: Zeroizing::new(checked[scalar_len..].to_vec()),
            marker: core::marker::PhantomData,
        })
    }
}

///////////////////////////
// Server registration   //
///////////////////////////

/// The stored registration record, wrapping the client's upload.
#[derive_where(Clone, Debug, Eq, PartialEq; <CS::Group as Group>::Elem)]
pub struct ServerRegistration<CS: CipherSuite>(pub(crate) RegistrationUpload<CS>);

/// The output of [`ServerRegistration::start`].
#[derive_where(Clone; <CS::Group as Group>::Elem)]
pub struct ServerRegistrationStartResult<CS: CipherSuite> {
    pub message: RegistrationResponse<CS>,
}

impl<CS: CipherSuite> ServerRegistration<CS> {
    /// Evaluates the blinded registration request under the
    /// per-credential OPRF key. Deterministic: no server state is needed
    /// until the client's upload arrives.
    pub fn start(
        server_setup: &ServerSetup<CS>,
        request: RegistrationRequest<CS>,
        credential_identifier: &[u8],
    ) -> Result<ServerRegistrationStartResult<CS>, ProtocolError> {
        let oprf_key =
            derive_credential_oprf_key::<CS>(&server_setup.oprf_seed, credential_identifier)?;
        let evaluation =
            CS::Group::scalar_mul(&oprf_key, &request.blinded_element.0);
        Ok(ServerRegistrationStartResult {
            message: RegistrationResponse {
                evaluation_element: EvaluationElement(evaluation),
                server_public_key: server_setup.keypair.public().clone(),
            },
        })
    }

    /// Accepts the client's upload as the stored record.
    pub fn finish(upload: RegistrationUpload<CS>) -> Self {
        ServerRegistration(upload)
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.0.serialize()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(ServerRegistration(RegistrationUpload::deserialize(bytes)?))
    }
}

//////////////////
// Client login //
//////////////////

/// The client's login state between KE1 and KE3: blind, password, and the
/// ephemeral key-exchange secrets. Consumed by [`ClientLogin::finish`];
/// zeroed on drop.
#[derive_where(Clone)]
pub struct ClientLogin<CS: CipherSuite> {
    blind: Zeroizing<Vec<u8>>,
    client_secret_keyshare: Zeroizing<Vec<u8>>,
    ke1_serialized: Vec<u8>,
    password: Zeroizing<Vec<u8>>,
    marker: core::marker::PhantomData<CS>,
}

impl<CS: CipherSuite> core::fmt::Debug for ClientLogin<CS> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("ClientLogin(..)")
    }
}

/// The output of [`ClientLogin::start`].
#[derive_where(Clone; <CS::Group as Group>::Elem)]
pub struct ClientLoginStartResult<CS: CipherSuite> {
    pub message: Ke1<CS>,
    pub state: ClientLogin<CS>,
}

/// Optional parameters for [`ClientLogin::finish`]. The context and
/// identifiers must match the server's or authentication fails.
pub struct ClientLoginFinishParameters<'a, CS: CipherSuite> {
    pub context: Option<&'a [u8]>,
    pub identifiers: Identifiers<'a>,
    pub ksf: Option<&'a CS::Ksf>,
}

impl<CS: CipherSuite> Default for ClientLoginFinishParameters<'_, CS> {
    fn default() -> Self {
        Self {
            context: None,
            identifiers: Identifiers::default(),
            ksf: None,
        }
    }
}

/// The output of [`ClientLogin::finish`].
#[derive_where(Clone, Debug)]
pub struct ClientLoginFinishResult<CS: CipherSuite> {
    pub message: Ke3<CS>,
    pub session_key: Vec<u8>,
    pub export_key: Vec<u8>,
}

impl<CS: CipherSuite> ClientLogin<CS> {
    /// Blinds the password and generates KE1.
    pub fn start<R: RngCore + CryptoRng>(
        rng: &mut R,
        password: &[u8],
    ) -> Result<ClientLoginStartResult<CS>, ProtocolError> {
        let blind = CS::Group::random_scalar(rng);
        let mut client_nonce = [0; NONCE_LEN];
        rng.fill_bytes(&mut client_nonce);
        let keyshare = CS::Group::random_scalar(rng);
        Self::start_with(password, blind, client_nonce, keyshare)
    }

    /// Deterministic variant of [`ClientLogin::start`] for test-vector
    /// reproduction.
    #[cfg(feature = "danger")]
    pub fn deterministic_start(
        password: &[u8],
        blind: &[u8],
        client_nonce: [u8; NONCE_LEN],
        client_secret_keyshare: &[u8],
    ) -> Result<ClientLoginStartResult<CS>, ProtocolError> {
        Self::start_with(
            password,
            CS::Group::deserialize_scalar(blind)?,
            client_nonce,
            CS::Group::deserialize_scalar(client_secret_keyshare)?,
        )
    }

    pub(crate) fn start_with(
        password: &[u8],
        blind: BigUint,
        client_nonce: [u8; NONCE_LEN],
        client_secret_keyshare: BigUint,
    ) -> Result<ClientLoginStartResult<CS>, ProtocolError> {
        let blind_result = OprfClient::<CS>::blind_with(password, blind)?;
        let keypair = KeyPair::<CS::Group>::from_scalar(&client_secret_keyshare)?;

        let ke1 = Ke1 {
            credential_request: CredentialRequest {
                blinded_element: blind_result.message,
            },
            client_nonce,
            client_public_keyshare: keypair.public().clone(),
        };

        Ok(ClientLoginStartResult {
            state: ClientLogin {
                blind: Zeroizing::new(CS::Group::serialize_scalar(&blind_result.state.blind)?),
                client_secret_keyshare: Zeroizing::new(keypair.private().serialize()),
                ke1_serialized: ke1.serialize(),
                password: Zeroizing::new(password.to_vec()),
                marker: core::marker::PhantomData,
            },
            message: ke1,
        })
    }

    /// Recovers the credentials from KE2, verifies the server MAC, and
    /// produces KE3 together with the session and export keys.
    ///
    /// A wrong password, a tampered envelope, mismatched identities or
    /// context, and mismatched KSF parameters are indistinguishable: all
    /// fail with [`ProtocolError::AuthenticationFailed`].
    pub fn finish(
        self,
        ke2: Ke2<CS>,
        params: ClientLoginFinishParameters<'_, CS>,
    ) -> Result<ClientLoginFinishResult<CS>, ProtocolError> {
        let oprf_client = OprfClient::<CS>::from_blind(CS::Group::deserialize_scalar(&self.blind)?);
        let oprf_output = Zeroizing::new(
            oprf_client.finalize(&self.password, &ke2.credential_response.evaluation_element)?,
        );
        let randomized_pwd = randomized_pwd_hkdf::<CS>(&oprf_output, params.ksf)?;
        let masking_key = derive_masking_key::<CS>(&randomized_pwd)?;

        // From here on, all failures collapse into AuthenticationFailed:
        // on a wrong password the unmasked bytes are indistinguishable
        // from random, and the error must not reveal which check tripped.
        let (server_public_key, envelope) = unmask_response::<CS>(
            &masking_key,
            &ke2.credential_response.masking_nonce,
            &ke2.credential_response.masked_response,
        )
        .map_err(|_| ProtocolError::AuthenticationFailed)?;

        let opened = envelope.open(&randomized_pwd, &server_public_key, params.identifiers)?;

        let server_pk_bytes = server_public_key.serialize();
        let client_pk_bytes = opened.client_keypair.public().serialize();
        let (client_identity, server_identity) = bytestrings_from_identifiers(
            params.identifiers,
            &client_pk_bytes,
            &server_pk_bytes,
        );

        let transcript = preamble(
            params.context.unwrap_or(&[]),
            &client_identity,
            &self.ke1_serialized,
            &server_identity,
            &ke2.credential_response.serialize(),
            &ke2.server_nonce,
            &ke2.server_public_keyshare.serialize(),
        )?;

        let client_esk = CS::Group::deserialize_scalar(&self.client_secret_keyshare)?;
        let client_sk = opened.client_keypair.private().to_scalar()?;
        let ikm = triple_dh_ikm::<CS::Group>([
            (&client_esk, &ke2.server_public_keyshare.0),
            (&client_esk, &server_public_key.0),
            (&client_sk, &ke2.server_public_keyshare.0),
        ]);

        let secrets = derive_session_secrets::<CS::Hash>(&ikm, &transcript)?;
        verify_mac(&secrets.server_mac, &ke2.server_mac)?;

        Ok(ClientLoginFinishResult {
            message: Ke3::new(secrets.client_mac),
            session_key: secrets.session_key,
            export_key: opened.export_key.to_vec(),
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.blind.to_vec();
        out.extend_from_slice(&self.client_secret_keyshare);
        out.extend_from_slice(&self.ke1_serialized);
        out.extend_from_slice(&self.password);
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let scalar_len = <CS::Group as Group>::SCALAR_LEN;
        let ke1_len = Ke1::<CS>::len();
        let checked = check_slice_size_atleast(bytes, 2 * scalar_len + ke1_len)?;

        CS::Group::deserialize_scalar(&checked[..scalar_len])?;
        CS::Group::deserialize_scalar(&checked[scalar_len..2 * scalar_len])?;
        let ke1_serialized = checked[2 * scalar_len..2 * scalar_len + ke1_len].to_vec();
        Ke1::<CS>::deserialize(&ke1_serialized)?;

        Ok(ClientLogin {
            blind: Zeroizing::new(checked[..scalar_len].to_vec()),
            client_secret_keyshare: Zeroizing::new(checked[scalar_len..2 * scalar_len].to_vec()),
            ke1_serialized,
            password: Zeroizing::new(checked[2 * scalar_len + ke1_len..].to_vec()),
            marker: core::marker::PhantomData,
        })
    }
}

//////////////////
// Server login //
//////////////////

/// The server's login state between KE2 and KE3: the expected client MAC
/// and the session key. Consumed by [`ServerLogin::finish`].
#[derive_where(Clone)]
pub struct ServerLogin<CS: CipherSuite> {
    expected_client_mac: Zeroizing<Vec<u8>>,
    session_key: Zeroizing<Vec<u8>>,
    marker: core::marker::PhantomData<CS>,
}

impl<CS: CipherSuite> core::fmt::Debug for ServerLogin<CS> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("ServerLogin(..)")
    }
}

/// The output of [`ServerLogin::start`].
#[derive_where(Clone; <CS::Group as Group>::Elem)]
pub struct ServerLoginStartResult<CS: CipherSuite> {
    pub message: Ke2<CS>,
    pub state: ServerLogin<CS>,
}

/// Optional parameters for [`ServerLogin::start`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerLoginParameters<'a> {
    pub context: Option<&'a [u8]>,
    pub identifiers: Identifiers<'a>,
}

/// The output of [`ServerLogin::finish`].
#[derive(Clone, Debug)]
pub struct ServerLoginFinishResult {
    pub session_key: Vec<u8>,
}

impl<CS: CipherSuite> ServerLogin<CS> {
    /// Produces KE2 from KE1 and the stored record. When `record` is
    /// `None` (unknown credential identifier), a deterministic fake
    /// record derived from the OPRF seed is used, so the response is
    /// indistinguishable from a registered user's and stable for the
    /// same identifier across restarts.
    pub fn start<R: RngCore + CryptoRng>(
        rng: &mut R,
        server_setup: &ServerSetup<CS>,
        record: Option<&ServerRegistration<CS>>,
        ke1: Ke1<CS>,
        credential_identifier: &[u8],
        params: ServerLoginParameters<'_>,
    ) -> Result<ServerLoginStartResult<CS>, ProtocolError> {
        let mut masking_nonce = [0; NONCE_LEN];
        rng.fill_bytes(&mut masking_nonce);
        let mut server_nonce = [0; NONCE_LEN];
        rng.fill_bytes(&mut server_nonce);
        let keyshare = CS::Group::random_scalar(rng);
        Self::start_with(
            server_setup,
            record,
            ke1,
            credential_identifier,
            params,
            masking_nonce,
            server_nonce,
            keyshare,
        )
    }

    /// Deterministic variant of [`ServerLogin::start`] for test-vector
    /// reproduction.
    #[cfg(feature = "danger")]
    #[allow(clippy::too_many_arguments)]
    pub fn deterministic_start(
        server_setup: &ServerSetup<CS>,
        record: Option<&ServerRegistration<CS>>,
        ke1: Ke1<CS>,
        credential_identifier: &[u8],
        params: ServerLoginParameters<'_>,
        masking_nonce: [u8; NONCE_LEN],
        server_nonce: [u8; NONCE_LEN],
        server_secret_keyshare: &[u8],
    ) -> Result<ServerLoginStartResult<CS>, ProtocolError> {
        Self::start_with(
            server_setup,
            record,
            ke1,
            credential_identifier,
            params,
            masking_nonce,
            server_nonce,
            CS::Group::deserialize_scalar(server_secret_keyshare)?,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn start_with(
        server_setup: &ServerSetup<CS>,
        record: Option<&ServerRegistration<CS>>,
        ke1: Ke1<CS>,
        credential_identifier: &[u8],
        params: ServerLoginParameters<'_>,
        masking_nonce: [u8; NONCE_LEN],
        server_nonce: [u8; NONCE_LEN],
        server_secret_keyshare: BigUint,
    ) -> Result<ServerLoginStartResult<CS>, ProtocolError> {
        let oprf_key =
            derive_credential_oprf_key::<CS>(&server_setup.oprf_seed, credential_identifier)?;
        let evaluation = EvaluationElement::<CS>(CS::Group::scalar_mul(
            &oprf_key,
            &ke1.credential_request.blinded_element.0,
        ));

        let (client_public_key, masking_key, envelope) = match record {
            Some(record) => (
                record.0.client_public_key.clone(),
                Zeroizing::new(record.0.masking_key.clone()),
                record.0.envelope.clone(),
            ),
            None => fake_record::<CS>(&server_setup.oprf_seed, credential_identifier)?,
        };

        let masked_response = mask_response::<CS>(
            &masking_key,
            &masking_nonce,
            server_setup.keypair.public(),
            &envelope,
        )?;
        let credential_response = CredentialResponse {
            evaluation_element: evaluation,
            masking_nonce,
            masked_response,
        };

        let server_keyshare = KeyPair::<CS::Group>::from_scalar(&server_secret_keyshare)?;
        let server_pk_bytes = server_setup.keypair.public().serialize();
        let client_pk_bytes = client_public_key.serialize();
        let (client_identity, server_identity) = bytestrings_from_identifiers(
            params.identifiers,
            &client_pk_bytes,
            &server_pk_bytes,
        );

        let transcript = preamble(
            params.context.unwrap_or(&[]),
            &client_identity,
            &ke1.serialize(),
            &server_identity,
            &credential_response.serialize(),
            &server_nonce,
            &server_keyshare.public().serialize(),
        )?;

        let server_sk = server_setup.keypair.private().to_scalar()?;
        let ikm = triple_dh_ikm::<CS::Group>([
            (&server_secret_keyshare, &ke1.client_public_keyshare.0),
            (&server_sk, &ke1.client_public_keyshare.0),
            (&server_secret_keyshare, &client_public_key.0),
        ]);

        let secrets = derive_session_secrets::<CS::Hash>(&ikm, &transcript)?;

        Ok(ServerLoginStartResult {
            message: Ke2 {
                credential_response,
                server_nonce,
                server_public_keyshare: server_keyshare.public().clone(),
                server_mac: secrets.server_mac,
            },
            state: ServerLogin {
                expected_client_mac: Zeroizing::new(secrets.client_mac),
                session_key: Zeroizing::new(secrets.session_key),
                marker: core::marker::PhantomData,
            },
        })
    }

    /// Verifies the client MAC and releases the session key.
    pub fn finish(self, ke3: Ke3<CS>) -> Result<ServerLoginFinishResult, ProtocolError> {
        verify_mac(&self.expected_client_mac, &ke3.client_mac)?;
        Ok(ServerLoginFinishResult {
            session_key: self.session_key.to_vec(),
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.expected_client_mac.to_vec();
        out.extend_from_slice(&self.session_key);
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let nh = output_size::<CS::Hash>();
        let checked = check_slice_size(bytes, 2 * nh)?;
        Ok(ServerLogin {
            expected_client_mac: Zeroizing::new(checked[..nh].to_vec()),
            session_key: Zeroizing::new(checked[nh..].to_vec()),
            marker: core::marker::PhantomData,
        })
    }
}

/// Derives the deterministic fake record for an unregistered credential
/// identifier: the same identifier yields the same fake client key and
/// masking key, across restarts, so probing responses stay stable.
fn fake_record<CS: CipherSuite>(
    oprf_seed: &[u8],
    credential_identifier: &[u8],
) -> Result<(PublicKey<CS::Group>, Zeroizing<Vec<u8>>, Envelope<CS>), ProtocolError> {
    let hkdf =
        HkdfHash::<CS::Hash>::from_prk(oprf_seed).map_err(|_| ProtocolError::InvalidLength)?;

    let mut fake_sk_seed = Zeroizing::new(vec![0; <CS::Group as Group>::SCALAR_LEN]);
    hkdf.expand_multi_info(&[credential_identifier, STR_FAKE_CLIENT_KEY], &mut fake_sk_seed)
        .map_err(|_| ProtocolError::InvalidLength)?;
    let fake_sk = derive_key_pair::<CS>(&fake_sk_seed, STR_DERIVE_DIFFIE_HELLMAN)?;
    let fake_client_pk = PublicKey(CS::Group::base_mul(&fake_sk));

    let mut fake_masking_key = Zeroizing::new(vec![0; output_size::<CS::Hash>()]);
    hkdf.expand_multi_info(
        &[credential_identifier, STR_FAKE_MASKING_KEY],
        &mut fake_masking_key,
    )
    .map_err(|_| ProtocolError::InvalidLength)?;

    Ok((fake_client_pk, fake_masking_key, Envelope::dummy()))
}

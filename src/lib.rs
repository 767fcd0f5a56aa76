// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The cryptographic core of the OPAQUE augmented password-authenticated
//! key exchange: RFC 9497 OPRF (mode 0), the RFC 9380 hash-to-curve
//! pipeline it rests on, and the RFC 9807 OPAQUE-3DH registration and
//! login protocols.
//!
//! The library performs computation only. It does no I/O, holds no global
//! state, and takes its randomness through [`rand::RngCore`] +
//! [`rand::CryptoRng`] arguments, so hosts control the entropy source and
//! tests can substitute deterministic ones.
//!
//! # Suites
//!
//! A [`CipherSuite`](ciphersuite::CipherSuite) fixes the prime-order
//! group, the hash, and the key-stretching function. The provided suites
//! are [`P256Sha256`](ciphersuite::P256Sha256),
//! [`P384Sha384`](ciphersuite::P384Sha384),
//! [`P521Sha512`](ciphersuite::P521Sha512) and
//! [`Ristretto255Sha512`](ciphersuite::Ristretto255Sha512); secp256k1 is
//! available through the [`Group`] seam for hash-to-curve use only. The
//! provided suites use the identity KSF — production deployments should
//! define a suite with [`argon2::Argon2`] as its `Ksf`.
//!
//! # Example
//!
//! ```
//! use opaque_core::ciphersuite::P256Sha256;
//! use opaque_core::opaque::{
//!     ClientLogin, ClientLoginFinishParameters, ClientRegistration,
//!     ClientRegistrationFinishParameters, ServerLogin, ServerLoginParameters,
//!     ServerRegistration, ServerSetup,
//! };
//! use rand::rngs::OsRng;
//!
//! let mut rng = OsRng;
//! let server_setup = ServerSetup::<P256Sha256>::new(&mut rng);
//!
//! // Registration
//! let client_start = ClientRegistration::start(&mut rng, b"hunter2")?;
//! let server_response =
//!     ServerRegistration::start(&server_setup, client_start.message, b"alice")?;
//! let client_finish = client_start.state.finish(
//!     &mut rng,
//!     server_response.message,
//!     ClientRegistrationFinishParameters::default(),
//! )?;
//! let record = ServerRegistration::finish(client_finish.message);
//!
//! // Login
//! let login_start = ClientLogin::start(&mut rng, b"hunter2")?;
//! let server_start = ServerLogin::start(
//!     &mut rng,
//!     &server_setup,
//!     Some(&record),
//!     login_start.message,
//!     b"alice",
//!     ServerLoginParameters::default(),
//! )?;
//! let login_finish = login_start
//!     .state
//!     .finish(server_start.message, ClientLoginFinishParameters::default())?;
//! let server_finish = server_start.state.finish(login_finish.message)?;
//!
//! assert_eq!(login_finish.session_key, server_finish.session_key);
//! # Ok::<(), opaque_core::errors::ProtocolError>(())
//! ```

#![deny(unsafe_code)]

pub mod ciphersuite;
mod envelope;
pub mod errors;
mod group;
pub mod hash;
mod key_exchange;
mod keypair;
pub mod ksf;
mod messages;
pub mod opaque;
mod oprf;
mod serialization;

#[cfg(test)]
mod tests;

pub use crate::errors::ProtocolError;
pub use crate::group::{Group, NistP256, NistP384, NistP521, Ristretto255, Secp256k1};
pub use crate::key_exchange::{Ke1, Ke2, Ke3};
pub use crate::keypair::{KeyPair, PrivateKey, PublicKey};
pub use crate::messages::{
    CredentialRequest, CredentialResponse, RegistrationRequest, RegistrationResponse,
    RegistrationUpload,
};
pub use crate::opaque::{
    ClientLogin, ClientLoginFinishParameters, ClientLoginFinishResult, ClientLoginStartResult,
    ClientRegistration, ClientRegistrationFinishParameters, ClientRegistrationFinishResult,
    ClientRegistrationStartResult, Identifiers, ServerLogin, ServerLoginFinishResult,
    ServerLoginParameters, ServerLoginStartResult, ServerRegistration,
    ServerRegistrationStartResult, ServerSetup,
};
pub use crate::oprf::{
    BlindedElement, EvaluationElement, OprfClient, OprfClientBlindResult, OprfServer,
};

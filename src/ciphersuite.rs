// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Defines the CipherSuite trait to specify the underlying primitives for
//! OPAQUE

use crate::group::{Group, NistP256, NistP384, NistP521, Ristretto255};
use crate::hash::Hash;
use crate::ksf::{Identity, Ksf};

/// Configures the underlying primitives used in OPAQUE and the OPRF:
/// the prime-order group, the suite hash, and the key-stretching function.
///
/// The suite identifier fixes every domain separation tag, so two parties
/// interoperate only when their `ID`, group, and hash agree.
pub trait CipherSuite: 'static + Sized {
    /// The suite identifier mixed into the OPRF context string, e.g.
    /// `"P256-SHA256"`.
    const ID: &'static str;
    /// The prime-order group shared by the OPRF and the key exchange.
    type Group: Group;
    /// The suite hash, which also drives HKDF and HMAC.
    type Hash: Hash;
    /// The key-stretching function hardening the OPRF output. The
    /// [`Identity`] stretch is only appropriate for test vectors; define a
    /// custom suite with [`argon2::Argon2`] for production use.
    type Ksf: Ksf + Default;
}

/// OPRF(P-256, SHA-256), with the identity KSF.
pub struct P256Sha256;

impl CipherSuite for P256Sha256 {
    const ID: &'static str = "P256-SHA256";
    type Group = NistP256;
    type Hash = sha2::Sha256;
    type Ksf = Identity;
}

/// OPRF(P-384, SHA-384), with the identity KSF.
pub struct P384Sha384;

impl CipherSuite for P384Sha384 {
    const ID: &'static str = "P384-SHA384";
    type Group = NistP384;
    type Hash = sha2::Sha384;
    type Ksf = Identity;
}

/// OPRF(P-521, SHA-512), with the identity KSF.
pub struct P521Sha512;

impl CipherSuite for P521Sha512 {
    const ID: &'static str = "P521-SHA512";
    type Group = NistP521;
    type Hash = sha2::Sha512;
    type Ksf = Identity;
}

/// OPRF(ristretto255, SHA-512), with the identity KSF.
pub struct Ristretto255Sha512;

impl CipherSuite for Ristretto255Sha512 {
    const ID: &'static str = "ristretto255-SHA512";
    type Group = Ristretto255;
    type Hash = sha2::Sha512;
    type Ksf = Identity;
}

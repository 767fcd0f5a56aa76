// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A convenience trait for the hash functions a cipher suite may use, plus
//! type aliases for the HKDF and HMAC instantiations built on them.

use digest::core_api::BlockSizeUser;
use digest::Digest;
use hkdf::Hkdf;
use hmac::SimpleHmac;

/// The hash requirements of a cipher suite.
///
/// Satisfied by [`sha2::Sha256`], [`sha2::Sha384`] and [`sha2::Sha512`].
/// The block size is needed by `expand_message_xmd` and by the HMAC
/// construction.
pub trait Hash: Digest + BlockSizeUser + Clone + Default {}

impl<T: Digest + BlockSizeUser + Clone + Default> Hash for T {}

/// HKDF over the suite hash.
pub(crate) type HkdfHash<D> = Hkdf<D, SimpleHmac<D>>;

/// HMAC over the suite hash.
pub(crate) type HmacHash<D> = SimpleHmac<D>;

/// The output length `Nh` of the suite hash, in bytes.
pub(crate) fn output_size<D: Hash>() -> usize {
    <D as Digest>::output_size()
}

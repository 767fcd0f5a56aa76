// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A list of error types which are used throughout the library

use displaydoc::Display;

/// The error type returned by every fallible operation in this crate.
///
/// The taxonomy is deliberately coarse: all MAC and auth-tag mismatches
/// surface as [`ProtocolError::AuthenticationFailed`] so that a transport
/// cannot distinguish a wrong password from a tampered envelope or a
/// mismatched identity.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum ProtocolError {
    /// Group element deserialization failed: wrong length, off-curve,
    /// non-canonical, or the identity element
    InvalidPoint,
    /// A length was out of range: I2OSP overflow, expansion length, or a
    /// buffer of unexpected size
    InvalidLength,
    /// Authentication failed
    AuthenticationFailed,
    /// Key pair derivation exhausted its rejection-sampling retries
    DeriveKeyPairError,
    /// A scalar, key, or parameter was outside its valid range
    InvalidConfiguration,
}

impl std::error::Error for ProtocolError {}

pub(crate) mod utils {
    use super::ProtocolError;

    /// Checks that `bytes` is exactly `expected_len` long.
    pub(crate) fn check_slice_size(
        bytes: &[u8],
        expected_len: usize,
    ) -> Result<&[u8], ProtocolError> {
        if bytes.len() != expected_len {
            return Err(ProtocolError::InvalidLength);
        }
        Ok(bytes)
    }

    /// Checks that `bytes` is at least `min_len` long.
    pub(crate) fn check_slice_size_atleast(
        bytes: &[u8],
        min_len: usize,
    ) -> Result<&[u8], ProtocolError> {
        if bytes.len() < min_len {
            return Err(ProtocolError::InvalidLength);
        }
        Ok(bytes)
    }
}

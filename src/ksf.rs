// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Key-stretching functions applied to the OPRF output before the
//! randomized password is extracted.
//!
//! Client and server never exchange KSF parameters; a mismatch shows up as
//! an ordinary authentication failure, indistinguishable from a wrong
//! password.

use crate::errors::ProtocolError;

/// The salt fed to every salted KSF. It must be a fixed all-zero string:
/// the OPRF already personalizes the input per credential, and a
/// per-record salt would break the deterministic recovery the protocol
/// depends on.
const STATIC_SALT: [u8; 32] = [0; 32];

/// A key-stretching function with output length `output_len` (the suite's
/// `Nh`).
pub trait Ksf {
    /// Stretches `input` into `output_len` bytes.
    fn stretch(&self, input: &[u8], output_len: usize) -> Result<Vec<u8>, ProtocolError>;
}

/// A no-op stretch, for test vectors and benchmarks only.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl Ksf for Identity {
    fn stretch(&self, input: &[u8], output_len: usize) -> Result<Vec<u8>, ProtocolError> {
        if input.len() != output_len {
            return Err(ProtocolError::InvalidLength);
        }
        Ok(input.to_vec())
    }
}

#[cfg(feature = "argon2")]
impl Ksf for argon2::Argon2<'_> {
    fn stretch(&self, input: &[u8], output_len: usize) -> Result<Vec<u8>, ProtocolError> {
        let mut output = vec![0u8; output_len];
        self.hash_password_into(input, &STATIC_SALT, &mut output)
            .map_err(|_| ProtocolError::InvalidConfiguration)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_returns_input() {
        let input = [7u8; 32];
        assert_eq!(Identity.stretch(&input, 32).unwrap(), input.to_vec());
        assert_eq!(
            Identity.stretch(&input, 64),
            Err(ProtocolError::InvalidLength)
        );
    }

    #[cfg(feature = "argon2")]
    #[test]
    fn argon2id_is_deterministic_and_parameter_sensitive() {
        use argon2::{Algorithm, Argon2, Params, Version};

        let light = Params::new(8 * 1024, 1, 1, None).unwrap();
        let ksf = Argon2::new(Algorithm::Argon2id, Version::V0x13, light);
        let a = ksf.stretch(&[7u8; 32], 64).unwrap();
        let b = ksf.stretch(&[7u8; 32], 64).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let heavier = Params::new(8 * 1024, 2, 1, None).unwrap();
        let other = Argon2::new(Algorithm::Argon2id, Version::V0x13, heavier);
        assert_ne!(a, other.stretch(&[7u8; 32], 64).unwrap());
    }
}

// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! `expand_message_xmd` from RFC 9380 §5.3.1.

use digest::Digest;

use crate::errors::ProtocolError;
use crate::hash::Hash;
use crate::serialization::{i2osp_1, i2osp_2};

const OVERSIZE_DST_PREFIX: &[u8] = b"H2C-OVERSIZE-DST-";

/// Expands `msg` (given as a sequence of slices that are hashed as their
/// concatenation) to `len_in_bytes` uniform bytes under the domain
/// separation tag `dst`.
///
/// Fails with `InvalidLength` when `len_in_bytes` is 0 or exceeds 65535,
/// or when the expansion would need more than 255 hash blocks.
pub(crate) fn expand_message_xmd<D: Hash>(
    msg: &[&[u8]],
    dst: &[u8],
    len_in_bytes: usize,
) -> Result<Vec<u8>, ProtocolError> {
    let b_in_bytes = <D as Digest>::output_size();
    let r_in_bytes = D::block_size();

    if len_in_bytes == 0 || len_in_bytes > u16::MAX as usize {
        return Err(ProtocolError::InvalidLength);
    }
    let ell = (len_in_bytes + b_in_bytes - 1) / b_in_bytes;
    if ell > 255 {
        return Err(ProtocolError::InvalidLength);
    }

    // DST_prime: an oversize tag is first compressed through the hash.
    let dst_prime = if dst.len() > 255 {
        let mut hasher = D::new();
        hasher.update(OVERSIZE_DST_PREFIX);
        hasher.update(dst);
        let digest = hasher.finalize();
        let mut out = digest.to_vec();
        out.extend_from_slice(&i2osp_1(b_in_bytes)?);
        out
    } else {
        let mut out = dst.to_vec();
        out.extend_from_slice(&i2osp_1(dst.len())?);
        out
    };

    // b_0 = H(Z_pad || msg || l_i_b_str || 0x00 || DST_prime)
    let mut hasher = D::new();
    hasher.update(vec![0u8; r_in_bytes]);
    for part in msg {
        hasher.update(part);
    }
    hasher.update(i2osp_2(len_in_bytes)?);
    hasher.update([0u8]);
    hasher.update(&dst_prime);
    let b_0 = hasher.finalize();

    // b_1 = H(b_0 || 0x01 || DST_prime)
    let mut hasher = D::new();
    hasher.update(&b_0);
    hasher.update([1u8]);
    hasher.update(&dst_prime);
    let mut b_i = hasher.finalize();

    let mut uniform_bytes = Vec::with_capacity(ell * b_in_bytes);
    uniform_bytes.extend_from_slice(&b_i);

    for i in 2..=ell {
        // b_i = H((b_0 ^ b_{i-1}) || I2OSP(i, 1) || DST_prime)
        let mut hasher = D::new();
        let xored: Vec<u8> = b_0.iter().zip(b_i.iter()).map(|(x, y)| x ^ y).collect();
        hasher.update(&xored);
        hasher.update(i2osp_1(i)?);
        hasher.update(&dst_prime);
        b_i = hasher.finalize();
        uniform_bytes.extend_from_slice(&b_i);
    }

    uniform_bytes.truncate(len_in_bytes);
    Ok(uniform_bytes)
}

#[cfg(test)]
mod tests {
    use sha2::Sha256;

    use super::*;

    // RFC 9380, expand_message_xmd test vectors for SHA-256.
    const DST: &[u8] = b"QUUX-V01-CS02-with-expander-SHA256-128";

    #[test]
    fn xmd_sha256_empty_message() {
        let out = expand_message_xmd::<Sha256>(&[b""], DST, 0x20).unwrap();
        assert_eq!(
            hex::encode(out),
            "68a985b87eb6b46952128911f2a4412bbc302a9d759667f87f7a21d803f07235"
        );
    }

    #[test]
    fn xmd_sha256_abc() {
        let out = expand_message_xmd::<Sha256>(&[b"abc"], DST, 0x20).unwrap();
        assert_eq!(
            hex::encode(out),
            "d8ccab23b5985ccea865c6c97b6e5b8350e794e603b4b97902f53a8a0d605615"
        );
    }

    #[test]
    fn xmd_sha256_abcdef() {
        let out = expand_message_xmd::<Sha256>(&[b"abcdef0123456789"], DST, 0x20).unwrap();
        assert_eq!(
            hex::encode(out),
            "eff31487c770a893cfb36f912fbfcbff40d5661771ca4b2cb4eafe524333f5c1"
        );
    }

    #[test]
    fn xmd_message_framing_is_concatenation() {
        let joined = expand_message_xmd::<Sha256>(&[b"abcdef0123456789"], DST, 0x20).unwrap();
        let split = expand_message_xmd::<Sha256>(&[b"abcdef", b"0123456789"], DST, 0x20).unwrap();
        assert_eq!(joined, split);
    }

    #[test]
    fn xmd_oversize_dst_is_compressed() {
        let long_dst = vec![0x41u8; 300];
        let out = expand_message_xmd::<Sha256>(&[b"msg"], &long_dst, 0x40).unwrap();
        assert_eq!(out.len(), 0x40);
        // A distinct oversize tag must produce a distinct expansion.
        let other_dst = vec![0x42u8; 300];
        let other = expand_message_xmd::<Sha256>(&[b"msg"], &other_dst, 0x40).unwrap();
        assert_ne!(out, other);
    }

    #[test]
    fn xmd_rejects_out_of_range_lengths() {
        assert_eq!(
            expand_message_xmd::<Sha256>(&[b"msg"], DST, 0),
            Err(ProtocolError::InvalidLength)
        );
        assert_eq!(
            expand_message_xmd::<Sha256>(&[b"msg"], DST, 65536),
            Err(ProtocolError::InvalidLength)
        );
    }
}

// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Byte-level encoding helpers shared by the OPRF and OPAQUE layers.

use crate::errors::ProtocolError;

/// I2OSP for the one-byte lengths used in DSTs and derive-key-pair
/// counters. Fails if `n` does not fit.
pub(crate) fn i2osp_1(n: usize) -> Result<[u8; 1], ProtocolError> {
    if n > u8::MAX as usize {
        return Err(ProtocolError::InvalidLength);
    }
    Ok([n as u8])
}

/// I2OSP for the two-byte, big-endian lengths that frame every
/// variable-length field on the wire. Fails if `n` does not fit.
pub(crate) fn i2osp_2(n: usize) -> Result<[u8; 2], ProtocolError> {
    if n > u16::MAX as usize {
        return Err(ProtocolError::InvalidLength);
    }
    Ok((n as u16).to_be_bytes())
}

/// Length-value encoding: `I2OSP(|x|, 2) || x`.
pub(crate) fn lv(x: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::with_capacity(2 + x.len());
    out.extend_from_slice(&i2osp_2(x.len())?);
    out.extend_from_slice(x);
    Ok(out)
}

/// In-place XOR of `rhs` into `lhs`. The lengths must match.
pub(crate) fn xor_in_place(lhs: &mut [u8], rhs: &[u8]) -> Result<(), ProtocolError> {
    if lhs.len() != rhs.len() {
        return Err(ProtocolError::InvalidLength);
    }
    for (l, r) in lhs.iter_mut().zip(rhs) {
        *l ^= r;
    }
    Ok(())
}

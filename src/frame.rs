//! Verifier input framing.
//!
//! The `/verify` body is a single concatenated buffer:
//!
//! ```text
//! u64-le(len(pis)) || u64-le(len(proof)) || pis || proof
//! ```
//!
//! The two prefixes are the only delimiters; there is no padding.

use crate::error::FrameError;

/// Size of the two little-endian `u64` length prefixes.
pub const PREFIX_LEN: usize = 16;

/// Build the `/verify` request body from public inputs and a proof.
pub fn encode(pis: &[u8], proof: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(PREFIX_LEN + pis.len() + proof.len());
    frame.extend_from_slice(&(pis.len() as u64).to_le_bytes());
    frame.extend_from_slice(&(proof.len() as u64).to_le_bytes());
    frame.extend_from_slice(pis);
    frame.extend_from_slice(proof);
    frame
}

/// Split a frame back into `(pis, proof)`.
///
/// The declared lengths must account for every byte after the prefixes;
/// trailing or missing bytes are rejected.
pub fn decode(frame: &[u8]) -> Result<(&[u8], &[u8]), FrameError> {
    if frame.len() < PREFIX_LEN {
        return Err(FrameError::MissingPrefix(frame.len()));
    }
    let (prefix, body) = frame.split_at(PREFIX_LEN);
    let pis_len = read_u64_le(&prefix[..8]);
    let proof_len = read_u64_le(&prefix[8..]);

    let declared = pis_len
        .checked_add(proof_len)
        .ok_or(FrameError::LengthOverflow { pis_len, proof_len })?;
    if declared != body.len() as u64 {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: body.len(),
        });
    }

    // declared == body.len(), so both lengths fit in usize
    Ok(body.split_at(pis_len as usize))
}

fn read_u64_le(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

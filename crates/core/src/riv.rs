//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Ritual Imprint Vector (RIV): a 256-bit fingerprint combining a
//! spectral signature, a rhythm signature, and the Temporal Salt Chain's
//! hash. Used for steganography cross-checks, ROC binding, and ritual
//! matching/lookup.

use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};
use crate::features::FeatureVector;

pub const RIV_LEN: usize = 32;

fn le_bytes(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn spectral_signature(features: &[f32; 256]) -> [u8; 16] {
    let mut h = Sha256::new();
    h.update(b"SPECTRAL_SIG_V3");
    h.update(le_bytes(&features[0..32])); // centroid
    h.update(le_bytes(&features[160..192])); // rolloff
    h.update(le_bytes(&features[224..240])); // spec mean
    h.update(le_bytes(&features[240..256])); // spec std
    let digest = h.finalize();
    let mut sig = [0u8; 16];
    sig.copy_from_slice(&digest[0..16]);
    sig
}

fn rhythm_signature(features: &[f32; 256]) -> [u8; 16] {
    let mut h = Sha256::new();
    h.update(b"RHYTHM_SIG_V3");
    h.update(le_bytes(&features[32..64])); // flux
    h.update(le_bytes(&features[64..128])); // loudness / rms
    h.update(le_bytes(&features[128..160])); // onset / transients
    let digest = h.finalize();
    let mut sig = [0u8; 16];
    sig.copy_from_slice(&digest[0..16]);
    sig
}

/// Compute the 32-byte Ritual Imprint Vector from a feature vector and a
/// Temporal Salt Chain hash.
pub fn compute_riv(features: &FeatureVector, temporal_hash: &[u8; 32]) -> [u8; RIV_LEN] {
    let spectral = spectral_signature(&features.0);
    let rhythm = rhythm_signature(&features.0);

    let mut h = Sha256::new();
    h.update(b"ECHOTOME_RIV_V3");
    h.update(spectral);
    h.update(rhythm);
    h.update(temporal_hash);
    let digest = h.finalize();
    let mut riv = [0u8; RIV_LEN];
    riv.copy_from_slice(&digest);
    riv
}

pub fn riv_to_hex(riv: &[u8; RIV_LEN]) -> String {
    hex::encode(riv)
}

pub fn riv_from_hex(s: &str) -> Result<[u8; RIV_LEN]> {
    let bytes = hex::decode(s).map_err(|e| EngineError::InvalidInput(format!("invalid RIV hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| EngineError::InvalidInput("RIV must be 32 bytes".into()))
}

/// Exact equality, or equality within a normalized Hamming-distance tolerance.
pub fn compare_rivs(a: &[u8; RIV_LEN], b: &[u8; RIV_LEN], tolerance: f32) -> bool {
    if tolerance <= 0.0 {
        return a == b;
    }
    riv_distance(a, b) <= tolerance
}

/// Normalized Hamming distance over 256 bits: 0.0 = identical, 1.0 = fully opposite.
pub fn riv_distance(a: &[u8; RIV_LEN], b: &[u8; RIV_LEN]) -> f32 {
    let hamming: u32 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x ^ y).count_ones())
        .sum();
    hamming as f32 / (RIV_LEN as f32 * 8.0)
}

/// Short, human-readable fingerprint: the first `length/2` bytes of the
/// RIV as uppercase hex.
pub fn get_riv_fingerprint(riv: &[u8; RIV_LEN], length: usize) -> String {
    let n = (length / 2).min(RIV_LEN);
    hex::encode_upper(&riv[0..n])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(fill: f32) -> FeatureVector {
        FeatureVector([fill; 256])
    }

    #[test]
    fn same_inputs_give_same_riv() {
        let th = [7u8; 32];
        let a = compute_riv(&fv(0.5), &th);
        let b = compute_riv(&fv(0.5), &th);
        assert_eq!(a, b);
    }

    #[test]
    fn different_temporal_hash_changes_riv() {
        let a = compute_riv(&fv(0.5), &[1u8; 32]);
        let b = compute_riv(&fv(0.5), &[2u8; 32]);
        assert_ne!(a, b);
    }

    #[test]
    fn riv_hex_roundtrips() {
        let riv = compute_riv(&fv(0.1), &[9u8; 32]);
        let hexed = riv_to_hex(&riv);
        assert_eq!(riv_from_hex(&hexed).unwrap(), riv);
    }

    #[test]
    fn identical_rivs_have_zero_distance() {
        let riv = compute_riv(&fv(0.2), &[3u8; 32]);
        assert_eq!(riv_distance(&riv, &riv), 0.0);
        assert!(compare_rivs(&riv, &riv, 0.0));
    }

    #[test]
    fn fully_flipped_riv_has_max_distance() {
        let a = [0u8; RIV_LEN];
        let b = [0xFFu8; RIV_LEN];
        assert_eq!(riv_distance(&a, &b), 1.0);
    }
}

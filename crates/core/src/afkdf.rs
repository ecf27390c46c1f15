//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Audio-Field KDF: mixes a passphrase, an audio feature vector, and a
//! named profile through HKDF-SHA256 then a memory-hard function into a
//! 32-byte key. Any single KDF failure is surfaced verbatim to the caller;
//! wrong-passphrase/wrong-audio detection happens downstream at AEAD
//! authentication, not here.

use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};
use crate::profile::PrivacyProfile;
use crate::secret::Secret;

pub const DERIVED_KEY_LEN: usize = 32;

/// The 32-byte key derived by AF-KDF, held in a zeroizing container.
pub type DerivedKey = Secret<[u8; DERIVED_KEY_LEN]>;

fn feature_hash(feature_bytes: &[u8]) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(feature_bytes);
    h.finalize().into()
}

fn memory_hard_salt(feature_hash: &[u8; 32], profile_name: &str, audio_weight: f32) -> [u8; 16] {
    let mut h = Sha256::new();
    if audio_weight > 0.0 {
        h.update(feature_hash);
        h.update(profile_name.as_bytes());
    } else {
        h.update(profile_name.as_bytes());
    }
    let digest = h.finalize();
    let mut salt = [0u8; 16];
    salt.copy_from_slice(&digest[0..16]);
    salt
}

fn hkdf_intermediate(feature_hash: &[u8; 32], profile_name: &str, passphrase: &str) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(Some(feature_hash), passphrase.as_bytes());
    let mut out = [0u8; 32];
    hk.expand(profile_name.as_bytes(), &mut out)
        .map_err(|e| EngineError::InvalidInput(format!("HKDF expand failed: {e}")))?;
    Ok(out)
}

fn argon2id(password: &[u8], salt: &[u8], profile: &PrivacyProfile) -> Result<[u8; 32]> {
    let params = Params::new(
        profile.kdf_memory_kib,
        profile.kdf_time,
        profile.kdf_parallelism,
        Some(DERIVED_KEY_LEN),
    )
    .map_err(|e| EngineError::ResourceError(format!("invalid Argon2id params: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut out = [0u8; DERIVED_KEY_LEN];
    argon2
        .hash_password_into(password, salt, &mut out)
        .map_err(|e| EngineError::ResourceError(format!("Argon2id derivation failed: {e}")))?;
    Ok(out)
}

/// scrypt fallback for platforms lacking Argon2id. Reduces the effective
/// cost relative to Argon2id at the same nominal memory budget; callers
/// that select this path should document the reduction to operators.
fn scrypt_fallback(password: &[u8], salt: &[u8], memory_kib: u32) -> Result<[u8; 32]> {
    let log_n = (memory_kib / 1024).clamp(1, 14) as u8;
    let params = scrypt::Params::new(log_n, 8, 1, DERIVED_KEY_LEN)
        .map_err(|e| EngineError::ResourceError(format!("invalid scrypt params: {e}")))?;
    let mut out = [0u8; DERIVED_KEY_LEN];
    scrypt::scrypt(password, salt, &params, &mut out)
        .map_err(|e| EngineError::ResourceError(format!("scrypt derivation failed: {e}")))?;
    Ok(out)
}

/// Which memory-hard function actually produced the key. Exposed so
/// operators can be told when the reduced-cost fallback was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryHardAlgorithm {
    Argon2id,
    Scrypt,
}

/// Derive the 32-byte AF-KDF output key for `(passphrase, feature_vector, profile)`.
///
/// Deterministic: identical inputs always produce identical output bytes,
/// hence identical rune IDs (see [`crate::rune_id`]).
pub fn derive(
    passphrase: &str,
    feature_bytes: &[u8],
    profile: &PrivacyProfile,
) -> Result<(DerivedKey, MemoryHardAlgorithm)> {
    let h_a = feature_hash(feature_bytes);
    let intermediate = hkdf_intermediate(&h_a, profile.name, passphrase)?;
    let salt = memory_hard_salt(&h_a, profile.name, profile.audio_weight);

    match argon2id(&intermediate, &salt, profile) {
        Ok(key) => Ok((Secret::new(key), MemoryHardAlgorithm::Argon2id)),
        Err(_) => {
            let key = scrypt_fallback(&intermediate, &salt, profile.kdf_memory_kib)?;
            Ok((Secret::new(key), MemoryHardAlgorithm::Scrypt))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Registry;

    #[test]
    fn derivation_is_deterministic() {
        let reg = Registry::new();
        let profile = reg.get("Quick Lock").unwrap();
        let zero_features = [0u8; 1024];
        let (k1, _) = derive("pass", &zero_features, profile).unwrap();
        let (k2, _) = derive("pass", &zero_features, profile).unwrap();
        assert_eq!(k1.expose_secret(), k2.expose_secret());
    }

    #[test]
    fn different_passphrase_yields_different_key() {
        let reg = Registry::new();
        let profile = reg.get("Quick Lock").unwrap();
        let zero_features = [0u8; 1024];
        let (k1, _) = derive("pass", &zero_features, profile).unwrap();
        let (k2, _) = derive("pas5", &zero_features, profile).unwrap();
        assert_ne!(k1.expose_secret(), k2.expose_secret());
    }
}

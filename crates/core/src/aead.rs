//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! AEAD envelope around the derived ritual key.
//!
//! `encrypt` always writes XChaCha20-Poly1305 with a fresh 24-byte
//! nonce. `decrypt` negotiates the algorithm from the stored nonce
//! length (24 = XChaCha20-Poly1305, 12 = AES-GCM-256), so blobs
//! written by an older or alternate encoder using the 12-byte form
//! still open. Any AEAD failure -- wrong key, tampered ciphertext,
//! tampered AAD -- collapses to a single [`EngineError::AuthenticationFailed`];
//! the internal branch that actually failed is never exposed.

use aead::{Aead, KeyInit, Payload};
use aes_gcm::Aes256Gcm;
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::canon::to_canonical_bytes;
use crate::error::{EngineError, Result};

const NONCE_LEN_XCHACHA: usize = 24;
const NONCE_LEN_AESGCM: usize = 12;
const DECOY_TYPES: &[&str] = &["NOTE", "PHOTO", "MEMO", "DRAFT", "SKETCH", "VOICE"];

/// The subset of context fields that are authenticated but not secret.
/// Encryption and decryption MUST use identical bytes for this, or the
/// AEAD tag will not verify.
#[derive(Debug, Clone, Serialize)]
struct AadContext<'a> {
    profile_name: &'a str,
    rune_id: &'a str,
}

fn aad_bytes(profile_name: &str, rune_id: &str) -> Result<Vec<u8>> {
    to_canonical_bytes(&AadContext { profile_name, rune_id })
}

/// An encrypted blob in its on-disk shape. Field names match the
/// external JSON interface (`nonce`, `ciphertext`, `auth_tag`) rather
/// than the internal Rust-idiomatic ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedBlob {
    pub version: String,
    pub nonce: String,
    pub ciphertext: String,
    /// Retained empty for historical compatibility; the tag is embedded
    /// in `ciphertext`.
    pub auth_tag: String,
    pub profile_name: String,
    pub rune_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoy_header: Option<String>,
}

/// Encryption/decryption context: the non-secret fields bound into the AAD,
/// plus whether a decoy header should be generated.
#[derive(Debug, Clone)]
pub struct EncryptionContext {
    pub profile_name: String,
    pub rune_id: String,
    pub deniable: bool,
}

fn random_decoy_header() -> String {
    let idx = (OsRng.next_u32() as usize) % DECOY_TYPES.len();
    let mut suffix = [0u8; 8];
    OsRng.fill_bytes(&mut suffix);
    format!("DECOY_{}_{}", DECOY_TYPES[idx], hex::encode(suffix))
}

/// Encrypt `plaintext` under `key` (32 bytes), authenticating `ctx`.
pub fn encrypt(plaintext: &[u8], key: &[u8; 32], ctx: &EncryptionContext) -> Result<EncryptedBlob> {
    let aad = aad_bytes(&ctx.profile_name, &ctx.rune_id)?;

    let mut nonce_bytes = [0u8; NONCE_LEN_XCHACHA];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let cipher = XChaCha20Poly1305::new(key.into());
    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad: &aad })
        .map_err(|_| EngineError::AuthenticationFailed)?;

    Ok(EncryptedBlob {
        version: "2.0".to_string(),
        nonce: hex::encode(nonce_bytes),
        ciphertext: hex::encode(ciphertext),
        auth_tag: String::new(),
        profile_name: ctx.profile_name.clone(),
        rune_id: ctx.rune_id.clone(),
        decoy_header: if ctx.deniable { Some(random_decoy_header()) } else { None },
    })
}

/// Decrypt `blob` under `key`. The AEAD algorithm is chosen from the
/// stored nonce length. Any failure -- bad key, tampered ciphertext,
/// tampered AAD, unrecognized nonce length -- is reported identically.
pub fn decrypt(blob: &EncryptedBlob, key: &[u8; 32]) -> Result<Vec<u8>> {
    let nonce_bytes = hex::decode(&blob.nonce).map_err(|_| EngineError::AuthenticationFailed)?;
    let ciphertext = hex::decode(&blob.ciphertext).map_err(|_| EngineError::AuthenticationFailed)?;
    let aad = aad_bytes(&blob.profile_name, &blob.rune_id)?;

    match nonce_bytes.len() {
        NONCE_LEN_XCHACHA => {
            let nonce = XNonce::from_slice(&nonce_bytes);
            let cipher = XChaCha20Poly1305::new(key.into());
            cipher
                .decrypt(nonce, Payload { msg: &ciphertext, aad: &aad })
                .map_err(|_| EngineError::AuthenticationFailed)
        }
        NONCE_LEN_AESGCM => {
            let nonce = aes_gcm::Nonce::from_slice(&nonce_bytes);
            let cipher = Aes256Gcm::new(key.into());
            cipher
                .decrypt(nonce, Payload { msg: &ciphertext, aad: &aad })
                .map_err(|_| EngineError::AuthenticationFailed)
        }
        _ => Err(EngineError::AuthenticationFailed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(deniable: bool) -> EncryptionContext {
        EncryptionContext {
            profile_name: "Ritual Lock".to_string(),
            rune_id: "ECH-DEADBEEF".to_string(),
            deniable,
        }
    }

    #[test]
    fn round_trip_recovers_plaintext() {
        let key = [7u8; 32];
        let blob = encrypt(b"ritual payload bytes", &key, &ctx(false)).unwrap();
        let pt = decrypt(&blob, &key).unwrap();
        assert_eq!(pt, b"ritual payload bytes");
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let blob = encrypt(b"secret", &[1u8; 32], &ctx(false)).unwrap();
        assert!(matches!(
            decrypt(&blob, &[2u8; 32]),
            Err(EngineError::AuthenticationFailed)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let key = [3u8; 32];
        let mut blob = encrypt(b"secret", &key, &ctx(false)).unwrap();
        let mut bytes = hex::decode(&blob.ciphertext).unwrap();
        bytes[0] ^= 0xFF;
        blob.ciphertext = hex::encode(bytes);
        assert!(matches!(decrypt(&blob, &key), Err(EngineError::AuthenticationFailed)));
    }

    #[test]
    fn tampered_aad_field_fails_authentication() {
        let key = [4u8; 32];
        let mut blob = encrypt(b"secret", &key, &ctx(false)).unwrap();
        blob.rune_id = "ECH-00000000".to_string();
        assert!(matches!(decrypt(&blob, &key), Err(EngineError::AuthenticationFailed)));
    }

    #[test]
    fn deniable_context_populates_decoy_header() {
        let blob = encrypt(b"secret", &[5u8; 32], &ctx(true)).unwrap();
        let decoy = blob.decoy_header.expect("deniable blob must carry a decoy header");
        assert!(decoy.starts_with("DECOY_"));
    }

    #[test]
    fn non_deniable_context_has_no_decoy_header() {
        let blob = encrypt(b"secret", &[6u8; 32], &ctx(false)).unwrap();
        assert!(blob.decoy_header.is_none());
    }

    #[test]
    fn aes_gcm_nonce_length_is_accepted_on_decrypt() {
        let key = [8u8; 32];
        let aad = aad_bytes("Quick Lock", "ECH-12345678").unwrap();
        let mut nonce_bytes = [0u8; NONCE_LEN_AESGCM];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = aes_gcm::Nonce::from_slice(&nonce_bytes);
        let cipher = Aes256Gcm::new((&key).into());
        let ciphertext = cipher
            .encrypt(nonce, Payload { msg: b"legacy blob", aad: &aad })
            .unwrap();

        let blob = EncryptedBlob {
            version: "2.0".to_string(),
            nonce: hex::encode(nonce_bytes),
            ciphertext: hex::encode(ciphertext),
            auth_tag: String::new(),
            profile_name: "Quick Lock".to_string(),
            rune_id: "ECH-12345678".to_string(),
            decoy_header: None,
        };

        assert_eq!(decrypt(&blob, &key).unwrap(), b"legacy blob");
    }

    #[test]
    fn auth_tag_field_is_retained_empty() {
        let blob = encrypt(b"secret", &[9u8; 32], &ctx(false)).unwrap();
        assert!(blob.auth_tag.is_empty());
    }
}

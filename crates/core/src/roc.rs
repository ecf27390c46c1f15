//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Ritual Ownership Certificate (ROC): a signed, canonically-serialized
//! assertion of who bound a ritual to which audio, when, and under which
//! privacy profile.
//!
//! A ROC is stored as `<rune_id>.roc.json` under a per-user directory.
//! Single-track creation also populates the v3.0-compat shadow fields so
//! an older reader can still verify the same payload byte-for-byte;
//! multi-track certificates omit them. Verification never panics: any
//! decode or signature failure is a plain `false`.

use std::fs;
use std::path::Path;

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canon::{to_canonical_bytes, to_pretty_bytes};
use crate::error::{EngineError, Result};
use crate::identity::{self, IdentityKeypair};

/// A single audio track bound into a ritual.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RitualTrack {
    pub audio_hash_hex: String,
    pub active_start: u64,
    pub active_end: u64,
    pub riv_hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporal_hash_hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_length: Option<u64>,
}

/// The signed contents of a ROC. `tracks` carries one or more
/// [`RitualTrack`]s (v3.1); the `audio_hash_hex`/`active_start`/
/// `active_end`/`temporal_hash_hex`/`track_length` fields mirror
/// `tracks[0]` for single-track certificates and are omitted for
/// genuinely multi-track ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RitualCertificatePayload {
    pub version: String,
    pub owner_pub_b64: String,
    pub rune_id: String,
    pub profile: String,
    pub created_at_unix: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_hash_hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_start: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_end: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporal_hash_hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_length: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<RitualTrack>>,
}

impl RitualCertificatePayload {
    pub fn is_multi_track(&self) -> bool {
        self.tracks.as_ref().map(|t| t.len() > 1).unwrap_or(false)
    }

    pub fn get_track_count(&self) -> usize {
        if let Some(tracks) = &self.tracks {
            tracks.len()
        } else if self.audio_hash_hex.is_some() {
            1
        } else {
            0
        }
    }

    pub fn get_all_audio_hashes(&self) -> Vec<String> {
        if let Some(tracks) = &self.tracks {
            tracks.iter().map(|t| t.audio_hash_hex.clone()).collect()
        } else if let Some(hash) = &self.audio_hash_hex {
            vec![hash.clone()]
        } else {
            Vec::new()
        }
    }

    /// Canonical signing bytes: sorted keys, compact, UTF-8.
    fn to_signing_bytes(&self) -> Result<Vec<u8>> {
        to_canonical_bytes(self)
    }
}

/// A complete, signed Ritual Ownership Certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RitualCertificate {
    pub payload: RitualCertificatePayload,
    /// Base64 (standard, padded) Ed25519 signature over the payload's
    /// canonical signing bytes.
    pub signature: String,
}

fn unix_time_now() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Create a single-track ROC, populating both the v3.1 `tracks` field and
/// the v3.0-compat shadow fields.
pub fn create(
    keypair: &IdentityKeypair,
    rune_id: &str,
    profile: &str,
    track: RitualTrack,
) -> Result<RitualCertificate> {
    let payload = RitualCertificatePayload {
        version: "3.1".to_string(),
        owner_pub_b64: keypair.export_public_key_base64(),
        rune_id: rune_id.to_string(),
        profile: profile.to_string(),
        created_at_unix: unix_time_now(),
        audio_hash_hex: Some(track.audio_hash_hex.clone()),
        active_start: Some(track.active_start),
        active_end: Some(track.active_end),
        temporal_hash_hex: track.temporal_hash_hex.clone(),
        track_length: track.track_length,
        tracks: Some(vec![track]),
    };
    sign(keypair, payload)
}

/// Create a multi-track ROC. No v3.0 shadow fields are populated: a v3.0
/// reader cannot meaningfully represent more than one track.
pub fn create_multi_track(
    keypair: &IdentityKeypair,
    rune_id: &str,
    profile: &str,
    tracks: Vec<RitualTrack>,
) -> Result<RitualCertificate> {
    if tracks.is_empty() {
        return Err(EngineError::InvalidInput("ROC must have at least one track".into()));
    }
    let payload = RitualCertificatePayload {
        version: "3.1".to_string(),
        owner_pub_b64: keypair.export_public_key_base64(),
        rune_id: rune_id.to_string(),
        profile: profile.to_string(),
        created_at_unix: unix_time_now(),
        audio_hash_hex: None,
        active_start: None,
        active_end: None,
        temporal_hash_hex: None,
        track_length: None,
        tracks: Some(tracks),
    };
    sign(keypair, payload)
}

fn sign(keypair: &IdentityKeypair, payload: RitualCertificatePayload) -> Result<RitualCertificate> {
    let signing_bytes = payload.to_signing_bytes()?;
    let signature = keypair.sign(&signing_bytes);
    Ok(RitualCertificate {
        payload,
        signature: base64::engine::general_purpose::STANDARD.encode(signature),
    })
}

/// Verify a ROC. Checks, in order: (1) the signature against the
/// payload's own `owner_pub_b64`; (2) if `expected_audio_hash` is given,
/// that it matches the single-track legacy field (callers of multi-track
/// ROCs must compare `tracks[i].audio_hash_hex` themselves); (3) if
/// `allowed_pub_keys` is given, that the signer is in the list. Never
/// panics; any decode failure is simply `false`.
pub fn verify(
    cert: &RitualCertificate,
    expected_audio_hash: Option<&str>,
    allowed_pub_keys: Option<&[[u8; 32]]>,
) -> bool {
    let verify_inner = || -> Result<bool> {
        let signature_bytes = base64::engine::general_purpose::STANDARD
            .decode(&cert.signature)
            .map_err(|e| EngineError::InvalidInput(e.to_string()))?;
        let signature: [u8; 64] = signature_bytes
            .try_into()
            .map_err(|_| EngineError::InvalidInput("signature must be 64 bytes".into()))?;
        let owner_pub = identity::import_public_key_base64(&cert.payload.owner_pub_b64)?;

        let signing_bytes = cert.payload.to_signing_bytes()?;
        if !identity::verify(&signing_bytes, &signature, &owner_pub) {
            return Ok(false);
        }

        if let Some(expected) = expected_audio_hash {
            if cert.payload.audio_hash_hex.as_deref() != Some(expected) {
                return Ok(false);
            }
        }

        if let Some(allowed) = allowed_pub_keys {
            if !allowed.contains(&owner_pub) {
                return Ok(false);
            }
        }

        Ok(true)
    };

    verify_inner().unwrap_or(false)
}

fn cert_path(roc_dir: &Path, rune_id: &str) -> std::path::PathBuf {
    roc_dir.join(format!("{rune_id}.roc.json"))
}

/// Save a ROC as `<roc_dir>/<rune_id>.roc.json`. Creates `roc_dir` if
/// absent.
pub fn save(roc_dir: &Path, cert: &RitualCertificate) -> Result<std::path::PathBuf> {
    fs::create_dir_all(roc_dir)?;
    let path = cert_path(roc_dir, &cert.payload.rune_id);
    let bytes = serde_json::to_vec_pretty(cert)?;
    fs::write(&path, bytes)?;
    Ok(path)
}

/// Load a ROC by rune id. `Ok(None)` if no such file exists;
/// `Err(EngineError::Corrupt)` if it exists but fails to parse.
pub fn load_by_rune_id(roc_dir: &Path, rune_id: &str) -> Result<Option<RitualCertificate>> {
    let path = cert_path(roc_dir, rune_id);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(&path)?;
    let cert: RitualCertificate = serde_json::from_slice(&bytes)?;
    Ok(Some(cert))
}

/// Scan `roc_dir` for a certificate whose legacy `audio_hash_hex` matches.
/// Best-effort: unreadable or malformed entries are skipped, not fatal.
pub fn load_by_audio_hash(roc_dir: &Path, audio_hash_hex: &str) -> Result<Option<RitualCertificate>> {
    if !roc_dir.exists() {
        return Ok(None);
    }
    for entry in fs::read_dir(roc_dir)? {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Ok(bytes) = fs::read(&path) else { continue };
        let Ok(cert) = serde_json::from_slice::<RitualCertificate>(&bytes) else { continue };
        if cert.payload.audio_hash_hex.as_deref() == Some(audio_hash_hex) {
            return Ok(Some(cert));
        }
    }
    Ok(None)
}

/// List every certificate in `roc_dir`, newest first. Best-effort: entries
/// that fail to read or parse are skipped.
pub fn list_all(roc_dir: &Path) -> Result<Vec<RitualCertificate>> {
    if !roc_dir.exists() {
        return Ok(Vec::new());
    }
    let mut certs = Vec::new();
    for entry in fs::read_dir(roc_dir)? {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Ok(bytes) = fs::read(&path) else { continue };
        let Ok(cert) = serde_json::from_slice::<RitualCertificate>(&bytes) else { continue };
        certs.push(cert);
    }
    certs.sort_by(|a, b| b.payload.created_at_unix.total_cmp(&a.payload.created_at_unix));
    Ok(certs)
}

/// Delete a ROC by rune id. Returns `true` if a file was removed.
pub fn delete(roc_dir: &Path, rune_id: &str) -> Result<bool> {
    let path = cert_path(roc_dir, rune_id);
    if path.exists() {
        fs::remove_file(path)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Cross-check hash for the stego payload's `roc_hash`: SHA-256 of the
/// *pretty-printed* ROC JSON bytes. Deliberately distinct from the
/// compact signing bytes.
pub fn cross_check_hash(cert: &RitualCertificate) -> Result<String> {
    let bytes = to_pretty_bytes(cert)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn keypair() -> IdentityKeypair {
        let dir = tempdir().unwrap();
        identity::ensure_identity_keypair(&dir.path().join("identity")).unwrap()
    }

    fn track() -> RitualTrack {
        RitualTrack {
            audio_hash_hex: "a".repeat(64),
            active_start: 10,
            active_end: 200,
            riv_hex: "b".repeat(64),
            temporal_hash_hex: Some("c".repeat(64)),
            track_length: Some(48_000),
        }
    }

    #[test]
    fn create_and_verify_round_trip() {
        let kp = keypair();
        let cert = create(&kp, "ECH-AAAA1111", "Ritual Lock", track()).unwrap();
        assert!(verify(&cert, None, None));
        assert!(verify(&cert, Some(&"a".repeat(64)), None));
    }

    #[test]
    fn wrong_audio_hash_fails_verification() {
        let kp = keypair();
        let cert = create(&kp, "ECH-AAAA1111", "Ritual Lock", track()).unwrap();
        assert!(!verify(&cert, Some(&"f".repeat(64)), None));
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let kp = keypair();
        let mut cert = create(&kp, "ECH-AAAA1111", "Ritual Lock", track()).unwrap();
        cert.payload.profile = "Black Vault".to_string();
        assert!(!verify(&cert, None, None));
    }

    #[test]
    fn disallowed_signer_fails_verification() {
        let kp = keypair();
        let other_kp = keypair();
        let cert = create(&kp, "ECH-AAAA1111", "Ritual Lock", track()).unwrap();
        let allowed = [other_kp.public_bytes()];
        assert!(!verify(&cert, None, Some(&allowed)));
    }

    #[test]
    fn malformed_certificate_verifies_false_not_panic() {
        let kp = keypair();
        let mut cert = create(&kp, "ECH-AAAA1111", "Ritual Lock", track()).unwrap();
        cert.signature = "not valid base64!!".to_string();
        assert!(!verify(&cert, None, None));
        cert.payload.owner_pub_b64 = "also not valid".to_string();
        assert!(!verify(&cert, None, None));
    }

    #[test]
    fn single_track_creation_populates_shadow_fields() {
        let kp = keypair();
        let cert = create(&kp, "ECH-AAAA1111", "Quick Lock", track()).unwrap();
        assert_eq!(cert.payload.get_track_count(), 1);
        assert!(!cert.payload.is_multi_track());
        assert_eq!(cert.payload.audio_hash_hex, Some("a".repeat(64)));
    }

    #[test]
    fn multi_track_creation_has_no_shadow_fields() {
        let kp = keypair();
        let cert = create_multi_track(&kp, "ECH-BBBB2222", "Ritual Lock", vec![track(), track()]).unwrap();
        assert!(cert.payload.is_multi_track());
        assert_eq!(cert.payload.get_track_count(), 2);
        assert!(cert.payload.audio_hash_hex.is_none());
        assert!(verify(&cert, None, None));
    }

    #[test]
    fn multi_track_requires_at_least_one_track() {
        let kp = keypair();
        assert!(matches!(
            create_multi_track(&kp, "ECH-0", "Quick Lock", vec![]),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn save_and_load_by_rune_id_round_trips() {
        let kp = keypair();
        let cert = create(&kp, "ECH-CCCC3333", "Quick Lock", track()).unwrap();
        let dir = tempdir().unwrap();
        save(dir.path(), &cert).unwrap();
        let loaded = load_by_rune_id(dir.path(), "ECH-CCCC3333").unwrap().unwrap();
        assert_eq!(loaded.payload.rune_id, cert.payload.rune_id);
        assert!(verify(&loaded, None, None));
    }

    #[test]
    fn load_missing_rune_id_returns_none() {
        let dir = tempdir().unwrap();
        assert!(load_by_rune_id(dir.path(), "ECH-NOPE0000").unwrap().is_none());
    }

    #[test]
    fn load_by_audio_hash_scans_directory() {
        let kp = keypair();
        let cert = create(&kp, "ECH-DDDD4444", "Quick Lock", track()).unwrap();
        let dir = tempdir().unwrap();
        save(dir.path(), &cert).unwrap();
        let found = load_by_audio_hash(dir.path(), &"a".repeat(64)).unwrap().unwrap();
        assert_eq!(found.payload.rune_id, "ECH-DDDD4444");
    }

    #[test]
    fn corrupt_entry_is_skipped_during_scan() {
        let kp = keypair();
        let cert = create(&kp, "ECH-EEEE5555", "Quick Lock", track()).unwrap();
        let dir = tempdir().unwrap();
        save(dir.path(), &cert).unwrap();
        fs::write(dir.path().join("garbage.roc.json"), b"not json").unwrap();
        let certs = list_all(dir.path()).unwrap();
        assert_eq!(certs.len(), 1);
    }

    #[test]
    fn delete_removes_certificate() {
        let kp = keypair();
        let cert = create(&kp, "ECH-FFFF6666", "Quick Lock", track()).unwrap();
        let dir = tempdir().unwrap();
        save(dir.path(), &cert).unwrap();
        assert!(delete(dir.path(), "ECH-FFFF6666").unwrap());
        assert!(!delete(dir.path(), "ECH-FFFF6666").unwrap());
    }

    #[test]
    fn cross_check_hash_is_deterministic_and_distinct_from_signing_bytes() {
        let kp = keypair();
        let cert = create(&kp, "ECH-00001111", "Quick Lock", track()).unwrap();
        let h1 = cross_check_hash(&cert).unwrap();
        let h2 = cross_check_hash(&cert).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }
}

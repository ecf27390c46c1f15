//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Per-device Ed25519 signing identity.
//!
//! Generated exactly once per device and never rotated by this crate --
//! rotation is an external operator action. Keys are persisted as raw
//! 32-byte files (mode 0600) inside a directory (mode 0700).

use std::fs;
use std::path::Path;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;
use zeroize::Zeroize;

use crate::error::{EngineError, Result};

const PRIVATE_KEY_FILE: &str = "identity.sk";
const PUBLIC_KEY_FILE: &str = "identity.pk";

/// A device's Ed25519 signing identity. The private key is zeroized on drop.
pub struct IdentityKeypair {
    secret: [u8; 32],
    public: [u8; 32],
}

impl Drop for IdentityKeypair {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl IdentityKeypair {
    fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.secret)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey::from_bytes(&self.public).expect("stored public key is always valid")
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.public
    }

    /// 64-byte Ed25519 signature over `data`.
    pub fn sign(&self, data: &[u8]) -> [u8; 64] {
        self.signing_key().sign(data).to_bytes()
    }

    /// Base64 (standard, padded) encoding of the raw public key.
    pub fn export_public_key_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(self.public)
    }

    /// A short fingerprint for display/logging: the first 8 hex chars of
    /// SHA-256(public key).
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(self.public);
        hex::encode(&digest[0..4])
    }
}

/// Stateless verification against an arbitrary Ed25519 public key. Never
/// raises -- an invalid key or signature simply verifies as `false`.
pub fn verify(data: &[u8], signature: &[u8; 64], public_key: &[u8; 32]) -> bool {
    let Ok(vk) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let sig = Signature::from_bytes(signature);
    vk.verify(data, &sig).is_ok()
}

/// Base64-decode and validate a 32-byte Ed25519 public key.
pub fn import_public_key_base64(s: &str) -> Result<[u8; 32]> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| EngineError::InvalidInput(format!("invalid base64 public key: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| EngineError::InvalidInput("public key must be 32 bytes".into()))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

fn generate(identity_dir: &Path) -> Result<IdentityKeypair> {
    fs::create_dir_all(identity_dir)?;
    set_mode(identity_dir, 0o700)?;

    let signing_key = SigningKey::generate(&mut OsRng);
    let secret = signing_key.to_bytes();
    let public = signing_key.verifying_key().to_bytes();

    let sk_path = identity_dir.join(PRIVATE_KEY_FILE);
    let pk_path = identity_dir.join(PUBLIC_KEY_FILE);
    fs::write(&sk_path, secret)?;
    fs::write(&pk_path, public)?;
    set_mode(&sk_path, 0o600)?;
    set_mode(&pk_path, 0o600)?;

    Ok(IdentityKeypair { secret, public })
}

fn load(identity_dir: &Path) -> Result<IdentityKeypair> {
    let sk_bytes = fs::read(identity_dir.join(PRIVATE_KEY_FILE))?;
    let pk_bytes = fs::read(identity_dir.join(PUBLIC_KEY_FILE))?;

    let secret: [u8; 32] = sk_bytes
        .try_into()
        .map_err(|_| EngineError::ResourceError("identity private key has wrong length".into()))?;
    let public: [u8; 32] = pk_bytes
        .try_into()
        .map_err(|_| EngineError::ResourceError("identity public key has wrong length".into()))?;

    // Validate by reconstructing the Ed25519 objects -- catches corruption.
    let signing_key = SigningKey::from_bytes(&secret);
    if signing_key.verifying_key().to_bytes() != public {
        return Err(EngineError::ResourceError(
            "identity key files are inconsistent".into(),
        ));
    }
    VerifyingKey::from_bytes(&public)
        .map_err(|e| EngineError::ResourceError(format!("corrupt identity public key: {e}")))?;

    Ok(IdentityKeypair { secret, public })
}

/// Load the device identity if present, otherwise generate and persist a
/// new one. This is the normal entry point for every caller.
pub fn ensure_identity_keypair(identity_dir: &Path) -> Result<IdentityKeypair> {
    if identity_dir.join(PRIVATE_KEY_FILE).exists() {
        load(identity_dir)
    } else {
        generate(identity_dir)
    }
}

/// Delete and regenerate the device identity. Callers are responsible for
/// understanding this invalidates every ROC signed by the old key.
pub fn reset_identity_keypair(identity_dir: &Path) -> Result<IdentityKeypair> {
    let _ = fs::remove_file(identity_dir.join(PRIVATE_KEY_FILE));
    let _ = fs::remove_file(identity_dir.join(PUBLIC_KEY_FILE));
    generate(identity_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn generate_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let identity_dir = dir.path().join("identity");
        let generated = ensure_identity_keypair(&identity_dir).unwrap();
        let loaded = ensure_identity_keypair(&identity_dir).unwrap();
        assert_eq!(generated.public_bytes(), loaded.public_bytes());
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let dir = tempdir().unwrap();
        let keypair = ensure_identity_keypair(&dir.path().join("identity")).unwrap();
        let data = b"ritual payload bytes";
        let sig = keypair.sign(data);
        assert!(verify(data, &sig, &keypair.public_bytes()));
        assert!(!verify(b"tampered", &sig, &keypair.public_bytes()));
    }

    #[test]
    fn corrupt_identity_file_is_terminal() {
        let dir = tempdir().unwrap();
        let identity_dir = dir.path().join("identity");
        ensure_identity_keypair(&identity_dir).unwrap();
        fs::write(identity_dir.join(PRIVATE_KEY_FILE), [1u8; 10]).unwrap();
        assert!(matches!(
            ensure_identity_keypair(&identity_dir),
            Err(EngineError::ResourceError(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn directory_and_file_modes_are_restrictive() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let identity_dir = dir.path().join("identity");
        ensure_identity_keypair(&identity_dir).unwrap();
        let dir_mode = fs::metadata(&identity_dir).unwrap().permissions().mode() & 0o777;
        let sk_mode = fs::metadata(identity_dir.join(PRIVATE_KEY_FILE))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
        assert_eq!(sk_mode, 0o600);
    }
}

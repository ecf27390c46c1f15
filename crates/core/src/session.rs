//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Ephemeral ritual sessions: a time-bounded window during which
//! decrypted content and the master key exist, backed by a per-session
//! directory that is wiped on expiry or explicit end.
//!
//! A single mutex protects the session map. It is never held across file
//! I/O larger than the directory walk of the one session being ended.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{EngineError, Result};
use crate::profile::PrivacyProfile;

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// An active ritual session. `master_key` lives in process memory only
/// and is zeroized when the session ends.
pub struct Session {
    pub session_id: String,
    pub vault_id: String,
    pub profile_name: String,
    pub created_at: u64,
    pub expires_at: u64,
    pub last_activity: u64,
    pub session_dir: PathBuf,
    master_key: Option<[u8; 32]>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        now_unix() > self.expires_at
    }

    pub fn time_remaining_s(&self) -> u64 {
        self.expires_at.saturating_sub(now_unix())
    }

    pub fn master_key(&self) -> Option<&[u8; 32]> {
        self.master_key.as_ref()
    }
}

fn generate_session_id(vault_id: &str) -> String {
    let mut random = [0u8; 16];
    OsRng.fill_bytes(&mut random);
    let mut h = Sha256::new();
    h.update(vault_id.as_bytes());
    h.update(now_unix().to_be_bytes());
    h.update(random);
    hex::encode(h.finalize())
}

/// Reject anything that isn't lowercase hex of the expected length --
/// `session_id` values come from callers and are joined to the sessions
/// root as a pathname component.
fn validate_session_id(session_id: &str) -> Result<()> {
    let valid_len = session_id.len() == 64;
    let valid_chars = session_id.chars().all(|c| c.is_ascii_hexdigit());
    if valid_len && valid_chars {
        Ok(())
    } else {
        Err(EngineError::InvalidInput(format!("malformed session id: {session_id}")))
    }
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

fn secure_delete_directory(dir: &Path) -> Result<()> {
    for entry in walk_files(dir)? {
        let len = fs::metadata(&entry).map(|m| m.len()).unwrap_or(0);
        let mut junk = vec![0u8; len as usize];
        OsRng.fill_bytes(&mut junk);
        if let Ok(()) = fs::write(&entry, &junk) {
            let _ = fs::remove_file(&entry);
        }
    }
    fs::remove_dir_all(dir)?;
    Ok(())
}

fn walk_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    Ok(out)
}

/// Manages the live session map and the sessions-root directory on disk.
pub struct SessionManager {
    sessions_root: PathBuf,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionManager {
    /// Create the sessions root (mode 0700) and purge any stale
    /// subdirectories left over from a previous process.
    pub fn new(sessions_root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&sessions_root)?;
        set_mode(&sessions_root, 0o700)?;

        for entry in fs::read_dir(&sessions_root)? {
            let entry = entry?;
            if entry.path().is_dir() {
                let _ = fs::remove_dir_all(entry.path());
            }
        }

        Ok(Self {
            sessions_root,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Create a new session. `ttl_seconds` is clamped to
    /// `profile.session_ttl_max_s`; `None` uses `profile.session_ttl_default_s`.
    pub fn create_session(
        &self,
        vault_id: &str,
        profile: &PrivacyProfile,
        master_key: [u8; 32],
        ttl_seconds: Option<u64>,
    ) -> Result<String> {
        let ttl = ttl_seconds
            .unwrap_or(profile.session_ttl_default_s)
            .min(profile.session_ttl_max_s);

        let session_id = generate_session_id(vault_id);
        let session_dir = self.sessions_root.join(&session_id);
        fs::create_dir_all(&session_dir)?;
        set_mode(&session_dir, 0o700)?;

        let now = now_unix();
        let session = Session {
            session_id: session_id.clone(),
            vault_id: vault_id.to_string(),
            profile_name: profile.name.to_string(),
            created_at: now,
            expires_at: now + ttl,
            last_activity: now,
            session_dir,
            master_key: Some(master_key),
        };

        let mut sessions = self.sessions.lock().expect("session mutex poisoned");
        sessions.insert(session_id.clone(), session);
        tracing::info!(session_id = %&session_id[0..8], vault_id, ttl, "session created");
        Ok(session_id)
    }

    /// Path to a session's on-disk directory, without requiring the
    /// session to currently be live -- used by callers that already hold
    /// a validated session id.
    pub fn session_dir(&self, session_id: &str) -> Result<PathBuf> {
        validate_session_id(session_id)?;
        Ok(self.sessions_root.join(session_id))
    }

    /// Look up a live session, lazily expiring it first if its TTL has
    /// elapsed. Touches `last_activity` on a hit.
    pub fn get_session_info(&self, session_id: &str) -> Result<Option<(u64, u64, String)>> {
        validate_session_id(session_id)?;
        let expired = {
            let mut sessions = self.sessions.lock().expect("session mutex poisoned");
            match sessions.get_mut(session_id) {
                None => return Ok(None),
                Some(session) if session.is_expired() => true,
                Some(session) => {
                    session.last_activity = now_unix();
                    return Ok(Some((session.created_at, session.expires_at, session.profile_name.clone())));
                }
            }
        };
        if expired {
            self.end_session(session_id, true)?;
        }
        Ok(None)
    }

    /// Borrow the master key of a live, non-expired session via a
    /// caller-supplied closure, so the key never leaves this module's
    /// control. Returns `None` if the session is absent or expired
    /// (expiry triggers the normal end-of-session cleanup first).
    pub fn with_master_key<T>(&self, session_id: &str, f: impl FnOnce(&[u8; 32]) -> T) -> Result<Option<T>> {
        validate_session_id(session_id)?;
        let mut expired = false;
        let result = {
            let mut sessions = self.sessions.lock().expect("session mutex poisoned");
            match sessions.get_mut(session_id) {
                None => None,
                Some(session) if session.is_expired() => {
                    expired = true;
                    None
                }
                Some(session) => {
                    session.last_activity = now_unix();
                    session.master_key().map(&f)
                }
            }
        };
        if expired {
            self.end_session(session_id, true)?;
        }
        Ok(result)
    }

    /// End a session: zero the master key, delete the session directory
    /// (securely if requested), and drop it from the live map.
    pub fn end_session(&self, session_id: &str, secure_delete: bool) -> Result<()> {
        validate_session_id(session_id)?;
        let removed = {
            let mut sessions = self.sessions.lock().expect("session mutex poisoned");
            sessions.remove(session_id)
        };
        let Some(mut session) = removed else {
            return Ok(());
        };

        if let Some(mut key) = session.master_key.take() {
            key.zeroize();
        }

        if session.session_dir.exists() {
            let result = if secure_delete {
                secure_delete_directory(&session.session_dir)
            } else {
                fs::remove_dir_all(&session.session_dir).map_err(EngineError::from)
            };
            if let Err(e) = result {
                tracing::error!(session_id = %&session_id[0..8], error = %e, "failed to clean up session directory");
            }
        }

        tracing::info!(session_id = %&session_id[0..8], "session ended");
        Ok(())
    }

    /// Extend a live session's TTL, re-clamped against the profile max.
    pub fn extend_session(&self, session_id: &str, additional_seconds: u64, max_ttl_s: u64) -> Result<bool> {
        validate_session_id(session_id)?;
        let mut sessions = self.sessions.lock().expect("session mutex poisoned");
        match sessions.get_mut(session_id) {
            None => Ok(false),
            Some(session) if session.is_expired() => Ok(false),
            Some(session) => {
                let remaining = session.time_remaining_s();
                let new_remaining = (remaining + additional_seconds).min(max_ttl_s);
                session.expires_at = now_unix() + new_remaining;
                session.last_activity = now_unix();
                Ok(true)
            }
        }
    }

    /// Remove every expired session, cleaning up its directory. Returns
    /// the number of sessions removed.
    pub fn cleanup_expired_sessions(&self) -> Result<usize> {
        let expired_ids: Vec<String> = {
            let sessions = self.sessions.lock().expect("session mutex poisoned");
            sessions
                .values()
                .filter(|s| s.is_expired())
                .map(|s| s.session_id.clone())
                .collect()
        };
        for id in &expired_ids {
            self.end_session(id, true)?;
        }
        Ok(expired_ids.len())
    }

    /// IDs of every currently non-expired session, expiring stale ones
    /// first.
    pub fn list_active_sessions(&self) -> Result<Vec<String>> {
        self.cleanup_expired_sessions()?;
        let sessions = self.sessions.lock().expect("session mutex poisoned");
        Ok(sessions.keys().cloned().collect())
    }
}

//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Recovery codes: an optional, user-visible fallback unlock path for
//! vaults that are not configured as unconditionally unrecoverable.
//!
//! Codes are shown to the caller exactly once, at generation time; only
//! their SHA-256 hashes are ever persisted.

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const DEFAULT_CODE_COUNT: usize = 5;

/// Persisted recovery state for a vault. Never holds plaintext codes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecoveryConfig {
    pub enabled: bool,
    pub code_hashes: Vec<String>,
    pub use_count: u32,
    pub last_used_unix: Option<f64>,
}

fn normalize(code: &str) -> String {
    code.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

fn hash_normalized(normalized: &str) -> String {
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// Generate `count` CSPRNG-sourced codes of the form `XXXX-XXXX-XXXX-XXXX`
/// (16 hex chars from 8 random bytes).
pub fn generate_recovery_codes(count: usize) -> Vec<String> {
    (0..count)
        .map(|_| {
            let mut bytes = [0u8; 8];
            OsRng.fill_bytes(&mut bytes);
            let hex_str = hex::encode_upper(bytes);
            format!("{}-{}-{}-{}", &hex_str[0..4], &hex_str[4..8], &hex_str[8..12], &hex_str[12..16])
        })
        .collect()
}

/// SHA-256 hash each code after normalizing (strip hyphens/whitespace,
/// uppercase).
pub fn hash_recovery_codes(codes: &[String]) -> Vec<String> {
    codes.iter().map(|c| hash_normalized(&normalize(c))).collect()
}

/// `true` iff `code`, once normalized, hashes to one of `hashes`.
pub fn verify_recovery_code(code: &str, hashes: &[String]) -> bool {
    let candidate = hash_normalized(&normalize(code));
    hashes.iter().any(|h| h == &candidate)
}

/// Build a [`RecoveryConfig`] and, if `enabled`, a fresh set of plaintext
/// codes. The plaintext codes are the caller's only chance to see them --
/// only their hashes are retained in the returned config.
pub fn create_recovery_config(enabled: bool, count: usize) -> (RecoveryConfig, Vec<String>) {
    if !enabled {
        return (
            RecoveryConfig {
                enabled: false,
                code_hashes: Vec::new(),
                use_count: 0,
                last_used_unix: None,
            },
            Vec::new(),
        );
    }

    let count = if count == 0 { DEFAULT_CODE_COUNT } else { count };
    let codes = generate_recovery_codes(count);
    let hashes = hash_recovery_codes(&codes);

    (
        RecoveryConfig {
            enabled: true,
            code_hashes: hashes,
            use_count: 0,
            last_used_unix: None,
        },
        codes,
    )
}

/// Validate `code` against `config` and, on success, increment the use
/// counter and stamp `current_unix_time` as the last-used time.
pub fn validate_and_mark_used(config: &mut RecoveryConfig, code: &str, current_unix_time: f64) -> bool {
    if !config.enabled {
        return false;
    }
    if !verify_recovery_code(code, &config.code_hashes) {
        return false;
    }
    config.use_count += 1;
    config.last_used_unix = Some(current_unix_time);
    true
}

/// Disable recovery and discard all stored code hashes.
pub fn disable_recovery(config: &mut RecoveryConfig) {
    config.enabled = false;
    config.code_hashes.clear();
}

/// Render plaintext codes as a one-time display block.
pub fn format_codes_for_display(codes: &[String]) -> String {
    let mut lines = vec![
        "=".repeat(50),
        "RECOVERY CODES - KEEP SAFE".to_string(),
        "=".repeat(50),
        String::new(),
        "IMPORTANT:".to_string(),
        "- These codes can unlock the vault if the device identity is lost".to_string(),
        "- Store them securely (print, write down, password manager)".to_string(),
        "- Each code can be used once".to_string(),
        "- If these codes are lost, the vault may become unrecoverable".to_string(),
        String::new(),
        "CODES:".to_string(),
        String::new(),
    ];
    for (i, code) in codes.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, code));
    }
    lines.push(String::new());
    lines.push("=".repeat(50));
    lines.join("\n")
}

/// Human-readable recovery posture.
pub fn get_recovery_strength(config: &RecoveryConfig) -> String {
    if !config.enabled {
        return "Unrecoverable (no recovery codes)".to_string();
    }
    let code_count = config.code_hashes.len();
    if code_count == 0 {
        "Unrecoverable (recovery enabled but no codes)".to_string()
    } else if config.use_count as usize >= code_count {
        "Unrecoverable (all recovery codes used)".to_string()
    } else {
        format!("Recoverable ({} codes remaining)", code_count - config.use_count as usize)
    }
}

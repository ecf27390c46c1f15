//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Privacy guardrail: redacts sensitive fields out of structured log
//! records before they reach a sink, and gates which event names are
//! allowed to be logged at all.
//!
//! This is a defense-in-depth layer, not the only place secrets are kept
//! out of logs -- [`crate::secret::Secret`] already refuses to `Debug`-print
//! its contents. The guardrail exists for records assembled from plain
//! `serde_json::Value`s (e.g. a caller building a log record by hand)
//! where that type-level protection doesn't apply.

use serde_json::Value;

const SENSITIVE_KEYS: &[&str] = &[
    "passphrase",
    "key",
    "secret",
    "token",
    "nonce",
    "salt",
    "master_key",
    "audio_samples",
    "roc_payload",
    "track_name",
    "file_content",
];

const ALLOWED_EVENTS: &[&str] = &[
    "session_created",
    "session_ended",
    "session_expired",
    "session_extended",
    "roc_created",
    "roc_verified",
    "roc_verification_failed",
    "kdf_derived",
    "kdf_failed",
    "identity_generated",
    "identity_loaded",
    "stego_embedded",
    "stego_extracted",
    "migration_applied",
];

fn key_is_sensitive(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|s| lower.contains(s))
}

/// `true` if `s` looks like an email address, a long digit run (a phone
/// number or account id), or a path under a user's home directory.
fn looks_like_pii(s: &str) -> bool {
    if s.contains('@') {
        return true;
    }
    let mut run = 0;
    for c in s.chars() {
        if c.is_ascii_digit() {
            run += 1;
            if run >= 10 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    s.starts_with("/home/") || s.starts_with("/Users/") || s.contains("\\Users\\")
}

/// Redact a single value that is known to need it: strings and byte-like
/// arrays become fixed placeholders; everything else is walked
/// recursively so nested structure doesn't leak through a redacted key.
fn redact_value(value: &Value) -> Value {
    match value {
        Value::Array(items) if items.iter().all(|v| v.is_number()) => {
            Value::String(format!("[bytes: {} bytes]", items.len()))
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k.clone(), redact_value(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        _ => Value::String("[REDACTED]".to_string()),
    }
}

/// Walk a structured log record, replacing the value of any key that
/// matches a known-sensitive token with `"[REDACTED]"` (or
/// `"[bytes: N bytes]"` for byte arrays), recursing into nested objects
/// and arrays. Keys that are not sensitive are passed through unchanged,
/// including their nested sensitive descendants.
pub fn sanitize(record: &Value) -> Value {
    match record {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                let sanitized = if key_is_sensitive(k) {
                    redact_value(v)
                } else {
                    sanitize(v)
                };
                out.insert(k.clone(), sanitized);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        Value::String(s) if looks_like_pii(s) => Value::String("[REDACTED]".to_string()),
        other => other.clone(),
    }
}

/// Whether `event_name` is in the fixed allow-list of loggable events.
pub fn is_allowed_event(event_name: &str) -> bool {
    ALLOWED_EVENTS.contains(&event_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_known_sensitive_keys() {
        let record = json!({"passphrase": "hunter2", "note": "fine"});
        let sanitized = sanitize(&record);
        assert_eq!(sanitized["passphrase"], "[REDACTED]");
        assert_eq!(sanitized["note"], "fine");
    }

    #[test]
    fn redacts_nested_sensitive_keys() {
        let record = json!({"outer": {"master_key": [1, 2, 3, 4]}});
        let sanitized = sanitize(&record);
        assert_eq!(sanitized["outer"]["master_key"], "[bytes: 4 bytes]");
    }

    #[test]
    fn key_match_is_substring_and_case_insensitive() {
        let record = json!({"Device_Secret_Token": "abc"});
        let sanitized = sanitize(&record);
        assert_eq!(sanitized["Device_Secret_Token"], "[REDACTED]");
    }

    #[test]
    fn redacts_pii_looking_strings_in_non_sensitive_keys() {
        let record = json!({"contact": "user@example.com", "path": "/home/alice/vault"});
        let sanitized = sanitize(&record);
        assert_eq!(sanitized["contact"], "[REDACTED]");
        assert_eq!(sanitized["path"], "[REDACTED]");
    }

    #[test]
    fn leaves_ordinary_fields_untouched() {
        let record = json!({"profile_name": "Ritual Lock", "count": 3});
        let sanitized = sanitize(&record);
        assert_eq!(sanitized, record);
    }

    #[test]
    fn allowed_events_gate_correctly() {
        assert!(is_allowed_event("session_created"));
        assert!(!is_allowed_event("raw_master_key_dump"));
    }
}

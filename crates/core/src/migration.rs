//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Semantic-version compatibility and the single defined artifact
//! migration: v3.0 → v3.1.
//!
//! "Artifact" here is any stored JSON blob this engine round-trips --
//! most commonly a ROC, or a ROC embedded under a `"roc"` key in a
//! larger record. Only one rewrite is ever defined; anything else is
//! read as-is once `is_compatible` passes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{EngineError, Result};

pub const ENGINE_VERSION: &str = "3.1.0";
pub const KDF_VERSION: &str = "argon2id-v1";
pub const TSC_VERSION: &str = "tsc-v1";
pub const RITUAL_MODE_VERSION: &str = "ritual-v1";
pub const ROC_VERSION: &str = "roc-v1";
pub const STEGO_VERSION: &str = "steg-v1";

/// Version stamp carried alongside a migrated artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionInfo {
    pub echotome_version: String,
    pub kdf_version: String,
    pub tsc_version: String,
    pub ritual_mode_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roc_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stego_version: Option<String>,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            echotome_version: ENGINE_VERSION.to_string(),
            kdf_version: KDF_VERSION.to_string(),
            tsc_version: TSC_VERSION.to_string(),
            ritual_mode_version: RITUAL_MODE_VERSION.to_string(),
            roc_version: Some(ROC_VERSION.to_string()),
            stego_version: Some(STEGO_VERSION.to_string()),
        }
    }
}

/// Parse `"major.minor.patch"` into its three components.
pub fn parse_version(version_str: &str) -> Result<(u64, u64, u64)> {
    let parts: Vec<&str> = version_str.split('.').collect();
    if parts.len() != 3 {
        return Err(EngineError::InvalidInput(format!("malformed version string: {version_str}")));
    }
    let parse_part = |s: &str| {
        s.parse::<u64>()
            .map_err(|_| EngineError::InvalidInput(format!("malformed version string: {version_str}")))
    };
    Ok((parse_part(parts[0])?, parse_part(parts[1])?, parse_part(parts[2])?))
}

/// `true` iff the two versions share a major component. A different
/// major version is always incompatible, regardless of minor/patch.
pub fn is_compatible(artifact_version: &str, current_version: &str) -> Result<bool> {
    let (artifact_major, _, _) = parse_version(artifact_version)?;
    let (current_major, _, _) = parse_version(current_version)?;
    Ok(artifact_major == current_major)
}

/// `true` iff the artifact is compatible and strictly older in minor
/// version than the current release.
pub fn needs_migration(artifact_version: &str, current_version: &str) -> Result<bool> {
    if !is_compatible(artifact_version, current_version)? {
        return Ok(false);
    }
    let (_, artifact_minor, _) = parse_version(artifact_version)?;
    let (_, current_minor, _) = parse_version(current_version)?;
    Ok(artifact_minor < current_minor)
}

fn single_track_from_legacy_fields(roc: &Value) -> Value {
    json!({
        "audio_hash": roc.get("audio_hash").cloned().unwrap_or(Value::String(String::new())),
        "active_start": roc.get("active_start").cloned().unwrap_or(Value::from(0)),
        "active_end": roc.get("active_end").cloned().unwrap_or(Value::from(0)),
        "riv": roc.get("riv").cloned().unwrap_or(Value::String(String::new())),
    })
}

fn migrate_v30_to_v31(artifact: &Value) -> Value {
    let mut migrated = artifact.clone();
    let Value::Object(map) = &mut migrated else {
        return migrated;
    };

    if !map.contains_key("recovery") {
        map.insert(
            "recovery".to_string(),
            json!({
                "enabled": false,
                "codes_hashes": [],
                "use_count": 0,
                "last_used_timestamp": null,
            }),
        );
    }

    if !map.contains_key("unrecoverable") {
        let profile = map.get("profile").and_then(Value::as_str).unwrap_or("Quick Lock");
        map.insert("unrecoverable".to_string(), Value::Bool(profile == "Black Vault"));
    }

    if !map.contains_key("version_info") {
        let v = VersionInfo {
            echotome_version: ENGINE_VERSION.to_string(),
            kdf_version: KDF_VERSION.to_string(),
            tsc_version: TSC_VERSION.to_string(),
            ritual_mode_version: RITUAL_MODE_VERSION.to_string(),
            roc_version: None,
            stego_version: None,
        };
        map.insert("version_info".to_string(), serde_json::to_value(v).expect("VersionInfo always serializes"));
    }

    if let Some(roc) = map.get_mut("roc") {
        if let Value::Object(roc_map) = roc {
            if !roc_map.contains_key("tracks") {
                let single_track = single_track_from_legacy_fields(&Value::Object(roc_map.clone()));
                // legacy fields are intentionally left in place for v3.0 readers
                roc_map.insert("tracks".to_string(), Value::Array(vec![single_track]));
            }
        }
    }

    migrated
}

/// Migrate an artifact from `from_version` to `to_version`. The only
/// defined rewrite is v3.0 → v3.1; any other compatible pair is returned
/// unchanged apart from the version stamp.
pub fn migrate(artifact: &Value, from_version: &str, to_version: &str) -> Result<Value> {
    if !is_compatible(from_version, to_version)? {
        return Err(EngineError::MigrationIncompatible(format!(
            "cannot migrate from {from_version} to {to_version}: incompatible major versions"
        )));
    }
    if from_version == to_version {
        return Ok(artifact.clone());
    }

    let (from_major, from_minor, _) = parse_version(from_version)?;
    let (_, to_minor, _) = parse_version(to_version)?;

    let mut migrated = if from_major == 3 && from_minor == 0 && to_minor >= 1 {
        migrate_v30_to_v31(artifact)
    } else {
        artifact.clone()
    };

    if let Value::Object(map) = &mut migrated {
        let version_info = map
            .entry("version_info")
            .or_insert_with(|| json!({}));
        if let Value::Object(vi) = version_info {
            vi.insert("echotome_version".to_string(), Value::String(to_version.to_string()));
        }
    }

    Ok(migrated)
}

/// Human-readable description of what a migration would change.
pub fn get_migration_summary(from_version: &str, to_version: &str) -> Result<String> {
    if from_version == to_version {
        return Ok("No migration needed (same version)".to_string());
    }
    let (from_major, from_minor, _) = parse_version(from_version)?;
    let (to_major, to_minor, _) = parse_version(to_version)?;

    if from_major != to_major {
        return Ok(format!("ERROR: cannot migrate across major versions ({from_version} -> {to_version})"));
    }

    let mut changes = Vec::new();
    if from_major == 3 && from_minor == 0 && to_minor >= 1 {
        changes.push("- added recovery code support (disabled by default)");
        changes.push("- added unrecoverable flag");
        changes.push("- converted ritual metadata to multi-part format");
        changes.push("- added comprehensive version tracking");
    }

    if changes.is_empty() {
        return Ok(format!("Migration from {from_version} to {to_version}: no structural changes"));
    }
    Ok(format!("Migration from {from_version} to {to_version}:\n{}", changes.join("\n")))
}

/// Whether `artifact` can be loaded by this engine, and a human-readable
/// explanation. An artifact with no `version_info` is treated as v3.0.0.
pub fn validate_version_compatibility(artifact: &Value) -> Result<(bool, String)> {
    let artifact_version = artifact
        .get("version_info")
        .and_then(|vi| vi.get("echotome_version"))
        .and_then(Value::as_str)
        .unwrap_or("3.0.0")
        .to_string();

    if !is_compatible(&artifact_version, ENGINE_VERSION)? {
        return Ok((
            false,
            format!("artifact version {artifact_version} is incompatible with engine {ENGINE_VERSION}"),
        ));
    }

    if needs_migration(&artifact_version, ENGINE_VERSION)? {
        return Ok((
            true,
            format!("artifact can be loaded but requires migration from {artifact_version} to {ENGINE_VERSION}"),
        ));
    }

    Ok((true, format!("artifact version {artifact_version} is compatible")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_major_is_compatible() {
        assert!(is_compatible("3.0.0", "3.1.0").unwrap());
    }

    #[test]
    fn different_major_is_incompatible() {
        assert!(!is_compatible("2.5.0", "3.1.0").unwrap());
    }

    #[test]
    fn older_minor_needs_migration() {
        assert!(needs_migration("3.0.0", "3.1.0").unwrap());
        assert!(!needs_migration("3.1.0", "3.1.0").unwrap());
    }

    #[test]
    fn v30_to_v31_adds_recovery_and_unrecoverable_and_version_info() {
        let artifact = json!({"profile": "Black Vault"});
        let migrated = migrate(&artifact, "3.0.0", "3.1.0").unwrap();
        assert_eq!(migrated["recovery"]["enabled"], false);
        assert_eq!(migrated["unrecoverable"], true);
        assert_eq!(migrated["version_info"]["echotome_version"], "3.1.0");
    }

    #[test]
    fn unrecoverable_defaults_false_outside_black_vault() {
        let artifact = json!({"profile": "Quick Lock"});
        let migrated = migrate(&artifact, "3.0.0", "3.1.0").unwrap();
        assert_eq!(migrated["unrecoverable"], false);
    }

    #[test]
    fn nested_roc_single_track_is_wrapped_preserving_legacy_fields() {
        let artifact = json!({
            "profile": "Quick Lock",
            "roc": {"audio_hash": "abc123", "active_start": 1, "active_end": 99, "riv": "deadbeef"},
        });
        let migrated = migrate(&artifact, "3.0.0", "3.1.0").unwrap();
        let tracks = migrated["roc"]["tracks"].as_array().unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0]["audio_hash"], "abc123");
        assert_eq!(migrated["roc"]["audio_hash"], "abc123");
    }

    #[test]
    fn incompatible_major_version_migration_is_rejected() {
        let artifact = json!({});
        assert!(matches!(
            migrate(&artifact, "2.0.0", "3.1.0"),
            Err(EngineError::MigrationIncompatible(_))
        ));
    }

    #[test]
    fn missing_version_info_is_treated_as_v30() {
        let artifact = json!({"profile": "Quick Lock"});
        let (compatible, message) = validate_version_compatibility(&artifact).unwrap();
        assert!(compatible);
        assert!(message.contains("3.0.0"));
    }

    #[test]
    fn current_version_validates_without_migration_note() {
        let artifact = json!({"version_info": {"echotome_version": ENGINE_VERSION}});
        let (compatible, message) = validate_version_compatibility(&artifact).unwrap();
        assert!(compatible);
        assert!(!message.contains("requires migration"));
    }
}

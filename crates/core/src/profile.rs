//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Privacy profile registry.
//!
//! Three immutable, typed parameter bundles — "Quick Lock", "Ritual Lock",
//! and "Black Vault" — drive every other component: KDF cost, session TTL,
//! whether the audio channel is mandatory, and whether plaintext may ever
//! touch disk outside a session directory. Profiles are looked up by name,
//! case-insensitively, with a small alias table; the set is fixed at
//! compile time and cannot be mutated at runtime.

use std::fmt;

use crate::error::{EngineError, Result};

/// Threat model metadata carried alongside a [`PrivacyProfile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatModelId {
    Casual,
    Focused,
    Targeted,
}

/// Human-facing description of the adversary a profile is designed against.
#[derive(Debug, Clone)]
pub struct ThreatModel {
    pub id: ThreatModelId,
    pub description: &'static str,
    pub assumptions: &'static str,
    pub protects_against: &'static str,
    pub does_not_protect_against: &'static str,
}

/// An immutable, named parameter bundle controlling KDF cost, session
/// lifetime, and audio/deniability requirements.
///
/// Invariant: any profile with `deniable = true` MUST have
/// `requires_mic = true`, `requires_timing = true`, `audio_weight = 1.0`,
/// and `allow_plaintext_disk = false`. This is asserted in
/// [`Registry::new`] so a malformed profile table fails fast at startup.
#[derive(Debug, Clone)]
pub struct PrivacyProfile {
    pub name: &'static str,
    pub kdf_time: u32,
    pub kdf_memory_kib: u32,
    pub kdf_parallelism: u32,
    pub audio_weight: f32,
    pub deniable: bool,
    pub requires_mic: bool,
    pub requires_timing: bool,
    pub allows_visual_ritual: bool,
    pub session_ttl_default_s: u64,
    pub session_ttl_max_s: u64,
    pub allow_plaintext_disk: bool,
    pub unrecoverable_default: bool,
    pub threat_model: ThreatModel,
}

impl PrivacyProfile {
    fn check_invariant(&self) {
        if self.deniable {
            debug_assert!(self.requires_mic, "deniable profile must require mic");
            debug_assert!(self.requires_timing, "deniable profile must require timing");
            debug_assert!(
                (self.audio_weight - 1.0).abs() < f32::EPSILON,
                "deniable profile must have audio_weight == 1.0"
            );
            debug_assert!(
                !self.allow_plaintext_disk,
                "deniable profile must not allow plaintext disk"
            );
        }
    }
}

const QUICK_LOCK: PrivacyProfile = PrivacyProfile {
    name: "Quick Lock",
    kdf_time: 2,
    kdf_memory_kib: 19_456,
    kdf_parallelism: 1,
    audio_weight: 0.3,
    deniable: false,
    requires_mic: false,
    requires_timing: false,
    allows_visual_ritual: true,
    session_ttl_default_s: 3600,
    session_ttl_max_s: 7200,
    allow_plaintext_disk: true,
    unrecoverable_default: false,
    threat_model: ThreatModel {
        id: ThreatModelId::Casual,
        description: "Fast, low-friction locking for day-to-day use against casual snoopers.",
        assumptions: "Device is not seized; attacker has at most brief, opportunistic access.",
        protects_against: "Shoulder surfing, accidental disclosure, casual device borrowing.",
        does_not_protect_against: "Forensic disk imaging, coerced unlock, targeted attackers.",
    },
};

const RITUAL_LOCK: PrivacyProfile = PrivacyProfile {
    name: "Ritual Lock",
    kdf_time: 3,
    kdf_memory_kib: 65_536,
    kdf_parallelism: 2,
    audio_weight: 0.7,
    deniable: false,
    requires_mic: true,
    requires_timing: true,
    allows_visual_ritual: true,
    session_ttl_default_s: 1200,
    session_ttl_max_s: 3600,
    allow_plaintext_disk: false,
    unrecoverable_default: false,
    threat_model: ThreatModel {
        id: ThreatModelId::Focused,
        description: "Audio-bound ritual unlock for a focused, motivated adversary.",
        assumptions: "Attacker may hold the device but does not have the original audio source.",
        protects_against: "Passphrase-only brute force, device-only compromise without audio.",
        does_not_protect_against: "An adversary who has recorded the unlock ritual audio.",
    },
};

const BLACK_VAULT: PrivacyProfile = PrivacyProfile {
    name: "Black Vault",
    kdf_time: 4,
    kdf_memory_kib: 131_072,
    kdf_parallelism: 4,
    audio_weight: 1.0,
    deniable: true,
    requires_mic: true,
    requires_timing: true,
    allows_visual_ritual: false,
    session_ttl_default_s: 300,
    session_ttl_max_s: 300,
    allow_plaintext_disk: false,
    unrecoverable_default: true,
    threat_model: ThreatModel {
        id: ThreatModelId::Targeted,
        description: "Deniable, short-TTL vault for a targeted, well-resourced adversary.",
        assumptions: "Attacker may compel disclosure; plausible deniability is required.",
        protects_against: "Coerced unlock (decoy header), forensic recovery of expired sessions.",
        does_not_protect_against: "An attacker who controls the device during the ritual window.",
    },
};

/// A ritual-unlock input mode: playing back audio from a file, capturing
/// it live from a microphone, or a non-audio visual/text ritual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RitualMode {
    File,
    Mic,
    Visual,
}

impl RitualMode {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "file" => Ok(Self::File),
            "mic" => Ok(Self::Mic),
            "visual" => Ok(Self::Visual),
            other => Err(EngineError::InvalidInput(format!("unknown ritual mode: {other}"))),
        }
    }
}

impl PrivacyProfile {
    /// Whether `mode` is permitted under this profile. Mic is always
    /// allowed; file is refused when the profile mandates a live mic
    /// capture; visual is gated on `allows_visual_ritual`.
    pub fn allows_ritual_mode(&self, mode: RitualMode) -> bool {
        match mode {
            RitualMode::Mic => true,
            RitualMode::File => !self.requires_mic,
            RitualMode::Visual => self.allows_visual_ritual,
        }
    }
}

/// The fixed set of privacy profiles, looked up by case-insensitive name
/// or alias. Construction validates every profile's invariant.
pub struct Registry {
    profiles: [&'static PrivacyProfile; 3],
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        for p in [&QUICK_LOCK, &RITUAL_LOCK, &BLACK_VAULT] {
            p.check_invariant();
        }
        Self {
            profiles: [&QUICK_LOCK, &RITUAL_LOCK, &BLACK_VAULT],
        }
    }

    fn normalize(name: &str) -> String {
        name.trim().to_lowercase()
    }

    fn alias(name: &str) -> &str {
        match name {
            "quick" | "quicklock" | "quick_lock" | "quick-lock" | "quick lock" => "quick lock",
            "ritual" | "rituallock" | "ritual_lock" | "ritual-lock" | "ritual lock" => {
                "ritual lock"
            }
            "black" | "vault" | "blackvault" | "black_vault" | "black-vault" | "black vault" => {
                "black vault"
            }
            other => other,
        }
    }

    /// Look up a profile by name, case-insensitively, with aliases.
    pub fn get(&self, name: &str) -> Result<&'static PrivacyProfile> {
        let normalized = Self::normalize(name);
        let canonical = Self::alias(&normalized);
        self.profiles
            .iter()
            .find(|p| p.name.to_lowercase() == canonical)
            .copied()
            .ok_or_else(|| EngineError::NotFound(format!("unknown profile: {name}")))
    }

    /// List all registered profiles.
    pub fn list(&self) -> Vec<&'static PrivacyProfile> {
        self.profiles.to_vec()
    }

    /// Return the full parameter and threat-model record for a profile.
    pub fn describe(&self, name: &str) -> Result<&'static PrivacyProfile> {
        self.get(name)
    }

    /// Validate a ritual-mode selector (`"file"`, `"mic"`, or `"visual"`)
    /// against a named profile's capabilities.
    pub fn validate_ritual_mode(&self, profile_name: &str, ritual_mode: &str) -> Result<bool> {
        let profile = self.get(profile_name)?;
        let mode = RitualMode::parse(ritual_mode)?;
        Ok(profile.allows_ritual_mode(mode))
    }
}

impl fmt::Display for Registry {
    /// Human-readable listing of every profile's cost and threat-model
    /// parameters, for diagnostics.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.profiles.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}", p.name)?;
            writeln!(
                f,
                "  kdf: time={} memory_kib={} parallelism={}",
                p.kdf_time, p.kdf_memory_kib, p.kdf_parallelism
            )?;
            writeln!(
                f,
                "  audio_weight={} deniable={} requires_mic={} requires_timing={}",
                p.audio_weight, p.deniable, p.requires_mic, p.requires_timing
            )?;
            writeln!(
                f,
                "  session_ttl: default={}s max={}s",
                p.session_ttl_default_s, p.session_ttl_max_s
            )?;
            writeln!(f, "  threat model: {}", p.threat_model.description)?;
            write!(f, "  protects against: {}", p.threat_model.protects_against)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let reg = Registry::new();
        assert_eq!(reg.get("black vault").unwrap().name, "Black Vault");
        assert_eq!(reg.get("BLACK VAULT").unwrap().name, "Black Vault");
        assert_eq!(reg.get("Black").unwrap().name, "Black Vault");
    }

    #[test]
    fn unknown_profile_is_not_found() {
        let reg = Registry::new();
        assert!(matches!(reg.get("nonexistent"), Err(EngineError::NotFound(_))));
    }

    #[test]
    fn deniable_profile_invariant_holds() {
        assert!(BLACK_VAULT.deniable);
        assert!(BLACK_VAULT.requires_mic);
        assert!(BLACK_VAULT.requires_timing);
        assert_eq!(BLACK_VAULT.audio_weight, 1.0);
        assert!(!BLACK_VAULT.allow_plaintext_disk);
    }

    #[test]
    fn list_returns_three_profiles() {
        let reg = Registry::new();
        assert_eq!(reg.list().len(), 3);
    }

    #[test]
    fn display_lists_every_profile_by_name() {
        let reg = Registry::new();
        let rendered = reg.to_string();
        assert!(rendered.contains("Quick Lock"));
        assert!(rendered.contains("Ritual Lock"));
        assert!(rendered.contains("Black Vault"));
    }

    #[test]
    fn black_vault_rejects_file_mode_but_allows_mic() {
        let reg = Registry::new();
        assert!(!reg.validate_ritual_mode("Black Vault", "file").unwrap());
        assert!(reg.validate_ritual_mode("Black Vault", "mic").unwrap());
        assert!(!reg.validate_ritual_mode("Black Vault", "visual").unwrap());
    }

    #[test]
    fn quick_lock_allows_every_mode() {
        let reg = Registry::new();
        assert!(reg.validate_ritual_mode("Quick Lock", "file").unwrap());
        assert!(reg.validate_ritual_mode("Quick Lock", "mic").unwrap());
        assert!(reg.validate_ritual_mode("Quick Lock", "visual").unwrap());
    }

    #[test]
    fn unknown_ritual_mode_is_invalid_input() {
        let reg = Registry::new();
        assert!(matches!(
            reg.validate_ritual_mode("Quick Lock", "invalid_mode"),
            Err(EngineError::InvalidInput(_))
        ));
    }
}

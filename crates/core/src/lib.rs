//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Audio-bound ritual cryptography engine.
//!
//! Turns a short audio recording plus a passphrase into a symmetric key
//! (the "rune"), using the audio's deterministic acoustic fingerprint as
//! a second unlock factor alongside the passphrase. Built from nine
//! cooperating components:
//!
//! - [`features`] + [`active_region`]: deterministic audio fingerprinting.
//! - [`afkdf`]: AF-KDF, the audio-bound key derivation function.
//! - [`aead`]: the authenticated-encryption envelope around a derived key.
//! - [`identity`]: per-device Ed25519 signing identity.
//! - [`tsc`]: the Temporal Salt Chain, binding a key to real-time playback.
//! - [`roc`]: Ritual Ownership Certificates, signed ownership assertions.
//! - [`riv`]: the Ritual Imprint Vector, a compact matching fingerprint.
//! - [`stego`]: LSB steganographic embedding of a ROC cross-check.
//! - [`session`]: ephemeral, mutex-protected decryption sessions.
//!
//! [`profile`] ties cost and behavior parameters for all of the above to
//! one of three named privacy profiles; [`guardrail`], [`migration`], and
//! [`recovery`] are supporting concerns (logging hygiene, on-disk format
//! evolution, and optional recovery codes, respectively).

pub mod active_region;
pub mod aead;
pub mod afkdf;
pub mod canon;
pub mod error;
pub mod features;
pub mod guardrail;
pub mod identity;
pub mod migration;
pub mod profile;
pub mod recovery;
pub mod riv;
pub mod roc;
pub mod rune;
pub mod secret;
pub mod session;
pub mod stego;
pub mod tsc;

pub use error::{EngineError, Result};
pub use profile::{PrivacyProfile, Registry as ProfileRegistry, ThreatModel, ThreatModelId};
pub use rune::rune_id;
pub use secret::Secret;

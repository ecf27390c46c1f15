//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Unified error hierarchy for the ritual cryptography engine.
//!
//! Every fallible operation in this crate returns `Result<T, EngineError>`.
//! Internal failures that the spec requires to look identical from the
//! outside -- an AEAD tag mismatch, a ROC signature mismatch, a rune-id
//! mismatch -- are all collapsed into [`EngineError::AuthenticationFailed`]
//! rather than distinguished by variant; this is deliberate, not an
//! oversight, see the "single external error kind, no branch leak" rule.

use thiserror::Error;

/// The seven error kinds the engine promises to distinguish from one
/// another (but, within `AuthenticationFailed`, never further).
#[derive(Error, Debug)]
pub enum EngineError {
    /// Empty audio buffer, zero-length frame list, wrong-length public key,
    /// oversize stego payload, malformed recovery code input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// AEAD tag mismatch, ROC signature mismatch, rune-id mismatch at
    /// unlock. Never distinguishes which of these actually failed.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Unknown profile name, unknown session id, missing ROC for a
    /// requested rune_id or audio hash.
    #[error("not found: {0}")]
    NotFound(String),

    /// Streamer used after finalize, session extension past max TTL when
    /// strict, timing validation failure.
    #[error("state violation: {0}")]
    StateViolation(String),

    /// Filesystem or permission failure on identity/ROC/session paths.
    #[error("resource error: {0}")]
    ResourceError(String),

    /// Cross-major artifact: migration is not defined for this jump.
    #[error("migration incompatible: {0}")]
    MigrationIncompatible(String),

    /// Stego magic present but subsequent decode fails.
    #[error("corrupt payload: {0}")]
    Corrupt(String),
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::ResourceError(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Corrupt(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

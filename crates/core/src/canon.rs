//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Canonical JSON: lexicographically sorted keys at every nesting level,
//! compact separators, UTF-8, no trailing whitespace. Used for AEAD AAD
//! and for the bytes ROC signatures are computed over -- the design note
//! in spec.md §9 calls this out as "the single most common source of
//! signature-verification bugs in reimplementations".
//!
//! `serde_json::Map` is backed by a `BTreeMap` as long as the
//! `preserve_order` feature is not enabled (it isn't, in this
//! workspace), so round-tripping a value through `serde_json::Value`
//! sorts every object's keys for free.

use serde::Serialize;
use serde_json::Value;

use crate::error::{EngineError, Result};

/// Serialize `value` to canonical bytes: sorted keys, no pretty-printing.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let v = serde_json::to_value(value)
        .map_err(|e| EngineError::InvalidInput(format!("canonicalization failed: {e}")))?;
    serde_json::to_vec(&v).map_err(|e| EngineError::InvalidInput(format!("canonicalization failed: {e}")))
}

/// Same, but pretty-printed (two-space indent). Used only for the ROC
/// cross-check hash, which is deliberately distinct from the compact
/// signing bytes.
pub fn to_pretty_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let v = serde_json::to_value(value)
        .map_err(|e| EngineError::InvalidInput(format!("canonicalization failed: {e}")))?;
    serde_json::to_vec_pretty(&v)
        .map_err(|e| EngineError::InvalidInput(format!("canonicalization failed: {e}")))
}

/// `true` iff `v` is a JSON object/array whose keys are sorted at every
/// nesting level. Exposed for tests of the canonicality invariant.
pub fn is_sorted(v: &Value) -> bool {
    match v {
        Value::Object(map) => {
            let keys: Vec<&String> = map.keys().collect();
            let mut sorted = keys.clone();
            sorted.sort();
            keys == sorted && map.values().all(is_sorted)
        }
        Value::Array(items) => items.iter().all(is_sorted),
        _ => true,
    }
}

//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Rune ID: a short, human-presentable identifier derived from a key.

use sha2::{Digest, Sha256};

/// `"ECH-" || upper-hex(first 4 bytes of SHA-256(key))` -- 12 characters.
pub fn rune_id(key: &[u8]) -> String {
    let digest = Sha256::digest(key);
    format!("ECH-{}", hex::encode_upper(&digest[0..4]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rune_id_has_expected_shape() {
        let id = rune_id(&[0u8; 32]);
        assert!(id.starts_with("ECH-"));
        assert_eq!(id.len(), 12);
    }
}

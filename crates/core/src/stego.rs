//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! LSB steganography: embed and extract a small typed JSON record in the
//! two least-significant bits of every channel of an RGB/RGBA raster.
//!
//! Record layout: `MAGIC(11B) ‖ u32_be(len) ‖ UTF-8 JSON`. The embedder
//! never mutates its input; the extractor returns `Ok(None)` (not an
//! error) when the magic doesn't match -- that's the "no payload here"
//! case, distinct from "a payload started but is corrupt".

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

use crate::canon::to_canonical_bytes;
use crate::error::{EngineError, Result};

const MAGIC: &[u8; 11] = b"ECHOTOME_V3";
const BITS_PER_CHANNEL: u32 = 2;
const LEN_FIELD_BYTES: usize = 4;
const MAX_PAYLOAD_LEN: u32 = 1_000_000;
pub const STEGO_VERSION: &str = "steg-1";

/// The record embedded in a carrier image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StegoPayload {
    pub rune_id: String,
    pub enc_mk_b64: String,
    pub roc_hash_hex: String,
    pub riv_hex: String,
    pub version: String,
}

impl StegoPayload {
    pub fn new(rune_id: String, enc_mk_b64: String, roc_hash_hex: String, riv_hex: String) -> Self {
        Self {
            rune_id,
            enc_mk_b64,
            roc_hash_hex,
            riv_hex,
            version: STEGO_VERSION.to_string(),
        }
    }
}

fn channels_of(image: &DynamicImage) -> u32 {
    if image.color().has_alpha() { 4 } else { 3 }
}

/// Byte buffer in row-major, channel-interleaved order, matching the
/// image's declared channel count.
fn raw_bytes(image: &DynamicImage) -> (Vec<u8>, u32) {
    if image.color().has_alpha() {
        (image.to_rgba8().into_raw(), 4)
    } else {
        (image.to_rgb8().into_raw(), 3)
    }
}

fn capacity_bytes(width: u32, height: u32, channels: u32) -> usize {
    ((width as u64 * height as u64 * channels as u64 * BITS_PER_CHANNEL as u64) / 8) as usize
}

fn embed_bits(buffer: &mut [u8], message: &[u8]) {
    let mut bit_idx = 0usize;
    let total_bits = message.len() * 8;

    'outer: for byte in buffer.iter_mut() {
        if bit_idx >= total_bits {
            break 'outer;
        }
        let mask = (0xFFu8 << BITS_PER_CHANNEL) & 0xFF;
        let mut embed_bits: u8 = 0;
        for b in 0..BITS_PER_CHANNEL {
            if bit_idx >= total_bits {
                break;
            }
            let byte_idx = bit_idx / 8;
            let bit_in_byte = bit_idx % 8;
            let bit = (message[byte_idx] >> (7 - bit_in_byte)) & 1;
            embed_bits |= bit << (BITS_PER_CHANNEL - 1 - b);
            bit_idx += 1;
        }
        *byte = (*byte & mask) | embed_bits;
    }
}

fn extract_bits(buffer: &[u8], bit_offset: usize, num_bits: usize) -> Vec<u8> {
    let mut bits = Vec::with_capacity(num_bits);
    let mut seen_bits = 0usize;

    for &byte in buffer {
        if bits.len() >= num_bits {
            break;
        }
        if seen_bits + BITS_PER_CHANNEL as usize <= bit_offset {
            seen_bits += BITS_PER_CHANNEL as usize;
            continue;
        }
        for b in 0..BITS_PER_CHANNEL {
            if bits.len() >= num_bits {
                break;
            }
            let this_bit_pos = seen_bits + b as usize;
            if this_bit_pos < bit_offset {
                continue;
            }
            let bit = (byte >> (BITS_PER_CHANNEL - 1 - b)) & 1;
            bits.push(bit);
        }
        seen_bits += BITS_PER_CHANNEL as usize;
    }

    let mut out = vec![0u8; num_bits.div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        out[i / 8] |= bit << (7 - (i % 8));
    }
    out
}

/// Embed `payload` into `image`, producing a new image. Does not modify
/// the input.
pub fn embed(image: &DynamicImage, payload: &StegoPayload) -> Result<DynamicImage> {
    let payload_bytes = to_canonical_bytes(payload)?;
    let mut message = Vec::with_capacity(MAGIC.len() + LEN_FIELD_BYTES + payload_bytes.len());
    message.extend_from_slice(MAGIC);
    message.extend_from_slice(&(payload_bytes.len() as u32).to_be_bytes());
    message.extend_from_slice(&payload_bytes);

    let (width, height) = image.dimensions();
    let channels = channels_of(image);
    let cap = capacity_bytes(width, height, channels);
    if message.len() > cap {
        return Err(EngineError::InvalidInput(format!(
            "payload too large: {} bytes, capacity {} bytes",
            message.len(),
            cap
        )));
    }

    let (mut buffer, channels) = raw_bytes(image);
    embed_bits(&mut buffer, &message);

    let out = if channels == 4 {
        image::RgbaImage::from_raw(width, height, buffer)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| EngineError::InvalidInput("failed to rebuild RGBA raster".into()))?
    } else {
        image::RgbImage::from_raw(width, height, buffer)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| EngineError::InvalidInput("failed to rebuild RGB raster".into()))?
    };
    Ok(out)
}

/// Extract an embedded payload. `Ok(None)` means no payload is present
/// (magic mismatch) -- this is expected, not an error. A present-but-
/// malformed payload is `Err(EngineError::Corrupt)`.
pub fn extract(image: &DynamicImage) -> Result<Option<StegoPayload>> {
    let (buffer, _channels) = raw_bytes(image);

    let marker = extract_bits(&buffer, 0, MAGIC.len() * 8);
    if marker != MAGIC {
        return Ok(None);
    }

    let len_offset_bits = MAGIC.len() * 8;
    let len_bytes = extract_bits(&buffer, len_offset_bits, LEN_FIELD_BYTES * 8);
    let payload_len = u32::from_be_bytes(len_bytes.try_into().expect("4 bytes"));

    if payload_len > MAX_PAYLOAD_LEN {
        return Err(EngineError::Corrupt(format!(
            "invalid embedded payload length: {payload_len}"
        )));
    }

    let payload_offset_bits = len_offset_bits + LEN_FIELD_BYTES * 8;
    let payload_bytes = extract_bits(&buffer, payload_offset_bits, payload_len as usize * 8);

    let payload: StegoPayload = serde_json::from_slice(&payload_bytes)
        .map_err(|e| EngineError::Corrupt(format!("failed to decode stego payload: {e}")))?;
    Ok(Some(payload))
}

/// Verify an embedded payload's shape and, optionally, that it matches
/// caller-supplied expectations. Never panics.
pub fn verify_stego_integrity(
    image: &DynamicImage,
    expected_rune_id: Option<&str>,
    expected_roc_hash: Option<&str>,
) -> bool {
    let payload = match extract(image) {
        Ok(Some(p)) => p,
        _ => return false,
    };

    if payload.version != STEGO_VERSION {
        return false;
    }
    if let Some(expected) = expected_rune_id {
        if payload.rune_id != expected {
            return false;
        }
    }
    if let Some(expected) = expected_roc_hash {
        if payload.roc_hash_hex != expected {
            return false;
        }
    }
    true
}

/// Usable embedding capacity in bytes, after subtracting the `MAGIC` +
/// length-field overhead.
pub fn estimate_stego_capacity(image: &DynamicImage) -> usize {
    let (width, height) = image.dimensions();
    let channels = channels_of(image);
    let cap = capacity_bytes(width, height, channels);
    cap.saturating_sub(MAGIC.len() + LEN_FIELD_BYTES)
}

/// Summary information about an image's steganographic state.
#[derive(Debug, Clone, Serialize)]
pub struct StegoInfo {
    pub has_payload: bool,
    pub capacity_bytes: usize,
    pub payload_size_bytes: usize,
    pub payload: Option<StegoPayload>,
}

pub fn get_stego_info(image: &DynamicImage) -> Result<StegoInfo> {
    let capacity = estimate_stego_capacity(image);
    let payload = extract(image)?;
    let payload_size_bytes = match &payload {
        Some(p) => to_canonical_bytes(p)?.len(),
        None => 0,
    };
    Ok(StegoInfo {
        has_payload: payload.is_some(),
        capacity_bytes: capacity,
        payload_size_bytes,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn blank_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([128, 128, 128])))
    }

    fn payload() -> StegoPayload {
        StegoPayload::new(
            "ECH-AAAA1111".to_string(),
            "base64stuff==".to_string(),
            "c".repeat(64),
            "d".repeat(64),
        )
    }

    #[test]
    fn embed_then_extract_round_trips() {
        let image = blank_image(64, 64);
        let embedded = embed(&image, &payload()).unwrap();
        let extracted = extract(&embedded).unwrap().unwrap();
        assert_eq!(extracted, payload());
    }

    #[test]
    fn embed_does_not_mutate_input() {
        let image = blank_image(64, 64);
        let original_bytes = image.to_rgb8().into_raw();
        let _ = embed(&image, &payload()).unwrap();
        assert_eq!(image.to_rgb8().into_raw(), original_bytes);
    }

    #[test]
    fn extract_on_carrier_without_payload_is_none() {
        let image = blank_image(64, 64);
        assert!(extract(&image).unwrap().is_none());
    }

    #[test]
    fn embed_rejects_oversize_payload_for_tiny_carrier() {
        let image = blank_image(2, 2);
        assert!(matches!(embed(&image, &payload()), Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn verify_stego_integrity_checks_expectations() {
        let image = blank_image(64, 64);
        let embedded = embed(&image, &payload()).unwrap();
        assert!(verify_stego_integrity(&embedded, Some("ECH-AAAA1111"), Some(&"c".repeat(64))));
        assert!(!verify_stego_integrity(&embedded, Some("ECH-WRONG000"), None));
    }

    #[test]
    fn capacity_accounts_for_overhead() {
        let image = blank_image(64, 64);
        let raw_cap = capacity_bytes(64, 64, 3);
        assert_eq!(estimate_stego_capacity(&image), raw_cap - (MAGIC.len() + LEN_FIELD_BYTES));
    }

    #[test]
    fn stego_info_reports_payload_presence_and_size() {
        let image = blank_image(64, 64);
        let embedded = embed(&image, &payload()).unwrap();
        let info = get_stego_info(&embedded).unwrap();
        assert!(info.has_payload);
        assert!(info.payload_size_bytes > 0);
        assert_eq!(info.payload, Some(payload()));

        let bare_info = get_stego_info(&image).unwrap();
        assert!(!bare_info.has_payload);
        assert_eq!(bare_info.payload_size_bytes, 0);
    }

    #[test]
    fn rgba_carrier_round_trips() {
        let image = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(64, 64, image::Rgba([10, 20, 30, 255])));
        let embedded = embed(&image, &payload()).unwrap();
        let extracted = extract(&embedded).unwrap().unwrap();
        assert_eq!(extracted, payload());
    }
}

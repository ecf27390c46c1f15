//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Deterministic audio feature extraction.
//!
//! Produces a fixed-shape, 256-`f32` fingerprint of a mono audio buffer:
//! downmix + linear-interpolation resample, frame/window/FFT, then seven
//! component curves compressed to fixed lengths by regular-percentile
//! sampling. Every stage is pure and deterministic — no randomness, no
//! platform-dependent float behavior beyond standard IEEE-754 `f32` math.

use crate::error::{EngineError, Result};

pub const SAMPLE_RATE: u32 = 16_000;
pub const FRAME_SIZE: usize = 2048;
pub const HOP_SIZE: usize = 512;
pub const FEATURE_LEN: usize = 256;

const CURVE_LENGTHS: [usize; 7] = [32, 32, 64, 32, 32, 32, 16];
// centroid, flux, rms, onset, rolloff, zcr, spec_mean -- spec_std fills the remainder (16)

/// A single frame of windowed samples, ready for FFT.
pub type Frame = Vec<f32>;

/// Magnitude spectrogram: one magnitude vector per frame, `FRAME_SIZE/2 + 1` bins each.
pub type Spectrogram = Vec<Vec<f32>>;

/// Exactly 256 finite `f32` values in the fixed ordering described in §3:
/// centroid(32), flux(32), rms(64), onset(32), rolloff(32), zcr(32),
/// spec_mean(16), spec_std(16).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(pub [f32; FEATURE_LEN]);

impl FeatureVector {
    /// Canonical byte form: little-endian concatenation of the 256 floats.
    /// This is the byte string used verbatim as hash input throughout the
    /// rest of the engine (AF-KDF, RIV).
    pub fn to_bytes(&self) -> [u8; FEATURE_LEN * 4] {
        let mut out = [0u8; FEATURE_LEN * 4];
        for (i, v) in self.0.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
        out
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

/// Downmix a possibly-interleaved multi-channel buffer to mono by averaging
/// channels, then resample to `SAMPLE_RATE` by deterministic linear
/// interpolation.
pub fn load_audio_mono(samples: &[f32], channels: u16, source_rate: u32) -> Result<Vec<f32>> {
    if samples.is_empty() {
        return Err(EngineError::InvalidInput("empty audio buffer".into()));
    }
    let channels = channels.max(1) as usize;
    let mono: Vec<f32> = if channels == 1 {
        samples.to_vec()
    } else {
        samples
            .chunks(channels)
            .map(|c| c.iter().sum::<f32>() / c.len() as f32)
            .collect()
    };
    Ok(resample_linear(&mono, source_rate, SAMPLE_RATE))
}

fn resample_linear(input: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || input.is_empty() {
        return input.to_vec();
    }
    let ratio = src_rate as f64 / dst_rate as f64;
    let out_len = ((input.len() as f64) / ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos.floor() as usize;
        let frac = (src_pos - idx as f64) as f32;
        let a = input[idx.min(input.len() - 1)];
        let b = input[(idx + 1).min(input.len() - 1)];
        out.push(a + (b - a) * frac);
    }
    out
}

/// Split a mono buffer into overlapping, Hann-windowed frames of
/// `FRAME_SIZE` samples every `HOP_SIZE` samples. Short final frames are
/// zero-padded.
pub fn frame_audio(samples: &[f32]) -> Result<Vec<Frame>> {
    if samples.is_empty() {
        return Err(EngineError::InvalidInput("empty audio buffer".into()));
    }
    let window = hann_window(FRAME_SIZE);
    let mut frames = Vec::new();
    let mut start = 0usize;
    while start < samples.len() {
        let end = (start + FRAME_SIZE).min(samples.len());
        let mut frame = vec![0.0f32; FRAME_SIZE];
        frame[..end - start].copy_from_slice(&samples[start..end]);
        for (s, w) in frame.iter_mut().zip(window.iter()) {
            *s *= w;
        }
        frames.push(frame);
        if end == samples.len() {
            break;
        }
        start += HOP_SIZE;
    }
    Ok(frames)
}

fn hann_window(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| {
            0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (n as f32 - 1.0)).cos()
        })
        .collect()
}

/// Real-input FFT magnitude spectrum for a single windowed frame, computed
/// via a textbook recursive radix-2 Cooley-Tukey transform padded to the
/// next power of two. Deterministic for a fixed input length.
fn rfft_magnitude(frame: &[f32]) -> Vec<f32> {
    let n = frame.len().next_power_of_two();
    let mut re: Vec<f64> = frame.iter().map(|&x| x as f64).collect();
    re.resize(n, 0.0);
    let mut im = vec![0.0f64; n];
    fft_inplace(&mut re, &mut im);
    let bins = n / 2 + 1;
    (0..bins)
        .map(|i| (re[i] * re[i] + im[i] * im[i]).sqrt() as f32)
        .collect()
}

fn fft_inplace(re: &mut [f64], im: &mut [f64]) {
    let n = re.len();
    if n <= 1 {
        return;
    }
    // bit-reversal permutation
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            re.swap(i, j);
            im.swap(i, j);
        }
    }
    let mut len = 2;
    while len <= n {
        let ang = -2.0 * std::f64::consts::PI / len as f64;
        let wr = ang.cos();
        let wi = ang.sin();
        let mut i = 0;
        while i < n {
            let mut cur_r = 1.0;
            let mut cur_i = 0.0;
            for k in 0..len / 2 {
                let ur = re[i + k];
                let ui = im[i + k];
                let vr = re[i + k + len / 2] * cur_r - im[i + k + len / 2] * cur_i;
                let vi = re[i + k + len / 2] * cur_i + im[i + k + len / 2] * cur_r;
                re[i + k] = ur + vr;
                im[i + k] = ui + vi;
                re[i + k + len / 2] = ur - vr;
                im[i + k + len / 2] = ui - vi;
                let next_r = cur_r * wr - cur_i * wi;
                let next_i = cur_r * wi + cur_i * wr;
                cur_r = next_r;
                cur_i = next_i;
            }
            i += len;
        }
        len <<= 1;
    }
}

/// Compute the magnitude spectrogram for an already-framed buffer.
pub fn compute_spectral_map(frames: &[Frame]) -> Spectrogram {
    frames.iter().map(|f| rfft_magnitude(f)).collect()
}

pub(crate) fn bin_hz(bin: usize, n_fft: usize) -> f32 {
    bin as f32 * SAMPLE_RATE as f32 / n_fft as f32
}

/// Compress a curve to exactly `target_len` samples via regular-percentile
/// sampling: `target_len` equally spaced percentiles in `[0, 100]` are
/// evaluated as order statistics of the *sorted* curve, linearly
/// interpolating between the two nearest ranks (matching
/// `np.percentile(data, np.linspace(0, 100, n))`'s default interpolation).
/// This is the determinism anchor the spec pins to the original
/// implementation. If the input is empty the output is zero-padded.
fn compress_to_n(curve: &[f32], target_len: usize) -> Vec<f32> {
    if curve.is_empty() {
        return vec![0.0; target_len];
    }
    let mut sorted = curve.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let mut out = Vec::with_capacity(target_len);
    for i in 0..target_len {
        let pct = if target_len == 1 {
            0.0
        } else {
            i as f64 * 100.0 / (target_len as f64 - 1.0)
        };
        let pos = (pct / 100.0) * (sorted.len() as f64 - 1.0);
        let lo = pos.floor() as usize;
        let hi = (pos.ceil() as usize).min(sorted.len() - 1);
        let frac = pos - lo as f64;
        let value = sorted[lo] as f64 * (1.0 - frac) + sorted[hi] as f64 * frac;
        out.push(value as f32);
    }
    out
}

/// Extract the full 256-float feature vector from a pre-computed frame set
/// and spectrogram, avoiding recomputation when the caller (e.g. the
/// active-region detector) already needed both.
pub fn extract_audio_features(frames: &[Frame], spectrogram: &[Vec<f32>]) -> Result<FeatureVector> {
    if frames.is_empty() || spectrogram.is_empty() {
        return Err(EngineError::InvalidInput("empty frame/spectrogram input".into()));
    }
    let n_fft = (spectrogram[0].len() - 1) * 2;

    let mut centroid = Vec::with_capacity(frames.len());
    let mut rolloff = Vec::with_capacity(frames.len());
    let mut rms = Vec::with_capacity(frames.len());
    let mut zcr = Vec::with_capacity(frames.len());
    let mut flux = Vec::with_capacity(frames.len());
    let mut spec_mean = Vec::with_capacity(frames.len());
    let mut spec_std = Vec::with_capacity(frames.len());

    let mut prev_mag: Option<&Vec<f32>> = None;
    for (frame, mag) in frames.iter().zip(spectrogram.iter()) {
        let energy: f32 = mag.iter().sum();
        let weighted: f32 = mag
            .iter()
            .enumerate()
            .map(|(b, &m)| bin_hz(b, n_fft) * m)
            .sum();
        centroid.push(weighted / (energy + 1e-8));

        let total: f32 = mag.iter().map(|m| m * m).sum();
        let mut cum = 0.0f32;
        let mut roll_bin = 0usize;
        for (b, &m) in mag.iter().enumerate() {
            cum += m * m;
            if cum >= 0.85 * total + 1e-8 {
                roll_bin = b;
                break;
            }
        }
        rolloff.push(bin_hz(roll_bin, n_fft));

        let energy_rms = (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt();
        rms.push(energy_rms);

        let zc = frame
            .windows(2)
            .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
            .count() as f32
            / frame.len() as f32;
        zcr.push(zc);

        let f = match prev_mag {
            Some(prev) => prev
                .iter()
                .zip(mag.iter())
                .map(|(a, b)| (b - a) * (b - a))
                .sum::<f32>(),
            None => 0.0,
        };
        flux.push(f);
        prev_mag = Some(mag);

        let mean = mag.iter().sum::<f32>() / mag.len() as f32;
        let var = mag.iter().map(|m| (m - mean).powi(2)).sum::<f32>() / mag.len() as f32;
        let log_mean = (mean + 1.0).ln();
        spec_mean.push(log_mean);
        spec_std.push(var.sqrt());
    }

    let onset = flux.clone();

    let mut out = [0.0f32; FEATURE_LEN];
    let mut cursor = 0usize;
    for (curve, len) in [
        (&centroid, CURVE_LENGTHS[0]),
        (&flux, CURVE_LENGTHS[1]),
        (&rms, CURVE_LENGTHS[2]),
        (&onset, CURVE_LENGTHS[3]),
        (&rolloff, CURVE_LENGTHS[4]),
        (&zcr, CURVE_LENGTHS[5]),
        (&spec_mean, CURVE_LENGTHS[6]),
    ] {
        let compressed = compress_to_n(curve, len);
        out[cursor..cursor + len].copy_from_slice(&compressed);
        cursor += len;
    }
    let spec_std_compressed = compress_to_n(&spec_std, FEATURE_LEN - cursor);
    out[cursor..].copy_from_slice(&spec_std_compressed);

    for v in out.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
        }
    }

    Ok(FeatureVector(out))
}

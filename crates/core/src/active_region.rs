//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Active-region detection: selects the longest contiguous block of
//! "meaningful" audio (by RMS, spectral flux, and centroid shift) that
//! the rest of the engine binds to.

use crate::error::{EngineError, Result};
use crate::features::{bin_hz, Frame, Spectrogram, HOP_SIZE, SAMPLE_RATE};

/// Thresholds and hysteresis used to classify a frame as "active".
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub rms: f32,
    pub flux: f32,
    pub centroid_shift_hz: f32,
    pub hysteresis: f32,
    pub min_active_seconds: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            rms: 0.01,
            flux: 0.02,
            centroid_shift_hz: 500.0,
            hysteresis: 0.8,
            min_active_seconds: 1.0,
        }
    }
}

/// `[start, end)` frame indices of the selected active region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveRegion {
    pub start: usize,
    pub end: usize,
}

impl ActiveRegion {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

fn expected_interval_s() -> f32 {
    HOP_SIZE as f32 / SAMPLE_RATE as f32
}

/// Human-facing summary over an already-detected active region: duration,
/// frame count, and the fraction of the full track that was active.
#[derive(Debug, Clone, Copy)]
pub struct ActiveRegionInfo {
    pub frame_count: usize,
    pub duration_s: f32,
    pub activity_ratio: f32,
}

pub fn get_active_region_info(region: &ActiveRegion, total_frames: usize) -> ActiveRegionInfo {
    let frame_count = region.len();
    ActiveRegionInfo {
        frame_count,
        duration_s: frame_count as f32 * expected_interval_s(),
        activity_ratio: if total_frames == 0 {
            0.0
        } else {
            frame_count as f32 / total_frames as f32
        },
    }
}

/// Detect per-frame RMS, flux, and centroid-shift, then select the longest
/// contiguous run of frames exceeding threshold * hysteresis on any metric.
pub fn detect_active_region(
    frames: &[Frame],
    spectrogram: &Spectrogram,
    thresholds: Thresholds,
) -> Result<ActiveRegion> {
    if frames.is_empty() || spectrogram.is_empty() {
        return Err(EngineError::InvalidInput("empty frame/spectrogram input".into()));
    }
    let n_fft = (spectrogram[0].len() - 1) * 2;

    let mut rms = Vec::with_capacity(frames.len());
    let mut flux = Vec::with_capacity(frames.len());
    let mut centroid = Vec::with_capacity(frames.len());

    let mut prev_mag: Option<&Vec<f32>> = None;
    for (frame, mag) in frames.iter().zip(spectrogram.iter()) {
        let e = (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt();
        rms.push(e);

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

        let energy: f32 = mag.iter().sum();
        let weighted: f32 = mag
            .iter()
            .enumerate()
            .map(|(b, &m)| bin_hz(b, n_fft) * m)
            .sum();
        let c = weighted / (energy + 1e-8);
        centroid.push(c);
    }

    let hyst = thresholds.hysteresis;
    let mut active = vec![false; frames.len()];
    for i in 0..frames.len() {
        let centroid_shift = if i == 0 {
            0.0
        } else {
            (centroid[i] - centroid[i - 1]).abs()
        };
        active[i] = rms[i] > thresholds.rms * hyst
            || flux[i] > thresholds.flux * hyst
            || centroid_shift > thresholds.centroid_shift_hz * hyst;
    }

    let min_frames =
        ((thresholds.min_active_seconds / expected_interval_s()).ceil() as usize).max(1);

    let mut best: Option<ActiveRegion> = None;
    let mut run_start: Option<usize> = None;
    for i in 0..=active.len() {
        let is_active = i < active.len() && active[i];
        if is_active && run_start.is_none() {
            run_start = Some(i);
        } else if !is_active {
            if let Some(s) = run_start.take() {
                let region = ActiveRegion { start: s, end: i };
                if region.len() >= min_frames
                    && region.len() > best.map(|b| b.len()).unwrap_or(0)
                {
                    best = Some(region);
                }
            }
        }
    }

    best.ok_or_else(|| EngineError::InvalidInput("no active region found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{compute_spectral_map, frame_audio};

    #[test]
    fn silence_yields_no_active_region() {
        let samples = vec![0.0f32; SAMPLE_RATE as usize];
        let frames = frame_audio(&samples).unwrap();
        let spec = compute_spectral_map(&frames);
        assert!(detect_active_region(&frames, &spec, Thresholds::default()).is_err());
    }

    #[test]
    fn loud_tone_yields_active_region() {
        let samples: Vec<f32> = (0..SAMPLE_RATE as usize * 2)
            .map(|i| (i as f32 * 0.3).sin())
            .collect();
        let frames = frame_audio(&samples).unwrap();
        let spec = compute_spectral_map(&frames);
        let region = detect_active_region(&frames, &spec, Thresholds::default()).unwrap();
        assert!(!region.is_empty());
    }
}

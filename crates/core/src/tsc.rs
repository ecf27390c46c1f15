//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Temporal Salt Chain (TSC): a per-frame hash chain with per-frame
//! jitter that binds a derived hash to real-time, in-order playback of
//! the bound active region. `Streamer` is the incremental API used for
//! live (microphone) verification; [`compute_temporal_hash`] is the
//! one-shot API used when reconstructing from a stored file.

use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};
use crate::features::{Frame, HOP_SIZE, SAMPLE_RATE};

const TSC_PREFIX: &[u8] = b"ECHOTOME-TSC-V3";
const JITTER_BYTES: usize = 8;

/// Timing-gate tolerances, recomputed from the active-region framing
/// parameters rather than hard-coded -- see spec.md §9 Open Question
/// "timing-gate thresholds".
#[derive(Debug, Clone, Copy)]
pub struct Constants {
    pub expected_interval_s: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    pub max_stall_multiple: f32,
    pub too_fast_fraction: f32,
    pub too_slow_fraction: f32,
}

impl Default for Constants {
    fn default() -> Self {
        Self {
            expected_interval_s: HOP_SIZE as f32 / SAMPLE_RATE as f32,
            min_speed: 0.8,
            max_speed: 1.2,
            max_stall_multiple: 3.0,
            too_fast_fraction: 0.1,
            too_slow_fraction: 0.2,
        }
    }
}

fn initial_state(device_pub: &[u8; 32], track_length: u64) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(TSC_PREFIX);
    h.update(device_pub);
    h.update(track_length.to_be_bytes());
    h.finalize().into()
}

fn jitter(state: &[u8; 32], index: u64) -> [u8; JITTER_BYTES] {
    let mut h = Sha256::new();
    h.update(state);
    h.update(index.to_be_bytes());
    let digest = h.finalize();
    let mut out = [0u8; JITTER_BYTES];
    out.copy_from_slice(&digest[0..JITTER_BYTES]);
    out
}

fn chain_frame(state: &[u8; 32], frame: &[f32], index: u64) -> [u8; 32] {
    let mut frame_bytes = Vec::with_capacity(frame.len() * 4);
    for s in frame {
        frame_bytes.extend_from_slice(&s.to_le_bytes());
    }
    let fh = Sha256::digest(&frame_bytes);
    let j = jitter(state, index);

    let mut h = Sha256::new();
    h.update(state);
    h.update(fh);
    h.update(j);
    h.update(index.to_be_bytes());
    h.finalize().into()
}

fn validate_timing(intervals: &[f32], constants: &Constants) -> Result<()> {
    if intervals.is_empty() {
        return Ok(());
    }
    let min_interval = constants.expected_interval_s * constants.min_speed;
    let max_interval = constants.expected_interval_s * constants.max_speed;

    let too_fast = intervals.iter().filter(|&&i| i < min_interval).count() as f32
        / intervals.len() as f32;
    if too_fast > constants.too_fast_fraction {
        return Err(EngineError::StateViolation(format!(
            "timing invalid: {:.1}% of frames arrived too quickly",
            too_fast * 100.0
        )));
    }

    let stall_threshold = max_interval * constants.max_stall_multiple;
    let too_slow = intervals.iter().filter(|&&i| i > stall_threshold).count() as f32
        / intervals.len() as f32;
    if too_slow > constants.too_slow_fraction {
        return Err(EngineError::StateViolation(format!(
            "timing invalid: {:.1}% of frames arrived too slowly",
            too_slow * 100.0
        )));
    }

    Ok(())
}

/// Compute the temporal hash in one shot from a complete, already-loaded
/// frame sequence (offline reconstruction from a stored file). Never
/// validates timing -- use [`Streamer`] for live playback.
pub fn compute_temporal_hash(
    frames: &[Frame],
    device_pub: &[u8; 32],
    track_length: u64,
) -> Result<[u8; 32]> {
    if frames.is_empty() {
        return Err(EngineError::InvalidInput("empty frames for temporal hash".into()));
    }
    let mut state = initial_state(device_pub, track_length);
    for (i, frame) in frames.iter().enumerate() {
        state = chain_frame(&state, frame, i as u64);
    }
    Ok(state)
}

/// State machine: `Init -> Chaining(i) -> Finalized`. `add_frame` after
/// `finalize` is a [`EngineError::StateViolation`].
pub struct Streamer {
    state: [u8; 32],
    frame_idx: u64,
    constants: Constants,
    intervals: Vec<f32>,
    last_timestamp: Option<f32>,
    finalized: bool,
}

impl Streamer {
    pub fn new(device_pub: &[u8; 32], track_length: u64) -> Self {
        Self::with_constants(device_pub, track_length, Constants::default())
    }

    pub fn with_constants(device_pub: &[u8; 32], track_length: u64, constants: Constants) -> Self {
        Self {
            state: initial_state(device_pub, track_length),
            frame_idx: 0,
            constants,
            intervals: Vec::new(),
            last_timestamp: None,
            finalized: false,
        }
    }

    /// Add a frame. `timestamp_s` is the arrival time (seconds since an
    /// arbitrary epoch the caller holds fixed across the stream).
    pub fn add_frame(&mut self, frame: &[f32], timestamp_s: Option<f32>) -> Result<()> {
        if self.finalized {
            return Err(EngineError::StateViolation("streamer already finalized".into()));
        }
        if let Some(ts) = timestamp_s {
            if let Some(prev) = self.last_timestamp {
                self.intervals.push(ts - prev);
            }
            self.last_timestamp = Some(ts);
        }
        self.state = chain_frame(&self.state, frame, self.frame_idx);
        self.frame_idx += 1;
        Ok(())
    }

    /// Finalize the chain. If `validate_timing` is set and at least two
    /// frames were supplied with timestamps, enforce the timing gate.
    /// A finalized streamer's hash is immutable and repeat calls return
    /// the same value.
    pub fn finalize(&mut self, validate_timing_flag: bool) -> Result<[u8; 32]> {
        if self.finalized {
            return Ok(self.state);
        }
        if validate_timing_flag && self.intervals.len() >= 1 && self.frame_idx >= 2 {
            validate_timing(&self.intervals, &self.constants)?;
        }
        self.finalized = true;
        Ok(self.state)
    }

    /// `(frames processed, elapsed seconds since the first timestamped frame)`.
    pub fn progress(&self) -> (u64, Option<f32>) {
        let elapsed = self.last_timestamp.zip(self.intervals.first()).map(|_| {
            self.intervals.iter().sum::<f32>()
        });
        (self.frame_idx, elapsed)
    }
}

/// Recompute the temporal hash from stored frames and compare against an
/// expected value from enrollment. Never panics; any internal failure
/// simply fails the comparison.
pub fn verify_temporal_consistency(
    expected_hash: &[u8; 32],
    device_pub: &[u8; 32],
    track_length: u64,
    frames: &[Frame],
) -> bool {
    match compute_temporal_hash(frames, device_pub, track_length) {
        Ok(computed) => &computed == expected_hash,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| vec![i as f32 * 0.01, (i as f32 * 0.02).sin()])
            .collect()
    }

    #[test]
    fn order_sensitivity() {
        let device_pub = [1u8; 32];
        let f = frames(8);
        let mut reversed = f.clone();
        reversed.reverse();

        let h1 = compute_temporal_hash(&f, &device_pub, 1000).unwrap();
        let h2 = compute_temporal_hash(&reversed, &device_pub, 1000).unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn streaming_matches_offline_without_timing_validation() {
        let device_pub = [2u8; 32];
        let f = frames(5);

        let offline = compute_temporal_hash(&f, &device_pub, 500).unwrap();

        let mut streamer = Streamer::new(&device_pub, 500);
        for frame in &f {
            streamer.add_frame(frame, None).unwrap();
        }
        let streamed = streamer.finalize(false).unwrap();

        assert_eq!(offline, streamed);
    }

    #[test]
    fn accelerated_playback_rejects_under_timing_gate() {
        let device_pub = [3u8; 32];
        let f = frames(20);
        let constants = Constants::default();
        let real_interval = constants.expected_interval_s;

        let mut streamer = Streamer::with_constants(&device_pub, 640, constants);
        let mut t = 0.0f32;
        for frame in &f {
            streamer.add_frame(frame, Some(t)).unwrap();
            t += real_interval / 2.0; // 2x real-time
        }
        assert!(streamer.finalize(true).is_err());
    }

    #[test]
    fn realtime_playback_accepts_under_timing_gate() {
        let device_pub = [4u8; 32];
        let f = frames(20);
        let constants = Constants::default();
        let real_interval = constants.expected_interval_s;

        let mut streamer = Streamer::with_constants(&device_pub, 640, constants);
        let mut t = 0.0f32;
        for frame in &f {
            streamer.add_frame(frame, Some(t)).unwrap();
            t += real_interval;
        }
        assert!(streamer.finalize(true).is_ok());
    }

    #[test]
    fn add_frame_after_finalize_is_state_violation() {
        let device_pub = [5u8; 32];
        let mut streamer = Streamer::new(&device_pub, 10);
        streamer.add_frame(&[0.0, 1.0], None).unwrap();
        streamer.finalize(false).unwrap();
        assert!(matches!(
            streamer.add_frame(&[0.0], None),
            Err(EngineError::StateViolation(_))
        ));
    }

    #[test]
    fn empty_frames_is_invalid_input() {
        assert!(matches!(
            compute_temporal_hash(&[], &[0u8; 32], 0),
            Err(EngineError::InvalidInput(_))
        ));
    }
}

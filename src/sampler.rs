//! Frame sampling policy.
//!
//! A [`FrameSampler`] is a small monotonic state machine that sees every
//! native frame index of one video in increasing order and answers whether
//! that frame should be written. Cadence targets are computed from the
//! multiple `k * step` rather than by repeatedly adding a rounded step, so
//! a non-integer step such as `29.97 / 1.0` does not drift over long videos.
//!
//! # Example
//!
//! ```
//! use frameshard::{FrameSampler, SampleRatePolicy};
//!
//! let policy = SampleRatePolicy::from_frames_per_second(10.0)?;
//! let mut sampler = FrameSampler::new(policy, 30.0)?;
//!
//! let emitted: Vec<u64> = (0..9).filter(|&index| sampler.should_emit(index)).collect();
//! assert_eq!(emitted, vec![0, 3, 6]);
//! # Ok::<(), frameshard::FrameShardError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::Serialize;

use crate::error::FrameShardError;

// Absorbs floating-point noise in `k * step` so that an exact multiple such
// as 100 * 29.97 lands on 2997 rather than 2998.
const CADENCE_EPSILON: f64 = 1e-6;

/// Which native frames of a video are written.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SampleRatePolicy {
    /// Write every decoded frame. Selected by a rate of `0`.
    #[default]
    EveryFrame,
    /// Write frames at a fixed wall-clock cadence.
    Cadence {
        /// Requested output frames per second (`> 0`).
        frames_per_second: f64,
    },
}

impl SampleRatePolicy {
    /// Interpret a user-supplied rate: `0` means every frame, a positive
    /// finite value is a cadence.
    ///
    /// # Errors
    ///
    /// Returns [`FrameShardError::Configuration`] for negative, NaN, or
    /// infinite rates.
    pub fn from_frames_per_second(frames_per_second: f64) -> Result<Self, FrameShardError> {
        let policy = if frames_per_second == 0.0 {
            SampleRatePolicy::EveryFrame
        } else {
            SampleRatePolicy::Cadence { frames_per_second }
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Check that a cadence rate is positive and finite.
    ///
    /// # Errors
    ///
    /// Returns [`FrameShardError::Configuration`] if it is not.
    pub fn validate(&self) -> Result<(), FrameShardError> {
        match *self {
            SampleRatePolicy::EveryFrame => Ok(()),
            SampleRatePolicy::Cadence { frames_per_second }
                if frames_per_second.is_finite() && frames_per_second > 0.0 =>
            {
                Ok(())
            }
            SampleRatePolicy::Cadence { frames_per_second } => {
                Err(FrameShardError::configuration(format!(
                    "sample rate must be a positive number of frames per second, got {frames_per_second}"
                )))
            }
        }
    }
}

impl Display for SampleRatePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SampleRatePolicy::EveryFrame => write!(f, "every frame"),
            SampleRatePolicy::Cadence { frames_per_second } => {
                write!(f, "{frames_per_second} fps")
            }
        }
    }
}

/// Per-video sampling state.
///
/// Create one per video with that video's native frame rate, then call
/// [`should_emit`](FrameSampler::should_emit) for each decoded frame in
/// order.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    /// Native frames between samples; `None` for every-frame sampling.
    step: Option<f64>,
    /// Index `k` of the next multiple `k * step` that is due.
    next_multiple: u64,
    last_emitted: Option<u64>,
}

impl FrameSampler {
    /// Build a sampler for a video with the given native frame rate.
    ///
    /// A cadence faster than the native rate degrades to every frame, since
    /// the same native frame is never emitted twice.
    ///
    /// # Errors
    ///
    /// Returns [`FrameShardError::Configuration`] if the policy is invalid,
    /// or if the policy is a cadence and `native_frame_rate` is not a
    /// positive finite number.
    pub fn new(policy: SampleRatePolicy, native_frame_rate: f64) -> Result<Self, FrameShardError> {
        policy.validate()?;

        let step = match policy {
            SampleRatePolicy::EveryFrame => None,
            SampleRatePolicy::Cadence { frames_per_second } => {
                if !native_frame_rate.is_finite() || native_frame_rate <= 0.0 {
                    return Err(FrameShardError::configuration(format!(
                        "cadence sampling needs a positive native frame rate, got {native_frame_rate}"
                    )));
                }
                Some((native_frame_rate / frames_per_second).max(1.0))
            }
        };

        Ok(Self {
            step,
            next_multiple: 0,
            last_emitted: None,
        })
    }

    /// Native frames between consecutive samples (`1.0` for every frame).
    pub fn step(&self) -> f64 {
        self.step.unwrap_or(1.0)
    }

    /// Decide whether the frame at `native_index` is written.
    ///
    /// Indices must be non-decreasing; a repeated or earlier index is never
    /// emitted.
    pub fn should_emit(&mut self, native_index: u64) -> bool {
        if self.last_emitted.is_some_and(|last| native_index <= last) {
            return false;
        }

        let emit = match self.step {
            None => true,
            Some(step) => {
                if native_index < due_index(self.next_multiple, step) {
                    false
                } else {
                    // Skip every multiple this frame already satisfies so a
                    // gap in the index sequence yields one sample, not several.
                    while due_index(self.next_multiple, step) <= native_index {
                        self.next_multiple += 1;
                    }
                    true
                }
            }
        };

        if emit {
            self.last_emitted = Some(native_index);
        }
        emit
    }
}

/// First native index at or past `multiple * step`.
fn due_index(multiple: u64, step: f64) -> u64 {
    (multiple as f64 * step - CADENCE_EPSILON).ceil().max(0.0) as u64
}

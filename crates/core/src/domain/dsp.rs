//! Digital signal processing stages of the multiband path
//!
//! This module provides the building blocks the mix engine is assembled from:
//! - `filter`: 2nd-order Linkwitz-Riley low-pass/high-pass/all-pass stage
//! - `crossover`: phase-compensated 3-way band splitter
//! - `compressor`: feed-forward hard-knee band compressor
//! - `gain`: click-free ramped gain
//!
//! All stages are designed for:
//! - Zero allocations in the hot path (state is sized in `prepare`)
//! - Coefficients computed on parameter change, never per sample
//! - Per-channel state that persists across blocks

use crate::domain::audio::{AudioBuffer, ProcessSpec};

pub mod compressor;
pub mod crossover;
pub mod filter;
pub mod gain;

/// Core trait for the stages of the signal path
///
/// All stages process a planar `AudioBuffer` in place.
pub trait DspStage: Send {
    /// Size per-channel state for a stream and clear it
    ///
    /// This is the only call allowed to allocate.
    fn prepare(&mut self, spec: &ProcessSpec);

    /// Process the active region of `buffer` in place
    ///
    /// # Requirements
    /// - No allocations, locks or blocking
    /// - Channels beyond the prepared count are left untouched
    fn process_in_place(&mut self, buffer: &mut AudioBuffer);

    /// Reset state to initial conditions without reallocating
    fn reset(&mut self);

    /// Stage name for debugging/display
    fn name(&self) -> &str;
}

/// Parameter limits of the processing path
///
/// Live parameters are clamped to these ranges rather than rejected.
pub mod limits {
    /// Band threshold range (dB)
    pub const THRESHOLD_MIN_DB: f32 = -60.0;
    pub const THRESHOLD_MAX_DB: f32 = 12.0;

    /// Attack/release range exposed to controls (ms)
    pub const TIME_MIN_MS: f32 = 5.0;
    pub const TIME_MAX_MS: f32 = 500.0;

    /// Smallest ratio; 1:1 means no compression
    pub const RATIO_MIN: f32 = 1.0;

    /// Input/output gain range (dB)
    pub const GAIN_MIN_DB: f32 = -24.0;
    pub const GAIN_MAX_DB: f32 = 24.0;

    /// Crossover ranges (Hz)
    pub const LOW_MID_MIN_HZ: f32 = 20.0;
    pub const LOW_MID_MAX_HZ: f32 = 999.0;
    pub const MID_HIGH_MIN_HZ: f32 = 1000.0;
    pub const MID_HIGH_MAX_HZ: f32 = 20000.0;

    /// Floor of the level detector, keeps log10 away from zero
    pub const LEVEL_FLOOR: f32 = 1e-6;
    pub const LEVEL_FLOOR_DB: f32 = -120.0;

    /// Lowest cutoff handed to coefficient design (Hz)
    pub const MIN_CUTOFF_HZ: f32 = 1.0;
    /// Highest cutoff as a fraction of the sample rate
    pub const MAX_CUTOFF_RATIO: f32 = 0.499;

    /// Default gain ramp duration (ms)
    pub const GAIN_RAMP_MS: f32 = 50.0;
}

/// Convert decibels to linear gain
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels, floored at `LEVEL_FLOOR_DB`
#[inline]
pub fn gain_to_db(gain: f32) -> f32 {
    if gain < limits::LEVEL_FLOOR {
        limits::LEVEL_FLOOR_DB
    } else {
        20.0 * gain.log10()
    }
}

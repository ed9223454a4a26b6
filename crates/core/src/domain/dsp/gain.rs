//! Click-free gain stage
//!
//! A new target gain is reached by a linear ramp over a fixed duration
//! (50 ms by default). The ramp continues across blocks, ends exactly on the
//! target and never passes it.

use super::{db_to_gain, limits, DspStage};
use crate::domain::audio::{AudioBuffer, ProcessSpec};

/// Linearly ramped gain
#[derive(Debug, Clone, PartialEq)]
pub struct GainStage {
    // Linear gains
    current: f32,
    target: f32,
    target_db: f32,
    // Ramp state
    step: f32,
    remaining: usize,
    ramp_ms: f32,
    ramp_samples: usize,
    sample_rate: f32,
}

impl GainStage {
    pub fn new() -> Self {
        Self::with_ramp(limits::GAIN_RAMP_MS)
    }

    /// Unity gain stage with a custom ramp duration
    pub fn with_ramp(ramp_ms: f32) -> Self {
        let sample_rate = 48000.0;
        let ramp_ms = ramp_ms.max(0.0);
        Self {
            current: 1.0,
            target: 1.0,
            target_db: 0.0,
            step: 0.0,
            remaining: 0,
            ramp_ms,
            ramp_samples: ramp_length(ramp_ms, sample_rate),
            sample_rate,
        }
    }

    /// Start ramping towards a new gain in dB
    ///
    /// The value is clamped to the gain range. Setting the target already
    /// being ramped to (or held) is a no-op, so this can be called every
    /// block with the snapshot value.
    pub fn set_target_gain_db(&mut self, db: f32) {
        if db.is_nan() {
            return;
        }
        let db = db.clamp(limits::GAIN_MIN_DB, limits::GAIN_MAX_DB);
        if db == self.target_db {
            return;
        }

        self.target_db = db;
        self.target = db_to_gain(db);
        if self.ramp_samples == 0 {
            self.snap_to_target();
        } else {
            self.step = (self.target - self.current) / self.ramp_samples as f32;
            self.remaining = self.ramp_samples;
        }
    }

    /// Jump to a gain without ramping
    pub fn set_gain_db_immediate(&mut self, db: f32) {
        self.set_target_gain_db(db);
        self.snap_to_target();
    }

    pub fn ramp_samples(&self) -> usize {
        self.ramp_samples
    }

    /// Gain applied to the last processed sample (linear)
    pub fn current_gain(&self) -> f32 {
        self.current
    }

    pub fn target_gain_db(&self) -> f32 {
        self.target_db
    }

    pub fn is_smoothing(&self) -> bool {
        self.remaining > 0
    }

    fn snap_to_target(&mut self) {
        self.current = self.target;
        self.step = 0.0;
        self.remaining = 0;
    }

    /// Gain of the `k`-th sample (1-based) of the ramp starting at `start`
    #[inline]
    fn ramp_gain(start: f32, step: f32, target: f32, k: usize, remaining: usize) -> f32 {
        if k >= remaining {
            return target;
        }
        let gain = start + step * k as f32;
        if step > 0.0 {
            gain.min(target)
        } else {
            gain.max(target)
        }
    }
}

impl Default for GainStage {
    fn default() -> Self {
        Self::new()
    }
}

fn ramp_length(ramp_ms: f32, sample_rate: f32) -> usize {
    (ramp_ms / 1000.0 * sample_rate).round() as usize
}

impl DspStage for GainStage {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        self.ramp_samples = ramp_length(self.ramp_ms, spec.sample_rate);
        self.reset();
    }

    fn process_in_place(&mut self, buffer: &mut AudioBuffer) {
        if self.remaining == 0 {
            if self.current != 1.0 {
                buffer.apply_gain(self.current);
            }
            return;
        }

        // Every channel replays the same ramp segment from the block start
        let start = self.current;
        let step = self.step;
        let target = self.target;
        let remaining = self.remaining;
        for channel in buffer.channels_mut() {
            for (i, sample) in channel.iter_mut().enumerate() {
                *sample *= Self::ramp_gain(start, step, target, i + 1, remaining);
            }
        }

        let advanced = buffer.len().min(remaining);
        self.remaining -= advanced;
        if self.remaining == 0 {
            self.snap_to_target();
        } else {
            self.current = Self::ramp_gain(start, step, target, advanced, remaining);
        }
    }

    /// Finish any ramp immediately
    fn reset(&mut self) {
        self.snap_to_target();
    }

    fn name(&self) -> &str {
        "GainStage"
    }
}

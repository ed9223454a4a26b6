//! Feed-forward hard-knee band compressor
//!
//! Per sample and per channel:
//! 1. peak level in dB (floored, never -inf)
//! 2. static reduction from the hard-knee curve
//! 3. one-pole smoothing of the reduction with separate attack/release
//! 4. apply the smoothed reduction as a linear gain
//!
//! The envelope holds smoothed *reduction* in dB (>= 0), one value per
//! channel, and persists across blocks.
//!
//! Bypass leaves the buffer untouched and freezes the envelope, so
//! re-enabling picks up exactly where the band left off.

use super::{db_to_gain, gain_to_db, DspStage};
use crate::domain::audio::{AudioBuffer, ProcessSpec};
use crate::domain::dsp::limits;
use crate::domain::params::BandParameters;
use tracing::debug;

/// Envelope values below this are parked at zero
const ENVELOPE_FLOOR_DB: f32 = 1e-9;

/// Static hard-knee gain reduction in dB (>= 0)
///
/// `ratio` of 1 never reduces; an infinite ratio clamps the level to the
/// threshold.
#[inline]
pub fn hard_knee_reduction_db(level_db: f32, threshold_db: f32, ratio: f32) -> f32 {
    if level_db <= threshold_db {
        0.0
    } else {
        (level_db - threshold_db) * (1.0 - 1.0 / ratio)
    }
}

/// One-pole smoothing coefficient for a time constant
///
/// `coeff = 1 - exp(-1 / (t * sample_rate))`, with `t` clamped to at least
/// one sample period.
#[inline]
pub fn time_constant_coeff(time_ms: f32, sample_rate: f32) -> f32 {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return 1.0;
    }
    let min_seconds = 1.0 / sample_rate;
    let seconds = (time_ms / 1000.0).max(min_seconds);
    1.0 - (-1.0 / (seconds * sample_rate)).exp()
}

/// Compressor for one band, any number of channels
#[derive(Debug, Clone)]
pub struct BandCompressor {
    bypass: bool,
    // Parameters
    threshold_db: f32,
    ratio: f32,
    attack_ms: f32,
    release_ms: f32,
    sample_rate: f32,
    // Coefficients, recomputed on change only
    attack_coeff: f32,
    release_coeff: f32,
    // Smoothed reduction per channel (dB)
    envelopes: Vec<f32>,
}

impl BandCompressor {
    pub fn new() -> Self {
        let defaults = BandParameters::default();
        let mut comp = Self {
            bypass: defaults.bypass,
            threshold_db: defaults.threshold_db,
            ratio: defaults.ratio,
            attack_ms: defaults.attack_ms,
            release_ms: defaults.release_ms,
            sample_rate: 48000.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelopes: Vec::new(),
        };
        comp.update_coefficients();
        comp
    }

    /// Pull the band's settings from a block snapshot
    ///
    /// Cheap when nothing changed: coefficients are only recomputed when a
    /// time constant moved.
    pub fn set_parameters(&mut self, params: &BandParameters) {
        self.bypass = params.bypass;
        self.set_threshold(params.threshold_db);
        self.set_ratio(params.ratio);
        if params.attack_ms != self.attack_ms || params.release_ms != self.release_ms {
            self.attack_ms = params.attack_ms;
            self.release_ms = params.release_ms;
            self.update_coefficients();
            debug!(
                attack_ms = self.attack_ms,
                release_ms = self.release_ms,
                "Compressor time constants updated"
            );
        }
    }

    pub fn set_threshold(&mut self, threshold_db: f32) {
        if !threshold_db.is_nan() {
            self.threshold_db = threshold_db;
        }
    }

    /// Ratio is clamped to >= 1; `f32::INFINITY` makes a limiter
    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = if ratio.is_nan() {
            limits::RATIO_MIN
        } else {
            ratio.max(limits::RATIO_MIN)
        };
    }

    pub fn set_attack(&mut self, attack_ms: f32) {
        self.attack_ms = attack_ms;
        self.update_coefficients();
    }

    pub fn set_release(&mut self, release_ms: f32) {
        self.release_ms = release_ms;
        self.update_coefficients();
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn attack_coeff(&self) -> f32 {
        self.attack_coeff
    }

    pub fn release_coeff(&self) -> f32 {
        self.release_coeff
    }

    /// Current smoothed reduction of one channel (dB)
    pub fn envelope_db(&self, channel: usize) -> Option<f32> {
        self.envelopes.get(channel).copied()
    }

    /// Largest smoothed reduction across channels (dB, >= 0)
    pub fn gain_reduction_db(&self) -> f32 {
        self.envelopes.iter().fold(0.0_f32, |acc, &e| acc.max(e))
    }

    fn update_coefficients(&mut self) {
        self.attack_coeff = time_constant_coeff(self.attack_ms, self.sample_rate);
        self.release_coeff = time_constant_coeff(self.release_ms, self.sample_rate);
    }
}

impl Default for BandCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl DspStage for BandCompressor {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        self.envelopes = vec![0.0; spec.channels];
        self.update_coefficients();
    }

    fn process_in_place(&mut self, buffer: &mut AudioBuffer) {
        if self.bypass {
            return;
        }

        let threshold_db = self.threshold_db;
        let ratio = self.ratio;
        let attack = self.attack_coeff;
        let release = self.release_coeff;

        for (envelope, channel) in self.envelopes.iter_mut().zip(buffer.channels_mut()) {
            let mut smoothed = *envelope;
            for sample in channel.iter_mut() {
                let level_db = gain_to_db(sample.abs());
                let target = hard_knee_reduction_db(level_db, threshold_db, ratio);

                // More reduction needed means the level is rising: attack
                let coeff = if target > smoothed { attack } else { release };
                smoothed += (target - smoothed) * coeff;

                *sample *= db_to_gain(-smoothed);
            }
            // A non-finite input sample must not stick in the envelope
            if !smoothed.is_finite() || smoothed < ENVELOPE_FLOOR_DB {
                smoothed = 0.0;
            }
            *envelope = smoothed;
        }
    }

    fn reset(&mut self) {
        self.envelopes.fill(0.0);
    }

    fn name(&self) -> &str {
        "BandCompressor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE_RATE: f32 = 48000.0;

    fn compressor(threshold_db: f32, ratio: f32, attack_ms: f32, release_ms: f32) -> BandCompressor {
        let mut comp = BandCompressor::new();
        comp.prepare(&ProcessSpec::new(SAMPLE_RATE, 8192, 1));
        comp.set_parameters(&BandParameters {
            threshold_db,
            ratio,
            attack_ms,
            release_ms,
            ..Default::default()
        });
        comp
    }

    fn constant(level: f32, frames: usize) -> AudioBuffer {
        AudioBuffer::from_channels(&[vec![level; frames]])
    }

    fn sine(frequency: f32, amplitude: f32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * frequency * i as f32 / SAMPLE_RATE).sin())
            .collect()
    }

    #[test]
    fn test_hard_knee_curve() {
        assert_eq!(hard_knee_reduction_db(-30.0, -20.0, 4.0), 0.0);
        assert_eq!(hard_knee_reduction_db(-20.0, -20.0, 4.0), 0.0);
        assert!((hard_knee_reduction_db(0.0, -20.0, 4.0) - 15.0).abs() < 1e-5);
        assert_eq!(hard_knee_reduction_db(0.0, -20.0, 1.0), 0.0);
        assert_eq!(hard_knee_reduction_db(0.0, -20.0, f32::INFINITY), 20.0);
    }

    #[test]
    fn test_time_constant_coeff() {
        let c = time_constant_coeff(10.0, SAMPLE_RATE);
        assert!((c - (1.0 - (-1.0_f32 / 480.0).exp())).abs() < 1e-7);

        // Zero and negative times clamp to one sample
        let one_sample = 1.0 - (-1.0_f32).exp();
        assert!((time_constant_coeff(0.0, SAMPLE_RATE) - one_sample).abs() < 1e-6);
        assert!((time_constant_coeff(-5.0, SAMPLE_RATE) - one_sample).abs() < 1e-6);
        assert!(time_constant_coeff(f32::NAN, SAMPLE_RATE).is_finite());
    }

    #[test]
    fn test_steady_state_reduction() {
        let mut comp = compressor(-20.0, 4.0, 5.0, 50.0);
        let mut buffer = constant(1.0, 8192);
        comp.process_in_place(&mut buffer);

        // 0 dB in, -20 dB threshold, 4:1 => 15 dB of reduction
        let expected = db_to_gain(-15.0);
        assert!((buffer.channel(0)[8191] - expected).abs() < 1e-3);
        assert!((comp.gain_reduction_db() - 15.0).abs() < 0.01);
    }

    #[test]
    fn test_infinite_ratio_limits_to_threshold() {
        let mut comp = compressor(-12.0, f32::INFINITY, 5.0, 50.0);
        let mut buffer = constant(1.0, 8192);
        comp.process_in_place(&mut buffer);
        assert!((buffer.channel(0)[8191] - db_to_gain(-12.0)).abs() < 1e-3);
    }

    #[test]
    fn test_below_threshold_is_untouched() {
        let mut comp = compressor(-6.0, 10.0, 5.0, 50.0);
        let input = sine(440.0, 0.25, 2048);
        let mut buffer = AudioBuffer::from_channels(&[input.clone()]);
        comp.process_in_place(&mut buffer);
        assert_eq!(buffer.channel(0), input.as_slice());
        assert_eq!(comp.gain_reduction_db(), 0.0);
    }

    #[test]
    fn test_attack_reaches_one_time_constant() {
        // 10 ms attack = 480 samples; after that the envelope is at 1 - 1/e
        let mut comp = compressor(-20.0, 4.0, 10.0, 500.0);
        let mut buffer = constant(1.0, 480);
        comp.process_in_place(&mut buffer);

        let expected = 15.0 * (1.0 - (-1.0_f32).exp());
        assert!((comp.envelope_db(0).unwrap() - expected).abs() < 0.05);
    }

    #[test]
    fn test_release_is_slower_than_attack() {
        let mut comp = compressor(-20.0, 4.0, 5.0, 200.0);
        comp.process_in_place(&mut constant(1.0, 4800));
        let peak = comp.gain_reduction_db();

        // 5 ms of silence: a 200 ms release has barely moved
        comp.process_in_place(&mut constant(0.0, 240));
        assert!(comp.gain_reduction_db() > 0.9 * peak);
    }

    #[test]
    fn test_bypass_leaves_buffer_and_freezes_envelope() {
        let mut comp = compressor(-20.0, 4.0, 5.0, 50.0);
        comp.process_in_place(&mut constant(1.0, 2048));
        let frozen = comp.envelope_db(0).unwrap();
        assert!(frozen > 0.0);

        comp.set_bypass(true);
        let input = sine(1000.0, 0.9, 4096);
        let mut buffer = AudioBuffer::from_channels(&[input.clone()]);
        comp.process_in_place(&mut buffer);

        assert_eq!(buffer.channel(0), input.as_slice());
        assert_eq!(comp.envelope_db(0), Some(frozen));

        // Picks up from the frozen value
        comp.set_bypass(false);
        let mut buffer = constant(1.0, 1);
        comp.process_in_place(&mut buffer);
        assert!(comp.envelope_db(0).unwrap() >= frozen);
    }

    #[test]
    fn test_zero_time_constants_stay_finite() {
        let mut comp = compressor(-20.0, 8.0, 0.0, 0.0);
        let mut buffer = AudioBuffer::from_channels(&[sine(100.0, 1.0, 1024)]);
        comp.process_in_place(&mut buffer);
        assert!(buffer.channel(0).iter().all(|s| s.is_finite()));
        assert!(comp.attack_coeff() > 0.0 && comp.attack_coeff() <= 1.0);
    }

    #[test]
    fn test_nan_ratio_falls_back_to_unity() {
        let mut comp = BandCompressor::new();
        comp.set_ratio(f32::NAN);
        assert_eq!(comp.ratio(), 1.0);
        comp.set_ratio(0.5);
        assert_eq!(comp.ratio(), 1.0);
    }

    #[test]
    fn test_block_boundary_is_continuous() {
        let input = sine(1000.0, 1.0, 1024);

        let mut whole = compressor(-20.0, 4.0, 5.0, 50.0);
        let mut single = AudioBuffer::from_channels(&[input.clone()]);
        whole.process_in_place(&mut single);

        let mut split = compressor(-20.0, 4.0, 5.0, 50.0);
        let mut first = AudioBuffer::from_channels(&[input[..512].to_vec()]);
        let mut second = AudioBuffer::from_channels(&[input[512..].to_vec()]);
        split.process_in_place(&mut first);
        split.process_in_place(&mut second);

        assert_eq!(first.channel(0), &single.channel(0)[..512]);
        assert_eq!(second.channel(0), &single.channel(0)[512..]);

        // The step across the boundary is no larger than a step inside a block
        let out = single.channel(0);
        let max_step = out.windows(2).map(|w| (w[1] - w[0]).abs()).fold(0.0_f32, f32::max);
        let boundary = (second.channel(0)[0] - first.channel(0)[511]).abs();
        assert!(boundary <= max_step);
        assert!(boundary < 0.2);
    }

    #[test]
    fn test_prepare_clears_envelope() {
        let mut comp = compressor(-20.0, 4.0, 5.0, 50.0);
        comp.process_in_place(&mut constant(1.0, 1024));
        assert!(comp.gain_reduction_db() > 0.0);

        comp.prepare(&ProcessSpec::new(44100.0, 512, 2));
        assert_eq!(comp.envelope_db(0), Some(0.0));
        assert_eq!(comp.envelope_db(1), Some(0.0));
        assert_eq!(comp.envelope_db(2), None);
    }

    #[test]
    fn test_reset_clears_envelope() {
        let mut comp = compressor(-20.0, 4.0, 5.0, 50.0);
        comp.process_in_place(&mut constant(1.0, 1024));
        comp.reset();
        assert_eq!(comp.gain_reduction_db(), 0.0);
    }

    #[test]
    fn test_non_finite_sample_does_not_stick() {
        let mut comp = compressor(-20.0, 4.0, 5.0, 50.0);
        let mut spike = AudioBuffer::from_channels(&[vec![0.5, f32::INFINITY, 0.5, 0.5]]);
        comp.process_in_place(&mut spike);
        assert_eq!(comp.envelope_db(0), Some(0.0));

        let mut buffer = constant(0.5, 1024);
        comp.process_in_place(&mut buffer);
        assert!(buffer.channel(0).iter().all(|s| s.is_finite()));
        assert!(comp.gain_reduction_db() > 0.0);
    }

    proptest! {
        #[test]
        fn test_unity_ratio_is_exact_noop(
            threshold in -60.0_f32..12.0,
            samples in prop::collection::vec(-4.0_f32..4.0, 1..512),
        ) {
            let mut comp = compressor(threshold, 1.0, 5.0, 50.0);
            let mut buffer = AudioBuffer::from_channels(&[samples.clone()]);
            comp.process_in_place(&mut buffer);
            prop_assert_eq!(buffer.channel(0), samples.as_slice());
        }

        #[test]
        fn test_reduction_is_monotonic_in_level(
            threshold in -60.0_f32..12.0,
            ratio_index in 0usize..14,
            a in -120.0_f32..24.0,
            b in -120.0_f32..24.0,
        ) {
            let ratio = crate::domain::params::ratio_from_choice(ratio_index);
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                hard_knee_reduction_db(low, threshold, ratio)
                    <= hard_knee_reduction_db(high, threshold, ratio)
            );
        }

        #[test]
        fn test_steady_state_reduction_is_monotonic(
            threshold in -40.0_f32..0.0,
            a in 0.01_f32..2.0,
            b in 0.01_f32..2.0,
        ) {
            let (quiet, loud) = if a <= b { (a, b) } else { (b, a) };
            let settle = |level: f32| {
                let mut comp = compressor(threshold, 4.0, 5.0, 5.0);
                comp.process_in_place(&mut constant(level, 4096));
                comp.gain_reduction_db()
            };
            prop_assert!(settle(quiet) <= settle(loud) + 1e-4);
        }
    }
}

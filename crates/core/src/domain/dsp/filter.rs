//! 2nd-order Linkwitz-Riley filter stage
//!
//! The atomic building block of the crossover. Low-pass, high-pass and
//! all-pass share one denominator (a double real pole at the pre-warped
//! cutoff), which is what lets a low-pass/high-pass pair at the same cutoff
//! sum to the matching all-pass exactly.

use super::limits;
use super::DspStage;
use crate::domain::audio::{AudioBuffer, ProcessSpec};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Response of a filter stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterKind {
    LowPass,
    /// Polarity-inverted so that `LowPass + HighPass == AllPass`
    HighPass,
    AllPass,
}

/// Biquad coefficients with a0 normalized to 1.0
///
/// H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)
///
/// Kept in f64: near 20 Hz at high sample rates the double pole sits within
/// 1e-3 of z = 1, and f32 rounding of `a1`/`a2` shifts the DC gain by dBs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterCoeffs {
    /// Numerator coefficients
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    /// Denominator coefficients
    pub a1: f64,
    pub a2: f64,
}

impl Default for FilterCoeffs {
    fn default() -> Self {
        // Unity gain (no filtering)
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

impl FilterCoeffs {
    /// Linkwitz-Riley 2nd-order section via the bilinear transform
    ///
    /// The prototype is the squared 1st-order Butterworth response,
    /// `(w/(s+w))^2` for low-pass and `-(s/(s+w))^2` for high-pass. The
    /// all-pass numerator is the sum of the two, so the three kinds are
    /// phase-matched by construction.
    ///
    /// `cutoff_hz` is clamped to `(0, sample_rate / 2)` first. An invalid
    /// sample rate yields unity coefficients.
    #[must_use]
    pub fn linkwitz_riley(kind: FilterKind, cutoff_hz: f32, sample_rate: f32) -> Self {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Self::default();
        }
        let cutoff = clamp_cutoff(cutoff_hz, sample_rate) as f64;

        let k = (std::f64::consts::PI * cutoff / sample_rate as f64).tan();
        let norm = 1.0 / ((1.0 + k) * (1.0 + k));
        let pole = (k - 1.0) / (k + 1.0);
        let a1 = 2.0 * pole;
        let a2 = pole * pole;

        let (b0, b1, b2) = match kind {
            FilterKind::LowPass => {
                let b0 = k * k * norm;
                (b0, 2.0 * b0, b0)
            }
            FilterKind::HighPass => (-norm, 2.0 * norm, -norm),
            FilterKind::AllPass => {
                let edge = (k * k - 1.0) * norm;
                (edge, 2.0 * (k * k + 1.0) * norm, edge)
            }
        };

        Self { b0, b1, b2, a1, a2 }
    }
}

/// Keep a cutoff strictly inside (0, Nyquist)
#[inline]
pub fn clamp_cutoff(cutoff_hz: f32, sample_rate: f32) -> f32 {
    let max = sample_rate * limits::MAX_CUTOFF_RATIO;
    // max() swallows NaN, min() keeps the result below Nyquist
    cutoff_hz.max(limits::MIN_CUTOFF_HZ).min(max)
}

/// Two delay registers of one channel (transposed direct form II)
///
/// Samples enter and leave as f32; the recursion runs in f64.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub z1: f64,
    pub z2: f64,
}

impl FilterState {
    pub fn is_cleared(&self) -> bool {
        self.z1 == 0.0 && self.z2 == 0.0
    }

    #[inline]
    fn tick(&mut self, c: &FilterCoeffs, x: f32) -> f32 {
        let x = x as f64;
        let y = c.b0 * x + self.z1;
        self.z1 = c.b1 * x - c.a1 * y + self.z2;
        self.z2 = c.b2 * x - c.a2 * y;
        y as f32
    }

    /// Park decaying (subnormal) tails and non-finite history at zero
    ///
    /// A single inf/NaN input would otherwise stay in the recursion forever.
    #[inline]
    fn flush_denormals(&mut self) {
        const TINY: f64 = 1e-20;
        if !self.z1.is_finite() || self.z1.abs() < TINY {
            self.z1 = 0.0;
        }
        if !self.z2.is_finite() || self.z2.abs() < TINY {
            self.z2 = 0.0;
        }
    }
}

/// One 2nd-order filter with per-channel state
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStage {
    kind: FilterKind,
    cutoff_hz: f32,
    sample_rate: f32,
    coeffs: FilterCoeffs,
    states: Vec<FilterState>,
}

impl FilterStage {
    /// Default cutoff used until the stage is configured
    pub const DEFAULT_CUTOFF_HZ: f32 = 1000.0;

    /// Create an unprepared stage (no channels yet)
    pub fn new(kind: FilterKind) -> Self {
        let sample_rate = 48000.0;
        Self {
            kind,
            cutoff_hz: Self::DEFAULT_CUTOFF_HZ,
            sample_rate,
            coeffs: FilterCoeffs::linkwitz_riley(kind, Self::DEFAULT_CUTOFF_HZ, sample_rate),
            states: Vec::new(),
        }
    }

    /// Recompute coefficients and clear every channel's history
    ///
    /// Meant for parameter changes, not for every block.
    pub fn configure(&mut self, kind: FilterKind, cutoff_hz: f32, sample_rate: f32) {
        self.kind = kind;
        self.sample_rate = sample_rate;
        self.cutoff_hz = clamp_cutoff(cutoff_hz, sample_rate);
        self.coeffs = FilterCoeffs::linkwitz_riley(kind, self.cutoff_hz, sample_rate);
        self.reset();

        trace!(
            kind = ?self.kind,
            cutoff_hz = self.cutoff_hz,
            sample_rate = self.sample_rate,
            "Filter stage configured"
        );
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Effective (clamped) cutoff in Hz
    pub fn cutoff_hz(&self) -> f32 {
        self.cutoff_hz
    }

    pub fn coeffs(&self) -> FilterCoeffs {
        self.coeffs
    }

    pub fn num_channels(&self) -> usize {
        self.states.len()
    }

    /// Delay registers of one channel
    pub fn state(&self, channel: usize) -> Option<FilterState> {
        self.states.get(channel).copied()
    }
}

impl DspStage for FilterStage {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.states = vec![FilterState::default(); spec.channels];
        self.configure(self.kind, self.cutoff_hz, spec.sample_rate);
    }

    fn process_in_place(&mut self, buffer: &mut AudioBuffer) {
        let coeffs = self.coeffs;
        for (state, channel) in self.states.iter_mut().zip(buffer.channels_mut()) {
            for sample in channel.iter_mut() {
                *sample = state.tick(&coeffs, *sample);
            }
            state.flush_denormals();
        }
    }

    fn reset(&mut self) {
        self.states.fill(FilterState::default());
    }

    fn name(&self) -> &str {
        match self.kind {
            FilterKind::LowPass => "LowPass",
            FilterKind::HighPass => "HighPass",
            FilterKind::AllPass => "AllPass",
        }
    }
}

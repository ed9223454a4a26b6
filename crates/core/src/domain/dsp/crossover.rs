//! Phase-compensated 3-way crossover
//!
//! Two Linkwitz-Riley crossover points in cascade:
//!
//! ```text
//! input ─┬─ LP(low-mid) ── AP(mid-high) ─────────────── low
//!        └─ HP(low-mid) ─┬─ LP(mid-high) ────────────── mid
//!                        └─ HP(mid-high) ────────────── high
//! ```
//!
//! The low band never goes through the second split, so it gets the
//! all-pass tuned to the *mid-high* cutoff to match the phase the mid and
//! high bands pick up there. The three bands then sum to the input run
//! through AP(low-mid) and AP(mid-high): flat magnitude, no comb filtering.

use super::filter::{FilterKind, FilterStage};
use super::DspStage;
use crate::domain::audio::{AudioBuffer, ProcessSpec, Result};
use crate::domain::params::CrossoverParameters;
use tracing::debug;

/// The five filter stages of the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrossoverFilter {
    LowMidLowPass,
    LowMidHighPass,
    CompensationAllPass,
    MidHighLowPass,
    MidHighHighPass,
}

impl CrossoverFilter {
    pub const ALL: [CrossoverFilter; 5] = [
        CrossoverFilter::LowMidLowPass,
        CrossoverFilter::LowMidHighPass,
        CrossoverFilter::CompensationAllPass,
        CrossoverFilter::MidHighLowPass,
        CrossoverFilter::MidHighHighPass,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn kind(self) -> FilterKind {
        match self {
            CrossoverFilter::LowMidLowPass | CrossoverFilter::MidHighLowPass => FilterKind::LowPass,
            CrossoverFilter::LowMidHighPass | CrossoverFilter::MidHighHighPass => {
                FilterKind::HighPass
            }
            CrossoverFilter::CompensationAllPass => FilterKind::AllPass,
        }
    }

    /// Whether the stage is tuned to the low-mid cutoff (else mid-high)
    pub fn uses_low_mid_cutoff(self) -> bool {
        matches!(
            self,
            CrossoverFilter::LowMidLowPass | CrossoverFilter::LowMidHighPass
        )
    }
}

/// Splits one buffer into low, mid and high band buffers
#[derive(Debug, Clone)]
pub struct CrossoverNetwork {
    stages: [FilterStage; 5],
    cutoffs: CrossoverParameters,
    sample_rate: f32,
}

impl CrossoverNetwork {
    pub fn new() -> Self {
        let cutoffs = CrossoverParameters::default();
        let sample_rate = 48000.0;
        let stages = CrossoverFilter::ALL.map(|filter| {
            let mut stage = FilterStage::new(filter.kind());
            stage.configure(filter.kind(), cutoff_for(filter, &cutoffs), sample_rate);
            stage
        });

        Self {
            stages,
            cutoffs,
            sample_rate,
        }
    }

    /// Size per-channel state for a stream and clear all history
    pub fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        for stage in self.stages.iter_mut() {
            stage.prepare(spec);
        }
        self.apply_all();
    }

    /// Validate and apply cutoffs outside the audio path
    ///
    /// Fails if the low-mid cutoff is not below the mid-high cutoff.
    pub fn configure(&mut self, cutoffs: CrossoverParameters) -> Result<()> {
        cutoffs.validate()?;
        self.cutoffs = cutoffs;
        self.apply_all();
        Ok(())
    }

    /// Per-block cutoff update
    ///
    /// Only the crossover point whose cutoff actually moved is redesigned
    /// (and has its state cleared). Ordering is the caller's contract and is
    /// not checked here.
    pub fn set_cutoffs(&mut self, cutoffs: &CrossoverParameters) {
        let low_mid_changed = cutoffs.low_mid_hz != self.cutoffs.low_mid_hz;
        let mid_high_changed = cutoffs.mid_high_hz != self.cutoffs.mid_high_hz;
        if !low_mid_changed && !mid_high_changed {
            return;
        }

        self.cutoffs = *cutoffs;
        for filter in CrossoverFilter::ALL {
            let changed = if filter.uses_low_mid_cutoff() {
                low_mid_changed
            } else {
                mid_high_changed
            };
            if changed {
                self.configure_stage(filter);
            }
        }

        debug!(
            low_mid_hz = self.cutoffs.low_mid_hz,
            mid_high_hz = self.cutoffs.mid_high_hz,
            "Crossover cutoffs updated"
        );
    }

    /// Split `input` into `[low, mid, high]`
    ///
    /// Each band buffer adopts the input's active length and must have at
    /// least as much capacity.
    pub fn split(&mut self, input: &AudioBuffer, bands: &mut [AudioBuffer; 3]) {
        let [low, mid, high] = bands;

        low.copy_from(input);
        self.run(CrossoverFilter::LowMidLowPass, low);
        self.run(CrossoverFilter::CompensationAllPass, low);

        mid.copy_from(input);
        self.run(CrossoverFilter::LowMidHighPass, mid);
        high.copy_from(mid);
        self.run(CrossoverFilter::MidHighLowPass, mid);
        self.run(CrossoverFilter::MidHighHighPass, high);
    }

    /// Clear every stage's history, keeping coefficients
    pub fn reset(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.reset();
        }
    }

    pub fn cutoffs(&self) -> CrossoverParameters {
        self.cutoffs
    }

    pub fn stage(&self, filter: CrossoverFilter) -> &FilterStage {
        &self.stages[filter.index()]
    }

    #[inline]
    fn run(&mut self, filter: CrossoverFilter, buffer: &mut AudioBuffer) {
        self.stages[filter.index()].process_in_place(buffer);
    }

    fn configure_stage(&mut self, filter: CrossoverFilter) {
        let cutoff = cutoff_for(filter, &self.cutoffs);
        self.stages[filter.index()].configure(filter.kind(), cutoff, self.sample_rate);
    }

    fn apply_all(&mut self) {
        for filter in CrossoverFilter::ALL {
            self.configure_stage(filter);
        }
    }
}

impl Default for CrossoverNetwork {
    fn default() -> Self {
        Self::new()
    }
}

fn cutoff_for(filter: CrossoverFilter, cutoffs: &CrossoverParameters) -> f32 {
    if filter.uses_low_mid_cutoff() {
        cutoffs.low_mid_hz
    } else {
        cutoffs.mid_high_hz
    }
}

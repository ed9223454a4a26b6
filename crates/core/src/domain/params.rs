//! Parameters, the lock-free parameter store and gain-reduction telemetry
//!
//! The control side writes into `SharedParameters` one field at a time; the
//! audio side takes an owned `EngineParameters` snapshot once per block.
//! Every field is an atomic scalar, so neither side ever waits on the other.

use crate::domain::audio::{AudioError, Result};
use crate::domain::dsp::limits;
use crossbeam::utils::CachePadded;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Ratio values offered to controls
pub const RATIO_CHOICES: [f32; 14] = [
    1.0, 1.5, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 10.0, 15.0, 20.0, 50.0, 100.0,
];

/// Factory default ratio choice (3:1)
pub const DEFAULT_RATIO_INDEX: usize = 3;

/// Ratio for a choice index, saturating at the last choice
pub fn ratio_from_choice(index: usize) -> f32 {
    RATIO_CHOICES[index.min(RATIO_CHOICES.len() - 1)]
}

/// Clamp to `[min, max]`, replacing NaN with `fallback`
#[inline]
fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

/// Ratio is unbounded above; infinity turns the band into a limiter
#[inline]
fn clamp_ratio(ratio: f32) -> f32 {
    if ratio.is_nan() {
        RATIO_CHOICES[DEFAULT_RATIO_INDEX]
    } else {
        ratio.max(limits::RATIO_MIN)
    }
}

// ============================================================================
// Parameter values
// ============================================================================

/// Frequency band of the splitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    Low,
    Mid,
    High,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Low, Band::Mid, Band::High];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Band::Low => "Low",
            Band::Mid => "Mid",
            Band::High => "High",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compressor and routing settings of one band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandParameters {
    pub threshold_db: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub ratio: f32,
    pub bypass: bool,
    pub mute: bool,
    pub solo: bool,
}

impl Default for BandParameters {
    fn default() -> Self {
        Self {
            threshold_db: 0.0,
            attack_ms: 50.0,
            release_ms: 250.0,
            ratio: RATIO_CHOICES[DEFAULT_RATIO_INDEX],
            bypass: false,
            mute: false,
            solo: false,
        }
    }
}

impl BandParameters {
    /// Copy with every value clamped into its control range
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        Self {
            threshold_db: clamp_or(
                self.threshold_db,
                limits::THRESHOLD_MIN_DB,
                limits::THRESHOLD_MAX_DB,
                defaults.threshold_db,
            ),
            attack_ms: clamp_or(
                self.attack_ms,
                limits::TIME_MIN_MS,
                limits::TIME_MAX_MS,
                defaults.attack_ms,
            ),
            release_ms: clamp_or(
                self.release_ms,
                limits::TIME_MIN_MS,
                limits::TIME_MAX_MS,
                defaults.release_ms,
            ),
            ratio: clamp_ratio(self.ratio),
            ..*self
        }
    }
}

/// The two crossover points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverParameters {
    pub low_mid_hz: f32,
    pub mid_high_hz: f32,
}

impl Default for CrossoverParameters {
    fn default() -> Self {
        Self {
            low_mid_hz: 400.0,
            mid_high_hz: 2000.0,
        }
    }
}

impl CrossoverParameters {
    pub fn new(low_mid_hz: f32, mid_high_hz: f32) -> Self {
        Self {
            low_mid_hz,
            mid_high_hz,
        }
    }

    /// Both cutoffs must be positive and strictly ordered
    pub fn validate(&self) -> Result<()> {
        if !(self.low_mid_hz > 0.0 && self.mid_high_hz.is_finite()) {
            return Err(AudioError::InvalidConfiguration(format!(
                "crossover cutoffs must be positive and finite, got {} Hz / {} Hz",
                self.low_mid_hz, self.mid_high_hz
            )));
        }
        if self.low_mid_hz >= self.mid_high_hz {
            return Err(AudioError::InvalidConfiguration(format!(
                "low-mid crossover ({} Hz) must be below mid-high crossover ({} Hz)",
                self.low_mid_hz, self.mid_high_hz
            )));
        }
        Ok(())
    }

    /// Clamp each cutoff into its own range
    ///
    /// The ranges do not overlap, so the result is always ordered.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        Self {
            low_mid_hz: clamp_or(
                self.low_mid_hz,
                limits::LOW_MID_MIN_HZ,
                limits::LOW_MID_MAX_HZ,
                defaults.low_mid_hz,
            ),
            mid_high_hz: clamp_or(
                self.mid_high_hz,
                limits::MID_HIGH_MIN_HZ,
                limits::MID_HIGH_MAX_HZ,
                defaults.mid_high_hz,
            ),
        }
    }
}

/// Complete parameter snapshot consumed by one block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineParameters {
    pub gain_in_db: f32,
    pub gain_out_db: f32,
    pub master_bypass: bool,
    pub crossover: CrossoverParameters,
    pub bands: [BandParameters; 3],
}

impl EngineParameters {
    pub fn band(&self, band: Band) -> &BandParameters {
        &self.bands[band.index()]
    }

    pub fn band_mut(&mut self, band: Band) -> &mut BandParameters {
        &mut self.bands[band.index()]
    }

    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            bands: self.bands.map(|b| b.sanitized()),
            crossover: self.crossover.sanitized(),
            gain_in_db: clamp_or(self.gain_in_db, limits::GAIN_MIN_DB, limits::GAIN_MAX_DB, 0.0),
            gain_out_db: clamp_or(self.gain_out_db, limits::GAIN_MIN_DB, limits::GAIN_MAX_DB, 0.0),
            master_bypass: self.master_bypass,
        }
    }

    pub fn any_solo(&self) -> bool {
        self.bands.iter().any(|b| b.solo)
    }

    /// Whether a band reaches the mix, given the block's solo reduction
    ///
    /// Solo overrides mute: once any band is soloed, mute flags are ignored.
    #[inline]
    pub fn is_audible(&self, band: Band, any_solo: bool) -> bool {
        let params = self.band(band);
        if any_solo {
            params.solo
        } else {
            !params.mute
        }
    }

    /// Master bypass, or every band bypassed with no solo/mute in play
    ///
    /// Either way the crossover and compressors are skipped. Master bypass
    /// passes the block through untouched; with every band bypassed the
    /// input and output gains are still applied.
    pub fn is_global_bypass(&self) -> bool {
        self.master_bypass
            || self
                .bands
                .iter()
                .all(|b| b.bypass && !b.solo && !b.mute)
    }
}

// ============================================================================
// Parameter identifiers
// ============================================================================

/// Stable identifier of one automatable parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterId {
    Threshold(Band),
    Attack(Band),
    Release(Band),
    Ratio(Band),
    Bypass(Band),
    Mute(Band),
    Solo(Band),
    LowMidCrossover,
    MidHighCrossover,
    GainIn,
    GainOut,
    MasterBypass,
}

impl ParameterId {
    /// Every parameter, per-band groups first
    pub fn all() -> Vec<ParameterId> {
        let per_band: [fn(Band) -> ParameterId; 7] = [
            ParameterId::Threshold,
            ParameterId::Attack,
            ParameterId::Release,
            ParameterId::Ratio,
            ParameterId::Bypass,
            ParameterId::Mute,
            ParameterId::Solo,
        ];
        let mut ids: Vec<ParameterId> = Band::ALL
            .iter()
            .flat_map(|&band| per_band.iter().map(move |make| make(band)))
            .collect();
        ids.extend([
            ParameterId::LowMidCrossover,
            ParameterId::MidHighCrossover,
            ParameterId::GainIn,
            ParameterId::GainOut,
            ParameterId::MasterBypass,
        ]);
        ids
    }

    /// Look up a parameter by its display name
    pub fn from_name(name: &str) -> Option<ParameterId> {
        Self::all().into_iter().find(|id| id.to_string() == name)
    }

    /// Whether the parameter is a switch rather than a continuous value
    pub fn is_toggle(&self) -> bool {
        matches!(
            self,
            ParameterId::Bypass(_)
                | ParameterId::Mute(_)
                | ParameterId::Solo(_)
                | ParameterId::MasterBypass
        )
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterId::Threshold(band) => write!(f, "Threshold {} Band", band),
            ParameterId::Attack(band) => write!(f, "Attack {} Band", band),
            ParameterId::Release(band) => write!(f, "Release {} Band", band),
            ParameterId::Ratio(band) => write!(f, "Ratio {} Band", band),
            ParameterId::Bypass(band) => write!(f, "Bypass {} Band", band),
            ParameterId::Mute(band) => write!(f, "Mute {} Band", band),
            ParameterId::Solo(band) => write!(f, "Solo {} Band", band),
            ParameterId::LowMidCrossover => f.write_str("Low-Mid Crossover Frequency"),
            ParameterId::MidHighCrossover => f.write_str("Mid-High Crossover Frequency"),
            ParameterId::GainIn => f.write_str("Gain In"),
            ParameterId::GainOut => f.write_str("Gain Out"),
            ParameterId::MasterBypass => f.write_str("Master Bypass"),
        }
    }
}

// ============================================================================
// Lock-free store
// ============================================================================

/// `f32` stored as its bit pattern
#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

#[derive(Debug)]
struct AtomicBand {
    threshold_db: AtomicF32,
    attack_ms: AtomicF32,
    release_ms: AtomicF32,
    ratio: AtomicF32,
    bypass: AtomicBool,
    mute: AtomicBool,
    solo: AtomicBool,
}

impl AtomicBand {
    fn new(params: &BandParameters) -> Self {
        Self {
            threshold_db: AtomicF32::new(params.threshold_db),
            attack_ms: AtomicF32::new(params.attack_ms),
            release_ms: AtomicF32::new(params.release_ms),
            ratio: AtomicF32::new(params.ratio),
            bypass: AtomicBool::new(params.bypass),
            mute: AtomicBool::new(params.mute),
            solo: AtomicBool::new(params.solo),
        }
    }

    fn load(&self) -> BandParameters {
        BandParameters {
            threshold_db: self.threshold_db.load(),
            attack_ms: self.attack_ms.load(),
            release_ms: self.release_ms.load(),
            ratio: self.ratio.load(),
            bypass: self.bypass.load(Ordering::Relaxed),
            mute: self.mute.load(Ordering::Relaxed),
            solo: self.solo.load(Ordering::Relaxed),
        }
    }
}

/// Parameter store shared between a control thread and the audio thread
///
/// Setters clamp silently. Reads and writes are single relaxed atomic
/// operations per field, so a snapshot never tears a value and never blocks.
/// A snapshot may mix fields from before and after a concurrent multi-field
/// update; each field on its own is always a value some writer stored.
#[derive(Debug)]
pub struct SharedParameters {
    bands: [CachePadded<AtomicBand>; 3],
    low_mid_hz: AtomicF32,
    mid_high_hz: AtomicF32,
    gain_in_db: AtomicF32,
    gain_out_db: AtomicF32,
    master_bypass: AtomicBool,
}

impl SharedParameters {
    pub fn new() -> Self {
        Self::from_parameters(&EngineParameters::default())
    }

    pub fn from_parameters(params: &EngineParameters) -> Self {
        let params = params.sanitized();
        Self {
            bands: params.bands.map(|b| CachePadded::new(AtomicBand::new(&b))),
            low_mid_hz: AtomicF32::new(params.crossover.low_mid_hz),
            mid_high_hz: AtomicF32::new(params.crossover.mid_high_hz),
            gain_in_db: AtomicF32::new(params.gain_in_db),
            gain_out_db: AtomicF32::new(params.gain_out_db),
            master_bypass: AtomicBool::new(params.master_bypass),
        }
    }

    /// Copy every field out (audio thread, once per block)
    pub fn snapshot(&self) -> EngineParameters {
        EngineParameters {
            bands: [self.bands[0].load(), self.bands[1].load(), self.bands[2].load()],
            crossover: CrossoverParameters {
                low_mid_hz: self.low_mid_hz.load(),
                mid_high_hz: self.mid_high_hz.load(),
            },
            gain_in_db: self.gain_in_db.load(),
            gain_out_db: self.gain_out_db.load(),
            master_bypass: self.master_bypass.load(Ordering::Relaxed),
        }
    }

    /// Store a whole parameter set, clamped
    pub fn apply(&self, params: &EngineParameters) {
        let params = params.sanitized();
        for band in Band::ALL {
            let src = params.band(band);
            let dst = &self.bands[band.index()];
            dst.threshold_db.store(src.threshold_db);
            dst.attack_ms.store(src.attack_ms);
            dst.release_ms.store(src.release_ms);
            dst.ratio.store(src.ratio);
            dst.bypass.store(src.bypass, Ordering::Relaxed);
            dst.mute.store(src.mute, Ordering::Relaxed);
            dst.solo.store(src.solo, Ordering::Relaxed);
        }
        self.low_mid_hz.store(params.crossover.low_mid_hz);
        self.mid_high_hz.store(params.crossover.mid_high_hz);
        self.gain_in_db.store(params.gain_in_db);
        self.gain_out_db.store(params.gain_out_db);
        self.master_bypass.store(params.master_bypass, Ordering::Relaxed);
    }

    pub fn set_threshold(&self, band: Band, db: f32) {
        let value = clamp_or(db, limits::THRESHOLD_MIN_DB, limits::THRESHOLD_MAX_DB, 0.0);
        self.bands[band.index()].threshold_db.store(value);
    }

    pub fn set_attack(&self, band: Band, ms: f32) {
        let value = clamp_or(ms, limits::TIME_MIN_MS, limits::TIME_MAX_MS, 50.0);
        self.bands[band.index()].attack_ms.store(value);
    }

    pub fn set_release(&self, band: Band, ms: f32) {
        let value = clamp_or(ms, limits::TIME_MIN_MS, limits::TIME_MAX_MS, 250.0);
        self.bands[band.index()].release_ms.store(value);
    }

    pub fn set_ratio(&self, band: Band, ratio: f32) {
        self.bands[band.index()].ratio.store(clamp_ratio(ratio));
    }

    /// Select a ratio from `RATIO_CHOICES`
    pub fn set_ratio_choice(&self, band: Band, index: usize) {
        self.set_ratio(band, ratio_from_choice(index));
    }

    pub fn set_bypass(&self, band: Band, bypass: bool) {
        self.bands[band.index()].bypass.store(bypass, Ordering::Relaxed);
    }

    pub fn set_mute(&self, band: Band, mute: bool) {
        self.bands[band.index()].mute.store(mute, Ordering::Relaxed);
    }

    pub fn set_solo(&self, band: Band, solo: bool) {
        self.bands[band.index()].solo.store(solo, Ordering::Relaxed);
    }

    pub fn set_low_mid_crossover(&self, hz: f32) {
        let value = clamp_or(hz, limits::LOW_MID_MIN_HZ, limits::LOW_MID_MAX_HZ, 400.0);
        self.low_mid_hz.store(value);
    }

    pub fn set_mid_high_crossover(&self, hz: f32) {
        let value = clamp_or(hz, limits::MID_HIGH_MIN_HZ, limits::MID_HIGH_MAX_HZ, 2000.0);
        self.mid_high_hz.store(value);
    }

    pub fn set_gain_in(&self, db: f32) {
        let value = clamp_or(db, limits::GAIN_MIN_DB, limits::GAIN_MAX_DB, 0.0);
        self.gain_in_db.store(value);
    }

    pub fn set_gain_out(&self, db: f32) {
        let value = clamp_or(db, limits::GAIN_MIN_DB, limits::GAIN_MAX_DB, 0.0);
        self.gain_out_db.store(value);
    }

    pub fn set_master_bypass(&self, bypass: bool) {
        self.master_bypass.store(bypass, Ordering::Relaxed);
    }

    /// Generic setter for adapters that bind controls by name
    ///
    /// Toggles are on for values >= 0.5. Ratio takes the ratio itself, not
    /// a choice index.
    pub fn set(&self, id: ParameterId, value: f32) {
        let on = value >= 0.5;
        match id {
            ParameterId::Threshold(band) => self.set_threshold(band, value),
            ParameterId::Attack(band) => self.set_attack(band, value),
            ParameterId::Release(band) => self.set_release(band, value),
            ParameterId::Ratio(band) => self.set_ratio(band, value),
            ParameterId::Bypass(band) => self.set_bypass(band, on),
            ParameterId::Mute(band) => self.set_mute(band, on),
            ParameterId::Solo(band) => self.set_solo(band, on),
            ParameterId::LowMidCrossover => self.set_low_mid_crossover(value),
            ParameterId::MidHighCrossover => self.set_mid_high_crossover(value),
            ParameterId::GainIn => self.set_gain_in(value),
            ParameterId::GainOut => self.set_gain_out(value),
            ParameterId::MasterBypass => self.set_master_bypass(on),
        }
    }

    /// Current value of one parameter; toggles read as 0.0 / 1.0
    pub fn get(&self, id: ParameterId) -> f32 {
        let flag = |b: &AtomicBool| if b.load(Ordering::Relaxed) { 1.0 } else { 0.0 };
        match id {
            ParameterId::Threshold(band) => self.bands[band.index()].threshold_db.load(),
            ParameterId::Attack(band) => self.bands[band.index()].attack_ms.load(),
            ParameterId::Release(band) => self.bands[band.index()].release_ms.load(),
            ParameterId::Ratio(band) => self.bands[band.index()].ratio.load(),
            ParameterId::Bypass(band) => flag(&self.bands[band.index()].bypass),
            ParameterId::Mute(band) => flag(&self.bands[band.index()].mute),
            ParameterId::Solo(band) => flag(&self.bands[band.index()].solo),
            ParameterId::LowMidCrossover => self.low_mid_hz.load(),
            ParameterId::MidHighCrossover => self.mid_high_hz.load(),
            ParameterId::GainIn => self.gain_in_db.load(),
            ParameterId::GainOut => self.gain_out_db.load(),
            ParameterId::MasterBypass => flag(&self.master_bypass),
        }
    }
}

impl Default for SharedParameters {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Telemetry
// ============================================================================

/// Per-band gain reduction published by the engine once per block
///
/// Values are in dB and non-negative: 6.0 means the band is 6 dB quieter
/// than it would be uncompressed.
#[derive(Debug)]
pub struct GainReductionMeters {
    bands: [CachePadded<AtomicF32>; 3],
}

impl GainReductionMeters {
    pub fn new() -> Self {
        Self {
            bands: std::array::from_fn(|_| CachePadded::new(AtomicF32::new(0.0))),
        }
    }

    pub fn publish(&self, band: Band, reduction_db: f32) {
        self.bands[band.index()].store(reduction_db.max(0.0));
    }

    pub fn get(&self, band: Band) -> f32 {
        self.bands[band.index()].load()
    }

    pub fn snapshot(&self) -> [f32; 3] {
        Band::ALL.map(|band| self.get(band))
    }

    pub fn reset(&self) {
        for meter in &self.bands {
            meter.store(0.0);
        }
    }
}

impl Default for GainReductionMeters {
    fn default() -> Self {
        Self::new()
    }
}

//! Domain entities and business rules

pub mod audio;
pub mod config;
pub mod dsp;
pub mod mixer;
pub mod params;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{AudioBuffer, AudioError, ProcessSpec};
pub use config::{ConfigError, ConfigManager, EngineConfig, MbcompConfig};
pub use dsp::compressor::BandCompressor;
pub use dsp::crossover::{CrossoverFilter, CrossoverNetwork};
pub use dsp::filter::{FilterCoeffs, FilterKind, FilterStage, FilterState};
pub use dsp::gain::GainStage;
pub use dsp::{db_to_gain, gain_to_db};
pub use mixer::MixEngine;
pub use params::{
    Band, BandParameters, CrossoverParameters, EngineParameters, GainReductionMeters,
    ParameterId, SharedParameters, RATIO_CHOICES,
};

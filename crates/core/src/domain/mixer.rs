//! Multiband mix engine
//!
//! One call to [`MixEngine::process`] runs a whole block:
//!
//! ```text
//! snapshot → input gain → crossover → compressor x3 → solo/mute sum → output gain
//! ```
//!
//! All buffers are allocated in [`MixEngine::prepare`]; the per-block path
//! only reads atomics, does arithmetic and writes into preallocated memory.

use crate::domain::audio::{AudioBuffer, AudioError, ProcessSpec, Result};
use crate::domain::dsp::compressor::BandCompressor;
use crate::domain::dsp::crossover::CrossoverNetwork;
use crate::domain::dsp::gain::GainStage;
use crate::domain::dsp::DspStage;
use crate::domain::params::{Band, EngineParameters, GainReductionMeters, SharedParameters};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Three-band compressor engine
#[derive(Debug)]
pub struct MixEngine {
    params: Arc<SharedParameters>,
    meters: Arc<GainReductionMeters>,
    spec: Option<ProcessSpec>,
    input_gain: GainStage,
    output_gain: GainStage,
    crossover: CrossoverNetwork,
    compressors: [BandCompressor; 3],
    bands: [AudioBuffer; 3],
}

impl MixEngine {
    /// Create an unprepared engine reading from a shared parameter store
    pub fn new(params: Arc<SharedParameters>) -> Self {
        Self {
            params,
            meters: Arc::new(GainReductionMeters::new()),
            spec: None,
            input_gain: GainStage::new(),
            output_gain: GainStage::new(),
            crossover: CrossoverNetwork::new(),
            compressors: std::array::from_fn(|_| BandCompressor::new()),
            bands: std::array::from_fn(|_| AudioBuffer::new(1, 1)),
        }
    }

    /// Size every buffer and stage for a stream, clearing all state
    ///
    /// Must be called before the first block and whenever the sample rate,
    /// channel count or maximum block size changes. The audio callback must
    /// not be running while this executes.
    pub fn prepare(&mut self, spec: ProcessSpec) -> Result<()> {
        spec.validate()?;

        self.bands = std::array::from_fn(|_| AudioBuffer::new(spec.channels, spec.max_block_size));
        self.crossover.prepare(&spec);
        for compressor in self.compressors.iter_mut() {
            compressor.prepare(&spec);
        }
        self.input_gain.prepare(&spec);
        self.output_gain.prepare(&spec);

        // Start from the current settings instead of ramping in from unity
        let params = self.params.snapshot().sanitized();
        self.crossover.set_cutoffs(&params.crossover);
        for band in Band::ALL {
            self.compressors[band.index()].set_parameters(params.band(band));
        }
        self.input_gain.set_gain_db_immediate(params.gain_in_db);
        self.output_gain.set_gain_db_immediate(params.gain_out_db);
        self.meters.reset();

        self.spec = Some(spec);
        info!(
            sample_rate = spec.sample_rate,
            max_block_size = spec.max_block_size,
            channels = spec.channels,
            "Mix engine prepared"
        );
        Ok(())
    }

    /// Validate a full parameter set and publish it to the store
    ///
    /// Rejects crossover cutoffs that are not strictly ordered; every other
    /// value is clamped.
    pub fn set_parameters(&self, params: &EngineParameters) -> Result<()> {
        params.crossover.validate()?;
        self.params.apply(params);
        debug!("Engine parameters replaced");
        Ok(())
    }

    /// Process one block in place against a fresh parameter snapshot
    pub fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()> {
        let params = self.params.snapshot();
        self.process_with(&params, buffer)
    }

    /// Process one block in place against an explicit snapshot
    pub fn process_with(&mut self, params: &EngineParameters, buffer: &mut AudioBuffer) -> Result<()> {
        let spec = self.spec.ok_or(AudioError::NotPrepared)?;
        if buffer.num_channels() != spec.channels {
            return Err(AudioError::ChannelMismatch {
                expected: spec.channels,
                actual: buffer.num_channels(),
            });
        }
        if buffer.len() > spec.max_block_size {
            return Err(AudioError::BlockTooLarge {
                max: spec.max_block_size,
                actual: buffer.len(),
            });
        }

        let params = params.sanitized();
        if params.is_global_bypass() {
            for band in Band::ALL {
                self.meters.publish(band, 0.0);
            }
            // Bypassing every band skips the split but keeps gain staging,
            // so toggling the last band does not jump by the trim settings
            if !params.master_bypass {
                self.input_gain.set_target_gain_db(params.gain_in_db);
                self.output_gain.set_target_gain_db(params.gain_out_db);
                self.input_gain.process_in_place(buffer);
                self.output_gain.process_in_place(buffer);
            }
            return Ok(());
        }

        self.input_gain.set_target_gain_db(params.gain_in_db);
        self.input_gain.process_in_place(buffer);

        self.crossover.set_cutoffs(&params.crossover);
        self.crossover.split(buffer, &mut self.bands);

        for band in Band::ALL {
            let compressor = &mut self.compressors[band.index()];
            compressor.set_parameters(params.band(band));
            compressor.process_in_place(&mut self.bands[band.index()]);

            let reduction = if compressor.is_bypassed() {
                0.0
            } else {
                compressor.gain_reduction_db()
            };
            self.meters.publish(band, reduction);
        }

        buffer.clear();
        let any_solo = params.any_solo();
        for band in Band::ALL {
            if params.is_audible(band, any_solo) {
                buffer.add_from(&self.bands[band.index()]);
            }
        }

        self.output_gain.set_target_gain_db(params.gain_out_db);
        self.output_gain.process_in_place(buffer);

        trace!(frames = buffer.len(), any_solo, "Block processed");
        Ok(())
    }

    /// Clear filter, envelope and ramp state without reallocating
    pub fn reset(&mut self) {
        self.crossover.reset();
        for compressor in self.compressors.iter_mut() {
            compressor.reset();
        }
        self.input_gain.reset();
        self.output_gain.reset();
        self.meters.reset();
    }

    pub fn is_prepared(&self) -> bool {
        self.spec.is_some()
    }

    pub fn spec(&self) -> Option<ProcessSpec> {
        self.spec
    }

    /// Store this engine reads its per-block snapshot from
    pub fn parameters(&self) -> &Arc<SharedParameters> {
        &self.params
    }

    /// Gain-reduction telemetry, refreshed once per block
    pub fn meters(&self) -> Arc<GainReductionMeters> {
        Arc::clone(&self.meters)
    }

    pub fn crossover(&self) -> &CrossoverNetwork {
        &self.crossover
    }

    pub fn compressor(&self, band: Band) -> &BandCompressor {
        &self.compressors[band.index()]
    }

    /// Band signal of the last processed block, after compression
    pub fn band_buffer(&self, band: Band) -> &AudioBuffer {
        &self.bands[band.index()]
    }

    pub fn input_gain(&self) -> &GainStage {
        &self.input_gain
    }

    pub fn output_gain(&self) -> &GainStage {
        &self.output_gain
    }
}

impl Default for MixEngine {
    fn default() -> Self {
        Self::new(Arc::new(SharedParameters::new()))
    }
}

//! Offline rendering through the mix engine
//!
//! Audio is fed to `MixEngine` in blocks of at most `max_block_size`
//! frames through one preallocated planar buffer, exactly as a real-time
//! callback would: deinterleave, process, interleave.

use super::wav::{read_wav, write_wav};
use mbcomp_core::domain::audio::{AudioBuffer, AudioError, ProcessSpec, Result};
use mbcomp_core::domain::mixer::MixEngine;
use mbcomp_core::domain::params::{Band, SharedParameters};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Summary of one render
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderReport {
    pub sample_rate: f32,
    pub channels: usize,
    pub block_size: usize,
    pub frames: usize,
    pub blocks: usize,
    pub input_peak: f32,
    pub output_peak: f32,
    /// Largest per-block gain reduction seen in each band (dB)
    pub peak_reduction_db: [f32; 3],
}

impl RenderReport {
    fn new(spec: &ProcessSpec) -> Self {
        Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            block_size: spec.max_block_size,
            frames: 0,
            blocks: 0,
            input_peak: 0.0,
            output_peak: 0.0,
            peak_reduction_db: [0.0; 3],
        }
    }

    pub fn peak_reduction(&self, band: Band) -> f32 {
        self.peak_reduction_db[band.index()]
    }
}

/// Drives a prepared `MixEngine` over whole signals
pub struct OfflineRenderer {
    engine: MixEngine,
    buffer: AudioBuffer,
    spec: ProcessSpec,
}

impl OfflineRenderer {
    /// Prepare an engine for `spec`, reading parameters from `params`
    pub fn new(params: Arc<SharedParameters>, spec: ProcessSpec) -> Result<Self> {
        let mut engine = MixEngine::new(params);
        engine.prepare(spec)?;
        Ok(Self {
            engine,
            buffer: AudioBuffer::new(spec.channels, spec.max_block_size),
            spec,
        })
    }

    pub fn spec(&self) -> ProcessSpec {
        self.spec
    }

    pub fn engine(&self) -> &MixEngine {
        &self.engine
    }

    /// Render an interleaved signal, returning the processed signal
    pub fn render(&mut self, input: &[f32]) -> Result<(Vec<f32>, RenderReport)> {
        let mut output = vec![0.0; input.len()];
        let report = self.render_into(input, &mut output)?;
        Ok((output, report))
    }

    /// Render an interleaved signal into `output` (same length as `input`)
    pub fn render_into(&mut self, input: &[f32], output: &mut [f32]) -> Result<RenderReport> {
        let channels = self.spec.channels;
        if input.len() % channels != 0 {
            return Err(AudioError::InvalidConfiguration(format!(
                "{} samples is not a whole number of {}-channel frames",
                input.len(),
                channels
            )));
        }
        if output.len() != input.len() {
            return Err(AudioError::InvalidConfiguration(format!(
                "output holds {} samples, input {}",
                output.len(),
                input.len()
            )));
        }

        let meters = self.engine.meters();
        let chunk = self.spec.max_block_size * channels;
        let mut report = RenderReport::new(&self.spec);

        for (src, dst) in input.chunks(chunk).zip(output.chunks_mut(chunk)) {
            let frames = self.buffer.deinterleave_from(src, channels);
            report.input_peak = report.input_peak.max(self.buffer.peak());

            self.engine.process(&mut self.buffer)?;

            self.buffer.interleave_into(dst);
            report.output_peak = report.output_peak.max(self.buffer.peak());
            for band in Band::ALL {
                let slot = &mut report.peak_reduction_db[band.index()];
                *slot = slot.max(meters.get(band));
            }
            report.frames += frames;
            report.blocks += 1;
        }

        debug!(frames = report.frames, blocks = report.blocks, "Render complete");
        Ok(report)
    }
}

/// Render a WAV file through a fresh engine
///
/// The engine is prepared with the file's sample rate and channel count.
pub fn render_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    params: Arc<SharedParameters>,
    block_size: usize,
) -> Result<RenderReport> {
    let started = Instant::now();
    let source = read_wav(input.as_ref())?;
    let spec = ProcessSpec::new(source.sample_rate as f32, block_size, source.channels);

    info!(
        input = %input.as_ref().display(),
        output = %output.as_ref().display(),
        block_size,
        "Rendering file"
    );

    let mut renderer = OfflineRenderer::new(params, spec)?;
    let (processed, report) = renderer.render(&source.samples)?;
    write_wav(output.as_ref(), source.sample_rate, source.channels, &processed)?;

    info!(
        frames = report.frames,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "File rendered"
    );
    Ok(report)
}

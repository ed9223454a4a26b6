//! WAV file reading and writing
//!
//! Integer sources are normalized to [-1, 1]; output is always 32-bit float.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use mbcomp_core::domain::audio::{AudioError, Result};
use std::path::Path;
use tracing::{debug, info};

/// Decoded file contents
#[derive(Debug, Clone, PartialEq)]
pub struct WavData {
    pub sample_rate: u32,
    pub channels: usize,
    /// Interleaved samples
    pub samples: Vec<f32>,
}

impl WavData {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }
}

fn stream_error(context: &str, err: hound::Error) -> AudioError {
    match err {
        hound::Error::Unsupported => {
            AudioError::UnsupportedConfiguration(format!("{}: unsupported WAV format", context))
        }
        other => AudioError::StreamError(format!("{}: {}", context, other)),
    }
}

/// Read a WAV file into interleaved `f32` samples
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<WavData> {
    let path = path.as_ref();
    let mut reader =
        WavReader::open(path).map_err(|e| stream_error("Failed to open WAV file", e))?;
    let spec = reader.spec();

    let samples: std::result::Result<Vec<f32>, hound::Error> = match spec.sample_format {
        SampleFormat::Float => {
            if spec.bits_per_sample != 32 {
                return Err(AudioError::UnsupportedConfiguration(format!(
                    "{}-bit float WAV",
                    spec.bits_per_sample
                )));
            }
            reader.samples::<f32>().collect()
        }
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(AudioError::UnsupportedConfiguration(format!(
                    "{}-bit integer WAV",
                    spec.bits_per_sample
                )));
            }
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect()
        }
    };
    let samples = samples.map_err(|e| stream_error("Failed to read samples", e))?;

    let data = WavData {
        sample_rate: spec.sample_rate,
        channels: spec.channels as usize,
        samples,
    };
    info!(
        path = %path.display(),
        sample_rate = data.sample_rate,
        channels = data.channels,
        frames = data.frames(),
        "WAV file read"
    );
    Ok(data)
}

/// Write interleaved samples as a 32-bit float WAV file
pub fn write_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: usize,
    samples: &[f32],
) -> Result<()> {
    let path = path.as_ref();
    let channel_count = u16::try_from(channels)
        .ok()
        .filter(|&c| c > 0)
        .ok_or_else(|| {
            AudioError::InvalidConfiguration(format!("cannot write {} channels", channels))
        })?;
    if sample_rate == 0 {
        return Err(AudioError::InvalidConfiguration(
            "sample rate must be positive".to_string(),
        ));
    }
    if samples.len() % channels != 0 {
        return Err(AudioError::InvalidConfiguration(format!(
            "{} samples is not a whole number of {}-channel frames",
            samples.len(),
            channels
        )));
    }

    let spec = WavSpec {
        channels: channel_count,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer =
        WavWriter::create(path, spec).map_err(|e| stream_error("Failed to create WAV writer", e))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| stream_error("Failed to write sample", e))?;
    }
    writer
        .finalize()
        .map_err(|e| stream_error("Failed to finalize WAV file", e))?;

    debug!(
        path = %path.display(),
        frames = samples.len() / channels,
        "WAV file written"
    );
    Ok(())
}

//! Audio buffers, stream shape and the errors of the processing path
//!
//! Everything here is platform-agnostic. File and device adapters live in
//! the `infra` crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while configuring or driving the engine
///
/// Variants returned from the per-block path carry plain integers so that
/// reporting them never allocates.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AudioError {
    /// Invalid sample rate, channel count, block size or crossover ordering
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// `process` was called before `prepare`
    #[error("Engine used before prepare")]
    NotPrepared,

    /// Buffer channel count differs from the prepared channel count
    #[error("Channel mismatch: prepared for {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    /// Buffer holds more frames than the prepared maximum block size
    #[error("Block too large: maximum {max} frames, got {actual}")]
    BlockTooLarge { max: usize, actual: usize },

    /// Error while reading or writing an audio stream
    #[error("Stream error: {0}")]
    StreamError(String),

    /// Source uses a format the adapters cannot convert
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Stream shape fixed for one prepare lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessSpec {
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Largest block the host will ever pass to `process`
    pub max_block_size: usize,
    /// Number of channels per block
    pub channels: usize,
}

impl ProcessSpec {
    pub fn new(sample_rate: f32, max_block_size: usize, channels: usize) -> Self {
        Self {
            sample_rate,
            max_block_size,
            channels,
        }
    }

    /// Check the stream shape before any state is allocated for it
    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(AudioError::InvalidConfiguration(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.max_block_size == 0 {
            return Err(AudioError::InvalidConfiguration(
                "maximum block size must be at least 1".to_string(),
            ));
        }
        if self.channels == 0 {
            return Err(AudioError::InvalidConfiguration(
                "channel count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ProcessSpec {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            max_block_size: 512,
            channels: 2,
        }
    }
}

/// Rectangular planar sample buffer (channels x frames)
///
/// Storage is allocated once for `capacity` frames per channel. The active
/// length can shrink and grow within that capacity without touching the
/// allocator, which is what the per-block path relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    data: Vec<f32>,
    channels: usize,
    capacity: usize,
    len: usize,
}

impl AudioBuffer {
    /// Create a zeroed buffer whose active length equals its capacity
    pub fn new(channels: usize, capacity: usize) -> Self {
        let channels = channels.max(1);
        let capacity = capacity.max(1);
        Self {
            data: vec![0.0; channels * capacity],
            channels,
            capacity,
            len: capacity,
        }
    }

    /// Build a buffer from per-channel sample vectors
    ///
    /// Shorter channels are zero-padded to the longest one.
    pub fn from_channels(channels: &[Vec<f32>]) -> Self {
        let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        let mut buffer = Self::new(channels.len(), frames);
        for (dst, src) in buffer.channels_mut().zip(channels) {
            dst[..src.len()].copy_from_slice(src);
        }
        buffer.len = frames;
        buffer
    }

    pub fn num_channels(&self) -> usize {
        self.channels
    }

    /// Active frames per channel
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the active length, clamped to capacity
    ///
    /// Returns the length actually set. Never reallocates.
    pub fn set_len(&mut self, len: usize) -> usize {
        self.len = len.min(self.capacity);
        self.len
    }

    /// Active samples of one channel
    pub fn channel(&self, channel: usize) -> &[f32] {
        let start = channel * self.capacity;
        &self.data[start..start + self.len]
    }

    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        let start = channel * self.capacity;
        &mut self.data[start..start + self.len]
    }

    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        let len = self.len;
        self.data.chunks(self.capacity).map(move |c| &c[..len])
    }

    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        let len = self.len;
        self.data.chunks_mut(self.capacity).map(move |c| &mut c[..len])
    }

    /// Zero the active region
    pub fn clear(&mut self) {
        for channel in self.channels_mut() {
            channel.fill(0.0);
        }
    }

    /// Copy `other` into this buffer, adopting its active length
    ///
    /// Copies as many channels and frames as fit; capacity is never changed.
    pub fn copy_from(&mut self, other: &AudioBuffer) {
        self.set_len(other.len);
        for (dst, src) in self.channels_mut().zip(other.channels()) {
            let n = dst.len().min(src.len());
            dst[..n].copy_from_slice(&src[..n]);
        }
    }

    /// Sum `other` into this buffer over the common active region
    pub fn add_from(&mut self, other: &AudioBuffer) {
        for (dst, src) in self.channels_mut().zip(other.channels()) {
            for (d, s) in dst.iter_mut().zip(src.iter()) {
                *d += s;
            }
        }
    }

    /// Multiply every active sample by a constant linear gain
    pub fn apply_gain(&mut self, gain: f32) {
        for channel in self.channels_mut() {
            for sample in channel.iter_mut() {
                *sample *= gain;
            }
        }
    }

    /// Largest absolute sample value over all channels
    pub fn peak(&self) -> f32 {
        self.channels()
            .flat_map(|c| c.iter())
            .fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }

    /// Fill from interleaved frames, returning the number of frames taken
    ///
    /// Reads at most `capacity` frames. Missing channels in `interleaved`
    /// (when `source_channels` is smaller) are left silent.
    pub fn deinterleave_from(&mut self, interleaved: &[f32], source_channels: usize) -> usize {
        let source_channels = source_channels.max(1);
        let frames = (interleaved.len() / source_channels).min(self.capacity);
        self.len = frames;
        let capacity = self.capacity;
        for (ch, dst) in self.data.chunks_mut(capacity).enumerate() {
            if ch >= source_channels {
                dst[..frames].fill(0.0);
                continue;
            }
            for (frame, sample) in dst[..frames].iter_mut().enumerate() {
                *sample = interleaved[frame * source_channels + ch];
            }
        }
        frames
    }

    /// Write the active region as interleaved frames, returning frames written
    pub fn interleave_into(&self, out: &mut [f32]) -> usize {
        let frames = (out.len() / self.channels).min(self.len);
        for (ch, src) in self.channels().enumerate() {
            for (frame, sample) in src[..frames].iter().enumerate() {
                out[frame * self.channels + ch] = *sample;
            }
        }
        frames
    }
}

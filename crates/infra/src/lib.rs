//! I/O adapters around the mbcomp core
//!
//! The core only knows planar blocks. This crate turns files into blocks
//! and drives `MixEngine` over them the way a host callback would.

pub mod audio;

pub use audio::renderer::{render_file, OfflineRenderer, RenderReport};
pub use audio::wav::{read_wav, write_wav, WavData};

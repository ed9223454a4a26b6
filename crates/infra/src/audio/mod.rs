//! Audio file and offline stream adapters
//!
//! - `wav`: WAV reading/writing through `hound`, normalized to `f32`
//! - `renderer`: block-by-block rendering through a prepared `MixEngine`

pub mod renderer;
pub mod wav;

pub use renderer::*;
pub use wav::*;

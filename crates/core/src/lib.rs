//! Multiband dynamics core
//!
//! Splits a block of audio into low, mid and high bands with a
//! phase-compensated Linkwitz-Riley crossover, compresses each band
//! independently and remixes them under solo/mute/bypass control with
//! ramped input and output gain.
//!
//! The processing path (`domain::mixer::MixEngine` and the stages in
//! `domain::dsp`) never allocates, locks or blocks once prepared.

pub mod domain;

pub use domain::*;

//! Audio preprocessing
//!
//! Conversion of raw interleaved PCM into the mono `f64` samples the
//! pipeline consumes.

pub mod channel_mixer;

pub use channel_mixer::{interleaved_to_mono, pcm_i16_to_f64};

//! Onset features computed once per window
//!
//! - Spectral impulse: positive spectral change in the lower band
//! - Trailing moving-average denoiser
//! - Volume measures (RMS, spectral sum, low-frequency sum)

pub mod denoise;
pub mod impulse;
pub mod volume;

pub use denoise::trailed_moving_average;
pub use impulse::spectral_impulse;
pub use volume::{low_frequency_volume, rms_volume, spectral_volume};

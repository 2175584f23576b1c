//! Feature extraction modules
//!
//! - Spectral analysis (FFT, tapers, direct DFT)
//! - Onset features (impulse, denoising, volumes)
//! - Period estimation (periodicity and harmonic searches)
//! - Beat tracking (tempo estimation + per-window decision)

pub mod beat_tracking;
pub mod onset;
pub mod period;
pub mod spectral;

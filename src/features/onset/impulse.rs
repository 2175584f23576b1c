//! Spectral impulse (onset strength between consecutive windows)
//!
//! `impulse[n] = Σ_{i < len·fraction} max(0, S_n[i] - S_{n-1}[i])`
//!
//! Only rising energy counts, and only in the lower part of the spectrum
//! (a third by default), where kicks and bass lines live.

use crate::error::{Result, TrackerError};

/// Onset strength of `current` relative to `previous`
///
/// # Arguments
///
/// * `current` - Spectrum of the newest window
/// * `previous` - Spectrum of the window before it
/// * `band_fraction` - Fraction of the spectrum (from DC) to sum, in (0, 1]
///
/// # Errors
///
/// Returns `SizeMismatch` if the spectra differ in length, `InvalidInput`
/// if `band_fraction` is outside (0, 1].
pub fn spectral_impulse(current: &[f64], previous: &[f64], band_fraction: f64) -> Result<f64> {
    if current.len() != previous.len() {
        return Err(TrackerError::SizeMismatch {
            expected: previous.len(),
            actual: current.len(),
        });
    }

    if !(band_fraction > 0.0 && band_fraction <= 1.0) {
        return Err(TrackerError::InvalidInput(format!(
            "impulse band fraction must be in (0, 1], got {}",
            band_fraction
        )));
    }

    let band = (current.len() as f64 * band_fraction) as usize;
    Ok(current[..band]
        .iter()
        .zip(&previous[..band])
        .map(|(c, p)| (c - p).max(0.0))
        .sum())
}

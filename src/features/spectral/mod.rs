//! Spectral analysis
//!
//! - [`SpectralEngine`]: power-of-two FFT with precomputed twiddles
//! - [`Taper`] / [`PaddingPolicy`]: windowing applied before the transform
//! - [`single_bin_dft`] / [`sparse_bin_dft`]: direct DFT at a fractional bin
//! - Spectrum scaling applied before spectra are stored or differentiated

pub mod dft;
pub mod fft;
pub mod taper;

pub use dft::{single_bin_dft, sparse_bin_dft, BinResponse};
pub use fft::SpectralEngine;
pub use taper::{PaddingPolicy, Taper};

/// Compress a power spectrum in place: `x ← log10(1 + x)`
pub fn log_compress(spectrum: &mut [f64]) {
    for x in spectrum.iter_mut() {
        *x = (1.0 + *x).log10();
    }
}

/// Convert a power spectrum to amplitudes in place
pub fn sqrt_in_place(spectrum: &mut [f64]) {
    for x in spectrum.iter_mut() {
        *x = x.max(0.0).sqrt();
    }
}

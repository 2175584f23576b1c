//! Direct single-frequency DFT
//!
//! Evaluates one (possibly fractional) bin by direct summation, independent of
//! the power-of-two machinery in [`fft`](super::fft). A bin is expressed in
//! cycles per window: bin 2.5 is a sinusoid completing two and a half periods
//! across the window.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Response of a signal at one frequency bin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinResponse {
    /// Squared magnitude (no square root: only comparisons are needed)
    pub power: f64,
    /// Phase in cycles, `atan2(im, re) / 2π`
    pub phase: f64,
}

/// DFT of `window` at fractional `bin`
///
/// `X(bin) = Σ x[j] · e^{-2πi · bin · j / len}`
pub fn single_bin_dft(window: &[f64], bin: f64) -> BinResponse {
    sparse_bin_dft(
        window.iter().copied().enumerate(),
        window.len(),
        bin,
    )
}

/// DFT at fractional `bin` over `(index, value)` pairs of a window of `len`
///
/// Samples that are absent are treated as zero, so a compacted signal keeps
/// its phase alignment as long as each value carries its original index.
pub fn sparse_bin_dft<I>(samples: I, len: usize, bin: f64) -> BinResponse
where
    I: IntoIterator<Item = (usize, f64)>,
{
    if len == 0 {
        return BinResponse {
            power: 0.0,
            phase: 0.0,
        };
    }

    let omega = 2.0 * PI * bin / len as f64;
    let (mut re, mut im) = (0.0f64, 0.0f64);
    for (j, x) in samples {
        let angle = omega * j as f64;
        re += x * angle.cos();
        im -= x * angle.sin();
    }

    BinResponse {
        power: re * re + im * im,
        phase: im.atan2(re) / (2.0 * PI),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::spectral::{SpectralEngine, Taper};

    #[test]
    fn test_integer_bin_matches_fft() {
        let n = 32;
        let window: Vec<f64> = (0..n)
            .map(|i| (i as f64 * 0.37).sin() + 0.25 * (i as f64 * 1.3).cos())
            .collect();

        let mut engine = SpectralEngine::new(n).unwrap();
        let power = engine.transform(&window, Taper::Rectangular).unwrap();

        for k in 0..n {
            let dft = single_bin_dft(&window, k as f64);
            assert!((dft.power - power[k]).abs() < 1e-9, "bin {}", k);
            let fft_phase = engine.phase_at(k).unwrap();
            if power[k] > 1e-6 {
                let diff = (dft.phase - fft_phase).abs();
                assert!(diff < 1e-9 || (diff - 1.0).abs() < 1e-9, "phase bin {}", k);
            }
        }
    }

    #[test]
    fn test_fractional_bin_peaks_at_true_frequency() {
        let n = 200;
        let cycles = 7.4;
        let window: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * cycles * i as f64 / n as f64).cos())
            .collect();

        let at_peak = single_bin_dft(&window, cycles).power;
        assert!(at_peak > single_bin_dft(&window, 7.0).power);
        assert!(at_peak > single_bin_dft(&window, 8.0).power);
        assert!(at_peak > single_bin_dft(&window, 7.2).power);
    }

    #[test]
    fn test_sparse_equals_dense_with_zeros() {
        let mut window = vec![0.0; 50];
        window[3] = 1.0;
        window[20] = 0.5;
        window[41] = 2.0;

        let dense = single_bin_dft(&window, 3.3);
        let sparse = sparse_bin_dft(vec![(3, 1.0), (20, 0.5), (41, 2.0)], 50, 3.3);
        assert!((dense.power - sparse.power).abs() < 1e-12);
        assert!((dense.phase - sparse.phase).abs() < 1e-12);
    }

    #[test]
    fn test_empty_window() {
        let response = single_bin_dft(&[], 2.0);
        assert_eq!(response.power, 0.0);
    }
}

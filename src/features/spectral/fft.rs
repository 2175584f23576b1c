//! Power-of-two FFT engine with interchangeable tapers
//!
//! The engine is built once for a nominal window length `L`. It rounds the
//! transform size up to `W = next_pow2(L)` and precomputes a table of `W/2`
//! twiddle factors and a bit-reversal permutation of size `W`, so a transform
//! costs only the `log2(W)` butterfly stages.
//!
//! # Algorithm
//!
//! 1. Zero-pad the window to `W` (placement set by [`PaddingPolicy`])
//! 2. Apply the taper at each padded position
//! 3. Scatter into a complex buffer in bit-reversed order
//! 4. Run iterative radix-2 butterflies using the precomputed twiddles
//! 5. Return `|X[k]|²` for all `W` bins
//!
//! The power spectrum is NOT truncated to the first half: bins `k` and
//! `W - k` of a real input carry the same power.
//!
//! # Example
//!
//! ```
//! use stratum_live::features::spectral::{SpectralEngine, Taper};
//!
//! let mut engine = SpectralEngine::new(16)?;
//! let window: Vec<f64> = (0..16)
//!     .map(|i| (2.0 * std::f64::consts::PI * 3.0 * i as f64 / 16.0).cos())
//!     .collect();
//! let power = engine.transform(&window, Taper::Rectangular)?;
//! assert!((power[3] - 64.0).abs() < 1e-9);
//! # Ok::<(), stratum_live::TrackerError>(())
//! ```

use super::taper::{PaddingPolicy, Taper};
use crate::error::{Result, TrackerError};
use rustfft::num_complex::Complex;
use std::f64::consts::PI;

/// Radix-2 FFT engine for one window length
#[derive(Debug, Clone)]
pub struct SpectralEngine {
    input_len: usize,
    size: usize,
    start_offset: usize,
    twiddles: Vec<Complex<f64>>,
    bit_reverse: Vec<usize>,
    buffer: Vec<Complex<f64>>,
}

impl SpectralEngine {
    /// Create an engine for windows of `input_len` samples, left-aligned
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if `input_len` is zero.
    pub fn new(input_len: usize) -> Result<Self> {
        Self::with_padding(input_len, PaddingPolicy::Left)
    }

    /// Create an engine with an explicit zero-padding placement
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if `input_len` is zero or the padding
    /// offset would place samples outside the transform buffer.
    pub fn with_padding(input_len: usize, padding: PaddingPolicy) -> Result<Self> {
        if input_len == 0 {
            return Err(TrackerError::ConfigurationError(
                "FFT window length must be > 0".to_string(),
            ));
        }

        let size = input_len.next_power_of_two();
        let start_offset = padding.start_offset(input_len, size);
        if start_offset > size - input_len {
            return Err(TrackerError::ConfigurationError(format!(
                "padding offset {} leaves no room for {} samples in a {}-point transform",
                start_offset, input_len, size
            )));
        }

        let twiddles = (0..size / 2)
            .map(|r| {
                let angle = 2.0 * PI * r as f64 / size as f64;
                Complex::new(angle.cos(), -angle.sin())
            })
            .collect();

        let bits = size.trailing_zeros();
        let bit_reverse = (0..size)
            .map(|r| {
                if bits == 0 {
                    0
                } else {
                    r.reverse_bits() >> (usize::BITS - bits)
                }
            })
            .collect();

        log::trace!(
            "Spectral engine: {} samples -> {}-point FFT, offset {}",
            input_len,
            size,
            start_offset
        );

        Ok(Self {
            input_len,
            size,
            start_offset,
            twiddles,
            bit_reverse,
            buffer: vec![Complex::new(0.0, 0.0); size],
        })
    }

    /// Nominal window length this engine accepts
    pub fn input_len(&self) -> usize {
        self.input_len
    }

    /// Transform size `W` (power of two)
    pub fn size(&self) -> usize {
        self.size
    }

    /// Offset of the first sample inside the padded buffer
    pub fn start_offset(&self) -> usize {
        self.start_offset
    }

    /// Compute the power spectrum of `window` with the given taper
    ///
    /// Returns the `W` squared magnitudes. The complex result is retained for
    /// [`phases`](Self::phases) until the next call.
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` if `window.len()` differs from
    /// [`input_len`](Self::input_len).
    pub fn transform(&mut self, window: &[f64], taper: Taper) -> Result<Vec<f64>> {
        let mut power = vec![0.0; self.size];
        self.transform_into(window, taper, &mut power)?;
        Ok(power)
    }

    /// Same as [`transform`](Self::transform), writing into `power`
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` if `window` or `power` have the wrong length.
    pub fn transform_into(&mut self, window: &[f64], taper: Taper, power: &mut [f64]) -> Result<()> {
        if window.len() != self.input_len {
            return Err(TrackerError::SizeMismatch {
                expected: self.input_len,
                actual: window.len(),
            });
        }
        if power.len() != self.size {
            return Err(TrackerError::SizeMismatch {
                expected: self.size,
                actual: power.len(),
            });
        }

        // Padded positions get zero; samples are tapered at their padded position
        for r in 0..self.size {
            let value = if r >= self.start_offset && r < self.start_offset + self.input_len {
                window[r - self.start_offset] * taper.coefficient(r, self.size)
            } else {
                0.0
            };
            self.buffer[self.bit_reverse[r]] = Complex::new(value, 0.0);
        }

        self.butterflies();

        for (out, x) in power.iter_mut().zip(self.buffer.iter()) {
            *out = x.norm_sqr();
        }

        Ok(())
    }

    /// Iterative radix-2 stages over the bit-reversed buffer
    fn butterflies(&mut self) {
        let mut step = 2;
        while step <= self.size {
            let half = step / 2;
            let twiddle_stride = self.size / step;

            for offset in 0..half {
                let w = self.twiddles[offset * twiddle_stride];
                let mut a = offset;
                while a < self.size {
                    let b = a + half;
                    let t = self.buffer[b] * w;
                    self.buffer[b] = self.buffer[a] - t;
                    self.buffer[a] += t;
                    a += step;
                }
            }

            step *= 2;
        }
    }

    /// Phases of the most recent transform, in cycles (`atan2(im, re) / 2π`)
    ///
    /// Bins whose real and imaginary parts are both within `threshold` of zero
    /// are reported as exactly 0, which removes the noise of near-empty bins.
    pub fn phases(&self, threshold: f64) -> Vec<f64> {
        self.buffer
            .iter()
            .map(|x| {
                if x.re.abs() > threshold || x.im.abs() > threshold {
                    x.im.atan2(x.re) / (2.0 * PI)
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Phase of a single bin of the most recent transform, in cycles
    pub fn phase_at(&self, bin: usize) -> Option<f64> {
        self.buffer.get(bin).map(|x| x.im.atan2(x.re) / (2.0 * PI))
    }
}

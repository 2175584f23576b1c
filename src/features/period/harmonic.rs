//! Harmonic-weighted tempo search
//!
//! A beat period rarely shows up as a single clean spectral line: the impulse
//! spectrum carries energy at the fundamental and at every multiple of it.
//! This search folds several octaves of one power spectrum onto a common axis
//! so that energy at `f, 2f, 4f, ...` reinforces a single candidate.
//!
//! # Algorithm
//!
//! 1. Blackman-Harris power spectrum of the impulse interval (`M` samples,
//!    padded to `W = next_pow2(M)`)
//! 2. Map the low bracket bin to the padded grid: `base = floor(low · W / M)`
//! 3. For octave `j = 0..count`, resample `[base · 2^j, base · 2^(j+1))` at
//!    `points` positions with linear interpolation, weighted by
//!    `1 + weight_step · j`
//! 4. The position with the largest combined energy maps back to a bin in
//!    cycles per interval
//!
//! Positions that fall past the end of the spectrum contribute nothing.

use super::BinEstimate;
use crate::error::{Result, TrackerError};
use crate::features::spectral::{SpectralEngine, Taper};

/// Octave-folding search over a padded power spectrum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicSearch {
    points: usize,
    count: usize,
    weight_step: f64,
}

impl HarmonicSearch {
    /// Create a search resampling each octave at `points` positions across
    /// `count` octaves, with weights `1 + weight_step · j`
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if `points` or `count` is 0.
    pub fn new(points: usize, count: usize, weight_step: f64) -> Result<Self> {
        if points == 0 || count == 0 {
            return Err(TrackerError::ConfigurationError(format!(
                "harmonic search needs points and octaves (got {} points, {} octaves)",
                points, count
            )));
        }

        Ok(Self {
            points,
            count,
            weight_step,
        })
    }

    /// Find the harmonic-weighted best bin above `low_bin`
    ///
    /// # Arguments
    ///
    /// * `engine` - Spectral engine built for the interval length
    /// * `impulses` - Impulse interval of `engine.input_len()` samples
    /// * `low_bin` - Lower bracket, in cycles per interval
    ///
    /// # Returns
    ///
    /// The best bin in cycles per interval and its combined energy.
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` if the interval length differs from the engine's,
    /// `InvalidInput` if `low_bin` maps below the first bin of the padded
    /// spectrum.
    pub fn search(
        &self,
        engine: &mut SpectralEngine,
        impulses: &[f64],
        low_bin: f64,
    ) -> Result<BinEstimate> {
        let spectrum = engine.transform(impulses, Taper::BlackmanHarris)?;

        let padding_ratio = engine.size() as f64 / engine.input_len() as f64;
        let base = (low_bin * padding_ratio) as usize;
        if base == 0 {
            return Err(TrackerError::InvalidInput(format!(
                "harmonic search bracket {:.3} is below the first spectral bin",
                low_bin
            )));
        }

        let mut combined = vec![0.0; self.points];
        let mut clipped = 0usize;
        let mut start = base as f64;
        let mut width = base as f64;
        for octave in 0..self.count {
            let weight = 1.0 + self.weight_step * octave as f64;
            let step = width / self.points as f64;

            for (k, energy) in combined.iter_mut().enumerate() {
                let position = start + step * k as f64;
                match interpolate(&spectrum, position) {
                    Some(value) => *energy += value * weight,
                    None => clipped += 1,
                }
            }

            start *= 2.0;
            width *= 2.0;
        }

        if clipped > 0 {
            log::warn!(
                "Harmonic search clipped {} positions past the {}-bin spectrum",
                clipped,
                spectrum.len()
            );
        }

        let mut best_index = 0;
        let mut best_energy = 0.0;
        for (k, &energy) in combined.iter().enumerate() {
            if energy > best_energy {
                best_energy = energy;
                best_index = k;
            }
        }

        let padded_bin = best_index as f64 * base as f64 / self.points as f64 + base as f64;
        let estimate = BinEstimate {
            bin: padded_bin / padding_ratio,
            power: best_energy,
        };

        log::trace!(
            "Harmonic search from bin {} over {} octaves: bin {:.3} (energy {:.3e})",
            base,
            self.count,
            estimate.bin,
            estimate.power
        );

        Ok(estimate)
    }
}

/// Linear interpolation at a fractional position, `None` past the end
fn interpolate(spectrum: &[f64], position: f64) -> Option<f64> {
    let lower = position as usize;
    let upper = lower + 1;
    if upper >= spectrum.len() {
        return None;
    }

    let fraction = position - lower as f64;
    Some(spectrum[lower] + (spectrum[upper] - spectrum[lower]) * fraction)
}

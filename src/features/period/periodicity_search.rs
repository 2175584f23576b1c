//! Coarse-to-fine periodicity search over an impulse interval
//!
//! Finds the fractional bin (cycles per interval) at which a sparse impulse
//! signal correlates best with a sinusoid.
//!
//! # Algorithm
//!
//! 1. Compact the interval to its strictly positive samples, each weighted by
//!    a Hamming taper evaluated at its original index
//! 2. Evaluate `coarse_steps + 1` direct DFTs evenly spaced across
//!    `[low_bin, high_bin]`
//! 3. Refine `refine_steps` times around the best bin, starting with a span of
//!    `range / (2 · coarse_steps)` and halving it each round
//!
//! The refined bin may drift slightly outside the bracket. It is not clamped.
//!
//! # Example
//!
//! ```
//! use stratum_live::features::period::PeriodicitySearch;
//!
//! // One impulse every 40 windows: 25 cycles across 1000 windows
//! let impulses: Vec<f64> = (0..1000).map(|i| if i % 40 == 0 { 1.0 } else { 0.0 }).collect();
//!
//! let search = PeriodicitySearch::new(31, 5)?;
//! let best = search.search(&impulses, 18.0, 36.0)?;
//! assert!((best.bin - 25.0).abs() < 0.25);
//! # Ok::<(), stratum_live::TrackerError>(())
//! ```

use super::BinEstimate;
use crate::error::{Result, TrackerError};
use crate::features::spectral::{sparse_bin_dft, Taper};

/// Coarse grid plus iterative refinement over direct single-bin DFTs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicitySearch {
    coarse_steps: usize,
    refine_steps: usize,
}

impl PeriodicitySearch {
    /// Create a search with `coarse_steps` grid intervals and `refine_steps`
    /// refinement rounds
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if `coarse_steps` is 0.
    pub fn new(coarse_steps: usize, refine_steps: usize) -> Result<Self> {
        if coarse_steps == 0 {
            return Err(TrackerError::ConfigurationError(
                "periodicity search needs at least one coarse step".to_string(),
            ));
        }

        Ok(Self {
            coarse_steps,
            refine_steps,
        })
    }

    /// Number of coarse grid intervals
    pub fn coarse_steps(&self) -> usize {
        self.coarse_steps
    }

    /// Number of refinement rounds
    pub fn refine_steps(&self) -> usize {
        self.refine_steps
    }

    /// Find the bin in `[low_bin, high_bin]` with the strongest response
    ///
    /// # Arguments
    ///
    /// * `impulses` - Impulse interval; only strictly positive samples count
    /// * `low_bin` - Lower bracket, in cycles per interval
    /// * `high_bin` - Upper bracket, in cycles per interval
    ///
    /// # Returns
    ///
    /// The refined best bin and its power. An interval without any positive
    /// sample yields `low_bin` with zero power.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the interval is empty or the bracket is not a
    /// finite range with `low_bin < high_bin`.
    pub fn search(&self, impulses: &[f64], low_bin: f64, high_bin: f64) -> Result<BinEstimate> {
        if impulses.is_empty() {
            return Err(TrackerError::InvalidInput(
                "empty impulse interval".to_string(),
            ));
        }

        if !(low_bin.is_finite() && high_bin.is_finite() && low_bin < high_bin) {
            return Err(TrackerError::InvalidInput(format!(
                "invalid search bracket [{}, {}]",
                low_bin, high_bin
            )));
        }

        let len = impulses.len();
        let compacted: Vec<(usize, f64)> = impulses
            .iter()
            .enumerate()
            .filter(|&(_, &x)| x > 0.0)
            .map(|(i, &x)| (i, x * Taper::Hamming.coefficient(i, len)))
            .collect();

        let power_at = |bin: f64| sparse_bin_dft(compacted.iter().copied(), len, bin).power;

        // Coarse grid
        let range = high_bin - low_bin;
        let mut best = BinEstimate {
            bin: low_bin,
            power: power_at(low_bin),
        };
        for step in 1..=self.coarse_steps {
            let bin = low_bin + (step as f64 * range) / self.coarse_steps as f64;
            let power = power_at(bin);
            if power > best.power {
                best = BinEstimate { bin, power };
            }
        }

        // Refinement: best of {best, best - span, best + span}, ties keep best
        let mut span = range / (2.0 * self.coarse_steps as f64);
        for _ in 0..self.refine_steps {
            let below = best.bin - span;
            let above = best.bin + span;
            let below_power = power_at(below);
            let above_power = power_at(above);

            if below_power > best.power && below_power >= above_power {
                best = BinEstimate {
                    bin: below,
                    power: below_power,
                };
            } else if above_power > best.power {
                best = BinEstimate {
                    bin: above,
                    power: above_power,
                };
            }

            span /= 2.0;
        }

        log::trace!(
            "Periodicity search [{:.2}, {:.2}] over {} impulses: bin {:.3} (power {:.3e})",
            low_bin,
            high_bin,
            compacted.len(),
            best.bin,
            best.power
        );

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse_train(len: usize, period: usize, offset: usize) -> Vec<f64> {
        (0..len)
            .map(|i| if i >= offset && (i - offset) % period == 0 { 1.0 } else { 0.0 })
            .collect()
    }

    #[test]
    fn test_converges_on_integer_periodicity() {
        let impulses = impulse_train(1000, 40, 7);
        let search = PeriodicitySearch::new(31, 5).unwrap();
        let best = search.search(&impulses, 18.0, 36.0).unwrap();

        assert!((best.bin - 25.0).abs() < 0.25, "bin = {}", best.bin);
        assert!(best.power > 0.0);
    }

    #[test]
    fn test_converges_on_fractional_periodicity() {
        // 1000 / 37 = 27.027 cycles
        let impulses = impulse_train(1000, 37, 0);
        let search = PeriodicitySearch::new(31, 5).unwrap();
        let best = search.search(&impulses, 20.0, 40.0).unwrap();

        let expected = 1000.0 / 37.0;
        assert!(
            (best.bin - expected).abs() / expected < 0.01,
            "bin = {}, expected {}",
            best.bin,
            expected
        );
    }

    #[test]
    fn test_weighted_impulses_keep_their_period() {
        let impulses: Vec<f64> = (0..800)
            .map(|i| if i % 32 == 0 { 1.0 + (i % 3) as f64 } else { 0.0 })
            .collect();
        let search = PeriodicitySearch::new(31, 5).unwrap();
        let best = search.search(&impulses, 18.75, 37.5).unwrap();
        assert!((best.bin - 25.0).abs() < 0.25, "bin = {}", best.bin);
    }

    #[test]
    fn test_silent_interval_returns_low_bin() {
        let search = PeriodicitySearch::new(31, 5).unwrap();
        let best = search.search(&vec![0.0; 256], 4.0, 8.0).unwrap();
        assert_eq!(best.bin, 4.0);
        assert_eq!(best.power, 0.0);
    }

    #[test]
    fn test_rejects_degenerate_inputs() {
        assert!(PeriodicitySearch::new(0, 5).is_err());

        let search = PeriodicitySearch::new(31, 5).unwrap();
        assert!(search.search(&[], 1.0, 2.0).is_err());
        assert!(search.search(&[1.0; 16], 2.0, 2.0).is_err());
        assert!(search.search(&[1.0; 16], f64::NAN, 2.0).is_err());
    }
}

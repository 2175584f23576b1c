//! Period estimation
//!
//! Estimate the dominant periodicity of an impulse interval:
//! - [`PeriodicitySearch`]: coarse grid plus refinement of direct DFTs
//! - [`HarmonicSearch`]: octave-folded power spectrum

pub mod harmonic;
pub mod periodicity_search;

pub use harmonic::HarmonicSearch;
pub use periodicity_search::PeriodicitySearch;

/// Best bin found by a search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinEstimate {
    /// Bin in cycles per interval (fractional)
    pub bin: f64,

    /// Power (or combined energy) at that bin
    pub power: f64,
}

//! Tapering windows and zero-padding placement
//!
//! Tapers are evaluated at the sample's position inside the padded
//! power-of-two buffer, over the padded length `W`:
//!
//! - Rectangular: `1`
//! - Hamming: `0.54 - 0.46 cos(2πi/W)`
//! - Hanning (shallow variant): `0.5 - 0.4 cos(2πi/W)`
//! - Blackman-Harris (4-term): `0.355768 - 0.487396 cos(2πi/W) + 0.144232 cos(4πi/W) - 0.012604 cos(6πi/W)`

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Tapering window applied before the FFT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Taper {
    /// No tapering
    Rectangular,
    /// Hamming window
    Hamming,
    /// Shallow Hann variant (`0.5 - 0.4 cos`), keeps some energy at the edges
    Hanning,
    /// 4-term Blackman-Harris window
    BlackmanHarris,
}

impl Taper {
    /// Coefficient at position `i` of a buffer of length `len`
    pub fn coefficient(self, i: usize, len: usize) -> f64 {
        let t = 2.0 * PI * i as f64 / len as f64;
        match self {
            Taper::Rectangular => 1.0,
            Taper::Hamming => 0.54 - 0.46 * t.cos(),
            Taper::Hanning => 0.5 - 0.4 * t.cos(),
            Taper::BlackmanHarris => {
                0.355768 - 0.487396 * t.cos() + 0.144232 * (2.0 * t).cos()
                    - 0.012604 * (3.0 * t).cos()
            }
        }
    }
}

/// Where a window shorter than the FFT size sits inside the padded buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaddingPolicy {
    /// Samples start at offset 0, zeros follow
    #[default]
    Left,
    /// Samples are centred, zeros split on both sides (extra zero on the right)
    Centered,
}

impl PaddingPolicy {
    /// Offset of the first sample for an input of `input_len` padded to `size`
    pub fn start_offset(self, input_len: usize, size: usize) -> usize {
        match self {
            PaddingPolicy::Left => 0,
            PaddingPolicy::Centered => size.saturating_sub(input_len) / 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taper_edges_and_centre() {
        let n = 64;
        assert_eq!(Taper::Rectangular.coefficient(17, n), 1.0);
        assert!((Taper::Hamming.coefficient(0, n) - 0.08).abs() < 1e-12);
        assert!((Taper::Hamming.coefficient(n / 2, n) - 1.0).abs() < 1e-12);
        assert!((Taper::Hanning.coefficient(0, n) - 0.1).abs() < 1e-12);
        assert!((Taper::Hanning.coefficient(n / 2, n) - 0.9).abs() < 1e-12);
        // Blackman-Harris is ~0 at the edge and 1 in the centre
        assert!(Taper::BlackmanHarris.coefficient(0, n).abs() < 1e-4);
        assert!((Taper::BlackmanHarris.coefficient(n / 2, n) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_padding_offsets() {
        assert_eq!(PaddingPolicy::Left.start_offset(100, 128), 0);
        assert_eq!(PaddingPolicy::Centered.start_offset(100, 128), 14);
        assert_eq!(PaddingPolicy::Centered.start_offset(101, 128), 13);
        assert_eq!(PaddingPolicy::Centered.start_offset(128, 128), 0);
    }
}

//! Impulse denoising with a trailing moving average
//!
//! A raw impulse only survives if it stands out from the impulses just before
//! it: `max(0, last - gain · mean(history))`. Steady spectral shimmer produces
//! impulses near the average and is removed; a genuine onset jumps well above
//! it.

use crate::error::{Result, TrackerError};

/// Denoise the newest impulse against its trailing history
///
/// # Arguments
///
/// * `history` - Most recent raw impulses, oldest first, newest last
/// * `gain` - Multiplier on the mean before subtraction (typically 1.2)
///
/// # Errors
///
/// Returns `InvalidInput` if `history` is empty.
pub fn trailed_moving_average(history: &[f64], gain: f64) -> Result<f64> {
    let last = match history.last() {
        Some(&last) => last,
        None => {
            return Err(TrackerError::InvalidInput(
                "moving average needs at least one impulse".to_string(),
            ))
        }
    };

    let mean = history.iter().sum::<f64>() / history.len() as f64;
    Ok((last - mean * gain).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_onset_survives_steady_noise_does_not() {
        let steady = vec![1.0; 10];
        assert_eq!(trailed_moving_average(&steady, 1.2).unwrap(), 0.0);

        let mut onset = vec![1.0; 9];
        onset.push(11.0);
        // mean = 2.0, 11 - 2.4 = 8.6
        let denoised = trailed_moving_average(&onset, 1.2).unwrap();
        assert!((denoised - 8.6).abs() < 1e-12);
    }

    #[test]
    fn test_single_value_history() {
        // With one value the mean is the value itself
        assert_eq!(trailed_moving_average(&[4.0], 1.2).unwrap(), 0.0);
        assert_eq!(trailed_moving_average(&[4.0], 0.5).unwrap(), 2.0);
    }

    #[test]
    fn test_empty_history_is_error() {
        assert!(trailed_moving_average(&[], 1.2).is_err());
    }
}

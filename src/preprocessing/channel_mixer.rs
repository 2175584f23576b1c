//! Channel mixing (interleaved multi-channel to mono)

use crate::error::{Result, TrackerError};

const I16_SCALE: f64 = 32768.0;

/// Average each interleaved frame across its channels
///
/// # Arguments
///
/// * `samples` - Interleaved samples, `channels` per frame
/// * `channels` - Number of channels
///
/// # Returns
///
/// One mono sample per frame
///
/// # Errors
///
/// Returns `InvalidInput` if `channels` is 0, `SizeMismatch` if the sample
/// count is not a whole number of frames.
pub fn interleaved_to_mono(samples: &[f64], channels: usize) -> Result<Vec<f64>> {
    if channels == 0 {
        return Err(TrackerError::InvalidInput(
            "channel count must be at least 1".to_string(),
        ));
    }

    if samples.len() % channels != 0 {
        return Err(TrackerError::SizeMismatch {
            expected: samples.len() - samples.len() % channels + channels,
            actual: samples.len(),
        });
    }

    if channels == 1 {
        return Ok(samples.to_vec());
    }

    Ok(samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f64>() / channels as f64)
        .collect())
}

/// Normalize signed 16-bit PCM to `[-1, 1)`
pub fn pcm_i16_to_f64(samples: &[i16]) -> Vec<f64> {
    samples.iter().map(|&s| s as f64 / I16_SCALE).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_average() {
        let stereo = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(interleaved_to_mono(&stereo, 2).unwrap(), vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_mono_passthrough() {
        let mono = [0.1, 0.2, 0.3];
        assert_eq!(interleaved_to_mono(&mono, 1).unwrap(), mono.to_vec());
    }

    #[test]
    fn test_rejects_partial_frames_and_zero_channels() {
        assert!(matches!(
            interleaved_to_mono(&[0.0; 5], 2),
            Err(TrackerError::SizeMismatch { expected: 6, actual: 5 })
        ));
        assert!(matches!(
            interleaved_to_mono(&[0.0; 4], 0),
            Err(TrackerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_pcm_normalization() {
        let pcm = [i16::MIN, 0, 16384, i16::MAX];
        let normalized = pcm_i16_to_f64(&pcm);
        assert_eq!(normalized[0], -1.0);
        assert_eq!(normalized[1], 0.0);
        assert_eq!(normalized[2], 0.5);
        assert!(normalized[3] < 1.0);
    }
}

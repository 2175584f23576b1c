//! Frame sources feeding the producer

use crate::error::{Result, TrackerError};
use crate::preprocessing::{interleaved_to_mono, pcm_i16_to_f64};

/// Supplier of mono samples, one hop at a time
pub trait FrameSource: Send {
    /// Frame rate in Hz
    fn frame_rate(&self) -> f64;

    /// Next chunk of at most `len` samples, `None` at end of stream
    ///
    /// A chunk shorter than `len` is accepted and zero-padded by the caller.
    fn next_chunk(&mut self, len: usize) -> Result<Option<Vec<f64>>>;
}

/// In-memory mono source
#[derive(Debug, Clone)]
pub struct SliceSource {
    samples: Vec<f64>,
    frame_rate: f64,
    position: usize,
}

impl SliceSource {
    /// Source over `samples` at `frame_rate` Hz
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the frame rate is not positive.
    pub fn new(samples: Vec<f64>, frame_rate: f64) -> Result<Self> {
        if !(frame_rate.is_finite() && frame_rate > 0.0) {
            return Err(TrackerError::ConfigurationError(format!(
                "frame rate must be positive, got {}",
                frame_rate
            )));
        }

        Ok(Self {
            samples,
            frame_rate,
            position: 0,
        })
    }

    /// Source over interleaved signed 16-bit PCM, mixed down to mono
    pub fn from_interleaved_i16(pcm: &[i16], channels: usize, frame_rate: f64) -> Result<Self> {
        let mono = interleaved_to_mono(&pcm_i16_to_f64(pcm), channels)?;
        Self::new(mono, frame_rate)
    }

    /// Samples not yet handed out
    pub fn remaining(&self) -> usize {
        self.samples.len() - self.position
    }
}

impl FrameSource for SliceSource {
    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn next_chunk(&mut self, len: usize) -> Result<Option<Vec<f64>>> {
        if self.position >= self.samples.len() || len == 0 {
            return Ok(None);
        }

        let end = (self.position + len).min(self.samples.len());
        let chunk = self.samples[self.position..end].to_vec();
        self.position = end;
        Ok(Some(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_source_chunks() {
        let mut source = SliceSource::new((0..10).map(|i| i as f64).collect(), 100.0).unwrap();
        assert_eq!(source.next_chunk(4).unwrap(), Some(vec![0.0, 1.0, 2.0, 3.0]));
        assert_eq!(source.next_chunk(4).unwrap(), Some(vec![4.0, 5.0, 6.0, 7.0]));
        assert_eq!(source.next_chunk(4).unwrap(), Some(vec![8.0, 9.0]));
        assert_eq!(source.next_chunk(4).unwrap(), None);
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn test_interleaved_source_is_mono() {
        let pcm = [16384i16, 0, 16384, 16384];
        let mut source = SliceSource::from_interleaved_i16(&pcm, 2, 8000.0).unwrap();
        assert_eq!(source.next_chunk(8).unwrap(), Some(vec![0.25, 0.5]));
    }

    #[test]
    fn test_rejects_bad_frame_rate() {
        assert!(SliceSource::new(vec![0.0; 4], 0.0).is_err());
    }
}

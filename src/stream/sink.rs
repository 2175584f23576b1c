//! Playback sinks
//!
//! The sink's consumption position is the only backpressure reference the
//! producer uses.

use crate::error::Result;

/// Consumer of the raw audio, exposing how far it has played
pub trait PlaybackSink: Send {
    /// Hand one hop of samples to the sink
    fn write(&mut self, samples: &[f64]) -> Result<()>;

    /// Frames consumed so far (monotonically increasing)
    fn frames_consumed(&self) -> u64;

    /// Whether the sink is currently playing
    fn is_active(&self) -> bool {
        true
    }

    /// Flush whatever is still buffered before teardown
    fn drain(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Sink that consumes everything immediately
#[derive(Debug, Default, Clone)]
pub struct NullSink {
    consumed: u64,
}

impl NullSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlaybackSink for NullSink {
    fn write(&mut self, samples: &[f64]) -> Result<()> {
        self.consumed += samples.len() as u64;
        Ok(())
    }

    fn frames_consumed(&self) -> u64 {
        self.consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sink_counts_frames() {
        let mut sink = NullSink::new();
        sink.write(&[0.0; 128]).unwrap();
        sink.write(&[0.0; 64]).unwrap();
        assert_eq!(sink.frames_consumed(), 192);
        assert!(sink.is_active());
        assert!(sink.drain().is_ok());
    }
}

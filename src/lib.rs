//! # Stratum Live
//!
//! Real-time tempo and beat tracking for streamed audio. A single producer
//! steps through the stream one short hop at a time, turning each window into
//! spectral impulses, estimating the tempo over a sliding interval of them
//! and deciding, window by window, whether a beat has just happened.
//!
//! ## Features
//!
//! - **Sliding-window memories**: bounded, lock-guarded stores with stable
//!   logical indices, readable from any number of threads
//! - **Spectral engine**: precomputed radix-2 FFT with selectable tapers and a
//!   direct fractional-bin DFT
//! - **Tempo estimation**: coarse-to-fine periodicity search, harmonic
//!   folding and a self-correcting backward jump-walk
//! - **Beat decision**: prediction, verification and confidence decay per
//!   window
//! - **Streaming**: backpressure against a playback sink, stop signal,
//!   observers for the beat side channel
//!
//! ## Quick Start
//!
//! ```no_run
//! use stratum_live::{track_beats, TrackerConfig};
//!
//! // Mono samples, normalized to [-1.0, 1.0]
//! let samples: Vec<f64> = vec![]; // Your audio data
//! let frame_rate = 44100.0;
//!
//! let events = track_beats(samples, frame_rate, TrackerConfig::default())?;
//! for beat in events.iter().filter(|e| e.is_beat) {
//!     println!("beat at {:.0} ms", beat.timestamp_ms);
//! }
//! # Ok::<(), stratum_live::TrackerError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Frame source → window → spectrum → impulse → denoise ─┬→ tempo interval → beat decision → observers
//!                                                        └→ tempogram
//!                    (every stage appends to a SlidingWindowMemory readers can poll)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod features;
pub mod memory;
pub mod preprocessing;
pub mod stream;

// Re-export main types
pub use config::{StreamLayout, TrackerConfig};
pub use error::{Result, TrackerError};
pub use features::beat_tracking::{BeatDecision, BeatEstimator, TempoHypothesis};
pub use features::period::{HarmonicSearch, PeriodicitySearch};
pub use features::spectral::{PaddingPolicy, SpectralEngine, Taper};
pub use memory::SlidingWindowMemory;
pub use stream::{
    BeatEvent, BeatObserver, FrameSource, NullSink, PlaybackSink, SliceSource, StreamControl,
    StreamOrchestrator, StreamSummary,
};

/// Track beats over an in-memory mono signal
///
/// Runs the full streaming pipeline without playback (the sink consumes
/// instantly, so backpressure never holds the producer back).
///
/// # Arguments
///
/// * `samples` - Mono samples, normalized to [-1.0, 1.0]
/// * `frame_rate` - Frame rate in Hz
/// * `config` - Tracker configuration
///
/// # Returns
///
/// One event per processed window, in order
///
/// # Errors
///
/// Returns `TrackerError` if the configuration is invalid for the frame rate
/// or a processing step fails.
pub fn track_beats(samples: Vec<f64>, frame_rate: f64, config: TrackerConfig) -> Result<Vec<BeatEvent>> {
    let source = SliceSource::new(samples, frame_rate)?;
    let (observer, receiver) = stream::ChannelObserver::unbounded();

    let mut orchestrator =
        StreamOrchestrator::new(config, source, NullSink::new())?.with_observer(Box::new(observer));
    let summary = orchestrator.run()?;

    let events: Vec<BeatEvent> = receiver.try_iter().collect();
    log::debug!(
        "Tracked {} windows: {} beats, final tempo {:.2} windows/beat",
        summary.windows_processed,
        summary.beats,
        summary.windows_between_beats
    );
    Ok(events)
}

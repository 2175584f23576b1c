//! Beat tracking
//!
//! [`BeatEstimator`] composes the tempo tracker with the per-window decision
//! state machine. It reads the denoised impulse and volume memories that the
//! producer fills and is owned by the producer thread alone.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stratum_live::{BeatEstimator, SlidingWindowMemory, StreamLayout, TrackerConfig};
//!
//! let config = TrackerConfig::default();
//! let layout = StreamLayout::derive(&config, 44100.0)?;
//! let impulses = Arc::new(SlidingWindowMemory::<f64>::new(layout.analysis_capacity)?);
//! let volumes = Arc::new(SlidingWindowMemory::<f64>::new(layout.analysis_capacity)?);
//!
//! let mut estimator = BeatEstimator::new(&config, &layout, impulses.clone(), volumes.clone())?;
//! impulses.append(0.0)?;
//! volumes.append(0.1)?;
//! let decision = estimator.process_window(0)?;
//! assert!(!decision.is_beat);
//! # Ok::<(), stratum_live::TrackerError>(())
//! ```

pub mod decision;
pub mod tempo;

pub use decision::{BeatDecision, BeatState};
pub use tempo::{walk_back, JumpWalk, TempoCandidates, TempoHypothesis, TempoTracker};

use crate::config::{StreamLayout, TrackerConfig};
use crate::error::{Result, TrackerError};
use crate::features::period::{HarmonicSearch, PeriodicitySearch};
use crate::features::spectral::SpectralEngine;
use crate::memory::SlidingWindowMemory;
use std::sync::Arc;

/// Tempo tracking plus beat decision over shared impulse memories
#[derive(Debug)]
pub struct BeatEstimator {
    tracker: TempoTracker,
    state: BeatState,
    impulses: Arc<SlidingWindowMemory<f64>>,
    volumes: Arc<SlidingWindowMemory<f64>>,
    last_hypothesis: Option<TempoHypothesis>,
}

impl BeatEstimator {
    /// Create an estimator reading `impulses` (denoised) and `volumes`
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if either memory cannot hold a full tempo
    /// interval or the search parameters are degenerate.
    pub fn new(
        config: &TrackerConfig,
        layout: &StreamLayout,
        impulses: Arc<SlidingWindowMemory<f64>>,
        volumes: Arc<SlidingWindowMemory<f64>>,
    ) -> Result<Self> {
        let interval_len = layout.interval_len;
        for (name, capacity) in [("impulse", impulses.capacity()), ("volume", volumes.capacity())] {
            if capacity < interval_len {
                return Err(TrackerError::ConfigurationError(format!(
                    "{} memory holds {} windows, tempo interval needs {}",
                    name, capacity, interval_len
                )));
            }
        }

        let tracker = TempoTracker::new(
            PeriodicitySearch::new(config.coarse_steps, config.refine_steps)?,
            HarmonicSearch::new(
                config.harmonic_points,
                config.harmonic_count,
                config.harmonic_weight_step,
            )?,
            SpectralEngine::with_padding(interval_len, config.padding)?,
            layout.windows_per_beat,
            config.beats_per_interval,
        )?;

        log::debug!(
            "Beat estimator: interval {} windows, prior {:.2} windows/beat, {} jumps max",
            interval_len,
            layout.windows_per_beat,
            config.beats_per_interval
        );

        Ok(Self {
            tracker,
            state: BeatState::new(),
            impulses,
            volumes,
            last_hypothesis: None,
        })
    }

    /// Estimate the tempo of one interval of impulses and parallel volumes
    pub fn track_tempo(&mut self, impulses: &[f64], volumes: &[f64]) -> Result<TempoHypothesis> {
        self.tracker.track(impulses, volumes)
    }

    /// Run the decision state machine on window `n`
    pub fn decide_beat(
        &mut self,
        n: i64,
        hypothesis: Option<&TempoHypothesis>,
    ) -> Result<BeatDecision> {
        self.state
            .decide(n, hypothesis, &self.impulses, &self.volumes)
    }

    /// Process window `n`, whose impulse and volume were just appended
    ///
    /// A tempo is only estimated when window `n` carries an impulse and a full
    /// interval ending at `n` is retrievable from both memories.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if window `n` has not been appended yet.
    pub fn process_window(&mut self, n: i64) -> Result<BeatDecision> {
        let hypothesis = if self.impulses.get(n)? > 0.0 {
            self.track_interval_ending_at(n)?
        } else {
            None
        };

        let decision = self.decide_beat(n, hypothesis.as_ref())?;
        if hypothesis.is_some() {
            self.last_hypothesis = hypothesis;
        }
        Ok(decision)
    }

    fn track_interval_ending_at(&mut self, n: i64) -> Result<Option<TempoHypothesis>> {
        let len = self.tracker.interval_len();
        let start = n - len as i64 + 1;
        if start < self.impulses.min_valid_index() || start < self.volumes.min_valid_index() {
            return Ok(None);
        }

        let impulses = self.impulses.get_range(start, len)?;
        let volumes = self.volumes.get_range(start, len)?;
        self.track_tempo(&impulses, &volumes).map(Some)
    }

    /// Decision state
    pub fn state(&self) -> &BeatState {
        &self.state
    }

    /// Most recent tempo estimate, adopted or not
    pub fn last_hypothesis(&self) -> Option<&TempoHypothesis> {
        self.last_hypothesis.as_ref()
    }

    /// Windows per beat of the adopted tempo (0 before adoption)
    pub fn windows_between_beats(&self) -> f64 {
        self.state.windows_between_beats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_layout() -> (TrackerConfig, StreamLayout) {
        let config = TrackerConfig {
            min_reaction_ms: 10.0,
            ..TrackerConfig::default()
        };
        let layout = StreamLayout::derive(&config, 8000.0).unwrap();
        (config, layout)
    }

    #[test]
    fn test_rejects_memories_shorter_than_interval() {
        let (config, layout) = small_layout();
        let short = Arc::new(SlidingWindowMemory::<f64>::new(layout.interval_len - 1).unwrap());
        let long = Arc::new(SlidingWindowMemory::<f64>::new(layout.analysis_capacity).unwrap());
        assert!(BeatEstimator::new(&config, &layout, short, long).is_err());
    }

    #[test]
    fn test_locks_onto_a_steady_impulse_train() {
        let (config, layout) = small_layout();
        let impulses = Arc::new(SlidingWindowMemory::<f64>::new(layout.analysis_capacity).unwrap());
        let volumes = Arc::new(SlidingWindowMemory::<f64>::new(layout.analysis_capacity).unwrap());
        let mut estimator =
            BeatEstimator::new(&config, &layout, impulses.clone(), volumes.clone()).unwrap();

        // 8 kHz with 10 ms hops: 100 windows per second, beats every 50 windows
        let mut beats = Vec::new();
        for n in 0..1500i64 {
            let on_beat = n % 50 == 0;
            impulses.append(if on_beat { 1.0 } else { 0.0 }).unwrap();
            volumes.append(if on_beat { 0.8 } else { 0.05 }).unwrap();
            if estimator.process_window(n).unwrap().is_beat {
                beats.push(n);
            }
        }

        assert!((estimator.windows_between_beats() - 50.0).abs() < 1.5);
        assert!(estimator.last_hypothesis().is_some());

        // Once locked, flags land within a couple of windows of every beat
        let late: Vec<i64> = beats.into_iter().filter(|&b| b >= 1000).collect();
        assert!(late.len() >= 8, "beats after lock: {:?}", late);
        for beat in late {
            let distance = (beat % 50).min(50 - beat % 50);
            assert!(distance <= 2, "beat {} is {} windows off", beat, distance);
        }
    }

    #[test]
    fn test_requires_appended_window() {
        let (config, layout) = small_layout();
        let impulses = Arc::new(SlidingWindowMemory::<f64>::new(layout.analysis_capacity).unwrap());
        let volumes = Arc::new(SlidingWindowMemory::<f64>::new(layout.analysis_capacity).unwrap());
        let mut estimator = BeatEstimator::new(&config, &layout, impulses, volumes).unwrap();
        assert!(estimator.process_window(0).is_err());
    }
}

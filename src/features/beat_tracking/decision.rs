//! Per-window beat decision
//!
//! A small state machine fed once per window with the latest tempo
//! hypothesis (if one was produced). It keeps a current tempo, predicts the
//! next beat and checks each prediction against the denoised impulses once
//! it has passed.
//!
//! # Transitions
//!
//! - **Adopt**: a hypothesis with more confidence than the current tempo,
//!   more than one hit and a period of at least one window replaces it. The window is flagged if the previous
//!   flag lies more than two thirds of a beat back.
//! - **Verify**: once `n ≥ next + error_window`, the last `2 · error_window`
//!   windows are scanned. A hit snaps the prediction to the impulse and
//!   restores confidence (never above the adopted level). A miss advances the
//!   prediction blindly and, while declining, costs confidence.
//! - **Flag**: `round(next) == n`.

use crate::error::Result;
use crate::features::beat_tracking::tempo::{TempoHypothesis, MIN_JUMP};
use crate::memory::SlidingWindowMemory;
use serde::{Deserialize, Serialize};

const ADOPT_SPACING: f64 = 2.0 / 3.0;
const ERROR_WINDOW_FRACTION: f64 = 0.01;

/// What happened on one window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatDecision {
    /// Window index
    pub window_index: i64,
    /// Whether the window is flagged as a beat
    pub is_beat: bool,
    /// Whether a new tempo was adopted on this window
    pub adopted_tempo: bool,
    /// Confidence in the current tempo after this window
    pub confidence: f64,
    /// Current tempo in windows per beat (0 before any tempo is adopted)
    pub windows_between_beats: f64,
}

/// Persistent decision state of one stream
#[derive(Debug, Clone, PartialEq)]
pub struct BeatState {
    windows_between_beats: f64,
    original_confidence: f64,
    current_confidence: f64,
    next_predicted: f64,
    prev_flagged: Option<i64>,
    failed_streak: u32,
    declining: bool,
}

impl Default for BeatState {
    fn default() -> Self {
        Self {
            windows_between_beats: 0.0,
            original_confidence: 0.0,
            current_confidence: 0.0,
            next_predicted: f64::INFINITY,
            prev_flagged: None,
            failed_streak: 0,
            declining: false,
        }
    }
}

impl BeatState {
    /// Fresh state: no tempo, nothing predicted
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tempo in windows per beat
    pub fn windows_between_beats(&self) -> f64 {
        self.windows_between_beats
    }

    /// Confidence at the moment the current tempo was adopted
    pub fn original_confidence(&self) -> f64 {
        self.original_confidence
    }

    /// Confidence after hits and misses since adoption
    pub fn current_confidence(&self) -> f64 {
        self.current_confidence
    }

    /// Window the next beat is expected on (`+∞` before adoption)
    pub fn next_predicted(&self) -> f64 {
        self.next_predicted
    }

    /// Last window flagged, or snapped to, as a beat
    pub fn prev_flagged(&self) -> Option<i64> {
        self.prev_flagged
    }

    /// Consecutive missed predictions
    pub fn failed_streak(&self) -> u32 {
        self.failed_streak
    }

    /// Whether misses currently cost confidence
    pub fn is_declining(&self) -> bool {
        self.declining
    }

    /// Tolerance either side of a prediction, in windows
    pub fn error_window(&self) -> i64 {
        ((ERROR_WINDOW_FRACTION * self.windows_between_beats).round() as i64).max(1)
    }

    /// Decide whether window `n` is a beat
    ///
    /// # Arguments
    ///
    /// * `n` - Index of the window just processed
    /// * `hypothesis` - Tempo estimated on this window, if any
    /// * `impulses` - Denoised impulse memory (read for verification)
    /// * `volumes` - Volume memory parallel to `impulses`
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if a verified impulse's volume is no longer
    /// retrievable. Scans are clipped to the retrievable range.
    pub fn decide(
        &mut self,
        n: i64,
        hypothesis: Option<&TempoHypothesis>,
        impulses: &SlidingWindowMemory<f64>,
        volumes: &SlidingWindowMemory<f64>,
    ) -> Result<BeatDecision> {
        let mut is_beat = false;
        let mut adopted_tempo = false;

        if let Some(h) = hypothesis {
            if h.confidence > self.current_confidence && h.hits > 1 && h.jump >= MIN_JUMP {
                self.adopt(n, h);
                adopted_tempo = true;

                let spaced = self
                    .prev_flagged
                    .map_or(true, |prev| n as f64 - self.windows_between_beats * ADOPT_SPACING > prev as f64);
                if spaced {
                    is_beat = true;
                    self.prev_flagged = Some(n);
                }
            }
        }

        let error_window = self.error_window();
        if n as f64 >= self.next_predicted + error_window as f64 {
            self.verify(n, error_window, impulses, volumes)?;
        }

        if self.next_predicted.is_finite() && self.next_predicted.round() as i64 == n {
            is_beat = true;
        }

        Ok(BeatDecision {
            window_index: n,
            is_beat,
            adopted_tempo,
            confidence: self.current_confidence,
            windows_between_beats: self.windows_between_beats,
        })
    }

    fn adopt(&mut self, n: i64, h: &TempoHypothesis) {
        log::debug!(
            "Adopting tempo {:.2} windows/beat at window {} ({} hits, confidence {:.3} > {:.3})",
            h.jump,
            n,
            h.hits,
            h.confidence,
            self.current_confidence
        );

        self.windows_between_beats = h.jump;
        self.original_confidence = h.confidence;
        self.current_confidence = h.confidence;
        self.next_predicted = n as f64 + h.jump;
        self.failed_streak = 0;
        self.declining = false;
    }

    fn verify(
        &mut self,
        n: i64,
        error_window: i64,
        impulses: &SlidingWindowMemory<f64>,
        volumes: &SlidingWindowMemory<f64>,
    ) -> Result<()> {
        let (max_impulse, offset) = strongest_impulse(impulses, n, 2 * error_window + 1)?;

        if max_impulse > 0.0 {
            self.next_predicted = n as f64 + self.windows_between_beats - offset as f64;
            self.prev_flagged = Some(n - offset);
            self.failed_streak = 0;
            self.declining = false;
            self.current_confidence =
                (self.current_confidence + volumes.get(n - offset)?).min(self.original_confidence);

            log::trace!(
                "Prediction hit at window {} (offset {}), confidence {:.3}",
                n - offset,
                offset,
                self.current_confidence
            );
        } else {
            let reach = (self.windows_between_beats / 2.0).ceil().max(0.0) as i64;
            let (diagnostic, diagnostic_offset) = strongest_impulse(impulses, n, reach)?;

            self.failed_streak += 1;
            self.next_predicted += self.windows_between_beats - error_window as f64;
            self.prev_flagged = Some(n - error_window);
            if self.failed_streak > 0 {
                self.declining = true;
            }
            if self.declining && diagnostic > 0.0 {
                self.current_confidence -= volumes.get(n - diagnostic_offset)?;
            }

            log::trace!(
                "Prediction missed at window {} (streak {}), confidence {:.3}",
                n,
                self.failed_streak,
                self.current_confidence
            );
        }

        Ok(())
    }
}

/// Largest impulse among windows `n, n-1, ..., n-(count-1)`
///
/// Returns the value (0 if none is positive) and its offset back from `n`.
/// Windows no longer retrievable are skipped.
fn strongest_impulse(impulses: &SlidingWindowMemory<f64>, n: i64, count: i64) -> Result<(f64, i64)> {
    let oldest = (n - count + 1).max(impulses.min_valid_index());
    let mut max_impulse = 0.0;
    let mut max_offset = 0;

    for index in (oldest..=n).rev() {
        let value = impulses.get(index)?;
        if value > max_impulse {
            max_impulse = value;
            max_offset = n - index;
        }
    }

    Ok((max_impulse, max_offset))
}

//! Tempo estimation over one impulse interval
//!
//! # Algorithm
//!
//! 1. Search bracket around the prior: `low = 0.75 · M / expected`,
//!    `high = 1.5 · M / expected` (cycles per interval)
//! 2. Three candidate periods (windows per beat):
//!    - fundamental: periodicity search over `[low, high]`
//!    - octave: search over `[2 · low, low + high]`, halved back
//!    - harmonic: octave-folded spectrum starting at `low`
//! 3. Backward jump-walk from the end of the interval to verify the period
//!    against actual impulses and accumulate volume as confidence
//!
//! The walk corrects the jump after each hit, using the distance from the
//! interval end divided by the jumps made so far, and narrows its tolerance
//! as it goes.

use crate::error::{Result, TrackerError};
use crate::features::period::{HarmonicSearch, PeriodicitySearch};
use crate::features::spectral::SpectralEngine;
use serde::{Deserialize, Serialize};

const INITIAL_ERROR_FRACTION: f64 = 0.05;
const ERROR_SHRINK: f64 = 0.6;
const MIN_ERROR: f64 = 1.1;
const MAX_EMPTY_JUMPS: usize = 2;
/// Shortest jump walked; below it every landing re-hits the same impulse
pub const MIN_JUMP: f64 = 1.0;

/// Windows per beat proposed by each search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoCandidates {
    /// Direct search over the prior's bracket
    pub fundamental: f64,
    /// Search over the doubled bracket, halved back
    pub octave: f64,
    /// Harmonic-weighted search, `None` when the spectrum carried no energy
    pub harmonic: Option<f64>,
}

impl TempoCandidates {
    /// Jump the walk starts from: harmonic, else octave, else fundamental
    pub fn preferred(&self) -> f64 {
        match self.harmonic {
            Some(jump) => jump,
            None if self.octave.is_finite() && self.octave > 0.0 => self.octave,
            None => self.fundamental,
        }
    }
}

/// Result of one tempo estimation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoHypothesis {
    /// Windows per beat after walk correction
    pub jump: f64,
    /// Accumulated volume at every hit, plus the volume at the interval end
    pub confidence: f64,
    /// Jumps that landed near an impulse
    pub hits: usize,
    /// Jumps attempted
    pub jumps_attempted: usize,
    /// Interval length `M`
    pub interval_len: usize,
    /// Periods proposed before the walk
    pub candidates: TempoCandidates,
}

/// Outcome of [`walk_back`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JumpWalk {
    /// Corrected jump
    pub jump: f64,
    /// Accumulated confidence
    pub confidence: f64,
    /// Hits
    pub hits: usize,
    /// Jumps attempted
    pub jumps_attempted: usize,
}

/// Backward jump-walk verifying `jump` against an impulse interval
///
/// Starts at the last index with the confidence set to its volume. Each jump
/// lands `trunc(jump)` windows back and scans `± error` windows for the
/// largest impulse. The walk stops when a landing falls before the interval,
/// after three consecutive empty jumps or after `max_jumps` jumps. It also
/// stops once the jump is shorter than one window.
///
/// # Errors
///
/// Returns `InvalidInput` if the interval is empty, `SizeMismatch` if the
/// volumes do not run parallel to the impulses.
pub fn walk_back(impulses: &[f64], volumes: &[f64], jump: f64, max_jumps: usize) -> Result<JumpWalk> {
    if impulses.is_empty() {
        return Err(TrackerError::InvalidInput(
            "empty impulse interval".to_string(),
        ));
    }
    if volumes.len() != impulses.len() {
        return Err(TrackerError::SizeMismatch {
            expected: impulses.len(),
            actual: volumes.len(),
        });
    }

    let len = impulses.len();
    let last = len - 1;
    let mut jump = jump;
    let mut error = (INITIAL_ERROR_FRACTION * jump).max(MIN_ERROR);
    let mut confidence = volumes[last];
    let mut start = last as i64;
    let mut jumps = 0usize;
    let mut hits = 0usize;
    let mut empty_jumps = 0usize;

    loop {
        let landing = start - jump as i64;
        if jump < MIN_JUMP
            || landing < 0
            || empty_jumps > MAX_EMPTY_JUMPS
            || jumps >= max_jumps
        {
            break;
        }
        let landing = landing as usize;
        jumps += 1;

        let mut max_impulse = f64::NEG_INFINITY;
        let mut max_index = landing;
        let mut offset = 0usize;
        while (offset as f64) < error {
            if let Some(&above) = impulses.get(landing + offset) {
                if above > max_impulse {
                    max_impulse = above;
                    max_index = landing + offset;
                }
            }
            if offset <= landing && impulses[landing - offset] > max_impulse {
                max_impulse = impulses[landing - offset];
                max_index = landing - offset;
            }
            offset += 1;
        }

        if max_impulse > 0.0 {
            confidence += volumes[max_index];
            jump = (last - max_index) as f64 / jumps as f64;
            error = (error * ERROR_SHRINK).max(MIN_ERROR);
            start = max_index as i64;
            hits += 1;
            empty_jumps = 0;
        } else {
            start = landing as i64;
            empty_jumps += 1;
        }
    }

    Ok(JumpWalk {
        jump,
        confidence,
        hits,
        jumps_attempted: jumps,
    })
}

/// Estimates windows-per-beat for impulse intervals of a fixed length
#[derive(Debug)]
pub struct TempoTracker {
    periodicity: PeriodicitySearch,
    harmonic: HarmonicSearch,
    engine: SpectralEngine,
    expected_windows_per_beat: f64,
    max_jumps: usize,
}

impl TempoTracker {
    /// Create a tracker for intervals of `engine.input_len()` windows
    ///
    /// # Arguments
    ///
    /// * `periodicity` - Direct search used for the fundamental and octave
    /// * `harmonic` - Octave-folding search
    /// * `engine` - Spectral engine sized for the interval
    /// * `expected_windows_per_beat` - Tempo prior (centre of the bracket)
    /// * `max_jumps` - Walk limit, typically the beats per interval
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the prior is not positive.
    pub fn new(
        periodicity: PeriodicitySearch,
        harmonic: HarmonicSearch,
        engine: SpectralEngine,
        expected_windows_per_beat: f64,
        max_jumps: usize,
    ) -> Result<Self> {
        if !(expected_windows_per_beat.is_finite() && expected_windows_per_beat > 0.0) {
            return Err(TrackerError::ConfigurationError(format!(
                "expected windows per beat must be positive, got {}",
                expected_windows_per_beat
            )));
        }

        Ok(Self {
            periodicity,
            harmonic,
            engine,
            expected_windows_per_beat,
            max_jumps,
        })
    }

    /// Interval length the tracker expects
    pub fn interval_len(&self) -> usize {
        self.engine.input_len()
    }

    /// Estimate the tempo of one interval
    ///
    /// # Arguments
    ///
    /// * `impulses` - Denoised impulses of the interval, oldest first
    /// * `volumes` - Volumes parallel to `impulses`
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` if either slice differs from the interval length.
    pub fn track(&mut self, impulses: &[f64], volumes: &[f64]) -> Result<TempoHypothesis> {
        let len = self.interval_len();
        if volumes.len() != impulses.len() {
            return Err(TrackerError::SizeMismatch {
                expected: impulses.len(),
                actual: volumes.len(),
            });
        }
        if impulses.len() != len {
            return Err(TrackerError::SizeMismatch {
                expected: len,
                actual: impulses.len(),
            });
        }

        let candidates = self.candidates(impulses)?;
        let mut jump = candidates.preferred();
        if !(jump.is_finite() && jump > 0.0) {
            jump = self.expected_windows_per_beat;
        }

        let walk = walk_back(impulses, volumes, jump, self.max_jumps)?;

        log::trace!(
            "Tempo: fundamental {:.2}, octave {:.2}, harmonic {:?} -> {:.2} windows/beat ({} hits of {} jumps, confidence {:.3})",
            candidates.fundamental,
            candidates.octave,
            candidates.harmonic,
            walk.jump,
            walk.hits,
            walk.jumps_attempted,
            walk.confidence
        );

        Ok(TempoHypothesis {
            jump: walk.jump,
            confidence: walk.confidence,
            hits: walk.hits,
            jumps_attempted: walk.jumps_attempted,
            interval_len: len,
            candidates,
        })
    }

    fn candidates(&mut self, impulses: &[f64]) -> Result<TempoCandidates> {
        let len = impulses.len() as f64;
        let cycles = len / self.expected_windows_per_beat;
        let low = cycles * 0.75;
        let high = cycles * 1.5;

        let fundamental = self.periodicity.search(impulses, low, high)?;
        let octave = self.periodicity.search(impulses, low * 2.0, high + low)?;
        let harmonic = self.harmonic.search(&mut self.engine, impulses, low)?;

        Ok(TempoCandidates {
            fundamental: len / fundamental.bin,
            octave: 2.0 * len / octave.bin,
            harmonic: if harmonic.power > 0.0 && harmonic.bin > 0.0 {
                Some(len / harmonic.bin)
            } else {
                None
            },
        })
    }
}

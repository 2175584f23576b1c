//! Configuration parameters for stream tracking
//!
//! [`TrackerConfig`] holds the externally supplied tunables. Nothing in the
//! pipeline reads global state: every component receives the values it needs
//! at construction, usually through a [`StreamLayout`] derived from the
//! config and the source frame rate.

use crate::error::{Result, TrackerError};
use crate::features::spectral::PaddingPolicy;
use serde::{Deserialize, Serialize};

/// Tracker configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    // Windowing
    /// Minimum frequency to resolve in Hz (default: 23.43)
    /// Sets the analysis window length: `frame_rate / min_frequency_hz` samples
    pub min_frequency_hz: f64,

    /// Minimum reaction time in milliseconds (default: 3.0)
    /// Sets the hop between consecutive windows
    pub min_reaction_ms: f64,

    /// Zero-padding placement for the power-of-two FFT (default: Left)
    pub padding: PaddingPolicy,

    // Tempo search
    /// Expected BPM, the centre of the tempo search bracket (default: 130.0)
    pub expected_bpm: f64,

    /// Beats per tempo interval (default: 7)
    /// Also bounds the number of jumps in the backward jump-walk
    pub beats_per_interval: usize,

    /// Coarse DFT evaluations across the bracket (default: 31)
    pub coarse_steps: usize,

    /// Refinement rounds after the coarse pass (default: 5)
    pub refine_steps: usize,

    /// Sample points of the harmonic-weighted search (default: 700)
    pub harmonic_points: usize,

    /// Number of octave-doubled spectra summed by the harmonic search (default: 6)
    pub harmonic_count: usize,

    /// Weight increment per harmonic: weight = 1 + step * k (default: 0.2)
    pub harmonic_weight_step: f64,

    // Onsets
    /// Moving-average length used to denoise impulses, in ms (default: 100.0)
    pub moving_average_ms: f64,

    /// Gain applied to the moving average before subtraction (default: 1.2)
    pub denoise_gain: f64,

    /// Fraction of the spectrum (from DC) summed into the impulse (default: 1/3)
    pub impulse_band_fraction: f64,

    /// Cutoff for the low-frequency volume in Hz (default: 800.0)
    pub low_frequency_cutoff_hz: f64,

    // Streaming
    /// Seconds of history kept by reader-facing memories (default: 10.0)
    pub history_seconds: f64,

    /// Fraction of the history the producer may run ahead of playback (default: 0.25)
    pub backpressure_fraction: f64,

    /// Poll interval while waiting on an active sink, in ms (default: 1)
    pub poll_interval_ms: u64,

    /// Poll interval while the sink reports itself idle, in ms (default: 50)
    pub idle_poll_interval_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_frequency_hz: 23.43,
            min_reaction_ms: 3.0,
            padding: PaddingPolicy::Left,
            expected_bpm: 130.0,
            beats_per_interval: 7,
            coarse_steps: 31,
            refine_steps: 5,
            harmonic_points: 700,
            harmonic_count: 6,
            harmonic_weight_step: 0.2,
            moving_average_ms: 100.0,
            denoise_gain: 1.2,
            impulse_band_fraction: 1.0 / 3.0,
            low_frequency_cutoff_hz: 800.0,
            history_seconds: 10.0,
            backpressure_fraction: 0.25,
            poll_interval_ms: 1,
            idle_poll_interval_ms: 50,
        }
    }
}

impl TrackerConfig {
    /// Reject degenerate parameter combinations
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f64) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(TrackerError::ConfigurationError(format!(
                    "{} must be a positive finite number, got {}",
                    name, value
                )))
            }
        }

        fn fraction(name: &str, value: f64) -> Result<()> {
            if value > 0.0 && value <= 1.0 {
                Ok(())
            } else {
                Err(TrackerError::ConfigurationError(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )))
            }
        }

        positive("min_frequency_hz", self.min_frequency_hz)?;
        positive("min_reaction_ms", self.min_reaction_ms)?;
        positive("expected_bpm", self.expected_bpm)?;
        positive("moving_average_ms", self.moving_average_ms)?;
        positive("history_seconds", self.history_seconds)?;
        positive("low_frequency_cutoff_hz", self.low_frequency_cutoff_hz)?;
        fraction("impulse_band_fraction", self.impulse_band_fraction)?;
        fraction("backpressure_fraction", self.backpressure_fraction)?;

        if !(self.denoise_gain.is_finite() && self.denoise_gain >= 0.0) {
            return Err(TrackerError::ConfigurationError(format!(
                "denoise_gain must be non-negative, got {}",
                self.denoise_gain
            )));
        }

        if !(self.harmonic_weight_step.is_finite() && self.harmonic_weight_step >= 0.0) {
            return Err(TrackerError::ConfigurationError(format!(
                "harmonic_weight_step must be non-negative, got {}",
                self.harmonic_weight_step
            )));
        }

        if self.beats_per_interval < 2 {
            return Err(TrackerError::ConfigurationError(format!(
                "beats_per_interval must be >= 2, got {}",
                self.beats_per_interval
            )));
        }

        if self.coarse_steps == 0 {
            return Err(TrackerError::ConfigurationError(
                "coarse_steps must be > 0".to_string(),
            ));
        }

        if self.harmonic_points == 0 || self.harmonic_count == 0 {
            return Err(TrackerError::ConfigurationError(
                "harmonic_points and harmonic_count must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Window, interval and memory sizes derived from a config and a frame rate
///
/// All lengths are in samples (for `window_len`, `fft_size`, `hop_len`) or in
/// windows (everything else).
#[derive(Debug, Clone, PartialEq)]
pub struct StreamLayout {
    /// Source frame rate in Hz
    pub frame_rate: f64,
    /// Samples per analysis window
    pub window_len: usize,
    /// Power-of-two FFT size the window is padded to
    pub fft_size: usize,
    /// Samples between consecutive windows
    pub hop_len: usize,
    /// Actual reaction time (duration of one hop) in ms
    pub reaction_ms: f64,
    /// Expected windows per beat at the configured BPM
    pub windows_per_beat: f64,
    /// Windows in one tempo-tracking interval
    pub interval_len: usize,
    /// Windows in one tempogram row (power of two)
    pub tempogram_len: usize,
    /// Windows in the impulse moving average
    pub moving_average_windows: usize,
    /// Windows of history kept by the smallest reader-facing memory
    pub history_windows: usize,
    /// Capacity of the memories the beat estimator reads from
    pub analysis_capacity: usize,
    /// Windows the producer may run ahead of playback, a fraction of
    /// `history_windows`
    pub backpressure_horizon: usize,
}

impl StreamLayout {
    /// Derive all sizes for a stream at `frame_rate` Hz
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the config is invalid or any derived
    /// size degenerates (empty window, zero hop, interval shorter than two
    /// windows).
    pub fn derive(config: &TrackerConfig, frame_rate: f64) -> Result<Self> {
        config.validate()?;

        if !(frame_rate.is_finite() && frame_rate > 0.0) {
            return Err(TrackerError::ConfigurationError(format!(
                "frame rate must be positive, got {}",
                frame_rate
            )));
        }

        let window_len = (frame_rate / config.min_frequency_hz) as usize;
        if window_len < 2 {
            return Err(TrackerError::ConfigurationError(format!(
                "window of {} samples at {:.1} Hz is too short (min frequency {:.2} Hz)",
                window_len, frame_rate, config.min_frequency_hz
            )));
        }
        let fft_size = window_len.next_power_of_two();

        let hop_len = ((frame_rate * config.min_reaction_ms / 1000.0) as usize).min(window_len);
        if hop_len == 0 {
            return Err(TrackerError::ConfigurationError(format!(
                "reaction time {:.3} ms is shorter than one sample at {:.1} Hz",
                config.min_reaction_ms, frame_rate
            )));
        }
        let reaction_ms = hop_len as f64 / frame_rate * 1000.0;

        let windows_per_beat = (60.0 / config.expected_bpm) * 1000.0 / reaction_ms;
        let interval_len = (windows_per_beat * config.beats_per_interval as f64 * 1.5) as usize;
        if interval_len < 2 {
            return Err(TrackerError::ConfigurationError(format!(
                "tempo interval of {} windows is too short",
                interval_len
            )));
        }

        let beats_span = windows_per_beat * config.beats_per_interval as f64;
        let mut tempogram_len = 1usize;
        while tempogram_len as f64 <= beats_span {
            tempogram_len *= 2;
        }

        let moving_average_ms = config.moving_average_ms.max(reaction_ms.ceil());
        let moving_average_windows = ((moving_average_ms / reaction_ms) as usize)
            .max(1)
            .min(interval_len);

        let history_windows =
            ((frame_rate * config.history_seconds / hop_len as f64) as usize).max(3);
        let analysis_capacity = history_windows.max(tempogram_len).max(interval_len * 4);
        // The producer blocks with window `played + H + 1` written, which must
        // not overwrite the window being played in the smallest memory
        let backpressure_horizon = ((history_windows as f64 * config.backpressure_fraction)
            as usize)
            .min(history_windows - 2)
            .max(1);

        let layout = Self {
            frame_rate,
            window_len,
            fft_size,
            hop_len,
            reaction_ms,
            windows_per_beat,
            interval_len,
            tempogram_len,
            moving_average_windows,
            history_windows,
            analysis_capacity,
            backpressure_horizon,
        };

        log::debug!(
            "Stream layout: window={} (fft {}), hop={} ({:.2} ms, {:.1}% overlap), {:.1} windows/beat, interval={}, tempogram={}, moving average={}, history={}",
            layout.window_len,
            layout.fft_size,
            layout.hop_len,
            layout.reaction_ms,
            100.0 - 100.0 * layout.hop_len as f64 / layout.fft_size as f64,
            layout.windows_per_beat,
            layout.interval_len,
            layout.tempogram_len,
            layout.moving_average_windows,
            layout.history_windows
        );

        Ok(layout)
    }

    /// Samples held by the sample history: `history_windows` hops plus the
    /// window being assembled
    pub fn sample_capacity(&self) -> usize {
        self.history_windows * self.hop_len + self.window_len
    }

    /// Lowest frequency actually resolved by the window, in Hz
    pub fn resolved_min_frequency(&self) -> f64 {
        self.frame_rate / self.window_len as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrackerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_layout_matches_reference_stream() {
        // 44.1 kHz with the defaults: 1882-sample windows padded to 2048,
        // 132-sample hops (~2.99 ms)
        let layout = StreamLayout::derive(&TrackerConfig::default(), 44100.0).unwrap();

        assert_eq!(layout.window_len, 1882);
        assert_eq!(layout.fft_size, 2048);
        assert_eq!(layout.hop_len, 132);
        assert!((layout.reaction_ms - 2.993).abs() < 0.01);
        assert!((layout.windows_per_beat - 154.2).abs() < 0.2);
        assert_eq!(layout.interval_len, 1619);
        assert_eq!(layout.tempogram_len, 2048);
        assert_eq!(layout.moving_average_windows, 33);
        assert_eq!(layout.history_windows, 3340);
        assert_eq!(layout.analysis_capacity, 1619 * 4);
        assert_eq!(layout.backpressure_horizon, 835);
    }

    #[test]
    fn test_layout_rejects_degenerate_rates() {
        let config = TrackerConfig::default();
        assert!(StreamLayout::derive(&config, 0.0).is_err());
        assert!(StreamLayout::derive(&config, f64::NAN).is_err());

        // A 3 ms hop at 100 Hz is zero samples
        let result = StreamLayout::derive(&config, 100.0);
        assert!(matches!(result, Err(TrackerError::ConfigurationError(_))));
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        let mut config = TrackerConfig::default();
        config.beats_per_interval = 1;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.backpressure_fraction = 1.5;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.coarse_steps = 0;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.expected_bpm = -10.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_horizon_leaves_the_played_window_in_history() {
        let mut config = TrackerConfig::default();
        config.backpressure_fraction = 1.0;
        config.history_seconds = 0.01;
        let layout = StreamLayout::derive(&config, 44100.0).unwrap();
        assert_eq!(layout.history_windows, 3);
        assert_eq!(layout.backpressure_horizon, 1);

        let layout = StreamLayout::derive(&TrackerConfig::default(), 8000.0).unwrap();
        assert!(layout.backpressure_horizon + 2 <= layout.history_windows);
        assert_eq!(
            layout.sample_capacity(),
            layout.history_windows * layout.hop_len + layout.window_len
        );
    }

    #[test]
    fn test_moving_average_never_shorter_than_one_hop() {
        let mut config = TrackerConfig::default();
        config.moving_average_ms = 0.5;
        let layout = StreamLayout::derive(&config, 44100.0).unwrap();
        assert_eq!(layout.moving_average_windows, 1);
    }
}

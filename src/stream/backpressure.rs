//! Producer-ahead-of-playback bound
//!
//! The producer may not run more than `horizon` windows ahead of the sink's
//! playback position, so reader-facing memories never overwrite data that is
//! still due to be played (and visualized).

use super::control::StreamControl;
use super::sink::PlaybackSink;
use crate::config::{StreamLayout, TrackerConfig};
use std::time::Duration;

/// Threshold and poll intervals of the backpressure wait
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backpressure {
    horizon: i64,
    hop_len: u64,
    poll_interval: Duration,
    idle_poll_interval: Duration,
}

impl Backpressure {
    /// Backpressure for a stream of `layout`
    pub fn new(config: &TrackerConfig, layout: &StreamLayout) -> Self {
        Self {
            horizon: layout.backpressure_horizon as i64,
            hop_len: layout.hop_len.max(1) as u64,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            idle_poll_interval: Duration::from_millis(config.idle_poll_interval_ms),
        }
    }

    /// Windows the producer may run ahead of playback
    pub fn horizon(&self) -> i64 {
        self.horizon
    }

    /// Whether window `last_index` is too far ahead of `frames_consumed`
    pub fn must_wait(&self, last_index: i64, frames_consumed: u64) -> bool {
        let played = (frames_consumed / self.hop_len) as i64;
        played < last_index - self.horizon
    }

    /// Block until playback catches up with `last_index` or the stream stops
    ///
    /// Polls at the short interval while the sink is active and the long one
    /// while it is idle. Any [`StreamControl::notify_progress`] call cuts the
    /// current poll short.
    ///
    /// # Returns
    ///
    /// `true` if the producer may continue, `false` if a stop was requested.
    pub fn wait<K>(&self, last_index: i64, sink: &K, control: &StreamControl) -> bool
    where
        K: PlaybackSink + ?Sized,
    {
        let mut waited = 0u32;
        loop {
            if control.is_stopped() {
                return false;
            }
            if !self.must_wait(last_index, sink.frames_consumed()) {
                if waited > 0 {
                    log::trace!("Backpressure released window {} after {} polls", last_index, waited);
                }
                return true;
            }

            let interval = if sink.is_active() {
                self.poll_interval
            } else {
                self.idle_poll_interval
            };
            if control.wait_timeout(interval) {
                return false;
            }
            waited += 1;
        }
    }
}

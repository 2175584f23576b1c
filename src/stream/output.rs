//! Beat output side channel
//!
//! Every processed window produces one [`BeatEvent`]; observers receive them
//! in window order on the producer thread.

use crate::config::{StreamLayout, TrackerConfig};
use crate::error::Result;
use crate::features::beat_tracking::BeatDecision;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Outcome of one processed window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    /// Window index
    pub window_index: i64,
    /// Whether the window is a beat
    pub is_beat: bool,
    /// Confidence in the current tempo
    pub confidence: f64,
    /// Current tempo in windows per beat (0 before any tempo)
    pub windows_between_beats: f64,
    /// End of the window in stream time, `(window_index + 1) · reaction_ms`
    pub timestamp_ms: f64,
}

impl BeatEvent {
    /// Event for `decision` on a stream with hops of `reaction_ms`
    pub fn from_decision(decision: &BeatDecision, reaction_ms: f64) -> Self {
        Self {
            window_index: decision.window_index,
            is_beat: decision.is_beat,
            confidence: decision.confidence,
            windows_between_beats: decision.windows_between_beats,
            timestamp_ms: (decision.window_index + 1) as f64 * reaction_ms,
        }
    }

    /// Current tempo in BPM, `None` before any tempo is adopted
    pub fn bpm(&self, reaction_ms: f64) -> Option<f64> {
        if self.windows_between_beats > 0.0 {
            Some(60_000.0 / (self.windows_between_beats * reaction_ms))
        } else {
            None
        }
    }
}

/// Receiver of per-window beat events
pub trait BeatObserver: Send {
    /// Called once per processed window, in order
    fn on_event(&mut self, event: &BeatEvent) -> Result<()>;

    /// Called once when the stream ends or is stopped
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl BeatObserver for Vec<BeatEvent> {
    fn on_event(&mut self, event: &BeatEvent) -> Result<()> {
        self.push(*event);
        Ok(())
    }
}

/// Beat prediction log: a header of tunables, then one line per beat with
/// its timestamp in whole milliseconds
#[derive(Debug)]
pub struct BeatLog<W: Write + Send> {
    writer: W,
    beats: u64,
}

impl<W: Write + Send> BeatLog<W> {
    /// Start a log on `writer`, writing the header immediately
    pub fn new(mut writer: W, config: &TrackerConfig, layout: &StreamLayout) -> Result<Self> {
        writeln!(writer, "min_frequency_hz = {}", config.min_frequency_hz)?;
        writeln!(writer, "min_reaction_ms = {}", config.min_reaction_ms)?;
        writeln!(writer, "expected_bpm = {}", config.expected_bpm)?;
        writeln!(writer, "beats_per_interval = {}", config.beats_per_interval)?;
        writeln!(writer, "reaction_ms = {:.4}", layout.reaction_ms)?;
        Ok(Self { writer, beats: 0 })
    }

    /// Beats written so far
    pub fn beats(&self) -> u64 {
        self.beats
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> BeatObserver for BeatLog<W> {
    fn on_event(&mut self, event: &BeatEvent) -> Result<()> {
        if event.is_beat {
            writeln!(self.writer, "{}", event.timestamp_ms as i64)?;
            self.beats += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Forwards events to another thread over a channel
///
/// The producer never blocks on a slow consumer: when a bounded channel is
/// full the event is dropped with a warning, and once the receiver is gone
/// events are discarded.
#[derive(Debug)]
pub struct ChannelObserver {
    sender: Sender<BeatEvent>,
    beats_only: bool,
    dropped: u64,
}

impl ChannelObserver {
    /// Observer plus receiver on a channel holding up to `capacity` events
    pub fn bounded(capacity: usize) -> (Self, Receiver<BeatEvent>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (Self::from_sender(sender), receiver)
    }

    /// Observer plus receiver on an unbounded channel
    pub fn unbounded() -> (Self, Receiver<BeatEvent>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self::from_sender(sender), receiver)
    }

    /// Observer sending into an existing channel
    pub fn from_sender(sender: Sender<BeatEvent>) -> Self {
        Self {
            sender,
            beats_only: false,
            dropped: 0,
        }
    }

    /// Forward only windows flagged as beats
    pub fn beats_only(mut self) -> Self {
        self.beats_only = true;
        self
    }

    /// Events dropped because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl BeatObserver for ChannelObserver {
    fn on_event(&mut self, event: &BeatEvent) -> Result<()> {
        if self.beats_only && !event.is_beat {
            return Ok(());
        }

        match self.sender.try_send(*event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                log::warn!(
                    "Beat channel full, dropped event for window {} ({} dropped)",
                    event.window_index,
                    self.dropped
                );
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!(
                    "Beat channel receiver gone, discarding window {}",
                    event.window_index
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(window_index: i64, is_beat: bool) -> BeatEvent {
        BeatEvent::from_decision(
            &BeatDecision {
                window_index,
                is_beat,
                adopted_tempo: false,
                confidence: 1.0,
                windows_between_beats: 50.0,
            },
            3.0,
        )
    }

    #[test]
    fn test_timestamp_and_bpm() {
        let e = event(99, true);
        assert_eq!(e.timestamp_ms, 300.0);
        // 50 windows of 3 ms = 150 ms per beat
        assert!((e.bpm(3.0).unwrap() - 400.0).abs() < 1e-9);

        let mut silent = e;
        silent.windows_between_beats = 0.0;
        assert_eq!(silent.bpm(3.0), None);
    }

    #[test]
    fn test_beat_log_writes_header_and_beats() {
        let config = TrackerConfig::default();
        let layout = StreamLayout::derive(&config, 44100.0).unwrap();
        let mut log = BeatLog::new(Vec::new(), &config, &layout).unwrap();

        log.on_event(&event(10, false)).unwrap();
        log.on_event(&event(332, true)).unwrap();
        log.finish().unwrap();
        assert_eq!(log.beats(), 1);

        let text = String::from_utf8(log.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "min_frequency_hz = 23.43");
        assert_eq!(lines[3], "beats_per_interval = 7");
        assert_eq!(lines.last(), Some(&"999"));
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_channel_observer_forwards_and_tolerates_disconnect() {
        let (mut observer, receiver) = ChannelObserver::unbounded();
        observer.on_event(&event(0, false)).unwrap();
        observer.on_event(&event(1, true)).unwrap();
        assert_eq!(receiver.try_iter().count(), 2);

        drop(receiver);
        assert!(observer.on_event(&event(2, true)).is_ok());
    }

    #[test]
    fn test_bounded_channel_drops_when_full() {
        let (observer, receiver) = ChannelObserver::bounded(1);
        let mut observer = observer.beats_only();
        observer.on_event(&event(0, false)).unwrap();
        observer.on_event(&event(1, true)).unwrap();
        observer.on_event(&event(2, true)).unwrap();

        assert_eq!(observer.dropped(), 1);
        assert_eq!(receiver.try_recv().unwrap().window_index, 1);
    }
}

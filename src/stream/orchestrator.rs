//! Window-by-window producer loop
//!
//! For every hop of input the orchestrator:
//!
//! 1. Appends the hop to the sample history and assembles the window ending
//!    at it (zero-filled before the start of the stream)
//! 2. Appends RMS, spectral and low-frequency volumes and the log-compressed
//!    Blackman-Harris spectrum
//! 3. Differentiates the spectrum into an impulse, denoises it and appends
//!    the raw, denoised and held impulses
//! 4. Appends a tempogram row: amplitude spectrum of the latest denoised
//!    impulses
//! 5. Runs the beat estimator, latches the beat marker, notifies observers
//! 6. Waits on backpressure, then hands the hop to the sink
//!
//! All memories are appended exactly once per window, so window `n` sits at
//! logical index `n` in each of them (the sample history is indexed by
//! sample).

use super::backpressure::Backpressure;
use super::control::StreamControl;
use super::output::{BeatEvent, BeatObserver};
use super::sink::PlaybackSink;
use super::source::FrameSource;
use crate::config::{StreamLayout, TrackerConfig};
use crate::error::{Result, TrackerError};
use crate::features::beat_tracking::BeatEstimator;
use crate::features::onset::{
    low_frequency_volume, rms_volume, spectral_impulse, spectral_volume, trailed_moving_average,
};
use crate::features::spectral::{log_compress, sqrt_in_place, SpectralEngine, Taper};
use crate::memory::SlidingWindowMemory;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Memories filled by the producer, shared read-only with readers
#[derive(Debug, Clone)]
pub struct StreamMemories {
    /// Mono sample history, indexed by sample (`history_windows` hops plus
    /// one window)
    pub samples: Arc<SlidingWindowMemory<f64>>,
    /// Log-compressed Blackman-Harris spectra, `fft_size` bins per row
    pub spectra: Arc<SlidingWindowMemory<Vec<f64>>>,
    /// Amplitude spectra of the latest `tempogram_len` denoised impulses
    pub tempogram: Arc<SlidingWindowMemory<Vec<f64>>>,
    /// Raw impulses
    pub impulses: Arc<SlidingWindowMemory<f64>>,
    /// Denoised impulses
    pub denoised_impulses: Arc<SlidingWindowMemory<f64>>,
    /// Denoised impulses with zeros replaced by the previous value
    pub held_impulses: Arc<SlidingWindowMemory<f64>>,
    /// RMS volume per window
    pub volumes: Arc<SlidingWindowMemory<f64>>,
    /// Spectrum sum per window
    pub spectral_volumes: Arc<SlidingWindowMemory<f64>>,
    /// Low-frequency spectrum sum per window
    pub low_frequency_volumes: Arc<SlidingWindowMemory<f64>>,
    /// Low-frequency volume latched at the last beat
    pub beat_markers: Arc<SlidingWindowMemory<f64>>,
}

impl StreamMemories {
    /// Allocate every memory for `layout`
    pub fn new(layout: &StreamLayout) -> Result<Self> {
        let scalar = || -> Result<Arc<SlidingWindowMemory<f64>>> {
            Ok(Arc::new(SlidingWindowMemory::new(layout.analysis_capacity)?))
        };

        Ok(Self {
            samples: Arc::new(SlidingWindowMemory::new(layout.sample_capacity())?),
            spectra: Arc::new(SlidingWindowMemory::with_row_len(
                layout.history_windows,
                layout.fft_size,
            )?),
            tempogram: Arc::new(SlidingWindowMemory::with_row_len(
                layout.history_windows,
                layout.tempogram_len,
            )?),
            impulses: Arc::new(SlidingWindowMemory::new(
                layout.history_windows.max(layout.moving_average_windows),
            )?),
            denoised_impulses: scalar()?,
            held_impulses: scalar()?,
            volumes: scalar()?,
            spectral_volumes: scalar()?,
            low_frequency_volumes: scalar()?,
            beat_markers: scalar()?,
        })
    }
}

/// Totals reported when a stream ends
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamSummary {
    /// Windows processed
    pub windows_processed: u64,
    /// Windows flagged as beats
    pub beats: u64,
    /// Whether the stream ended on a stop request rather than end of input
    pub stopped_early: bool,
    /// Tempo in windows per beat at the end of the stream (0 if none)
    pub windows_between_beats: f64,
}

/// Producer driving one stream from source to sink
pub struct StreamOrchestrator<S, K> {
    config: TrackerConfig,
    layout: StreamLayout,
    source: S,
    sink: K,
    memories: StreamMemories,
    estimator: BeatEstimator,
    window_engine: SpectralEngine,
    tempogram_engine: SpectralEngine,
    backpressure: Backpressure,
    control: StreamControl,
    observers: Vec<Box<dyn BeatObserver>>,
    window: Vec<f64>,
    tempogram_input: Vec<f64>,
    previous_spectrum: Option<Vec<f64>>,
    held_impulse: f64,
    beat_marker: f64,
    next_window: i64,
    beats: u64,
    failure: Option<TrackerError>,
}

impl<S: FrameSource, K: PlaybackSink> StreamOrchestrator<S, K> {
    /// Set up a stream from `source` to `sink`
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the config is invalid for the source's
    /// frame rate.
    pub fn new(config: TrackerConfig, source: S, sink: K) -> Result<Self> {
        let layout = StreamLayout::derive(&config, source.frame_rate())?;
        let memories = StreamMemories::new(&layout)?;
        let estimator = BeatEstimator::new(
            &config,
            &layout,
            memories.denoised_impulses.clone(),
            memories.volumes.clone(),
        )?;
        let window_engine = SpectralEngine::with_padding(layout.window_len, config.padding)?;
        let tempogram_engine = SpectralEngine::new(layout.tempogram_len)?;
        let backpressure = Backpressure::new(&config, &layout);

        Ok(Self {
            window: vec![0.0; layout.window_len],
            tempogram_input: vec![0.0; layout.tempogram_len],
            config,
            layout,
            source,
            sink,
            memories,
            estimator,
            window_engine,
            tempogram_engine,
            backpressure,
            control: StreamControl::new(),
            observers: Vec::new(),
            previous_spectrum: None,
            held_impulse: 0.0,
            beat_marker: 0.0,
            next_window: 0,
            beats: 0,
            failure: None,
        })
    }

    /// Register an observer for every beat event
    pub fn add_observer(&mut self, observer: Box<dyn BeatObserver>) {
        self.observers.push(observer);
    }

    /// Builder form of [`add_observer`](Self::add_observer)
    pub fn with_observer(mut self, observer: Box<dyn BeatObserver>) -> Self {
        self.add_observer(observer);
        self
    }

    /// Derived sizes of this stream
    pub fn layout(&self) -> &StreamLayout {
        &self.layout
    }

    /// Configuration of this stream
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Handles to the memories, for readers
    pub fn memories(&self) -> &StreamMemories {
        &self.memories
    }

    /// Stop/progress handle of this stream
    pub fn control(&self) -> StreamControl {
        self.control.clone()
    }

    /// Beat estimator state
    pub fn estimator(&self) -> &BeatEstimator {
        &self.estimator
    }

    /// The sink
    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Windows processed so far
    pub fn windows_processed(&self) -> u64 {
        self.next_window as u64
    }

    /// Process one window
    ///
    /// # Returns
    ///
    /// The window's beat event, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Source errors leave the orchestrator untouched. Any later error fails
    /// the orchestrator: the memories may hold part of the window, so this
    /// and every following call returns the same error.
    pub fn step(&mut self) -> Result<Option<BeatEvent>> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        let chunk = match self.source.next_chunk(self.layout.hop_len)? {
            Some(chunk) if !chunk.is_empty() => chunk,
            _ => return Ok(None),
        };
        match self.process_chunk(chunk) {
            Ok(event) => Ok(Some(event)),
            Err(e) => {
                log::warn!("Stream failed at window {}: {}", self.next_window, e);
                self.failure = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Whether a step failed, leaving the memories unusable
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    fn process_chunk(&mut self, mut chunk: Vec<f64>) -> Result<BeatEvent> {
        let hop_len = self.layout.hop_len;
        if chunk.len() > hop_len {
            return Err(TrackerError::SizeMismatch {
                expected: hop_len,
                actual: chunk.len(),
            });
        }
        chunk.resize(hop_len, 0.0);

        let n = self.next_window;
        let last_sample = self.memories.samples.append_batch(&chunk)?;
        self.assemble_window(last_sample)?;

        // Volumes and spectrum
        self.memories.volumes.append(rms_volume(&self.window))?;
        let mut spectrum = self.window_engine.transform(&self.window, Taper::BlackmanHarris)?;
        log_compress(&mut spectrum);
        let low_volume = low_frequency_volume(
            &spectrum,
            self.layout.frame_rate,
            self.config.low_frequency_cutoff_hz,
        );
        self.memories.spectral_volumes.append(spectral_volume(&spectrum))?;
        self.memories.low_frequency_volumes.append(low_volume)?;

        // Impulses
        let impulse = match &self.previous_spectrum {
            Some(previous) => {
                spectral_impulse(&spectrum, previous, self.config.impulse_band_fraction)?
            }
            None => 0.0,
        };
        self.memories.spectra.append(spectrum.clone())?;
        self.previous_spectrum = Some(spectrum);

        self.memories.impulses.append(impulse)?;
        let (oldest, newest) = self.memories.impulses.valid_range();
        let oldest = oldest.max(newest - self.layout.moving_average_windows as i64 + 1);
        let history = self
            .memories
            .impulses
            .get_range(oldest, (newest - oldest + 1) as usize)?;
        let denoised = trailed_moving_average(&history, self.config.denoise_gain)?;
        self.memories.denoised_impulses.append(denoised)?;
        if denoised != 0.0 {
            self.held_impulse = denoised;
        }
        self.memories.held_impulses.append(self.held_impulse)?;

        self.append_tempogram_row(n)?;

        // Beat decision
        let decision = self.estimator.process_window(n)?;
        if decision.is_beat {
            self.beat_marker = low_volume;
            self.beats += 1;
        }
        self.memories.beat_markers.append(self.beat_marker)?;

        let event = BeatEvent::from_decision(&decision, self.layout.reaction_ms);
        for observer in self.observers.iter_mut() {
            observer.on_event(&event)?;
        }
        if event.is_beat {
            log::trace!(
                "Beat at window {} ({:.0} ms), {:.2} windows/beat",
                n,
                event.timestamp_ms,
                event.windows_between_beats
            );
        }
        self.next_window += 1;

        if self.backpressure.wait(n, &self.sink, &self.control) {
            self.sink.write(&chunk)?;
        }

        Ok(event)
    }

    /// Process windows until the input ends or a stop is requested
    ///
    /// The sink is drained and every observer finished on the way out, also
    /// when a step fails; the step's error takes precedence.
    pub fn run(&mut self) -> Result<StreamSummary> {
        log::info!(
            "Starting stream at {:.0} Hz: {} samples per window, {:.2} ms reaction",
            self.layout.frame_rate,
            self.layout.window_len,
            self.layout.reaction_ms
        );

        let outcome = self.pump();
        let finished = self.finish();
        let stopped_early = outcome?;
        finished?;

        let summary = StreamSummary {
            windows_processed: self.windows_processed(),
            beats: self.beats,
            stopped_early,
            windows_between_beats: self.estimator.windows_between_beats(),
        };

        log::info!(
            "Stream {}: {} windows, {} beats",
            if stopped_early { "stopped" } else { "ended" },
            summary.windows_processed,
            summary.beats
        );

        Ok(summary)
    }

    /// Move the orchestrator onto its own producer thread
    pub fn spawn(self) -> Result<StreamHandle>
    where
        S: 'static,
        K: 'static,
    {
        let control = self.control.clone();
        let memories = self.memories.clone();
        let layout = self.layout.clone();
        let mut orchestrator = self;

        let thread = thread::Builder::new()
            .name("stream-producer".to_string())
            .spawn(move || orchestrator.run())
            .map_err(|e| TrackerError::ThreadError(e.to_string()))?;

        Ok(StreamHandle {
            control,
            memories,
            layout,
            thread: Some(thread),
        })
    }

    fn pump(&mut self) -> Result<bool> {
        loop {
            if self.control.is_stopped() {
                return Ok(true);
            }
            if self.step()?.is_none() {
                return Ok(false);
            }
        }
    }

    fn finish(&mut self) -> Result<()> {
        let mut result = self.sink.drain();
        for observer in self.observers.iter_mut() {
            let finished = observer.finish();
            if result.is_ok() {
                result = finished;
            }
        }
        result
    }

    fn assemble_window(&mut self, last_sample: i64) -> Result<()> {
        let len = self.layout.window_len as i64;
        let first = last_sample - len + 1;
        let available_from = first.max(self.memories.samples.min_valid_index());
        let missing = (available_from - first) as usize;

        self.window[..missing].fill(0.0);
        let tail = self
            .memories
            .samples
            .get_range(available_from, (last_sample - available_from + 1) as usize)?;
        self.window[missing..].copy_from_slice(&tail);
        Ok(())
    }

    fn append_tempogram_row(&mut self, n: i64) -> Result<()> {
        let len = self.layout.tempogram_len as i64;
        let first = n - len + 1;
        let available_from = first.max(self.memories.denoised_impulses.min_valid_index());
        let missing = (available_from - first) as usize;

        self.tempogram_input[..missing].fill(0.0);
        let tail = self
            .memories
            .denoised_impulses
            .get_range(available_from, (n - available_from + 1) as usize)?;
        self.tempogram_input[missing..].copy_from_slice(&tail);

        let mut row = self
            .tempogram_engine
            .transform(&self.tempogram_input, Taper::BlackmanHarris)?;
        sqrt_in_place(&mut row);
        self.memories.tempogram.append(row)?;
        Ok(())
    }
}

/// A stream running on its own producer thread
///
/// Dropping the handle stops the stream and joins the thread.
#[derive(Debug)]
pub struct StreamHandle {
    control: StreamControl,
    memories: StreamMemories,
    layout: StreamLayout,
    thread: Option<JoinHandle<Result<StreamSummary>>>,
}

impl StreamHandle {
    /// Stop/progress handle of the stream
    pub fn control(&self) -> &StreamControl {
        &self.control
    }

    /// Memories being filled, for readers
    pub fn memories(&self) -> &StreamMemories {
        &self.memories
    }

    /// Derived sizes of the stream
    pub fn layout(&self) -> &StreamLayout {
        &self.layout
    }

    /// Ask the producer to stop at the next window boundary
    pub fn stop(&self) {
        self.control.request_stop();
    }

    /// Whether the producer thread has returned
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Wait for the producer to finish (without stopping it)
    pub fn join(mut self) -> Result<StreamSummary> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| TrackerError::ThreadError("producer thread panicked".to_string()))?,
            None => Err(TrackerError::ThreadError(
                "producer thread already joined".to_string(),
            )),
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.control.request_stop();
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{NullSink, SliceSource};

    fn config() -> TrackerConfig {
        TrackerConfig {
            min_reaction_ms: 10.0,
            ..TrackerConfig::default()
        }
    }

    #[test]
    fn test_memories_stay_aligned() {
        let samples: Vec<f64> = (0..8000).map(|i| (i as f64 * 0.3).sin() * 0.2).collect();
        let source = SliceSource::new(samples, 8000.0).unwrap();
        let mut orchestrator = StreamOrchestrator::new(config(), source, NullSink::new()).unwrap();

        for _ in 0..20 {
            assert!(orchestrator.step().unwrap().is_some());
        }

        let m = orchestrator.memories().clone();
        for memory in [
            &m.denoised_impulses,
            &m.held_impulses,
            &m.volumes,
            &m.spectral_volumes,
            &m.low_frequency_volumes,
            &m.beat_markers,
        ] {
            assert_eq!(memory.last_index(), 19);
        }
        assert_eq!(m.spectra.last_index(), 19);
        assert_eq!(m.tempogram.last_index(), 19);
        assert_eq!(m.impulses.last_index(), 19);
        assert_eq!(m.samples.last_index(), 20 * 80 - 1);
        assert_eq!(m.spectra.get(3).unwrap().len(), orchestrator.layout().fft_size);
        assert_eq!(orchestrator.sink().frames_consumed(), 20 * 80);
    }

    #[test]
    fn test_first_window_has_no_impulse_and_partial_hop_is_padded() {
        // 1.5 hops of input
        let source = SliceSource::new(vec![0.5; 120], 8000.0).unwrap();
        let mut orchestrator = StreamOrchestrator::new(config(), source, NullSink::new()).unwrap();

        let first = orchestrator.step().unwrap().unwrap();
        assert_eq!(first.window_index, 0);
        assert_eq!(orchestrator.memories().impulses.get(0).unwrap(), 0.0);

        let second = orchestrator.step().unwrap().unwrap();
        assert_eq!(second.window_index, 1);
        assert_eq!(orchestrator.memories().samples.get(159).unwrap(), 0.0);
        assert!(orchestrator.step().unwrap().is_none());
    }

    /// Observer that fails on one window
    struct FailingObserver {
        fail_at: i64,
    }

    impl BeatObserver for FailingObserver {
        fn on_event(&mut self, event: &BeatEvent) -> Result<()> {
            if event.window_index == self.fail_at {
                return Err(TrackerError::Io("disk full".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_failed_step_is_not_retried_against_partial_memories() {
        let source = SliceSource::new(vec![0.1; 80 * 20], 8000.0).unwrap();
        let mut orchestrator = StreamOrchestrator::new(config(), source, NullSink::new())
            .unwrap()
            .with_observer(Box::new(FailingObserver { fail_at: 5 }));

        for _ in 0..5 {
            assert!(orchestrator.step().unwrap().is_some());
        }
        let first = orchestrator.step().unwrap_err();
        assert_eq!(first, TrackerError::Io("disk full".to_string()));
        assert!(orchestrator.is_failed());
        assert_eq!(orchestrator.memories().volumes.last_index(), 5);

        // Retrying neither advances the memories nor reports a window
        let retry = orchestrator.step().unwrap_err();
        assert_eq!(retry, first);
        assert_eq!(orchestrator.memories().volumes.last_index(), 5);
        assert_eq!(orchestrator.memories().spectra.last_index(), 5);
        assert_eq!(orchestrator.windows_processed(), 5);
        assert!(orchestrator.run().is_err());
    }

    #[test]
    fn test_run_reports_stop_request() {
        let source = SliceSource::new(vec![0.0; 80 * 100], 8000.0).unwrap();
        let mut orchestrator = StreamOrchestrator::new(config(), source, NullSink::new()).unwrap();
        orchestrator.control().request_stop();

        let summary = orchestrator.run().unwrap();
        assert!(summary.stopped_early);
        assert_eq!(summary.windows_processed, 0);
    }

    #[test]
    fn test_silence_produces_no_beats() {
        let source = SliceSource::new(vec![0.0; 80 * 300], 8000.0).unwrap();
        let mut events = Vec::new();
        {
            let mut orchestrator =
                StreamOrchestrator::new(config(), source, NullSink::new()).unwrap();
            let summary = orchestrator.run().unwrap();
            assert_eq!(summary.windows_processed, 300);
            assert_eq!(summary.beats, 0);
            assert!(!summary.stopped_early);
            events.extend((0..300).map(|i| orchestrator.memories().denoised_impulses.get(i).unwrap()));
        }
        assert!(events.iter().all(|&x| x == 0.0));
    }
}

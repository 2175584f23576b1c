//! Live streaming pipeline
//!
//! One producer steps through the audio window by window and fills the
//! shared memories; any number of readers poll them. The producer stays
//! within a bounded distance of the playback sink and can be stopped at any
//! window boundary, including while it waits on backpressure.

pub mod backpressure;
pub mod control;
pub mod orchestrator;
pub mod output;
pub mod sink;
pub mod source;

pub use backpressure::Backpressure;
pub use control::StreamControl;
pub use orchestrator::{StreamHandle, StreamMemories, StreamOrchestrator, StreamSummary};
pub use output::{BeatEvent, BeatLog, BeatObserver, ChannelObserver};
pub use sink::{NullSink, PlaybackSink};
pub use source::{FrameSource, SliceSource};

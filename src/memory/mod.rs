//! Bounded memories shared between the producer and its readers
//!
//! Everything the pipeline derives per window (samples, spectra, impulses,
//! volumes, beat markers) is appended to a [`SlidingWindowMemory`]. Readers
//! such as visualisers or the beat estimator copy values out by logical
//! window index and never block the producer for longer than one copy.

pub mod sliding_window;

pub use sliding_window::{Element, SlidingWindowMemory};

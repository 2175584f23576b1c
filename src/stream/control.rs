//! Stop signal and progress notification shared with the producer

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct ControlState {
    stopped: bool,
    progress: u64,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<ControlState>,
    wake: Condvar,
}

/// Cloneable handle for stopping a stream and waking a waiting producer
///
/// Readers (a playback thread, a visualizer) call
/// [`notify_progress`](Self::notify_progress) after consuming data so that a
/// producer held back by backpressure re-checks immediately instead of
/// sleeping out its poll interval.
#[derive(Debug, Clone, Default)]
pub struct StreamControl {
    shared: Arc<Shared>,
}

impl StreamControl {
    /// Create a control in the running state
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the producer to stop at the next window boundary
    pub fn request_stop(&self) {
        let mut state = self.shared.state.lock();
        state.stopped = true;
        self.shared.wake.notify_all();
    }

    /// Whether a stop has been requested
    pub fn is_stopped(&self) -> bool {
        self.shared.state.lock().stopped
    }

    /// Signal that a reader has advanced
    pub fn notify_progress(&self) {
        let mut state = self.shared.state.lock();
        state.progress = state.progress.wrapping_add(1);
        self.shared.wake.notify_all();
    }

    /// Wait up to `timeout` for progress or a stop request
    ///
    /// Returns `true` if the stream has been stopped.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut state = self.shared.state.lock();
        if state.stopped {
            return true;
        }

        let seen = state.progress;
        let deadline = std::time::Instant::now() + timeout;
        while !state.stopped && state.progress == seen {
            if self.shared.wake.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.stopped
    }
}

//! Cooperative cancellation token shared between playback threads.
//!
//! The runtime hands a clone of this token to whichever playback strategy it
//! spawns; well-behaved loops check it at their safe points. `stop()` may be
//! called from any thread, any number of times.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cancellation token for cooperative shutdown of playback threads.
///
/// Clones share state: cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, uncancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep in short slices so cancellation is observed promptly.
    ///
    /// Returns `true` if cancellation was requested before the full duration
    /// elapsed, mirroring `Event.wait()` semantics.
    pub fn wait(&self, duration: std::time::Duration) -> bool {
        const SLICE: std::time::Duration = std::time::Duration::from_millis(10);
        let deadline = std::time::Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(SLICE.min(deadline - now));
        }
    }
}

//! Single-flight guard for collection runs.
//!
//! A second trigger while a run is in flight is rejected, never queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the run slot. `None` if another run holds it.
    pub fn try_acquire(&self) -> Option<RunTicket> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunTicket {
                running: Arc::clone(&self.running),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Held for the duration of a run; releases the slot on drop, including
/// when the run panics or its future is cancelled.
#[derive(Debug)]
pub struct RunTicket {
    running: Arc<AtomicBool>,
}

impl Drop for RunTicket {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

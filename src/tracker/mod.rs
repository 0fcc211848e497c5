//! The single focus track: one task owns the notifier, the reconciler and
//! every overlay, and everything else talks to it through channels.

pub mod controller;
pub mod loop_worker;

use std::sync::atomic::{AtomicU64, Ordering};

pub use controller::TrackerController;
pub use loop_worker::tracking_loop;

/// Counters published by the tracking loop.
#[derive(Debug, Default)]
pub struct TrackerStats {
    passes: AtomicU64,
    lookups_applied: AtomicU64,
    lookups_discarded: AtomicU64,
}

impl TrackerStats {
    /// Reconciliation passes run so far.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    pub fn lookups_applied(&self) -> u64 {
        self.lookups_applied.load(Ordering::Relaxed)
    }

    /// Lookups that finished after their text had been superseded.
    pub fn lookups_discarded(&self) -> u64 {
        self.lookups_discarded.load(Ordering::Relaxed)
    }

    fn record_pass(&self) {
        self.passes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_lookup(&self, applied: bool) {
        if applied {
            self.lookups_applied.fetch_add(1, Ordering::Relaxed);
        } else {
            self.lookups_discarded.fetch_add(1, Ordering::Relaxed);
        }
    }
}

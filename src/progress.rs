//! Progress counters and cooperative cancellation.
//!
//! Producers (the conversion loop, transport workers) update named-stage
//! counters from several tasks; a single consumer periodically snapshots
//! them. Cancellation is a polled flag checked at object-granularity
//! boundaries, never mid-object.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Cooperative cancellation token.
///
/// Once requested, cancellation never resets for the operation the token
/// belongs to. Clones share the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Monotonic named-stage progress counters with tear-free snapshots.
///
/// `known_total` starts unknown and is set once (e.g. when a receive learns
/// the closure size of the root object).
#[derive(Debug, Clone, Default)]
pub struct ProgressCounters {
    stages: Arc<Mutex<BTreeMap<String, u64>>>,
    known_total: Arc<AtomicU64>,
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a stage counter, returning the new value.
    pub fn increment(&self, stage: &str) -> u64 {
        let mut stages = self.stages.lock();
        let counter = stages.entry(stage.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Consistent snapshot of all stage counters.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.stages.lock().clone()
    }

    /// Record the total object count once it becomes known.
    pub fn set_known_total(&self, total: u64) {
        self.known_total.store(total, Ordering::SeqCst);
    }

    /// Total object count, if known yet.
    pub fn known_total(&self) -> Option<u64> {
        match self.known_total.load(Ordering::SeqCst) {
            0 => None,
            total => Some(total),
        }
    }
}

/// Stage name for transport uploads during send.
pub const STAGE_UPLOAD: &str = "upload";
/// Stage name for transport downloads during receive.
pub const STAGE_DOWNLOAD: &str = "download";
/// Stage name for native conversion/bake work.
pub const STAGE_CONVERSION: &str = "conversion";

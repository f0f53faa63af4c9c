//! Cooperative cancellation for Monte Carlo runs
//!
//! The registry trips the flag; the batch loop polls it as iterations
//! finish and again before each queued iteration starts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancel flag for one run
///
/// Every clone watches the same flag. Tripping it is one-way.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    tripped: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    /// Trip the flag. Returns false if it was already tripped.
    pub fn cancel(&self) -> bool {
        !self.tripped.swap(true, Ordering::AcqRel)
    }
}

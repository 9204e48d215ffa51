//! Process health state.
//!
//! # States
//! - Ready: listener accepting, new work welcome
//! - Draining: stop requested, in-flight work finishing
//!
//! # State Transitions
//! ```text
//! Ready → Draining: stop() begins
//! ```
//! There is no way back; a drained server is replaced, not revived.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared liveness/readiness state, cheap to clone into handlers.
#[derive(Debug, Clone)]
pub struct HealthState {
    draining: Arc<AtomicBool>,
    started_at: Instant,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            draining: Arc::new(AtomicBool::new(false)),
            started_at: Instant::now(),
        }
    }

    /// Whether the server should receive new traffic.
    pub fn is_ready(&self) -> bool {
        !self.draining.load(Ordering::Acquire)
    }

    /// Mark the server as draining. Returns `true` on the first call.
    pub fn begin_draining(&self) -> bool {
        let first = !self.draining.swap(true, Ordering::AcqRel);
        if first {
            tracing::info!("Readiness set to draining");
        }
        first
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

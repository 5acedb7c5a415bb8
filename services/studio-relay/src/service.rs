//! Runtime service counters and shutdown constants

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::{Duration, Instant};

/// How long to wait for in-flight requests after the shutdown signal.
/// Batch generations can take tens of seconds, so this is generous.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime metrics tracked while the service is running.
#[derive(Debug, Clone)]
pub struct ServiceMetrics {
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            errors_total: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

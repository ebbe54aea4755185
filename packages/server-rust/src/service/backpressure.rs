//! Backpressure regulator for `OP_BATCH` admission.
//!
//! Tracks in-flight operation counts and forces a synchronous (fully
//! awaited) path once `opsSinceLastSync` crosses `sync_frequency`, so a
//! steady stream of fire-and-forget writes can never starve the durability
//! machinery indefinitely.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;

/// Regulator configuration.
#[derive(Debug, Clone)]
pub struct BackpressureConfig {
    /// Maximum number of concurrently in-flight operations.
    pub max_pending: u32,
    /// Number of async-path ops permitted between forced sync flushes.
    pub sync_frequency: u64,
    /// How long `admit()` waits for capacity before giving up.
    pub backoff_ms: u64,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            max_pending: 1000,
            sync_frequency: 256,
            backoff_ms: 250,
        }
    }
}

/// Outcome of an admission request.
#[derive(Debug)]
pub enum Admission {
    /// Proceed on the normal async path. Holding the permit keeps `pending`
    /// incremented until it is dropped.
    Async(OwnedSemaphorePermit),
    /// The caller must take the synchronous, fully-awaited path; the
    /// `opsSinceLastSync` counter has already been reset.
    ForceSync,
}

/// Holds `pending` and `opsSinceLastSync` counters described in the spec's
/// batch executor section, backed by a `tokio::sync::Semaphore` for the
/// capacity wait.
pub struct BackpressureRegulator {
    capacity: Arc<Semaphore>,
    ops_since_last_sync: AtomicU64,
    config: BackpressureConfig,
}

impl BackpressureRegulator {
    #[must_use]
    pub fn new(config: BackpressureConfig) -> Self {
        Self {
            capacity: Arc::new(Semaphore::new(config.max_pending as usize)),
            ops_since_last_sync: AtomicU64::new(0),
            config,
        }
    }

    /// Current number of in-flight operations.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.config.max_pending as usize - self.capacity.available_permits()
    }

    /// Requests admission for one operation. Returns `ForceSync` when the
    /// sync-frequency threshold is crossed, `Async(permit)` otherwise, or
    /// an error on backoff timeout. Dropping the permit releases capacity.
    pub async fn admit(&self) -> Result<Admission, BackpressureTimeout> {
        let since = self.ops_since_last_sync.fetch_add(1, Ordering::Relaxed) + 1;
        if since >= self.config.sync_frequency {
            self.ops_since_last_sync.store(0, Ordering::Relaxed);
            return Ok(Admission::ForceSync);
        }

        match timeout(
            Duration::from_millis(self.config.backoff_ms),
            self.capacity.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => Ok(Admission::Async(permit)),
            Ok(Err(_)) | Err(_) => Err(BackpressureTimeout),
        }
    }
}

/// Raised when `admit()` cannot secure capacity within `backoff_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("server overloaded, try again later")]
pub struct BackpressureTimeout;

//! Striped event executor: preserves per-key ordering while fanning work
//! out across a fixed number of parallel FIFO lanes.
//!
//! Ops for the same `(map_name, key)` pair always land on the same stripe
//! and are processed in arrival order; ops for different keys run
//! concurrently across stripes. Grounded on the CRDT merge's commutativity
//! requirement: cross-key reordering is safe, same-key reordering is not.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use latticedb_core::fnv1a_hash;
use tokio::sync::{mpsc, oneshot};

/// Default number of stripes when not overridden by configuration.
pub const DEFAULT_STRIPE_COUNT: usize = 4;

/// Default bounded queue capacity per stripe.
const STRIPE_QUEUE_CAPACITY: usize = 1024;

type Job = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// A fixed pool of FIFO worker lanes, keyed by `hash(map_name, key) mod stripes`.
pub struct StripedExecutor {
    senders: Vec<mpsc::Sender<Job>>,
}

impl StripedExecutor {
    /// Spawns `stripe_count` worker tasks, each draining its own bounded
    /// mpsc channel sequentially.
    #[must_use]
    pub fn new(stripe_count: usize) -> Self {
        let stripe_count = stripe_count.max(1);
        let mut senders = Vec::with_capacity(stripe_count);
        for _ in 0..stripe_count {
            let (tx, mut rx) = mpsc::channel::<Job>(STRIPE_QUEUE_CAPACITY);
            tokio::spawn(async move {
                while let Some(job) = rx.recv().await {
                    job().await;
                }
            });
            senders.push(tx);
        }
        Self { senders }
    }

    /// Stripe index a given map/key pair is routed to.
    #[must_use]
    pub fn stripe_for(&self, map_name: &str, key: &str) -> usize {
        let combined = format!("{map_name}\u{0}{key}");
        (fnv1a_hash(&combined) as usize) % self.senders.len()
    }

    /// Submits `f` to run on the stripe owning `(map_name, key)`, returning
    /// its result once the stripe reaches it. Returns `Err` if the stripe's
    /// queue is full (oversubscription), matching the spec's `onReject` path.
    pub async fn submit<F, Fut, R>(&self, map_name: &str, key: &str, f: F) -> Result<R, StripeRejected>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        let idx = self.stripe_for(map_name, key);
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            Box::pin(async move {
                let result = f().await;
                let _ = tx.send(result);
            })
        });
        self.senders[idx]
            .try_send(job)
            .map_err(|_| StripeRejected)?;
        rx.await.map_err(|_| StripeRejected)
    }

    /// Number of stripes in this pool.
    #[must_use]
    pub fn stripe_count(&self) -> usize {
        self.senders.len()
    }
}

/// Returned when a stripe's bounded queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stripe queue full, operation rejected")]
pub struct StripeRejected;

/// Shared handle, cheaply cloned into every domain service that needs
/// per-key-ordered dispatch.
pub type SharedStripedExecutor = Arc<StripedExecutor>;

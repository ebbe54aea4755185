//! Distributed garbage collection of expired tombstones.
//!
//! Each node tracks the oldest timestamp it still needs for correctness
//! (its "local minimum"). The node with the smallest node ID among active
//! members acts as GC leader: it gathers every node's local minimum, takes
//! the overall minimum, subtracts the GC age grace period, and broadcasts
//! the result as the cluster's safe-to-prune timestamp. Any tombstone older
//! than that is physically removed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

/// Default grace period before a tombstone becomes eligible for pruning,
/// giving slow peers time to observe the delete before it vanishes.
pub const DEFAULT_GC_AGE_MS: u64 = 30 * 24 * 60 * 60 * 1000;

/// Tracks this node's local minimum timestamp (the oldest HLC millis value
/// still needed to correctly resolve any in-flight or recently-synced
/// operation) and participates in the cluster-wide safe-timestamp vote.
pub struct GcCoordinator {
    gc_age_ms: u64,
    local_minimum_millis: AtomicU64,
    /// Reports collected by the leader, keyed by node id.
    reports: DashMap<String, u64>,
}

impl GcCoordinator {
    #[must_use]
    pub fn new(gc_age_ms: u64) -> Self {
        Self {
            gc_age_ms,
            local_minimum_millis: AtomicU64::new(u64::MAX),
            reports: DashMap::new(),
        }
    }

    /// Updates this node's local minimum; called whenever the oldest
    /// outstanding dependency advances (e.g. after a sync completes).
    pub fn report_local_minimum(&self, millis: u64) {
        self.local_minimum_millis.fetch_min(millis, Ordering::SeqCst);
    }

    #[must_use]
    pub fn local_minimum(&self) -> u64 {
        self.local_minimum_millis.load(Ordering::SeqCst)
    }

    /// Leader-side: records a peer's reported local minimum.
    pub fn record_report(&self, node_id: String, millis: u64) {
        self.reports.insert(node_id, millis);
    }

    /// Leader-side: computes the cluster safe timestamp from all reports
    /// received so far (including this node's own), or `None` if no node
    /// has reported. `report_local_minimum` must be current before calling.
    #[must_use]
    pub fn compute_safe_timestamp(&self, self_node_id: &str) -> Option<u64> {
        let mut min = self.local_minimum();
        if min == u64::MAX {
            min = u64::MAX;
        }
        let mut any = min != u64::MAX;
        for entry in &self.reports {
            if entry.key() != self_node_id {
                min = min.min(*entry.value());
                any = true;
            }
        }
        if !any {
            return None;
        }
        Some(min.saturating_sub(self.gc_age_ms))
    }

    /// Determines whether this node is the GC leader: the active member
    /// with the lexicographically smallest node id.
    #[must_use]
    pub fn is_leader(self_node_id: &str, active_members: &[String]) -> bool {
        active_members
            .iter()
            .min()
            .is_some_and(|smallest| smallest == self_node_id)
    }
}

impl Default for GcCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_GC_AGE_MS)
    }
}

/// Decides whether a tombstone recorded at `tombstone_millis` may be
/// physically pruned given the cluster's current `safe_timestamp`.
#[must_use]
pub fn is_prunable(tombstone_millis: u64, safe_timestamp: u64) -> bool {
    tombstone_millis <= safe_timestamp
}

/// Shared handle, held by the persistence domain service and the
/// coordinator context's background GC task.
pub type SharedGcCoordinator = Arc<GcCoordinator>;

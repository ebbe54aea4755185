//! Anti-entropy repair scheduler.
//!
//! Periodically compares this node's `MerkleTree` root hash for each owned
//! partition against a peer's, and on mismatch walks the trie one hex digit
//! at a time (`bucket_hashes` -> `leaf_keys`) to find the specific keys that
//! differ, then exchanges just those records. Concurrency is capped so
//! repair traffic doesn't starve client operations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use latticedb_core::merkle::MerkleTree;
use tokio::sync::Semaphore;

/// Default interval between anti-entropy scans of a given partition.
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 5 * 60 * 1000;

/// Default cap on concurrently in-flight repairs across all partitions.
pub const DEFAULT_CONCURRENT_REPAIR_CAP: usize = 2;

/// One record exchanged during leaf-level repair.
#[derive(Debug, Clone)]
pub struct RepairRecord {
    pub key: String,
    pub item_hash: u32,
}

/// Abstraction over "ask a peer node for its tree state", so the walk logic
/// is unit-testable without a network round trip.
#[async_trait]
pub trait RepairPeer: Send + Sync {
    async fn root_hash(&self, map_name: &str) -> anyhow::Result<u32>;
    async fn bucket_hashes(&self, map_name: &str, path: &[u8]) -> anyhow::Result<Vec<(u8, u32)>>;
    async fn leaf_keys(&self, map_name: &str, path: &[u8]) -> anyhow::Result<Vec<RepairRecord>>;
}

/// Result of comparing this node's tree against a peer's for one map.
#[derive(Debug, Clone, Default)]
pub struct RepairPlan {
    /// Keys present (or differing) on the peer that this node should pull.
    pub keys_to_pull: Vec<String>,
}

/// Walks the trie below `path`, descending into every hex digit whose
/// bucket hash differs between `local` and the peer, accumulating leaf keys
/// that need reconciliation.
pub async fn diff_against_peer(
    local: &MerkleTree,
    peer: &dyn RepairPeer,
    map_name: &str,
) -> anyhow::Result<RepairPlan> {
    let peer_root = peer.root_hash(map_name).await?;
    if peer_root == local.get_root_hash() {
        return Ok(RepairPlan::default());
    }

    let mut plan = RepairPlan::default();
    let mut frontier: Vec<Vec<u8>> = vec![Vec::new()];

    while let Some(path) = frontier.pop() {
        let local_children = local.bucket_hashes(&path);
        if local_children.is_empty() {
            // leaf level: pull every key the peer has under this path
            let peer_leaf = peer.leaf_keys(map_name, &path).await?;
            let local_leaf = local.leaf_keys(&path);
            for record in peer_leaf {
                let matches = local_leaf.get(&record.key) == Some(&record.item_hash);
                if !matches {
                    plan.keys_to_pull.push(record.key);
                }
            }
            continue;
        }

        let peer_children = peer.bucket_hashes(map_name, &path).await?;
        for (digit, peer_hash) in peer_children {
            let local_hash = local_children
                .iter()
                .find(|(d, _)| *d == digit)
                .map(|(_, h)| *h)
                .unwrap_or(0);
            if local_hash != peer_hash {
                let mut child_path = path.clone();
                child_path.push(digit);
                frontier.push(child_path);
            }
        }
    }

    Ok(plan)
}

/// Bounds how many repair walks may run concurrently across all partitions.
pub struct RepairScheduler {
    semaphore: Arc<Semaphore>,
    scan_interval: Duration,
    repairs_run: AtomicUsize,
}

impl RepairScheduler {
    #[must_use]
    pub fn new(concurrent_cap: usize, scan_interval_ms: u64) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrent_cap.max(1))),
            scan_interval: Duration::from_millis(scan_interval_ms),
            repairs_run: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    /// Runs one repair pass against `peer`, respecting the concurrency cap.
    pub async fn run_once(
        &self,
        local: &MerkleTree,
        peer: &dyn RepairPeer,
        map_name: &str,
    ) -> anyhow::Result<RepairPlan> {
        let _permit = self.semaphore.clone().acquire_owned().await?;
        let plan = diff_against_peer(local, peer, map_name).await?;
        self.repairs_run.fetch_add(1, Ordering::Relaxed);
        Ok(plan)
    }

    #[must_use]
    pub fn repairs_run(&self) -> usize {
        self.repairs_run.load(Ordering::Relaxed)
    }
}

impl Default for RepairScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENT_REPAIR_CAP, DEFAULT_SCAN_INTERVAL_MS)
    }
}

/// Shared handle, held by the sync domain service and the coordinator context.
pub type SharedRepairScheduler = Arc<RepairScheduler>;

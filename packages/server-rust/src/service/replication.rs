//! Backup replication pipeline.
//!
//! Applies a committed CRDT mutation to a partition's backup replicas at the
//! write concern requested by the client: `FIRE_AND_FORGET`/`MEMORY`/`APPLIED`
//! fire the sends and return without waiting, `REPLICATED` waits for a
//! majority of backups to ack (quorum), `PERSISTED` waits for all of them.
//! Inbound application on a backup node is idempotent, deduplicated by
//! `op_id` against a bounded LRU so a retried send after a dropped ack never
//! double-applies.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashSet;
use latticedb_core::messages::base::WriteConcern;
use parking_lot::Mutex;

use crate::cluster::messages::DeltaOp;

/// Sends a delta operation to one backup node and waits for its ack.
///
/// Implemented by the cluster transport layer; kept as a trait so this
/// pipeline can be unit-tested without a real network connection.
#[async_trait]
pub trait ReplicationTransport: Send + Sync {
    async fn send_to_backup(&self, node_id: &str, op: DeltaOp) -> anyhow::Result<()>;
}

/// Bounded FIFO de-dup set for inbound `op_id`s, so a re-delivered
/// replication message after a lost ack is a no-op rather than a double
/// apply.
pub struct DedupWindow {
    capacity: usize,
    seen: DashSet<String>,
    order: Mutex<VecDeque<String>>,
}

impl DedupWindow {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            seen: DashSet::new(),
            order: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns `true` if `op_id` is new (and records it); `false` if already seen.
    pub fn check_and_insert(&self, op_id: &str) -> bool {
        if !self.seen.insert(op_id.to_string()) {
            return false;
        }
        let mut order = self.order.lock();
        order.push_back(op_id.to_string());
        if order.len() > self.capacity {
            if let Some(oldest) = order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }
}

fn quorum_count(backup_count: usize) -> usize {
    (1 + backup_count).div_ceil(2)
}

/// What a write concern requires of this replication call before it
/// resolves: no wait, a majority of backups, or every backup.
enum WaitRequirement {
    None,
    Quorum,
    All,
}

fn wait_requirement(concern: &WriteConcern) -> WaitRequirement {
    match concern {
        WriteConcern::FIRE_AND_FORGET | WriteConcern::MEMORY | WriteConcern::APPLIED => {
            WaitRequirement::None
        }
        WriteConcern::REPLICATED => WaitRequirement::Quorum,
        WriteConcern::PERSISTED => WaitRequirement::All,
    }
}

/// Drives replication of one committed operation to a partition's backups.
pub struct ReplicationPipeline<T: ReplicationTransport> {
    transport: Arc<T>,
    pub dedup: DedupWindow,
}

impl<T: ReplicationTransport> ReplicationPipeline<T> {
    #[must_use]
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            dedup: DedupWindow::new(10_000),
        }
    }

    /// Replicates `op` to `backup_nodes` honoring `concern`. Returns once
    /// the concern's condition is met; for the non-waiting concerns the
    /// sends are dispatched in the background and this returns immediately.
    pub async fn replicate(
        &self,
        op: DeltaOp,
        backup_nodes: &[String],
        concern: &WriteConcern,
    ) -> ReplicationOutcome {
        if backup_nodes.is_empty() {
            return ReplicationOutcome {
                acked: 0,
                required: 0,
            };
        }

        let required = match wait_requirement(concern) {
            WaitRequirement::None => 0,
            WaitRequirement::Quorum => quorum_count(backup_nodes.len()),
            WaitRequirement::All => backup_nodes.len(),
        };

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<bool>();
        for node in backup_nodes {
            let transport = self.transport.clone();
            let node = node.clone();
            let op = op.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let ok = transport.send_to_backup(&node, op).await.is_ok();
                let _ = tx.send(ok);
            });
        }
        drop(tx);

        if required == 0 {
            return ReplicationOutcome {
                acked: 0,
                required: 0,
            };
        }

        let mut acked = 0;
        while acked < required {
            match rx.recv().await {
                Some(true) => acked += 1,
                Some(false) => {}
                None => break,
            }
        }
        ReplicationOutcome { acked, required }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicationOutcome {
    pub acked: usize,
    pub required: usize,
}

impl ReplicationOutcome {
    #[must_use]
    pub fn satisfied(&self) -> bool {
        self.acked >= self.required
    }
}

/// Shared handle used by coordinator wiring.
pub type SharedReplication<T> = Arc<ReplicationPipeline<T>>;

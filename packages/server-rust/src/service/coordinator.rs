//! Coordinator context: the single struct bundling every cross-cutting
//! dependency a domain service needs, constructed once at startup and
//! handed to every `ManagedService` by reference. Exists so operation
//! handlers never reach for a global singleton.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use latticedb_core::hlc::{SystemClock, Timestamp, HLC};
use latticedb_core::lww_map::LWWMap;
use latticedb_core::or_map::ORMap;
use latticedb_core::types::Value;
use parking_lot::RwLock;
use tokio::sync::oneshot;
use tokio::time::timeout;

use crate::cluster::traits::ClusterService;
use crate::network::connection::ConnectionRegistry;
use crate::storage::map_data_store::MapDataStore;

use super::gc::GcCoordinator;
use super::journal::Journal;
use super::lock_manager::LockManager;
use super::policy::PolicyEngine;
use super::query_registry::QueryRegistry;
use super::search_index::SearchIndex;
use super::topic_bus::TopicBus;
use super::write_ack::WriteAckCoordinator;

/// A single named CRDT map, either LWW or OR, held behind a `parking_lot`
/// lock so the registry can be shared across async tasks without an actor.
pub enum MapHandle {
    Lww(RwLock<LWWMap<Value>>),
    Or(RwLock<ORMap<Value>>),
}

/// Registry of every CRDT map this node hosts, indexed by map name.
///
/// Maps are created lazily on first reference (`get_or_create_lww`/
/// `get_or_create_or`) rather than pre-declared, matching the schemaless
/// "any map name is valid" behavior the client SDKs assume.
#[derive(Default)]
pub struct LwwOrMapRegistry {
    maps: DashMap<String, Arc<MapHandle>>,
    node_id: String,
}

impl LwwOrMapRegistry {
    #[must_use]
    pub fn new(node_id: String) -> Self {
        Self {
            maps: DashMap::new(),
            node_id,
        }
    }

    #[must_use]
    pub fn get_or_create_lww(&self, map_name: &str) -> Arc<MapHandle> {
        self.maps
            .entry(map_name.to_string())
            .or_insert_with(|| {
                let hlc = HLC::new(self.node_id.clone(), Box::new(SystemClock));
                Arc::new(MapHandle::Lww(RwLock::new(LWWMap::new(hlc))))
            })
            .clone()
    }

    #[must_use]
    pub fn get_or_create_or(&self, map_name: &str) -> Arc<MapHandle> {
        self.maps
            .entry(map_name.to_string())
            .or_insert_with(|| {
                let hlc = HLC::new(self.node_id.clone(), Box::new(SystemClock));
                Arc::new(MapHandle::Or(RwLock::new(ORMap::new(hlc))))
            })
            .clone()
    }

    #[must_use]
    pub fn get(&self, map_name: &str) -> Option<Arc<MapHandle>> {
        self.maps.get(map_name).map(|e| e.clone())
    }

    #[must_use]
    pub fn map_count(&self) -> usize {
        self.maps.len()
    }

    /// Prunes every hosted map's tombstones older than `safe_timestamp`,
    /// the cluster-wide safe point computed by `GcCoordinator`. Returns the
    /// pruned keys per map name, for logging/metrics.
    pub fn prune_all(&self, safe_timestamp: &Timestamp) -> HashMap<String, Vec<String>> {
        let mut pruned = HashMap::new();
        for entry in &self.maps {
            let keys = match entry.value().as_ref() {
                MapHandle::Lww(m) => m.write().prune(safe_timestamp),
                MapHandle::Or(m) => m.write().prune(safe_timestamp),
            };
            if !keys.is_empty() {
                pruned.insert(entry.key().clone(), keys);
            }
        }
        pruned
    }
}

/// The write-ack coordinator's pending-operation table, named per the
/// bundle in the coordinator context; it *is* the `WriteAckCoordinator`,
/// aliased here so the field name in `Coordinator` matches its role.
pub type PendingWriteTable = WriteAckCoordinator;

/// Tracks outstanding scatter-gather cluster queries awaiting replies from
/// data nodes (§4.10's coordinator-node role): one entry per query id,
/// collecting partial result batches until every data node has replied or
/// the scatter-gather timeout elapses.
pub struct PendingClusterQueryTable {
    pending: DashMap<String, PendingClusterQuery>,
}

struct PendingClusterQuery {
    expected_partitions: usize,
    collected: Vec<(String, Value)>,
    resolver: Option<oneshot::Sender<Vec<(String, Value)>>>,
}

/// Default scatter-gather timeout for a distributed query fan-out.
pub const SCATTER_GATHER_TIMEOUT_MS: u64 = 5_000;

impl Default for PendingClusterQueryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingClusterQueryTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Registers a new fan-out, returning a receiver that resolves once
    /// every partition has reported (deduplicated by key) or the timeout
    /// elapses, whichever comes first.
    pub fn register(&self, query_id: String, expected_partitions: usize) -> oneshot::Receiver<Vec<(String, Value)>> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            query_id,
            PendingClusterQuery {
                expected_partitions,
                collected: Vec::new(),
                resolver: Some(tx),
            },
        );
        rx
    }

    /// Records one partition's partial result batch, resolving the fan-out
    /// once `expected_partitions` batches have arrived. Keys are deduped,
    /// last-write-wins among partition replies (partitions don't overlap in
    /// practice, so this only matters for retried/duplicate replies).
    pub fn report_partition_result(&self, query_id: &str, rows: Vec<(String, Value)>) {
        let mut resolve_with = None;
        if let Some(mut entry) = self.pending.get_mut(query_id) {
            for (key, value) in rows {
                if let Some(existing) = entry.collected.iter_mut().find(|(k, _)| *k == key) {
                    existing.1 = value;
                } else {
                    entry.collected.push((key, value));
                }
            }
            entry.expected_partitions = entry.expected_partitions.saturating_sub(1);
            if entry.expected_partitions == 0 {
                if let Some(resolver) = entry.resolver.take() {
                    resolve_with = Some((resolver, entry.collected.clone()));
                }
            }
        }
        if let Some((resolver, rows)) = resolve_with {
            let _ = resolver.send(rows);
            self.pending.remove(query_id);
        }
    }

    /// Awaits the fan-out's result with the scatter-gather timeout,
    /// returning whatever was collected so far on timeout.
    pub async fn await_result(
        &self,
        query_id: &str,
        rx: oneshot::Receiver<Vec<(String, Value)>>,
    ) -> Vec<(String, Value)> {
        match timeout(Duration::from_millis(SCATTER_GATHER_TIMEOUT_MS), rx).await {
            Ok(Ok(rows)) => rows,
            _ => self
                .pending
                .remove(query_id)
                .map(|(_, e)| e.collected)
                .unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Every cross-cutting dependency a domain service (CRDT, sync, query,
/// messaging, coordination, search, persistence) needs, constructed once
/// at startup. Domain services take `Arc<Coordinator>` rather than the
/// individual pieces so adding a new shared dependency doesn't ripple
/// through every service's constructor signature.
pub struct Coordinator {
    pub maps: Arc<LwwOrMapRegistry>,
    pub connections: Arc<ConnectionRegistry>,
    pub queries: Arc<QueryRegistry>,
    pub pending_writes: Arc<PendingWriteTable>,
    pub pending_cluster_queries: Arc<PendingClusterQueryTable>,
    pub cluster: Arc<dyn ClusterService>,
    pub data_store: Arc<dyn MapDataStore>,
    pub policy: Arc<PolicyEngine>,
    pub locks: Arc<LockManager>,
    pub topics: Arc<TopicBus>,
    pub gc: Arc<GcCoordinator>,
    pub search: Arc<SearchIndex>,
    pub journal: Arc<Journal>,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        node_id: String,
        cluster: Arc<dyn ClusterService>,
        data_store: Arc<dyn MapDataStore>,
        policy: Arc<PolicyEngine>,
    ) -> Self {
        let journal = Arc::new(Journal::new(node_id.clone()));
        Self {
            maps: Arc::new(LwwOrMapRegistry::new(node_id)),
            connections: Arc::new(ConnectionRegistry::new()),
            queries: Arc::new(QueryRegistry::new()),
            pending_writes: Arc::new(WriteAckCoordinator::new()),
            pending_cluster_queries: Arc::new(PendingClusterQueryTable::new()),
            cluster,
            data_store,
            policy,
            locks: Arc::new(LockManager::new()),
            topics: Arc::new(TopicBus::new()),
            gc: Arc::new(GcCoordinator::default()),
            search: Arc::new(SearchIndex::new()),
            journal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_creates_map_lazily() {
        let registry = LwwOrMapRegistry::new("node-1".to_string());
        assert_eq!(registry.map_count(), 0);
        registry.get_or_create_lww("users");
        assert_eq!(registry.map_count(), 1);
        registry.get_or_create_lww("users");
        assert_eq!(registry.map_count(), 1);
    }

    #[tokio::test]
    async fn cluster_query_table_resolves_after_all_partitions_report() {
        let table = PendingClusterQueryTable::new();
        let rx = table.register("q1".to_string(), 2);
        table.report_partition_result("q1", vec![("k1".to_string(), Value::Int(1))]);
        table.report_partition_result("q1", vec![("k2".to_string(), Value::Int(2))]);
        let rows = table.await_result("q1", rx).await;
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn cluster_query_table_times_out_with_partial_results() {
        let table = PendingClusterQueryTable::new();
        let rx = table.register("q2".to_string(), 3);
        table.report_partition_result("q2", vec![("k1".to_string(), Value::Int(1))]);
        let rows = table.await_result("q2", rx).await;
        assert_eq!(rows.len(), 1);
    }
}

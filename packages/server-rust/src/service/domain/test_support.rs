//! Test-only fakes shared by the domain service unit tests: a single-node
//! `ClusterService` stub with a fixed, empty partition table, used wherever
//! a test needs to construct a `Coordinator` without a real cluster layer.
#![cfg(test)]

use async_trait::async_trait;
use std::sync::Arc;

use crate::cluster::state::ClusterPartitionTable;
use crate::cluster::traits::ClusterService;
use crate::cluster::types::{ClusterHealth, MembersView};
use crate::service::registry::{ManagedService, ServiceContext};

pub struct FakeCluster {
    node_id: String,
    partition_table: ClusterPartitionTable,
}

impl FakeCluster {
    pub fn new(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            partition_table: ClusterPartitionTable::new(8),
        }
    }
}

#[async_trait]
impl ManagedService for FakeCluster {
    fn name(&self) -> &'static str {
        "cluster"
    }
    async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
        Ok(())
    }
    async fn reset(&self) -> anyhow::Result<()> {
        Ok(())
    }
    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ClusterService for FakeCluster {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn is_master(&self) -> bool {
        true
    }

    fn master_id(&self) -> Option<String> {
        Some(self.node_id.clone())
    }

    fn members_view(&self) -> Arc<MembersView> {
        Arc::new(MembersView {
            version: 1,
            members: Vec::new(),
        })
    }

    fn partition_table(&self) -> &ClusterPartitionTable {
        &self.partition_table
    }

    fn subscribe_changes(&self) -> tokio::sync::mpsc::UnboundedReceiver<crate::cluster::state::ClusterChange> {
        let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
        rx
    }

    fn health(&self) -> ClusterHealth {
        ClusterHealth {
            node_count: 1,
            active_nodes: 1,
            ..Default::default()
        }
    }
}

//! Standalone load harness for the CRDT write path.
//!
//! Not a criterion benchmark (`harness = false`): drives a fixed batch of
//! `ClientOp` writes directly through `CrdtService`, in-process, and reports
//! latency percentiles via `hdrhistogram`. Mirrors the shape of the
//! integration pipeline tests but without the classify/router/middleware
//! layers, to isolate the domain service's own cost.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use hdrhistogram::Histogram;
use tokio::sync::mpsc;
use tower::{Service, ServiceExt};

use latticedb_core::hlc::{LWWRecord, Timestamp};
use latticedb_core::{ClientOp, WriteConcern};
use latticedb_server::cluster::state::{ClusterChange, ClusterPartitionTable};
use latticedb_server::cluster::traits::ClusterService;
use latticedb_server::cluster::types::{ClusterHealth, MembersView};
use latticedb_server::service::coordinator::Coordinator;
use latticedb_server::service::domain::CrdtService;
use latticedb_server::service::operation::{Operation, OperationContext};
use latticedb_server::service::policy::PolicyEngine;
use latticedb_server::service::registry::ServiceContext;
use latticedb_server::service::ManagedService;
use latticedb_server::storage::NullDataStore;

const BATCH_SIZE: usize = 10_000;

struct BenchCluster {
    partition_table: ClusterPartitionTable,
}

#[async_trait]
impl ManagedService for BenchCluster {
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
impl ClusterService for BenchCluster {
    fn node_id(&self) -> &str {
        "bench-node"
    }
    fn is_master(&self) -> bool {
        true
    }
    fn master_id(&self) -> Option<String> {
        Some("bench-node".to_string())
    }
    fn members_view(&self) -> Arc<MembersView> {
        Arc::new(MembersView { version: 1, members: Vec::new() })
    }
    fn partition_table(&self) -> &ClusterPartitionTable {
        &self.partition_table
    }
    fn subscribe_changes(&self) -> mpsc::UnboundedReceiver<ClusterChange> {
        let (_tx, rx) = mpsc::unbounded_channel();
        rx
    }
    fn health(&self) -> ClusterHealth {
        ClusterHealth { node_count: 1, active_nodes: 1, ..Default::default() }
    }
}

fn write_op(index: usize) -> ClientOp {
    ClientOp {
        id: Some(format!("bench-{index}")),
        map_name: "bench".to_string(),
        key: format!("key-{index}"),
        op_type: Some("set".to_string()),
        record: Some(Some(LWWRecord {
            value: Some(rmpv::Value::Integer((index as i64).into())),
            timestamp: Timestamp { millis: index as u64, counter: 0, node_id: "bench-node".to_string() },
            ttl_ms: None,
        })),
        or_record: None,
        or_tag: None,
        write_concern: Some(WriteConcern::APPLIED),
        timeout: Some(5_000),
    }
}

fn op_context(call_id: u64) -> OperationContext {
    let mut ctx = OperationContext::new(
        call_id,
        latticedb_server::service::operation::service_names::CRDT,
        Timestamp { millis: call_id, counter: 0, node_id: "bench-node".to_string() },
        5_000,
    );
    ctx.client_id = Some("bench-client".to_string());
    ctx
}

#[tokio::main]
async fn main() {
    let coordinator = Arc::new(Coordinator::new(
        "bench-node".to_string(),
        Arc::new(BenchCluster { partition_table: ClusterPartitionTable::new(latticedb_core::PARTITION_COUNT) })
            as Arc<dyn ClusterService>,
        Arc::new(NullDataStore),
        Arc::new(PolicyEngine::new(b"bench-secret", None)),
    ));
    let service = Arc::new(CrdtService::new(coordinator));

    let mut histogram = Histogram::<u64>::new(3).expect("histogram init");

    for i in 0..BATCH_SIZE {
        let op = Operation::ClientOp { ctx: op_context(i as u64), payload: write_op(i) };
        let started = Instant::now();
        let svc = service.clone();
        svc.oneshot(op).await.expect("operation should not fail");
        histogram.record(started.elapsed().as_micros() as u64).expect("record latency");
    }

    println!("latticedb-server load_harness: {BATCH_SIZE} client-op writes");
    println!("  p50: {} us", histogram.value_at_quantile(0.50));
    println!("  p95: {} us", histogram.value_at_quantile(0.95));
    println!("  p99: {} us", histogram.value_at_quantile(0.99));
    println!("  max: {} us", histogram.max());
}

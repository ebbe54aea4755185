//! `latticedb-server` binary entry point.
//!
//! Parses configuration, wires the domain-service registry to a
//! single-node [`Coordinator`], and serves the axum/`WebSocket` network
//! module until a ctrl-c signal triggers graceful shutdown.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use latticedb_server::service::coordinator::Coordinator;
use latticedb_server::service::domain::{
    CoordinationService, CrdtService, MessagingService, PersistenceService, QueryService,
    SearchService, SyncService,
};
use latticedb_server::service::policy::PolicyEngine;
use latticedb_server::service::registry::ServiceContext;
use latticedb_server::service::router::OperationRouter;
use latticedb_server::{OperationService, ServerConfig, ServiceRegistry};
use latticedb_server::cluster::state::ClusterPartitionTable;
use latticedb_server::cluster::traits::ClusterService;
use latticedb_server::cluster::types::{ClusterHealth, MembersView};
use latticedb_server::network::{NetworkConfig, NetworkModule};
use latticedb_server::service::ManagedService;
use latticedb_server::storage::NullDataStore;
use latticedb_core::{SystemClock, HLC};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CLI configuration. Every field has a sensible single-node default so
/// `latticedb-server` runs with no flags during local development.
#[derive(Parser, Debug)]
#[command(name = "latticedb-server", about = "LatticeDB coordinator node")]
struct Cli {
    /// Unique identifier for this node.
    #[arg(long, env = "LATTICEDB_NODE_ID", default_value = "node-1")]
    node_id: String,

    /// Bind address.
    #[arg(long, env = "LATTICEDB_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Bind port. 0 picks an OS-assigned port.
    #[arg(long, env = "LATTICEDB_PORT", default_value_t = 7700)]
    port: u16,

    /// HMAC secret used to sign/verify request tokens.
    #[arg(long, env = "LATTICEDB_HMAC_SECRET", default_value = "dev-only-secret")]
    hmac_secret: String,

    /// Optional static admin token, bypassing per-request signing.
    #[arg(long, env = "LATTICEDB_ADMIN_TOKEN")]
    admin_token: Option<String>,
}

/// Single-node [`ClusterService`] used until the gossip membership protocol
/// (`cluster::assignment`/`cluster::failure_detector`) is wired to a live
/// transport. Reports itself as the sole, always-healthy member.
struct StandaloneCluster {
    node_id: String,
    partition_table: ClusterPartitionTable,
}

impl StandaloneCluster {
    fn new(node_id: String) -> Self {
        Self {
            partition_table: ClusterPartitionTable::new(latticedb_core::PARTITION_COUNT),
            node_id,
        }
    }
}

#[async_trait]
impl ManagedService for StandaloneCluster {
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
impl ClusterService for StandaloneCluster {
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

    fn subscribe_changes(
        &self,
    ) -> tokio::sync::mpsc::UnboundedReceiver<latticedb_server::cluster::state::ClusterChange> {
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    info!(node_id = %cli.node_id, port = cli.port, "starting latticedb-server");

    let config = Arc::new(ServerConfig {
        node_id: cli.node_id.clone(),
        ..ServerConfig::default()
    });

    let coordinator = Arc::new(Coordinator::new(
        cli.node_id.clone(),
        Arc::new(StandaloneCluster::new(cli.node_id.clone())) as Arc<dyn ClusterService>,
        Arc::new(NullDataStore),
        Arc::new(PolicyEngine::new(cli.hmac_secret.as_bytes(), cli.admin_token.clone())),
    ));

    let hlc = Arc::new(parking_lot::Mutex::new(HLC::new(
        cli.node_id.clone(),
        Box::new(SystemClock),
    )));
    let _classify_svc = OperationService::new(hlc, config.clone());

    let mut router = OperationRouter::new();
    router.register(
        latticedb_server::service::operation::service_names::CRDT,
        Arc::new(CrdtService::new(coordinator.clone())),
    );
    router.register(
        latticedb_server::service::operation::service_names::SYNC,
        Arc::new(SyncService::new(coordinator.clone())),
    );
    router.register(
        latticedb_server::service::operation::service_names::QUERY,
        Arc::new(QueryService::new(coordinator.clone())),
    );
    router.register(
        latticedb_server::service::operation::service_names::MESSAGING,
        Arc::new(MessagingService::new(coordinator.clone())),
    );
    router.register(
        latticedb_server::service::operation::service_names::COORDINATION,
        Arc::new(CoordinationService::new(coordinator.clone())),
    );
    router.register(
        latticedb_server::service::operation::service_names::SEARCH,
        Arc::new(SearchService::new(coordinator.clone())),
    );
    router.register(
        latticedb_server::service::operation::service_names::PERSISTENCE,
        Arc::new(PersistenceService::new(coordinator.clone())),
    );
    // Wiring this router into the connection loop happens once the
    // WebSocket handler stops being a stub (`network/handlers/websocket.rs`).
    let _router = router;

    let registry = ServiceRegistry::new();
    registry.register(CrdtService::new(coordinator.clone()));
    registry.register(SyncService::new(coordinator.clone()));
    registry.register(QueryService::new(coordinator.clone()));
    registry.register(MessagingService::new(coordinator.clone()));
    registry.register(CoordinationService::new(coordinator.clone()));
    registry.register(SearchService::new(coordinator.clone()));
    registry.register(PersistenceService::new(coordinator.clone()));

    let ctx = ServiceContext { config: config.clone() };
    registry
        .init_all(&ctx)
        .await
        .context("failed to initialize domain services")?;

    let network_config = NetworkConfig {
        host: cli.host.clone(),
        port: cli.port,
        ..NetworkConfig::default()
    };
    let mut network = NetworkModule::new(network_config);
    let bound_port = network.start().await.context("failed to bind listener")?;
    info!(port = bound_port, "listening");

    let shutdown_signal = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("received ctrl-c, shutting down");
    };
    network.serve(shutdown_signal).await?;

    registry
        .shutdown_all(false)
        .await
        .context("failed to shut down domain services")?;

    Ok(())
}

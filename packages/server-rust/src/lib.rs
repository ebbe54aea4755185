//! `LatticeDB` Server — `WebSocket` server with clustering, partitioning, and `PostgreSQL` storage.

pub mod cluster;
pub mod network;
pub mod service;
pub mod storage;

pub use service::{
    CallerOrigin, ManagedService, Operation, OperationContext, OperationError, OperationResponse,
    OperationService, OperationRouter, ServerConfig, ServiceContext, ServiceRegistry,
};


/// Integration tests for the full operation pipeline.
///
/// Tests the end-to-end flow: Message -> classify -> pipeline -> router -> domain service -> response.
#[cfg(test)]
mod integration_tests {
    use std::sync::Arc;

    use latticedb_core::messages::Message;
    use latticedb_core::{SystemClock, HLC};
    use tower::{Service, ServiceExt};

    use crate::cluster::traits::ClusterService;
    use crate::service::config::ServerConfig;
    use crate::service::coordinator::Coordinator;
    use crate::service::domain::test_support::FakeCluster;
    use crate::service::domain::{
        CoordinationService, CrdtService, MessagingService, PersistenceService, QueryService,
        SearchService, SyncService,
    };
    use crate::service::middleware::build_operation_pipeline;
    use crate::service::operation::{service_names, CallerOrigin, OperationResponse};
    use crate::service::policy::PolicyEngine;
    use crate::service::registry::{ServiceContext, ServiceRegistry};
    use crate::service::router::OperationRouter;
    use crate::service::{OperationService, ClassifyError};
    use crate::storage::NullDataStore;

    fn test_coordinator(node_id: &str) -> Arc<Coordinator> {
        Arc::new(Coordinator::new(
            node_id.to_string(),
            Arc::new(FakeCluster::new(node_id)) as Arc<dyn ClusterService>,
            Arc::new(NullDataStore),
            Arc::new(PolicyEngine::new(b"secret", None)),
        ))
    }

    fn setup() -> (OperationService, OperationRouter, ServerConfig, Arc<Coordinator>) {
        let config = ServerConfig {
            node_id: "integration-test-node".to_string(),
            default_operation_timeout_ms: 5000,
            max_concurrent_operations: 100,
            gc_interval_ms: 60_000,
            ..ServerConfig::default()
        };

        let hlc = Arc::new(parking_lot::Mutex::new(HLC::new(
            config.node_id.clone(),
            Box::new(SystemClock),
        )));

        let classify_svc = OperationService::new(hlc, Arc::new(config.clone()));
        let coordinator = test_coordinator(&config.node_id);

        let mut router = OperationRouter::new();
        router.register(service_names::CRDT, Arc::new(CrdtService::new(coordinator.clone())));
        router.register(service_names::SYNC, Arc::new(SyncService::new(coordinator.clone())));
        router.register(service_names::QUERY, Arc::new(QueryService::new(coordinator.clone())));
        router.register(service_names::MESSAGING, Arc::new(MessagingService::new(coordinator.clone())));
        router.register(service_names::COORDINATION, Arc::new(CoordinationService::new(coordinator.clone())));
        router.register(service_names::SEARCH, Arc::new(SearchService::new(coordinator.clone())));
        router.register(service_names::PERSISTENCE, Arc::new(PersistenceService::new(coordinator.clone())));

        (classify_svc, router, config, coordinator)
    }

    #[tokio::test]
    async fn full_pipeline_ping_gets_pong() {
        let (classify_svc, router, config, _coordinator) = setup();
        let mut pipeline = build_operation_pipeline(router, &config);

        // Classify a Ping message.
        let msg = Message::Ping(latticedb_core::messages::PingData {
            timestamp: 1_700_000_000_000,
        });
        let op = classify_svc
            .classify(msg, Some("client-1".to_string()), CallerOrigin::Client)
            .unwrap();

        assert_eq!(op.ctx().service_name, service_names::COORDINATION);

        // Route through the full pipeline.
        let resp = ServiceExt::ready(&mut pipeline)
            .await
            .unwrap()
            .call(op)
            .await
            .unwrap();

        match resp {
            OperationResponse::Message(boxed) => match *boxed {
                Message::Pong(pong) => assert_eq!(pong.timestamp, 1_700_000_000_000),
                other => panic!("expected Pong, got {other:?}"),
            },
            other => panic!("expected Message(Pong), got {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_pipeline_client_op_gets_ack() {
        let (classify_svc, router, config, _coordinator) = setup();
        let mut pipeline = build_operation_pipeline(router, &config);

        let msg = Message::ClientOp(latticedb_core::messages::sync::ClientOpMessage {
            payload: latticedb_core::ClientOp {
                id: None,
                map_name: "users".to_string(),
                key: "alice".to_string(),
                op_type: None,
                record: None,
                or_record: None,
                or_tag: None,
                write_concern: None,
                timeout: None,
            },
        });
        let op = classify_svc
            .classify(msg, None, CallerOrigin::Client)
            .unwrap();

        assert_eq!(op.ctx().service_name, service_names::CRDT);
        assert!(op.ctx().partition_id.is_some());

        let resp = ServiceExt::ready(&mut pipeline)
            .await
            .unwrap()
            .call(op)
            .await
            .unwrap();

        match resp {
            OperationResponse::Message(boxed) => assert!(matches!(
                *boxed,
                Message::OpAck(_) | Message::OpRejected(_)
            )),
            other => panic!("expected Message(OpAck|OpRejected), got {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_pipeline_topic_subscribe_gets_ack() {
        let (classify_svc, router, config, _coordinator) = setup();
        let mut pipeline = build_operation_pipeline(router, &config);

        let msg = Message::TopicSub {
            payload: latticedb_core::messages::TopicSubPayload {
                topic: "chat.general".to_string(),
            },
        };
        let op = classify_svc
            .classify(msg, None, CallerOrigin::Client)
            .unwrap();

        assert_eq!(op.ctx().service_name, service_names::MESSAGING);

        let resp = ServiceExt::ready(&mut pipeline)
            .await
            .unwrap()
            .call(op)
            .await
            .unwrap();

        assert!(matches!(resp, OperationResponse::Ack { .. }));
    }

    #[tokio::test]
    async fn classify_rejects_server_to_client_message() {
        let (classify_svc, _, _, _) = setup();

        let msg = Message::Pong(latticedb_core::messages::PongData {
            timestamp: 0,
            server_time: 0,
        });
        let err = classify_svc
            .classify(msg, None, CallerOrigin::Client)
            .unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::ServerToClient { variant: "Pong" }
        ));
    }

    #[tokio::test]
    async fn service_registry_lifecycle() {
        let coordinator = test_coordinator("registry-test-node");
        let registry = ServiceRegistry::new();
        registry.register(CrdtService::new(coordinator.clone()));
        registry.register(SyncService::new(coordinator.clone()));
        registry.register(QueryService::new(coordinator.clone()));
        registry.register(MessagingService::new(coordinator.clone()));
        registry.register(CoordinationService::new(coordinator.clone()));
        registry.register(SearchService::new(coordinator.clone()));
        registry.register(PersistenceService::new(coordinator.clone()));

        let config = ServerConfig::default();
        let ctx = ServiceContext {
            config: Arc::new(config),
        };

        // Init all services in order.
        registry.init_all(&ctx).await.unwrap();

        // Verify all accessible.
        assert!(registry.get::<CrdtService>().is_some());
        assert!(registry.get::<SyncService>().is_some());
        assert!(registry.get::<QueryService>().is_some());
        assert!(registry.get::<MessagingService>().is_some());
        assert!(registry.get::<CoordinationService>().is_some());
        assert!(registry.get::<SearchService>().is_some());
        assert!(registry.get::<PersistenceService>().is_some());

        // Shutdown all in reverse order.
        registry.shutdown_all(false).await.unwrap();
    }

    #[test]
    fn re_exports_accessible_from_crate_root() {
        // Verify that the key types are accessible from the crate root.
        let _config = crate::ServerConfig::default();
        let _registry = crate::ServiceRegistry::new();
        let _origin = crate::CallerOrigin::Client;
    }
}

//! Coordination domain service: distributed locks, partition map
//! distribution, and client heartbeat. Delegates lock lifecycle to
//! `LockManager` and partition topology to the cluster layer's
//! `ClusterPartitionTable`; this service's own logic is just translating
//! wire payloads to/from those two.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use latticedb_core::messages::client_events::{ErrorPayload, LockGrantedPayload, LockReleasedPayload};
use latticedb_core::messages::cluster::PartitionMapPayload;
use latticedb_core::messages::messaging::PongData;
use latticedb_core::messages::Message;
use tower::Service;

use crate::service::coordinator::Coordinator;
use crate::service::lock_manager::AcquireResult;
use crate::service::operation::{Operation, OperationError, OperationResponse};
use crate::service::registry::{ManagedService, ServiceContext};

/// Coordination domain service (locks, partition map, heartbeat).
pub struct CoordinationService {
    coordinator: Arc<Coordinator>,
}

impl CoordinationService {
    #[must_use]
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl ManagedService for CoordinationService {
    fn name(&self) -> &'static str {
        crate::service::operation::service_names::COORDINATION
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

fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

impl Service<Operation> for Arc<CoordinationService> {
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        let svc = self.clone();
        Box::pin(async move {
            match op {
                Operation::LockRequest { ctx, payload } => {
                    let client_id = ctx.client_id.clone().unwrap_or_default();
                    let result = svc.coordinator.locks.acquire(&payload.name, client_id, payload.request_id.clone(), payload.ttl);
                    match result {
                        AcquireResult::Granted { fencing_token } => {
                            Ok(OperationResponse::Message(Box::new(Message::LockGranted {
                                payload: LockGrantedPayload {
                                    request_id: payload.request_id,
                                    name: payload.name,
                                    fencing_token,
                                },
                            })))
                        }
                        AcquireResult::Queued => Ok(OperationResponse::Ack { call_id: ctx.call_id }),
                    }
                }
                Operation::LockRelease { ctx, payload } => {
                    let client_id = ctx.client_id.clone().unwrap_or_default();
                    match svc.coordinator.locks.release(&payload.name, &client_id, payload.fencing_token) {
                        Ok(_next_waiter) => Ok(OperationResponse::Message(Box::new(Message::LockReleased {
                            payload: LockReleasedPayload {
                                request_id: payload.request_id.unwrap_or_default(),
                                name: payload.name,
                                success: true,
                            },
                        }))),
                        Err(err) => Ok(OperationResponse::Message(Box::new(Message::Error {
                            payload: ErrorPayload { code: 409, message: err.to_string(), details: None },
                        }))),
                    }
                }
                Operation::PartitionMapRequest { ctx: _, payload: _ } => {
                    let members = svc.coordinator.cluster.members_view();
                    let map: PartitionMapPayload = svc.coordinator.cluster.partition_table().to_partition_map(&members);
                    Ok(OperationResponse::Message(Box::new(Message::PartitionMap { payload: map })))
                }
                Operation::Ping { ctx: _, payload } => {
                    Ok(OperationResponse::Message(Box::new(Message::Pong(PongData {
                        timestamp: payload.timestamp,
                        server_time: now_millis(),
                    }))))
                }
                other => Ok(OperationResponse::NotImplemented {
                    service_name: other.ctx().service_name,
                    call_id: other.ctx().call_id,
                }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::domain::test_support::FakeCluster;
    use crate::service::policy::PolicyEngine;
    use crate::service::operation::{service_names, OperationContext};
    use crate::storage::NullDataStore;
    use latticedb_core::hlc::Timestamp;
    use latticedb_core::messages::messaging::{LockRequestPayload, PingData};
    use tower::ServiceExt;

    fn coordinator() -> Arc<Coordinator> {
        Arc::new(Coordinator::new(
            "node-1".to_string(),
            Arc::new(FakeCluster::new("node-1")),
            Arc::new(NullDataStore),
            Arc::new(PolicyEngine::new(b"secret", None)),
        ))
    }

    fn ctx(client_id: &str) -> OperationContext {
        let mut ctx = OperationContext::new(
            1,
            service_names::COORDINATION,
            Timestamp { millis: 1, counter: 0, node_id: "n1".to_string() },
            5_000,
        );
        ctx.client_id = Some(client_id.to_string());
        ctx
    }

    #[tokio::test]
    async fn lock_request_grants_first_caller() {
        let svc: Arc<CoordinationService> = Arc::new(CoordinationService::new(coordinator()));
        let resp = svc
            .oneshot(Operation::LockRequest {
                ctx: ctx("client-1"),
                payload: LockRequestPayload { request_id: "r1".to_string(), name: "my-lock".to_string(), ttl: None },
            })
            .await
            .unwrap();
        assert!(matches!(resp, OperationResponse::Message(boxed) if matches!(*boxed, Message::LockGranted { .. })));
    }

    #[tokio::test]
    async fn ping_returns_pong_with_server_time() {
        let svc: Arc<CoordinationService> = Arc::new(CoordinationService::new(coordinator()));
        let resp = svc
            .oneshot(Operation::Ping { ctx: ctx("client-1"), payload: PingData { timestamp: 42 } })
            .await
            .unwrap();
        match resp {
            OperationResponse::Message(boxed) => match *boxed {
                Message::Pong(pong) => assert_eq!(pong.timestamp, 42),
                other => panic!("unexpected message: {other:?}"),
            },
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn partition_map_request_returns_current_topology() {
        let svc: Arc<CoordinationService> = Arc::new(CoordinationService::new(coordinator()));
        let resp = svc
            .oneshot(Operation::PartitionMapRequest { ctx: ctx("client-1"), payload: None })
            .await
            .unwrap();
        assert!(matches!(resp, OperationResponse::Message(boxed) if matches!(*boxed, Message::PartitionMap { .. })));
    }
}

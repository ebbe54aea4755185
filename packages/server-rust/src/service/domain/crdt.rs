//! CRDT domain service: LWW-Map and OR-Map reads/writes.
//!
//! Each `ClientOp` is routed through the `StripedExecutor` so operations on
//! the same `(map_name, key)` apply in arrival order while different keys
//! proceed concurrently, then admitted through the `BackpressureRegulator`,
//! then tracked by the `WriteAckCoordinator` until the op's requested
//! `WriteConcern` is reached (or its timeout elapses).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use latticedb_core::messages::base::{ClientOp, WriteConcern};
use latticedb_core::messages::messaging::JournalEventType;
use latticedb_core::messages::sync::{OpAckMessage, OpAckPayload, OpBatchMessage, OpRejectedMessage, OpRejectedPayload, OpResult};
use latticedb_core::messages::Message;
use latticedb_core::types::Value;
use tower::Service;
use uuid::Uuid;

use crate::service::backpressure::{Admission, BackpressureConfig, BackpressureRegulator};
use crate::service::coordinator::{Coordinator, MapHandle};
use crate::service::operation::{Operation, OperationError, OperationResponse};
use crate::service::registry::{ManagedService, ServiceContext};
use crate::service::stripe::{StripedExecutor, DEFAULT_STRIPE_COUNT};

use super::convert::{rmpv_to_value, value_to_rmpv};

/// CRDT domain service (LWW-Map and OR-Map operations).
pub struct CrdtService {
    coordinator: Arc<Coordinator>,
    stripes: Arc<StripedExecutor>,
    backpressure: Arc<BackpressureRegulator>,
}

impl CrdtService {
    #[must_use]
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            stripes: Arc::new(StripedExecutor::new(DEFAULT_STRIPE_COUNT)),
            backpressure: Arc::new(BackpressureRegulator::new(BackpressureConfig::default())),
        }
    }
}

#[async_trait]
impl ManagedService for CrdtService {
    fn name(&self) -> &'static str {
        crate::service::operation::service_names::CRDT
    }

    async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn reset(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        self.coordinator.pending_writes.resolve_all_on_shutdown();
        Ok(())
    }
}

/// Applies one `ClientOp` against the coordinator's map registry, returning
/// the resulting value (if any) after mutation for query re-evaluation.
fn apply_op(coordinator: &Coordinator, op: &ClientOp) -> Result<Option<Value>, String> {
    let is_or_op = op.or_record.is_some() || op.or_tag.is_some();
    let is_delete = matches!(op.op_type.as_deref(), Some("delete") | Some("remove"));

    if is_or_op {
        let handle = coordinator.maps.get_or_create_or(&op.map_name);
        let MapHandle::Or(map) = handle.as_ref() else {
            return Err("map already exists as an LWW-Map".to_string());
        };
        let mut map = map.write();
        let previous = map.get(&op.key).first().map(|v| (*v).clone());
        let mutated = if is_delete {
            if let Some(Some(record)) = &op.or_record {
                let value = rmpv_to_value(&record.value);
                map.remove(&op.key, &value);
                true
            } else {
                false
            }
        } else if let Some(Some(record)) = &op.or_record {
            let value = rmpv_to_value(&record.value);
            map.add(op.key.clone(), value, record.ttl_ms);
            true
        } else {
            false
        };
        let new_value = map.get(&op.key).first().map(|v| (*v).clone());
        if mutated {
            record_journal_event(coordinator, &op.map_name, &op.key, previous, new_value.clone());
        }
        Ok(new_value)
    } else {
        let handle = coordinator.maps.get_or_create_lww(&op.map_name);
        let MapHandle::Lww(map) = handle.as_ref() else {
            return Err("map already exists as an OR-Map".to_string());
        };
        let mut map = map.write();
        let previous = map.get(&op.key).cloned();
        if is_delete {
            map.remove(&op.key);
            record_journal_event(coordinator, &op.map_name, &op.key, previous, None);
            Ok(None)
        } else if let Some(Some(record)) = &op.record {
            let value = rmpv_to_value(&record.value.clone().unwrap_or(rmpv::Value::Nil));
            map.set(op.key.clone(), value.clone(), record.ttl_ms);
            record_journal_event(coordinator, &op.map_name, &op.key, previous, Some(value.clone()));
            Ok(Some(value))
        } else {
            Ok(map.get(&op.key).cloned())
        }
    }
}

/// Appends one mutation to the write-ahead journal. Callers only invoke
/// this once a write has actually been applied, never for read-only ops.
/// Shared with the persistence domain service's entry processors, which
/// mutate maps outside the normal `ClientOp` path.
pub(crate) fn record_journal_event(coordinator: &Coordinator, map_name: &str, key: &str, previous: Option<Value>, new_value: Option<Value>) {
    let event_type = match (&previous, &new_value) {
        (_, None) => JournalEventType::DELETE,
        (None, Some(_)) => JournalEventType::PUT,
        (Some(_), Some(_)) => JournalEventType::UPDATE,
    };
    coordinator.journal.append(
        map_name,
        key,
        event_type,
        new_value.as_ref().map(value_to_rmpv),
        previous.as_ref().map(value_to_rmpv),
    );
}

/// Runs one `ClientOp` through the striped executor, write-ack tracking, and
/// query re-evaluation, producing its `OpResult`.
async fn execute_client_op(coordinator: Arc<Coordinator>, stripes: Arc<StripedExecutor>, op: ClientOp) -> OpResult {
    let op_id = op.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
    let target_level = op.write_concern.clone().unwrap_or(WriteConcern::MEMORY);
    let timeout_ms = op.timeout.unwrap_or(5_000);

    let map_name = op.map_name.clone();
    let key = op.key.clone();
    let coordinator_for_stripe = coordinator.clone();
    let applied = stripes
        .submit(&map_name, &key, move || async move { apply_op(&coordinator_for_stripe, &op) })
        .await;

    match applied {
        Ok(Ok(new_value)) => {
            let rx = coordinator.pending_writes.register_pending(op_id.clone(), target_level);
            coordinator.pending_writes.notify_level(&op_id, WriteConcern::APPLIED);
            let outcome = coordinator.pending_writes.await_outcome(&op_id, rx, timeout_ms).await;

            if coordinator.queries.has_subscribers(&map_name) {
                coordinator.queries.on_change(&map_name, &key, new_value.as_ref());
            }
            match &new_value {
                Some(value) => coordinator.search.index_value(&map_name, &key, value),
                None => coordinator.search.remove_value(&map_name, &key),
            }

            OpResult {
                op_id,
                success: outcome.success,
                achieved_level: outcome.achieved_level,
                error: None,
            }
        }
        Ok(Err(reason)) => {
            coordinator.pending_writes.fail_pending(&op_id);
            OpResult {
                op_id,
                success: false,
                achieved_level: WriteConcern::FIRE_AND_FORGET,
                error: Some(reason),
            }
        }
        Err(_rejected) => OpResult {
            op_id,
            success: false,
            achieved_level: WriteConcern::FIRE_AND_FORGET,
            error: Some("stripe queue full, operation rejected".to_string()),
        },
    }
}

impl Service<Operation> for Arc<CrdtService> {
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
                Operation::ClientOp { ctx, payload } => {
                    let result = execute_client_op(svc.coordinator.clone(), svc.stripes.clone(), payload.payload).await;
                    if result.success {
                        Ok(OperationResponse::Message(Box::new(Message::OpAck(OpAckMessage {
                            payload: OpAckPayload {
                                last_id: result.op_id.clone(),
                                achieved_level: Some(result.achieved_level.clone()),
                                results: Some(vec![result]),
                            },
                        }))))
                    } else {
                        Ok(OperationResponse::Message(Box::new(Message::OpRejected(OpRejectedMessage {
                            payload: OpRejectedPayload {
                                op_id: result.op_id,
                                reason: result.error.unwrap_or_else(|| "operation failed".to_string()),
                                code: None,
                            },
                        }))))
                    }
                }
                Operation::OpBatch { ctx: _, payload } => {
                    let OpBatchMessage { payload } = payload;
                    let mut results = Vec::with_capacity(payload.ops.len());
                    for client_op in payload.ops {
                        let admission = svc.backpressure.admit().await;
                        let result = execute_client_op(svc.coordinator.clone(), svc.stripes.clone(), client_op).await;
                        let achieved = result.achieved_level.clone();
                        results.push(result);
                        if let Ok(Admission::Async(permit)) = admission {
                            drop(permit);
                        }
                        let _ = achieved;
                    }
                    let last_id = results.last().map(|r| r.op_id.clone()).unwrap_or_default();
                    Ok(OperationResponse::Message(Box::new(Message::OpAck(OpAckMessage {
                        payload: OpAckPayload {
                            last_id,
                            achieved_level: results.last().map(|r| r.achieved_level.clone()),
                            results: Some(results),
                        },
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

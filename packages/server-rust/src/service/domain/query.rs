//! Query domain service: live query subscriptions over LWW-Map and OR-Map
//! contents. Delegates subscription bookkeeping and delta evaluation to
//! `QueryRegistry`; this service's job is bridging that registry to the
//! operation pipeline -- building the initial snapshot a new subscription
//! evaluates against, and translating `QuerySubscribe`/`QueryUnsubscribe`
//! into its calls.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use latticedb_core::messages::query::{QueryRespMessage, QueryUnsubMessage};
use latticedb_core::messages::Message;
use latticedb_core::types::Value;
use tower::Service;

use crate::service::coordinator::{Coordinator, MapHandle};
use crate::service::operation::{Operation, OperationError, OperationResponse};
use crate::service::registry::{ManagedService, ServiceContext};

/// Query domain service (live query subscriptions).
pub struct QueryService {
    coordinator: Arc<Coordinator>,
}

impl QueryService {
    #[must_use]
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl ManagedService for QueryService {
    fn name(&self) -> &'static str {
        crate::service::operation::service_names::QUERY
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

/// Snapshots every key's current value out of whichever map kind is
/// registered under `map_name`, for a new subscription's initial
/// evaluation. OR-Map keys collapse to their first observed value --
/// multi-value keys aren't representable in a single-value query result.
fn snapshot(coordinator: &Coordinator, map_name: &str) -> Vec<(String, Value)> {
    let Some(handle) = coordinator.maps.get(map_name) else {
        return Vec::new();
    };
    match handle.as_ref() {
        MapHandle::Lww(map) => {
            let map = map.read();
            map.entries().map(|(k, v)| (k.clone(), v.clone())).collect()
        }
        MapHandle::Or(map) => {
            let map = map.read();
            map.all_keys()
                .into_iter()
                .filter_map(|key| map.get(key).first().map(|v| (key.clone(), (*v).clone())))
                .collect()
        }
    }
}

impl Service<Operation> for Arc<QueryService> {
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
                Operation::QuerySubscribe { ctx, payload } => {
                    let payload = payload.payload;
                    let client_id = ctx.client_id.clone().unwrap_or_default();
                    let snapshot = snapshot(&svc.coordinator, &payload.map_name);
                    let resp = svc.coordinator.queries.subscribe(
                        payload.query_id,
                        payload.map_name,
                        client_id,
                        payload.query,
                        &snapshot,
                    );
                    Ok(OperationResponse::Message(Box::new(Message::QueryResp(QueryRespMessage { payload: resp }))))
                }
                Operation::QueryUnsubscribe { ctx, payload } => {
                    let QueryUnsubMessage { payload } = payload;
                    svc.coordinator.queries.unsubscribe(&payload.query_id);
                    Ok(OperationResponse::Ack { call_id: ctx.call_id })
                }
                other => Ok(OperationResponse::NotImplemented {
                    service_name: other.ctx().service_name,
                    call_id: other.ctx().call_id,
                }),
            }
        })
    }
}

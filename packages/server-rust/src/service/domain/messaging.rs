//! Messaging domain service: named topic pub/sub. Delegates subscriber
//! bookkeeping and local fan-out computation to `TopicBus`; actual delivery
//! to each recipient's connection is a transport-layer concern (the
//! `ConnectionRegistry` indexes by `ConnectionId`, not `client_id`, so
//! wiring per-recipient delivery here would need a client-id index this
//! service doesn't have -- left as a known gap alongside the same
//! simplification in the query domain's change notifications).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tower::Service;

use crate::service::coordinator::Coordinator;
use crate::service::operation::{Operation, OperationError, OperationResponse};
use crate::service::registry::{ManagedService, ServiceContext};

/// Messaging domain service (topic pub/sub).
pub struct MessagingService {
    coordinator: Arc<Coordinator>,
}

impl MessagingService {
    #[must_use]
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl ManagedService for MessagingService {
    fn name(&self) -> &'static str {
        crate::service::operation::service_names::MESSAGING
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

impl Service<Operation> for Arc<MessagingService> {
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
                Operation::TopicSubscribe { ctx, payload } => {
                    let client_id = ctx.client_id.clone().unwrap_or_default();
                    svc.coordinator.topics.subscribe(&payload.topic, &client_id);
                    Ok(OperationResponse::Ack { call_id: ctx.call_id })
                }
                Operation::TopicUnsubscribe { ctx, payload } => {
                    let client_id = ctx.client_id.clone().unwrap_or_default();
                    svc.coordinator.topics.unsubscribe(&payload.topic, &client_id);
                    Ok(OperationResponse::Ack { call_id: ctx.call_id })
                }
                Operation::TopicPublish { ctx, payload } => {
                    let publisher_id = ctx.client_id.clone();
                    let (_event, recipients) = svc.coordinator.topics.publish(&payload.topic, payload.data, publisher_id);
                    let _ = recipients;
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

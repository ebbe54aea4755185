//! Search domain service: full-text search over CRDT map contents.
//!
//! Delegates indexing and query execution to `SearchIndex`, which
//! `CrdtService` keeps current on every successful write. This service's
//! job is translating `Search`/`SearchSubscribe`/`SearchUnsubscribe` into
//! `SearchIndex` calls and re-hydrating each match's authoritative value
//! from the CRDT map (the index only stores a flattened text blob, not the
//! value itself).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use latticedb_core::messages::search::{SearchResultEntry, SearchRespPayload};
use latticedb_core::messages::Message;
use latticedb_core::types::Value;
use tower::Service;

use crate::service::coordinator::{Coordinator, MapHandle};
use crate::service::operation::{Operation, OperationError, OperationResponse};
use crate::service::registry::{ManagedService, ServiceContext};

use super::convert::value_to_rmpv;

const DEFAULT_LIMIT: usize = 20;

/// Search domain service (full-text search).
pub struct SearchService {
    coordinator: Arc<Coordinator>,
}

impl SearchService {
    #[must_use]
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl ManagedService for SearchService {
    fn name(&self) -> &'static str {
        crate::service::operation::service_names::SEARCH
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

/// Looks up `key`'s current value in `map_name`, whichever map kind it is.
/// OR-Map keys collapse to their first observed value, matching the same
/// simplification the query domain applies to its snapshots.
fn lookup_value(coordinator: &Coordinator, map_name: &str, key: &str) -> Option<Value> {
    let handle = coordinator.maps.get(map_name)?;
    match handle.as_ref() {
        MapHandle::Lww(map) => map.read().get(key).cloned(),
        MapHandle::Or(map) => map.read().get(key).first().map(|v| (*v).clone()),
    }
}

/// Runs `query` against `map_name` and builds the wire-format result list,
/// re-hydrating each hit's value from the CRDT map. Hits whose key has
/// since been removed from the map are dropped rather than surfaced with a
/// stale value.
fn run_search(coordinator: &Coordinator, map_name: &str, query: &str, limit: usize, min_score: f64) -> Vec<SearchResultEntry> {
    coordinator
        .search
        .search(map_name, query, limit, min_score)
        .into_iter()
        .filter_map(|(key, score)| {
            let value = lookup_value(coordinator, map_name, &key)?;
            Some(SearchResultEntry { key, value: value_to_rmpv(&value), score: f64::from(score), matched_terms: Vec::new() })
        })
        .collect()
}

impl Service<Operation> for Arc<SearchService> {
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
                Operation::Search { ctx: _, payload } => {
                    let limit = payload.options.as_ref().and_then(|o| o.limit).map_or(DEFAULT_LIMIT, |l| l as usize);
                    let min_score = payload.options.as_ref().and_then(|o| o.min_score).unwrap_or(0.0);
                    let results = run_search(&svc.coordinator, &payload.map_name, &payload.query, limit, min_score);
                    let total_count = results.len() as u32;
                    Ok(OperationResponse::Message(Box::new(Message::SearchResp {
                        payload: SearchRespPayload { request_id: payload.request_id, results, total_count, error: None },
                    })))
                }
                Operation::SearchSubscribe { ctx, payload } => {
                    let client_id = ctx.client_id.clone().unwrap_or_default();
                    let limit = payload.options.as_ref().and_then(|o| o.limit).map_or(DEFAULT_LIMIT, |l| l as usize);
                    let min_score = payload.options.as_ref().and_then(|o| o.min_score).unwrap_or(0.0);
                    svc.coordinator.search.subscribe(
                        payload.subscription_id,
                        payload.map_name,
                        payload.query,
                        limit,
                        min_score,
                        client_id,
                    );
                    Ok(OperationResponse::Ack { call_id: ctx.call_id })
                }
                Operation::SearchUnsubscribe { ctx, payload } => {
                    svc.coordinator.search.unsubscribe(&payload.subscription_id);
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

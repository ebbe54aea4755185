//! Persistence domain service: PN-Counters, entry processors, conflict
//! resolver registration, and the write-ahead journal.
//!
//! Entry processors and conflict resolvers carry a `code` field in their
//! wire payload (meant for a user-supplied scripting language), but this
//! crate has no embedded script engine anywhere in its dependency stack --
//! `code` is stored/echoed back through `ListResolvers` but never
//! evaluated. Entry processing instead recognizes a small fixed set of
//! built-in processor names (`set`, `increment`, `delete`, `touch`);
//! anything else fails with an explicit error rather than silently no-op.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use dashmap::DashMap;
use latticedb_core::messages::messaging::{
    ConflictResolver, EntryProcessBatchResponseData, EntryProcessKeyResult, EntryProcessResponseData, EntryProcessor,
    JournalReadResponseData, ListResolversResponseData, PNCounterState, RegisterResolverResponseData, ResolverInfo,
    UnregisterResolverResponseData,
};
use latticedb_core::messages::Message;
use latticedb_core::types::Value;
use tower::Service;

use crate::service::coordinator::{Coordinator, MapHandle};
use crate::service::domain::crdt::record_journal_event;
use crate::service::operation::{Operation, OperationError, OperationResponse};
use crate::service::registry::{ManagedService, ServiceContext};

use super::convert::{rmpv_to_value, value_to_rmpv};

/// Persistence domain service (counters, entry processing, journal, resolvers).
pub struct PersistenceService {
    coordinator: Arc<Coordinator>,
    counters: DashMap<String, PNCounterState>,
    resolvers: DashMap<String, Vec<ConflictResolver>>,
}

impl PersistenceService {
    #[must_use]
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator, counters: DashMap::new(), resolvers: DashMap::new() }
    }
}

#[async_trait]
impl ManagedService for PersistenceService {
    fn name(&self) -> &'static str {
        crate::service::operation::service_names::PERSISTENCE
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

/// Merges `incoming` into `existing` element-wise by max, the standard
/// G-Counter merge rule applied to both the increment and decrement maps
/// that make up a PN-Counter.
fn merge_counter(existing: &mut PNCounterState, incoming: &PNCounterState) {
    for (node, value) in &incoming.p {
        let entry = existing.p.entry(node.clone()).or_insert(0.0);
        if *value > *entry {
            *entry = *value;
        }
    }
    for (node, value) in &incoming.n {
        let entry = existing.n.entry(node.clone()).or_insert(0.0);
        if *value > *entry {
            *entry = *value;
        }
    }
}

fn rmpv_as_f64(value: &rmpv::Value) -> Option<f64> {
    match value {
        rmpv::Value::Integer(i) => i.as_f64(),
        rmpv::Value::F32(f) => Some(f64::from(*f)),
        rmpv::Value::F64(f) => Some(*f),
        _ => None,
    }
}

/// Applies `processor` to `key` in `map_name`'s LWW-Map, journaling and
/// search-indexing the result like any other CRDT write.
fn apply_processor(coordinator: &Coordinator, map_name: &str, key: &str, processor: &EntryProcessor) -> EntryProcessKeyResult {
    let handle = coordinator.maps.get_or_create_lww(map_name);
    let MapHandle::Lww(map) = handle.as_ref() else {
        return EntryProcessKeyResult {
            success: false,
            result: None,
            new_value: None,
            error: Some("entry processors only operate on LWW-Map keys".to_string()),
        };
    };

    let mut map = map.write();
    let previous = map.get(key).cloned();

    let outcome: Result<Option<Value>, String> = match processor.name.as_str() {
        "touch" => Ok(previous.clone()),
        "delete" => {
            map.remove(key);
            Ok(None)
        }
        "set" => match &processor.args {
            Some(args) => {
                let value = rmpv_to_value(args);
                map.set(key.to_string(), value.clone(), None);
                Ok(Some(value))
            }
            None => Err("\"set\" requires args".to_string()),
        },
        "increment" => {
            let delta = processor.args.as_ref().and_then(rmpv_as_f64).unwrap_or(1.0);
            let base = match &previous {
                Some(Value::Int(i)) => Ok(*i as f64),
                Some(Value::Float(f)) => Ok(*f),
                None => Ok(0.0),
                Some(_) => Err("current value is not numeric".to_string()),
            };
            base.map(|base| {
                let value = Value::Float(base + delta);
                map.set(key.to_string(), value.clone(), None);
                Some(value)
            })
        }
        other => Err(format!("unknown entry processor \"{other}\"")),
    };

    drop(map);

    match outcome {
        Ok(new_value) => {
            if new_value != previous {
                record_journal_event(coordinator, map_name, key, previous, new_value.clone());
                match &new_value {
                    Some(v) => coordinator.search.index_value(map_name, key, v),
                    None => coordinator.search.remove_value(map_name, key),
                }
            }
            let wire = new_value.as_ref().map(value_to_rmpv);
            EntryProcessKeyResult { success: true, result: wire.clone(), new_value: wire, error: None }
        }
        Err(error) => EntryProcessKeyResult { success: false, result: None, new_value: None, error: Some(error) },
    }
}

impl Service<Operation> for Arc<PersistenceService> {
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
                Operation::CounterRequest { ctx: _, payload } => {
                    let state = svc.counters.get(&payload.name).map(|s| s.clone()).unwrap_or_default();
                    Ok(OperationResponse::Message(Box::new(Message::CounterResponse {
                        payload: latticedb_core::messages::messaging::CounterStatePayload { name: payload.name, state },
                    })))
                }
                Operation::CounterSync { ctx: _, payload } => {
                    let mut entry = svc.counters.entry(payload.name.clone()).or_default();
                    merge_counter(&mut entry, &payload.state);
                    let merged = entry.clone();
                    drop(entry);
                    Ok(OperationResponse::Message(Box::new(Message::CounterResponse {
                        payload: latticedb_core::messages::messaging::CounterStatePayload { name: payload.name, state: merged },
                    })))
                }
                Operation::EntryProcess { ctx: _, payload } => {
                    let result = apply_processor(&svc.coordinator, &payload.map_name, &payload.key, &payload.processor);
                    Ok(OperationResponse::Message(Box::new(Message::EntryProcessResponse(EntryProcessResponseData {
                        request_id: payload.request_id,
                        success: result.success,
                        result: result.result,
                        new_value: result.new_value,
                        error: result.error,
                    }))))
                }
                Operation::EntryProcessBatch { ctx: _, payload } => {
                    let mut results = HashMap::with_capacity(payload.keys.len());
                    for key in &payload.keys {
                        let result = apply_processor(&svc.coordinator, &payload.map_name, key, &payload.processor);
                        results.insert(key.clone(), result);
                    }
                    Ok(OperationResponse::Message(Box::new(Message::EntryProcessBatchResponse(
                        EntryProcessBatchResponseData { request_id: payload.request_id, results },
                    ))))
                }
                Operation::RegisterResolver { ctx: _, payload } => {
                    svc.resolvers.entry(payload.map_name).or_default().push(payload.resolver);
                    Ok(OperationResponse::Message(Box::new(Message::RegisterResolverResponse(RegisterResolverResponseData {
                        request_id: payload.request_id,
                        success: true,
                        error: None,
                    }))))
                }
                Operation::UnregisterResolver { ctx: _, payload } => {
                    let removed = svc
                        .resolvers
                        .get_mut(&payload.map_name)
                        .map(|mut list| {
                            let before = list.len();
                            list.retain(|r| r.name != payload.resolver_name);
                            before != list.len()
                        })
                        .unwrap_or(false);
                    let error = if removed { None } else { Some(format!("no resolver named \"{}\"", payload.resolver_name)) };
                    Ok(OperationResponse::Message(Box::new(Message::UnregisterResolverResponse(UnregisterResolverResponseData {
                        request_id: payload.request_id,
                        success: removed,
                        error,
                    }))))
                }
                Operation::ListResolvers { ctx: _, payload } => {
                    let mut resolvers = Vec::new();
                    for entry in &svc.resolvers {
                        if let Some(filter) = &payload.map_name {
                            if entry.key() != filter {
                                continue;
                            }
                        }
                        for resolver in entry.value() {
                            resolvers.push(ResolverInfo {
                                map_name: entry.key().clone(),
                                name: resolver.name.clone(),
                                priority: resolver.priority,
                                key_pattern: resolver.key_pattern.clone(),
                            });
                        }
                    }
                    Ok(OperationResponse::Message(Box::new(Message::ListResolversResponse(ListResolversResponseData {
                        request_id: payload.request_id,
                        resolvers,
                    }))))
                }
                Operation::JournalSubscribe { ctx, payload } => {
                    let client_id = ctx.client_id.clone().unwrap_or_default();
                    svc.coordinator.journal.subscribe(payload.request_id, payload.from_sequence, payload.map_name, payload.types, client_id);
                    Ok(OperationResponse::Ack { call_id: ctx.call_id })
                }
                Operation::JournalUnsubscribe { ctx, payload } => {
                    svc.coordinator.journal.unsubscribe(&payload.subscription_id);
                    Ok(OperationResponse::Ack { call_id: ctx.call_id })
                }
                Operation::JournalRead { ctx: _, payload } => {
                    let (events, has_more) = svc.coordinator.journal.read_from(&payload.from_sequence, payload.map_name.as_deref(), payload.limit);
                    Ok(OperationResponse::Message(Box::new(Message::JournalReadResponse(JournalReadResponseData {
                        request_id: payload.request_id,
                        events,
                        has_more,
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

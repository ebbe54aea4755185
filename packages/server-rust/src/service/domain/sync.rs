//! Sync domain service: answers the Merkle-tree walk a peer or client drives
//! to discover divergent keys in an LWW-Map or OR-Map, and ingests the
//! resulting diffs. This is the responder half of anti-entropy; the walker
//! half lives in `service::repair` and is driven by this node when *it*
//! wants to catch up against a peer.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use latticedb_core::hlc::ORMapRecord;
use latticedb_core::messages::sync::{
    ORMapDiffResponse, ORMapDiffResponsePayload, ORMapEntry, ORMapSyncRespBuckets,
    ORMapSyncRespBucketsPayload, ORMapSyncRespLeaf, ORMapSyncRespLeafPayload, ORMapSyncRespRoot,
    ORMapSyncRespRootPayload, SyncLeafRecord, SyncRespBucketsMessage, SyncRespBucketsPayload,
    SyncRespLeafMessage, SyncRespLeafPayload, SyncRespRootMessage, SyncRespRootPayload,
};
use latticedb_core::messages::Message;
use latticedb_core::types::Value;
use tower::Service;

use crate::service::coordinator::{Coordinator, MapHandle};
use crate::service::operation::{Operation, OperationError, OperationResponse};
use crate::service::registry::{ManagedService, ServiceContext};

use super::convert::{rmpv_to_value, value_to_rmpv};

/// Sync domain service (LWW-Map and OR-Map Merkle delta synchronization).
pub struct SyncService {
    coordinator: Arc<Coordinator>,
}

impl SyncService {
    #[must_use]
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl ManagedService for SyncService {
    fn name(&self) -> &'static str {
        crate::service::operation::service_names::SYNC
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

/// Parses a Merkle path string (hex digits, one per trie level) into the
/// digit sequence `MerkleTree::bucket_hashes`/`leaf_keys` expect.
fn parse_path(path: &str) -> Vec<u8> {
    path.chars().filter_map(|c| c.to_digit(16)).map(|d| d as u8).collect()
}

fn digit_key(digit: u8) -> String {
    format!("{digit:x}")
}

fn or_record_to_wire(record: &ORMapRecord<Value>) -> ORMapRecord<rmpv::Value> {
    ORMapRecord {
        value: value_to_rmpv(&record.value),
        timestamp: record.timestamp.clone(),
        tag: record.tag.clone(),
        ttl_ms: record.ttl_ms,
    }
}

impl Service<Operation> for Arc<SyncService> {
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
                Operation::SyncInit { ctx, payload } => {
                    let handle = svc.coordinator.maps.get_or_create_lww(&payload.map_name);
                    let MapHandle::Lww(map) = handle.as_ref() else {
                        return Err(OperationError::WrongService);
                    };
                    let root_hash = f64::from(map.read().merkle_tree().get_root_hash());
                    Ok(OperationResponse::Message(Box::new(Message::SyncRespRoot(SyncRespRootMessage {
                        payload: SyncRespRootPayload {
                            map_name: payload.map_name,
                            root_hash,
                            timestamp: ctx.timestamp,
                        },
                    }))))
                }
                Operation::MerkleReqBucket { ctx: _, payload } => {
                    let payload = payload.payload;
                    let handle = svc.coordinator.maps.get_or_create_lww(&payload.map_name);
                    let MapHandle::Lww(map) = handle.as_ref() else {
                        return Err(OperationError::WrongService);
                    };
                    let map = map.read();
                    let digits = parse_path(&payload.path);
                    let tree = map.merkle_tree();

                    if digits.len() >= tree.depth() {
                        let leaf = tree.leaf_keys(&digits);
                        let records = leaf
                            .keys()
                            .filter_map(|key| {
                                map.get_record(key).map(|record| SyncLeafRecord {
                                    key: key.clone(),
                                    record: latticedb_core::hlc::LWWRecord {
                                        value: record.value.as_ref().map(value_to_rmpv),
                                        timestamp: record.timestamp.clone(),
                                        ttl_ms: record.ttl_ms,
                                    },
                                })
                            })
                            .collect();
                        Ok(OperationResponse::Message(Box::new(Message::SyncRespLeaf(SyncRespLeafMessage {
                            payload: SyncRespLeafPayload {
                                map_name: payload.map_name,
                                path: payload.path,
                                records,
                            },
                        }))))
                    } else {
                        let buckets: HashMap<String, f64> = tree
                            .bucket_hashes(&digits)
                            .into_iter()
                            .map(|(digit, hash)| (digit_key(digit), f64::from(hash)))
                            .collect();
                        Ok(OperationResponse::Message(Box::new(Message::SyncRespBuckets(SyncRespBucketsMessage {
                            payload: SyncRespBucketsPayload {
                                map_name: payload.map_name,
                                path: payload.path,
                                buckets,
                            },
                        }))))
                    }
                }
                Operation::ORMapSyncInit { ctx, payload } => {
                    let handle = svc.coordinator.maps.get_or_create_or(&payload.map_name);
                    let MapHandle::Or(map) = handle.as_ref() else {
                        return Err(OperationError::WrongService);
                    };
                    let root_hash = f64::from(map.read().merkle_tree().get_root_hash());
                    Ok(OperationResponse::Message(Box::new(Message::ORMapSyncRespRoot(ORMapSyncRespRoot {
                        payload: ORMapSyncRespRootPayload {
                            map_name: payload.map_name,
                            root_hash,
                            timestamp: ctx.timestamp,
                        },
                    }))))
                }
                Operation::ORMapMerkleReqBucket { ctx: _, payload } => {
                    let payload = payload.payload;
                    let handle = svc.coordinator.maps.get_or_create_or(&payload.map_name);
                    let MapHandle::Or(map) = handle.as_ref() else {
                        return Err(OperationError::WrongService);
                    };
                    let map = map.read();
                    let digits = parse_path(&payload.path);
                    let tree = map.merkle_tree();

                    if digits.len() >= tree.depth() {
                        let leaf = tree.leaf_keys(&digits);
                        let entries = leaf
                            .keys()
                            .map(|key| ORMapEntry {
                                key: key.clone(),
                                records: map.get_records(key).into_iter().map(or_record_to_wire).collect(),
                                tombstones: Vec::new(),
                            })
                            .collect();
                        Ok(OperationResponse::Message(Box::new(Message::ORMapSyncRespLeaf(ORMapSyncRespLeaf {
                            payload: ORMapSyncRespLeafPayload {
                                map_name: payload.map_name,
                                path: payload.path,
                                entries,
                            },
                        }))))
                    } else {
                        let buckets: HashMap<String, f64> = tree
                            .bucket_hashes(&digits)
                            .into_iter()
                            .map(|(digit, hash)| (digit_key(digit), f64::from(hash)))
                            .collect();
                        Ok(OperationResponse::Message(Box::new(Message::ORMapSyncRespBuckets(ORMapSyncRespBuckets {
                            payload: ORMapSyncRespBucketsPayload {
                                map_name: payload.map_name,
                                path: payload.path,
                                buckets,
                            },
                        }))))
                    }
                }
                Operation::ORMapDiffRequest { ctx: _, payload } => {
                    let payload = payload.payload;
                    let handle = svc.coordinator.maps.get_or_create_or(&payload.map_name);
                    let MapHandle::Or(map) = handle.as_ref() else {
                        return Err(OperationError::WrongService);
                    };
                    let map = map.read();
                    let entries = payload
                        .keys
                        .into_iter()
                        .map(|key| {
                            let records = map.get_records(&key).into_iter().map(or_record_to_wire).collect();
                            ORMapEntry { key, records, tombstones: Vec::new() }
                        })
                        .collect();
                    Ok(OperationResponse::Message(Box::new(Message::ORMapDiffResponse(ORMapDiffResponse {
                        payload: ORMapDiffResponsePayload { map_name: payload.map_name, entries },
                    }))))
                }
                Operation::ORMapPushDiff { ctx, payload } => {
                    let payload = payload.payload;
                    let handle = svc.coordinator.maps.get_or_create_or(&payload.map_name);
                    let MapHandle::Or(map) = handle.as_ref() else {
                        return Err(OperationError::WrongService);
                    };
                    let mut map = map.write();
                    for entry in payload.entries {
                        let records: Vec<ORMapRecord<Value>> = entry
                            .records
                            .iter()
                            .map(|record| ORMapRecord {
                                value: rmpv_to_value(&record.value),
                                timestamp: record.timestamp.clone(),
                                tag: record.tag.clone(),
                                ttl_ms: record.ttl_ms,
                            })
                            .collect();
                        map.merge_key(entry.key, records, &entry.tombstones);
                    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::domain::test_support::FakeCluster;
    use crate::service::policy::PolicyEngine;
    use crate::service::operation::{service_names, OperationContext};
    use crate::storage::NullDataStore;
    use latticedb_core::hlc::Timestamp;
    use latticedb_core::messages::sync::{MerkleReqBucketMessage, MerkleReqBucketPayload, SyncInitMessage};
    use latticedb_core::types::Value;
    use tower::ServiceExt;

    fn coordinator() -> Arc<Coordinator> {
        Arc::new(Coordinator::new(
            "node-1".to_string(),
            Arc::new(FakeCluster::new("node-1")),
            Arc::new(NullDataStore),
            Arc::new(PolicyEngine::new(b"secret", None)),
        ))
    }

    fn ctx(service_name: &'static str) -> OperationContext {
        OperationContext::new(
            1,
            service_name,
            Timestamp { millis: 1, counter: 0, node_id: "n1".to_string() },
            5_000,
        )
    }

    #[tokio::test]
    async fn sync_init_reports_root_hash() {
        let coordinator = coordinator();
        let handle = coordinator.maps.get_or_create_lww("users");
        let MapHandle::Lww(map) = handle.as_ref() else { panic!("expected lww") };
        map.write().set("k1", Value::Int(1), None);

        let svc: Arc<SyncService> = Arc::new(SyncService::new(coordinator));
        let op = Operation::SyncInit {
            ctx: ctx(service_names::SYNC),
            payload: SyncInitMessage { map_name: "users".to_string(), last_sync_timestamp: None },
        };
        let resp = svc.oneshot(op).await.unwrap();
        match resp {
            OperationResponse::Message(boxed) => match *boxed {
                Message::SyncRespRoot(msg) => assert_ne!(msg.payload.root_hash, 0.0),
                other => panic!("unexpected message: {other:?}"),
            },
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn merkle_req_bucket_at_leaf_depth_returns_records() {
        let coordinator = coordinator();
        let handle = coordinator.maps.get_or_create_lww("users");
        let MapHandle::Lww(map) = handle.as_ref() else { panic!("expected lww") };
        map.write().set("k1", Value::Int(1), None);
        let depth = map.read().merkle_tree().depth();

        let svc: Arc<SyncService> = Arc::new(SyncService::new(coordinator));
        let path: String = (0..depth).map(|_| '0').collect();
        let op = Operation::MerkleReqBucket {
            ctx: ctx(service_names::SYNC),
            payload: MerkleReqBucketMessage {
                payload: MerkleReqBucketPayload { map_name: "users".to_string(), path },
            },
        };
        let resp = svc.oneshot(op).await.unwrap();
        assert!(matches!(
            resp,
            OperationResponse::Message(boxed)
                if matches!(*boxed, Message::SyncRespLeaf(_) | Message::SyncRespBuckets(_))
        ));
    }
}

//! Wire-compatible message schemas for the LatticeDB protocol.
//!
//! Each submodule corresponds to a domain of messages defined in the TypeScript
//! Zod schemas (`packages/core/src/schemas/`). All types use named MsgPack
//! serialization (`rmp_serde::to_vec_named()`) with camelCase field names to
//! match the TypeScript wire format.
//!
//! The [`Message`] enum at the bottom of this module is the single
//! deserialization target for every frame arriving over the WebSocket or
//! inter-node transport; [`OperationService::classify`](crate) (in
//! `latticedb-server`) is what turns a `Message` into a typed operation one
//! layer up.

pub mod base;
pub mod client_events;
pub mod cluster;
pub mod http_sync;
pub mod messaging;
pub mod query;
pub mod search;
pub mod sync;

use serde::{Deserialize, Serialize};

pub use base::{
    AuthMessage, AuthRequiredMessage, ChangeEventType, ClientOp, PredicateNode, PredicateOp,
    Query, SortDirection, WriteConcern,
};
pub use client_events::{
    AuthAckData, AuthFailData, ErrorPayload, GcPrunePayload, LockGrantedPayload,
    LockReleasedPayload, QueryUpdatePayload, ServerBatchEventPayload, ServerEventPayload,
    ServerEventType, SyncResetRequiredPayload,
};
pub use cluster::{
    ClusterSearchReqPayload, ClusterSearchRespPayload, ClusterSearchSubscribePayload,
    ClusterSearchUnsubscribePayload, ClusterSearchUpdatePayload, ClusterSubAckPayload,
    ClusterSubRegisterPayload, ClusterSubUnregisterPayload, ClusterSubUpdatePayload, NodeEndpoints,
    NodeInfo, NodeStatus, PartitionInfo, PartitionMapPayload, PartitionMapRequestPayload,
};
pub use messaging::{
    ConflictResolver, CounterRequestPayload, CounterStatePayload, EntryProcessBatchData,
    EntryProcessBatchResponseData, EntryProcessData, EntryProcessKeyResult,
    EntryProcessResponseData, EntryProcessor, JournalEventData, JournalEventMessageData,
    JournalEventType, JournalReadData, JournalReadResponseData, JournalSubscribeData,
    JournalUnsubscribeData, ListResolversData, ListResolversResponseData, LockReleasePayload,
    LockRequestPayload, MergeRejectedData, PNCounterState, PingData, PongData,
    RegisterResolverData, RegisterResolverResponseData, ResolverInfo, TopicMessageEventPayload,
    TopicPubPayload, TopicSubPayload, TopicUnsubPayload, UnregisterResolverData,
    UnregisterResolverResponseData,
};
pub use query::{
    CursorStatus, QueryRespMessage, QueryRespPayload, QueryResultEntry, QuerySubMessage,
    QuerySubPayload, QueryUnsubMessage, QueryUnsubPayload,
};
pub use search::{
    SearchOptions, SearchPayload, SearchRespPayload, SearchResultEntry, SearchSubPayload,
    SearchUnsubPayload, SearchUpdatePayload,
};
pub use sync::{
    BatchMessage, ClientOpMessage, MerkleReqBucketMessage, MerkleReqBucketPayload, OpAckMessage,
    OpAckPayload, OpBatchMessage, OpBatchPayload, OpRejectedMessage, OpRejectedPayload, OpResult,
    ORMapDiffRequest, ORMapDiffResponse, ORMapEntry, ORMapMerkleReqBucket, ORMapPushDiff,
    ORMapSyncInit, ORMapSyncRespBuckets, ORMapSyncRespLeaf, ORMapSyncRespRoot, SyncInitMessage,
    SyncLeafRecord, SyncRespBucketsMessage, SyncRespLeafMessage, SyncRespRootMessage,
};

// ---------------------------------------------------------------------------
// The Message enum
// ---------------------------------------------------------------------------

/// Every message the coordinator sends or receives over the `WebSocket` or
/// inter-node transport, dispatched on the `type` tag after MsgPack decode.
///
/// Variants wrap either a `type`-tagged struct directly (the ones whose own
/// schema already carries `type` alongside its other fields — these are kept
/// flat rather than double-wrapped) or a bare `{ payload }` for messages
/// whose TS schema nests everything else under a `payload` key. Which shape
/// a given variant uses mirrors its corresponding Zod schema exactly; this
/// enum does not normalize that choice.
///
/// Classification into a typed [`crate` service operation happens one layer
/// up in `latticedb-server`, which also rejects every server-to-client,
/// transport-envelope, and auth variant — those never originate a new
/// operation themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    // ----- Client -> server: CRDT writes -----
    #[serde(rename = "CLIENT_OP")]
    ClientOp(ClientOpMessage),
    #[serde(rename = "OP_BATCH")]
    OpBatch(OpBatchMessage),

    // ----- Server -> client: write acknowledgement -----
    #[serde(rename = "OP_ACK")]
    OpAck(OpAckMessage),
    #[serde(rename = "OP_REJECTED")]
    OpRejected(OpRejectedMessage),

    // ----- LWW sync -----
    #[serde(rename = "SYNC_INIT")]
    SyncInit(SyncInitMessage),
    #[serde(rename = "SYNC_RESP_ROOT")]
    SyncRespRoot(SyncRespRootMessage),
    #[serde(rename = "SYNC_RESP_BUCKETS")]
    SyncRespBuckets(SyncRespBucketsMessage),
    #[serde(rename = "SYNC_RESP_LEAF")]
    SyncRespLeaf(SyncRespLeafMessage),
    #[serde(rename = "MERKLE_REQ_BUCKET")]
    MerkleReqBucket(MerkleReqBucketMessage),

    // ----- OR-Map sync -----
    #[serde(rename = "ORMAP_SYNC_INIT")]
    ORMapSyncInit(ORMapSyncInit),
    #[serde(rename = "ORMAP_SYNC_RESP_ROOT")]
    ORMapSyncRespRoot(ORMapSyncRespRoot),
    #[serde(rename = "ORMAP_SYNC_RESP_BUCKETS")]
    ORMapSyncRespBuckets(ORMapSyncRespBuckets),
    #[serde(rename = "ORMAP_SYNC_RESP_LEAF")]
    ORMapSyncRespLeaf(ORMapSyncRespLeaf),
    #[serde(rename = "ORMAP_MERKLE_REQ_BUCKET")]
    ORMapMerkleReqBucket(ORMapMerkleReqBucket),
    #[serde(rename = "ORMAP_DIFF_REQUEST")]
    ORMapDiffRequest(ORMapDiffRequest),
    #[serde(rename = "ORMAP_DIFF_RESPONSE")]
    ORMapDiffResponse(ORMapDiffResponse),
    #[serde(rename = "ORMAP_PUSH_DIFF")]
    ORMapPushDiff(ORMapPushDiff),

    // ----- Query subscriptions -----
    #[serde(rename = "QUERY_SUB")]
    QuerySub(QuerySubMessage),
    #[serde(rename = "QUERY_UNSUB")]
    QueryUnsub(QueryUnsubMessage),
    #[serde(rename = "QUERY_RESP")]
    QueryResp(QueryRespMessage),
    #[serde(rename = "QUERY_UPDATE")]
    QueryUpdate { payload: QueryUpdatePayload },

    // ----- Search -----
    #[serde(rename = "SEARCH")]
    Search { payload: SearchPayload },
    #[serde(rename = "SEARCH_RESP")]
    SearchResp { payload: SearchRespPayload },
    #[serde(rename = "SEARCH_SUB")]
    SearchSub { payload: SearchSubPayload },
    #[serde(rename = "SEARCH_UPDATE")]
    SearchUpdate { payload: SearchUpdatePayload },
    #[serde(rename = "SEARCH_UNSUB")]
    SearchUnsub { payload: SearchUnsubPayload },

    // ----- Topics (pub/sub) -----
    #[serde(rename = "TOPIC_SUB")]
    TopicSub { payload: TopicSubPayload },
    #[serde(rename = "TOPIC_UNSUB")]
    TopicUnsub { payload: TopicUnsubPayload },
    #[serde(rename = "TOPIC_PUB")]
    TopicPub { payload: TopicPubPayload },
    #[serde(rename = "TOPIC_MESSAGE")]
    TopicMessage { payload: TopicMessageEventPayload },

    // ----- Locks -----
    #[serde(rename = "LOCK_REQUEST")]
    LockRequest { payload: LockRequestPayload },
    #[serde(rename = "LOCK_RELEASE")]
    LockRelease { payload: LockReleasePayload },
    #[serde(rename = "LOCK_GRANTED")]
    LockGranted { payload: LockGrantedPayload },
    #[serde(rename = "LOCK_RELEASED")]
    LockReleased { payload: LockReleasedPayload },

    // ----- PN-Counters -----
    #[serde(rename = "COUNTER_REQUEST")]
    CounterRequest { payload: CounterRequestPayload },
    #[serde(rename = "COUNTER_SYNC")]
    CounterSync { payload: CounterStatePayload },
    #[serde(rename = "COUNTER_RESPONSE")]
    CounterResponse { payload: CounterStatePayload },
    #[serde(rename = "COUNTER_UPDATE")]
    CounterUpdate { payload: CounterStatePayload },

    // ----- Heartbeat -----
    #[serde(rename = "PING")]
    Ping(PingData),
    #[serde(rename = "PONG")]
    Pong(PongData),

    // ----- Entry processors -----
    #[serde(rename = "ENTRY_PROCESS")]
    EntryProcess(EntryProcessData),
    #[serde(rename = "ENTRY_PROCESS_RESPONSE")]
    EntryProcessResponse(EntryProcessResponseData),
    #[serde(rename = "ENTRY_PROCESS_BATCH")]
    EntryProcessBatch(EntryProcessBatchData),
    #[serde(rename = "ENTRY_PROCESS_BATCH_RESPONSE")]
    EntryProcessBatchResponse(EntryProcessBatchResponseData),

    // ----- Journal -----
    #[serde(rename = "JOURNAL_SUBSCRIBE")]
    JournalSubscribe(JournalSubscribeData),
    #[serde(rename = "JOURNAL_UNSUBSCRIBE")]
    JournalUnsubscribe(JournalUnsubscribeData),
    #[serde(rename = "JOURNAL_EVENT")]
    JournalEvent { payload: JournalEventMessageData },
    #[serde(rename = "JOURNAL_READ")]
    JournalRead(JournalReadData),
    #[serde(rename = "JOURNAL_READ_RESPONSE")]
    JournalReadResponse(JournalReadResponseData),

    // ----- Conflict resolvers -----
    #[serde(rename = "REGISTER_RESOLVER")]
    RegisterResolver(RegisterResolverData),
    #[serde(rename = "REGISTER_RESOLVER_RESPONSE")]
    RegisterResolverResponse(RegisterResolverResponseData),
    #[serde(rename = "UNREGISTER_RESOLVER")]
    UnregisterResolver(UnregisterResolverData),
    #[serde(rename = "UNREGISTER_RESOLVER_RESPONSE")]
    UnregisterResolverResponse(UnregisterResolverResponseData),
    #[serde(rename = "LIST_RESOLVERS")]
    ListResolvers(ListResolversData),
    #[serde(rename = "LIST_RESOLVERS_RESPONSE")]
    ListResolversResponse(ListResolversResponseData),
    #[serde(rename = "MERGE_REJECTED")]
    MergeRejected(MergeRejectedData),

    // ----- Server push events -----
    #[serde(rename = "SERVER_EVENT")]
    ServerEvent { payload: ServerEventPayload },
    #[serde(rename = "SERVER_BATCH_EVENT")]
    ServerBatchEvent { payload: ServerBatchEventPayload },
    #[serde(rename = "GC_PRUNE")]
    GcPrune { payload: GcPrunePayload },
    #[serde(rename = "SYNC_RESET_REQUIRED")]
    SyncResetRequired { payload: SyncResetRequiredPayload },

    // ----- Errors -----
    #[serde(rename = "ERROR")]
    Error { payload: ErrorPayload },

    // ----- Auth -----
    #[serde(rename = "AUTH")]
    Auth(AuthMessage),
    #[serde(rename = "AUTH_REQUIRED")]
    AuthRequired(AuthRequiredMessage),
    #[serde(rename = "AUTH_ACK")]
    AuthAck(AuthAckData),
    #[serde(rename = "AUTH_FAIL")]
    AuthFail(AuthFailData),

    // ----- Partition map -----
    #[serde(rename = "PARTITION_MAP_REQUEST")]
    PartitionMapRequest {
        payload: Option<PartitionMapRequestPayload>,
    },
    #[serde(rename = "PARTITION_MAP")]
    PartitionMap { payload: PartitionMapPayload },

    // ----- Cluster-internal: query/search forwarding -----
    #[serde(rename = "CLUSTER_SUB_REGISTER")]
    ClusterSubRegister { payload: ClusterSubRegisterPayload },
    #[serde(rename = "CLUSTER_SUB_ACK")]
    ClusterSubAck { payload: ClusterSubAckPayload },
    #[serde(rename = "CLUSTER_SUB_UPDATE")]
    ClusterSubUpdate { payload: ClusterSubUpdatePayload },
    #[serde(rename = "CLUSTER_SUB_UNREGISTER")]
    ClusterSubUnregister { payload: ClusterSubUnregisterPayload },
    #[serde(rename = "CLUSTER_SEARCH_REQ")]
    ClusterSearchReq { payload: ClusterSearchReqPayload },
    #[serde(rename = "CLUSTER_SEARCH_RESP")]
    ClusterSearchResp { payload: ClusterSearchRespPayload },
    #[serde(rename = "CLUSTER_SEARCH_SUBSCRIBE")]
    ClusterSearchSubscribe {
        payload: ClusterSearchSubscribePayload,
    },
    #[serde(rename = "CLUSTER_SEARCH_UNSUBSCRIBE")]
    ClusterSearchUnsubscribe {
        payload: ClusterSearchUnsubscribePayload,
    },
    #[serde(rename = "CLUSTER_SEARCH_UPDATE")]
    ClusterSearchUpdate { payload: ClusterSearchUpdatePayload },

    // ----- Transport envelope -----
    #[serde(rename = "BATCH")]
    Batch(BatchMessage),
}

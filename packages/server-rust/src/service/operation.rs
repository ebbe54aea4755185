//! Typed operation variants dispatched through the routing pipeline.
//!
//! A `Message` arriving from a client, peer node, or backup link is classified
//! (see `classify.rs`) into one `Operation` variant per distinct business
//! request. Each variant pairs an `OperationContext` (call bookkeeping,
//! partition routing, caller identity) with the strongly-typed payload the
//! corresponding domain service needs.

use latticedb_core::messages::cluster::PartitionMapRequestPayload;
use latticedb_core::messages::query::{QuerySubMessage, QueryUnsubMessage};
use latticedb_core::messages::search::{SearchPayload, SearchSubPayload, SearchUnsubPayload};
use latticedb_core::messages::sync::{
    ClientOpMessage, MerkleReqBucketMessage, OpBatchMessage, ORMapDiffRequest, ORMapMerkleReqBucket,
    ORMapPushDiff, ORMapSyncInit, SyncInitMessage,
};
use latticedb_core::messages::{
    CounterRequestPayload, CounterStatePayload, EntryProcessBatchData, EntryProcessData,
    JournalReadData, JournalSubscribeData, JournalUnsubscribeData, ListResolversData,
    LockReleasePayload, LockRequestPayload, PingData, RegisterResolverData, TopicPubPayload,
    TopicSubPayload, TopicUnsubPayload, UnregisterResolverData,
};

/// Canonical `service_name` constants used as routing keys in
/// `OperationContext` and as registration keys in `OperationRouter`.
pub mod service_names {
    /// CRDT domain: LWW-Map and OR-Map reads/writes.
    pub const CRDT: &str = "crdt";
    /// Sync domain: Merkle tree delta synchronization.
    pub const SYNC: &str = "sync";
    /// Query domain: live query subscriptions.
    pub const QUERY: &str = "query";
    /// Messaging domain: topic pub/sub.
    pub const MESSAGING: &str = "messaging";
    /// Coordination domain: locks, partition map, heartbeat.
    pub const COORDINATION: &str = "coordination";
    /// Search domain: full-text search.
    pub const SEARCH: &str = "search";
    /// Persistence domain: counters, entry processing, journal, resolvers.
    pub const PERSISTENCE: &str = "persistence";
}

/// Origin of the operation caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerOrigin {
    /// A directly connected client over the public transport.
    Client,
    /// Forwarded from another cluster node (the operation's true owner).
    Forwarded,
    /// Replayed from a backup node during failover.
    Backup,
    /// Arriving over a WAN replication link from a remote cluster.
    Wan,
    /// Originated internally by the server itself (e.g. GC, repair).
    System,
}

/// Context carried with every operation through the pipeline.
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Monotonically increasing identifier, unique per `OperationService`.
    pub call_id: u64,
    /// Partition this operation routes to, when derivable from the payload.
    pub partition_id: Option<u32>,
    /// Domain service this operation is dispatched to.
    pub service_name: &'static str,
    /// Where this operation originated from.
    pub caller_origin: CallerOrigin,
    /// Connection identifier of the originating client, if any.
    pub client_id: Option<String>,
    /// Node identifier of the originating peer, for forwarded/backup/WAN calls.
    pub caller_node_id: Option<String>,
    /// HLC timestamp assigned at classification time.
    pub timestamp: latticedb_core::Timestamp,
    /// Timeout budget for this call, in milliseconds.
    pub call_timeout_ms: u64,
}

impl OperationContext {
    /// Build a fresh context with client-origin defaults. Callers that need a
    /// different origin, partition, or identity mutate the fields directly.
    #[must_use]
    pub fn new(
        call_id: u64,
        service_name: &'static str,
        timestamp: latticedb_core::Timestamp,
        call_timeout_ms: u64,
    ) -> Self {
        Self {
            call_id,
            partition_id: None,
            service_name,
            caller_origin: CallerOrigin::Client,
            client_id: None,
            caller_node_id: None,
            timestamp,
            call_timeout_ms,
        }
    }
}

/// Typed operation variants dispatched through the pipeline.
///
/// Variants group by domain in the same order as `classify.rs`'s match arms.
#[derive(Debug)]
pub enum Operation {
    // ----- CRDT domain -----
    /// A single read/write/delete against an LWW-Map or OR-Map entry.
    ClientOp {
        ctx: OperationContext,
        payload: ClientOpMessage,
    },
    /// A batch of `ClientOp`s submitted together.
    OpBatch {
        ctx: OperationContext,
        payload: OpBatchMessage,
    },

    // ----- Sync domain -----
    /// Start an LWW-Map Merkle sync session.
    SyncInit {
        ctx: OperationContext,
        payload: SyncInitMessage,
    },
    /// Request the children of one Merkle bucket during LWW-Map sync.
    MerkleReqBucket {
        ctx: OperationContext,
        payload: MerkleReqBucketMessage,
    },
    /// Start an OR-Map Merkle sync session.
    ORMapSyncInit {
        ctx: OperationContext,
        payload: ORMapSyncInit,
    },
    /// Request the children of one Merkle bucket during OR-Map sync.
    ORMapMerkleReqBucket {
        ctx: OperationContext,
        payload: ORMapMerkleReqBucket,
    },
    /// Request a full diff of divergent OR-Map entries.
    ORMapDiffRequest {
        ctx: OperationContext,
        payload: ORMapDiffRequest,
    },
    /// Push a computed OR-Map diff to be merged by the receiver.
    ORMapPushDiff {
        ctx: OperationContext,
        payload: ORMapPushDiff,
    },

    // ----- Query domain -----
    /// Register a live query subscription.
    QuerySubscribe {
        ctx: OperationContext,
        payload: QuerySubMessage,
    },
    /// Cancel a live query subscription.
    QueryUnsubscribe {
        ctx: OperationContext,
        payload: QueryUnsubMessage,
    },

    // ----- Messaging domain -----
    /// Subscribe to a pub/sub topic.
    TopicSubscribe {
        ctx: OperationContext,
        payload: TopicSubPayload,
    },
    /// Unsubscribe from a pub/sub topic.
    TopicUnsubscribe {
        ctx: OperationContext,
        payload: TopicUnsubPayload,
    },
    /// Publish a message to a pub/sub topic.
    TopicPublish {
        ctx: OperationContext,
        payload: TopicPubPayload,
    },

    // ----- Coordination domain -----
    /// Acquire a distributed lock.
    LockRequest {
        ctx: OperationContext,
        payload: LockRequestPayload,
    },
    /// Release a distributed lock.
    LockRelease {
        ctx: OperationContext,
        payload: LockReleasePayload,
    },
    /// Request the current partition-to-node ownership map.
    PartitionMapRequest {
        ctx: OperationContext,
        payload: Option<PartitionMapRequestPayload>,
    },
    /// Client heartbeat / latency probe.
    Ping {
        ctx: OperationContext,
        payload: PingData,
    },

    // ----- Search domain -----
    /// One-shot full-text search.
    Search {
        ctx: OperationContext,
        payload: SearchPayload,
    },
    /// Subscribe to a live-updating full-text search.
    SearchSubscribe {
        ctx: OperationContext,
        payload: SearchSubPayload,
    },
    /// Cancel a live full-text search subscription.
    SearchUnsubscribe {
        ctx: OperationContext,
        payload: SearchUnsubPayload,
    },

    // ----- Persistence domain -----
    /// Fetch the current value of a PN-Counter.
    CounterRequest {
        ctx: OperationContext,
        payload: CounterRequestPayload,
    },
    /// Merge a remote PN-Counter state into the local replica.
    CounterSync {
        ctx: OperationContext,
        payload: CounterStatePayload,
    },
    /// Apply a registered entry processor to a single key.
    EntryProcess {
        ctx: OperationContext,
        payload: EntryProcessData,
    },
    /// Apply a registered entry processor to a batch of keys.
    EntryProcessBatch {
        ctx: OperationContext,
        payload: EntryProcessBatchData,
    },
    /// Register a conflict resolver for a map.
    RegisterResolver {
        ctx: OperationContext,
        payload: RegisterResolverData,
    },
    /// Unregister a previously registered conflict resolver.
    UnregisterResolver {
        ctx: OperationContext,
        payload: UnregisterResolverData,
    },
    /// List registered conflict resolvers.
    ListResolvers {
        ctx: OperationContext,
        payload: ListResolversData,
    },
    /// Subscribe to the write-ahead journal.
    JournalSubscribe {
        ctx: OperationContext,
        payload: JournalSubscribeData,
    },
    /// Cancel a journal subscription.
    JournalUnsubscribe {
        ctx: OperationContext,
        payload: JournalUnsubscribeData,
    },
    /// Read a range of journal entries.
    JournalRead {
        ctx: OperationContext,
        payload: JournalReadData,
    },

    /// Internally triggered tombstone/expired-entry garbage collection pass.
    /// Has no client-facing payload.
    GarbageCollect { ctx: OperationContext },
}

impl Operation {
    /// Borrow the context carried by this operation, regardless of variant.
    #[must_use]
    pub fn ctx(&self) -> &OperationContext {
        match self {
            Operation::ClientOp { ctx, .. }
            | Operation::OpBatch { ctx, .. }
            | Operation::SyncInit { ctx, .. }
            | Operation::MerkleReqBucket { ctx, .. }
            | Operation::ORMapSyncInit { ctx, .. }
            | Operation::ORMapMerkleReqBucket { ctx, .. }
            | Operation::ORMapDiffRequest { ctx, .. }
            | Operation::ORMapPushDiff { ctx, .. }
            | Operation::QuerySubscribe { ctx, .. }
            | Operation::QueryUnsubscribe { ctx, .. }
            | Operation::TopicSubscribe { ctx, .. }
            | Operation::TopicUnsubscribe { ctx, .. }
            | Operation::TopicPublish { ctx, .. }
            | Operation::LockRequest { ctx, .. }
            | Operation::LockRelease { ctx, .. }
            | Operation::PartitionMapRequest { ctx, .. }
            | Operation::Ping { ctx, .. }
            | Operation::Search { ctx, .. }
            | Operation::SearchSubscribe { ctx, .. }
            | Operation::SearchUnsubscribe { ctx, .. }
            | Operation::CounterRequest { ctx, .. }
            | Operation::CounterSync { ctx, .. }
            | Operation::EntryProcess { ctx, .. }
            | Operation::EntryProcessBatch { ctx, .. }
            | Operation::RegisterResolver { ctx, .. }
            | Operation::UnregisterResolver { ctx, .. }
            | Operation::ListResolvers { ctx, .. }
            | Operation::JournalSubscribe { ctx, .. }
            | Operation::JournalUnsubscribe { ctx, .. }
            | Operation::JournalRead { ctx, .. }
            | Operation::GarbageCollect { ctx } => ctx,
        }
    }
}

/// Successful response from an operation handler.
#[derive(Debug)]
pub enum OperationResponse {
    /// Bare acknowledgement, no payload.
    Ack { call_id: u64 },
    /// A single reply message to send back to the caller.
    Message(Box<latticedb_core::messages::Message>),
    /// Multiple reply messages, e.g. a subscription's initial result page.
    Messages(Vec<latticedb_core::messages::Message>),
    /// Domain service recognized the operation but has no implementation yet.
    NotImplemented { service_name: &'static str, call_id: u64 },
    /// Operation succeeded with nothing to report back.
    Empty,
}

/// Errors returned by operation handlers.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    /// No domain service is registered for `ctx.service_name`.
    #[error("unknown service: {name}")]
    UnknownService { name: String },
    /// The call exceeded `ctx.call_timeout_ms`.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// Backpressure regulator rejected the call.
    #[error("server overloaded, try again later")]
    Overloaded,
    /// The operation was routed to a service that cannot handle its variant.
    #[error("wrong service for operation")]
    WrongService,
    /// Catch-all for domain-service-internal failures.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Errors from classifying a `Message` into an `Operation`.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    /// The message is a server-to-client response or cluster-internal
    /// message and cannot be classified as a client-originated operation.
    #[error("server-to-client response cannot be classified as operation: {variant}")]
    ServerToClient { variant: &'static str },
    /// The message is a transport envelope (e.g. `Batch`) that must be
    /// unpacked into its constituent messages before classification.
    #[error("transport envelope must be unpacked before classification: {variant}")]
    TransportEnvelope { variant: &'static str },
    /// The message is an authentication handshake message, handled by the
    /// transport layer before any operation is classified.
    #[error("authentication message handled at transport layer: {variant}")]
    AuthMessage { variant: &'static str },
}

//! Cluster domain payload structs for partition map distribution, inter-node
//! subscription forwarding, and distributed search coordination.
//!
//! These types correspond to the TypeScript Zod schemas in
//! `packages/core/src/schemas/cluster-schemas.ts`. All structs use
//! `#[serde(rename_all = "camelCase")]` to produce wire-compatible
//! `MsgPack` output via `rmp_serde::to_vec_named()`.

use serde::{Deserialize, Serialize};

use super::base::{ChangeEventType, Query};
use super::query::QueryResultEntry;
use super::search::{SearchOptions, SearchResultEntry};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of a node within the cluster.
///
/// Maps to the inline `z.enum(...)` in `NodeInfoSchema.status` in
/// `cluster-schemas.ts`. Variant names use `SCREAMING_CASE` to match
/// TS wire values directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum NodeStatus {
    ACTIVE,
    JOINING,
    LEAVING,
    SUSPECTED,
    FAILED,
}

// ---------------------------------------------------------------------------
// Partition Map types
// ---------------------------------------------------------------------------

/// Network endpoints for a cluster node.
///
/// Maps to the inline `endpoints` object in `NodeInfoSchema` in
/// `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEndpoints {
    /// WebSocket endpoint URL.
    pub websocket: String,

    /// Optional HTTP endpoint URL.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub http: Option<String>,
}

/// Information about a single node in the cluster.
///
/// Maps to `NodeInfoSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    /// Unique identifier for this node.
    pub node_id: String,

    /// Network endpoints for reaching this node.
    pub endpoints: NodeEndpoints,

    /// Current membership status.
    pub status: NodeStatus,
}

/// Ownership information for a single partition.
///
/// Maps to `PartitionInfoSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionInfo {
    /// Partition identifier (0-based).
    pub partition_id: u32,

    /// Node ID of the partition owner.
    pub owner_node_id: String,

    /// Node IDs holding backup replicas.
    pub backup_node_ids: Vec<String>,
}

/// Full partition map describing cluster topology.
///
/// Maps to `PartitionMapPayloadSchema` in `cluster-schemas.ts`.
/// Distributed to clients so they can route operations directly to
/// the owning node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionMapPayload {
    /// Monotonically increasing version for optimistic staleness detection.
    pub version: u32,

    /// Total number of partitions in the cluster (typically 271).
    pub partition_count: u32,

    /// All known cluster nodes and their endpoints.
    pub nodes: Vec<NodeInfo>,

    /// Assignment of partitions to nodes.
    pub partitions: Vec<PartitionInfo>,

    /// Timestamp (ms since epoch) when this map was generated.
    pub generated_at: i64,
}

/// Payload for requesting the current partition map.
///
/// Maps to the `payload` of `PartitionMapRequestSchema` in `cluster-schemas.ts`.
/// Includes the client's current version for delta comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionMapRequestPayload {
    /// Client's current partition map version, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_version: Option<u32>,
}

// ---------------------------------------------------------------------------
// Inter-node query subscription forwarding
// ---------------------------------------------------------------------------
//
// When a client subscribes to a query whose where-clause does not pin every
// relevant partition to the local node, the owning node registers the
// subscription with each remote partition owner using these messages, then
// relays `ClusterSubUpdate` notifications back to the client as regular
// `QueryUpdate` pushes. Node-to-node only; never forwarded to clients.

/// Registers a query subscription with a remote partition owner.
///
/// Maps to `ClusterSubRegisterPayloadSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSubRegisterPayload {
    /// Subscription identifier, shared across all participating nodes.
    pub subscription_id: String,
    /// Name of the map to query.
    pub map_name: String,
    /// The query parameters (filter, sort, pagination).
    pub query: Query,
    /// Node that owns the client connection and should receive updates.
    pub requesting_node_id: String,
}

/// Acknowledges a `ClusterSubRegister`, optionally carrying the initial matches.
///
/// Maps to `ClusterSubAckPayloadSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSubAckPayload {
    /// Subscription this acknowledgement is for.
    pub subscription_id: String,
    /// Node sending the acknowledgement.
    pub node_id: String,
    /// Whether registration succeeded on this node.
    pub success: bool,
    /// Error message if registration failed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    /// Initial matching records owned by this node, if requested.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub initial_results: Option<Vec<QueryResultEntry>>,
    /// Total number of matches owned by this node.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total_hits: Option<u32>,
}

/// Forwards a live query change from a remote partition owner.
///
/// Maps to `ClusterSubUpdatePayloadSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSubUpdatePayload {
    /// Subscription this update belongs to.
    pub subscription_id: String,
    /// Node that observed the change.
    pub node_id: String,
    /// Key that changed.
    pub key: String,
    /// Current value.
    pub value: rmpv::Value,
    /// Whether the record entered, updated within, or left the result set.
    pub change_type: ChangeEventType,
}

/// Cancels a previously registered cluster subscription.
///
/// Maps to `ClusterSubUnregisterPayloadSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSubUnregisterPayload {
    /// Subscription to cancel.
    pub subscription_id: String,
    /// Node the subscription was registered on.
    pub node_id: String,
}

// ---------------------------------------------------------------------------
// Distributed search coordination
// ---------------------------------------------------------------------------

/// Scatter-gather search request sent to every node owning a relevant partition.
///
/// Maps to `ClusterSearchReqPayloadSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSearchReqPayload {
    /// Correlates responses from every node back to the originating request.
    pub request_id: String,
    /// Name of the map to search.
    pub map_name: String,
    /// Full-text search query string.
    pub query: String,
    /// Optional search configuration.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub options: Option<SearchOptions>,
    /// Partitions this node is being asked to search.
    pub partition_ids: Vec<u32>,
}

/// A single node's contribution to a scatter-gather search response.
///
/// Maps to `ClusterSearchRespPayloadSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSearchRespPayload {
    /// Matches the `request_id` from the originating `ClusterSearchReq`.
    pub request_id: String,
    /// Node that produced these results.
    pub node_id: String,
    /// Matched records owned by this node.
    pub results: Vec<SearchResultEntry>,
    /// Total number of matches owned by this node.
    pub total_count: u32,
    /// Error message if the local search failed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// Registers a live search subscription with a remote partition owner.
///
/// Maps to `ClusterSearchSubscribePayloadSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSearchSubscribePayload {
    /// Subscription identifier, shared across all participating nodes.
    pub subscription_id: String,
    /// Name of the map to watch.
    pub map_name: String,
    /// Full-text search query string.
    pub query: String,
    /// Optional search configuration.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub options: Option<SearchOptions>,
    /// Node that owns the client connection and should receive updates.
    pub requesting_node_id: String,
}

/// Cancels a previously registered cluster search subscription.
///
/// Maps to `ClusterSearchUnsubscribePayloadSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSearchUnsubscribePayload {
    /// Subscription to cancel.
    pub subscription_id: String,
    /// Node the subscription was registered on.
    pub node_id: String,
}

/// Forwards a live search change from a remote partition owner.
///
/// Maps to `ClusterSearchUpdatePayloadSchema` in `cluster-schemas.ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSearchUpdatePayload {
    /// Subscription this update belongs to.
    pub subscription_id: String,
    /// Node that observed the change.
    pub node_id: String,
    /// Key that changed.
    pub key: String,
    /// Current value.
    pub value: rmpv::Value,
    /// Updated relevance score.
    pub score: f64,
    /// Terms from the query that match the updated record.
    pub matched_terms: Vec<String>,
    /// Whether the record entered, updated within, or left the result set.
    pub change_type: ChangeEventType,
}

//! Fire-and-forget named pub/sub overlay.
//!
//! Local delivery is immediate (no ack, no persistence); cluster-wide
//! delivery is the caller's responsibility via `CLUSTER_TOPIC_PUB`
//! broadcast to all members -- this module only tracks local subscribers
//! and fans out to them.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use dashmap::DashSet;
use latticedb_core::messages::messaging::TopicMessageEventPayload;

/// In-memory topic subscription table, keyed by topic name.
#[derive(Default)]
pub struct TopicBus {
    subscribers: DashMap<String, DashSet<String>>,
}

impl TopicBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `client_id` to `topic`.
    pub fn subscribe(&self, topic: &str, client_id: &str) {
        self.subscribers
            .entry(topic.to_string())
            .or_default()
            .insert(client_id.to_string());
    }

    /// Unsubscribes `client_id` from `topic`.
    pub fn unsubscribe(&self, topic: &str, client_id: &str) {
        if let Some(set) = self.subscribers.get(topic) {
            set.remove(client_id);
        }
    }

    /// Drops a disconnected client from every topic it was subscribed to.
    pub fn remove_client(&self, client_id: &str) {
        for entry in &self.subscribers {
            entry.value().remove(client_id);
        }
    }

    /// Publishes `data` to every local subscriber of `topic`, returning the
    /// event payload and the subscriber ids to deliver it to. Delivery
    /// itself (writing to each subscriber's coalescing writer) is the
    /// caller's responsibility since this module has no connection handle.
    #[must_use]
    pub fn publish(
        &self,
        topic: &str,
        data: rmpv::Value,
        publisher_id: Option<String>,
    ) -> (TopicMessageEventPayload, Vec<String>) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let payload = TopicMessageEventPayload {
            topic: topic.to_string(),
            data,
            publisher_id,
            timestamp: now,
        };
        let recipients = self
            .subscribers
            .get(topic)
            .map(|set| set.iter().map(|id| id.clone()).collect())
            .unwrap_or_default();
        (payload, recipients)
    }

    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers.get(topic).map(|s| s.len()).unwrap_or(0)
    }
}

/// Shared handle, held by the messaging domain service and the coordinator
/// context.
pub type SharedTopicBus = Arc<TopicBus>;

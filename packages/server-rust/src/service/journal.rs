//! In-memory write-ahead journal: a bounded ring buffer of every mutation
//! applied through the CRDT domain service, readable by sequence range and
//! subscribable for live tailing.
//!
//! Push delivery to a live `JournalSubscribe` subscriber has the same gap
//! as topic/query delivery elsewhere in this crate -- subscriptions are
//! tracked here but nothing currently drains them onto a connection, since
//! that needs a client-id-indexed connection lookup this crate doesn't have.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use latticedb_core::hlc::Timestamp;
use latticedb_core::messages::messaging::{JournalEventData, JournalEventType};
use parking_lot::RwLock;

/// Default ring buffer capacity; oldest entries are evicted once exceeded.
pub const DEFAULT_CAPACITY: usize = 10_000;

struct JournalSubscription {
    from_sequence: Option<u64>,
    map_name: Option<String>,
    types: Option<Vec<JournalEventType>>,
    client_id: String,
}

/// Per-node write-ahead journal.
pub struct Journal {
    node_id: String,
    capacity: usize,
    entries: RwLock<VecDeque<JournalEventData>>,
    next_sequence: AtomicU64,
    subscriptions: DashMap<String, JournalSubscription>,
}

fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

impl Journal {
    #[must_use]
    pub fn new(node_id: String) -> Self {
        Self::with_capacity(node_id, DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(node_id: String, capacity: usize) -> Self {
        Self {
            node_id,
            capacity,
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            next_sequence: AtomicU64::new(1),
            subscriptions: DashMap::new(),
        }
    }

    /// Appends one mutation event, evicting the oldest entry if the journal
    /// is at capacity. Returns the recorded event (with its assigned
    /// sequence number) for callers that want to react to it.
    pub fn append(
        &self,
        map_name: &str,
        key: &str,
        event_type: JournalEventType,
        value: Option<rmpv::Value>,
        previous_value: Option<rmpv::Value>,
    ) -> JournalEventData {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let event = JournalEventData {
            sequence: sequence.to_string(),
            event_type,
            map_name: map_name.to_string(),
            key: key.to_string(),
            value,
            previous_value,
            timestamp: Timestamp { millis: now_millis(), counter: 0, node_id: self.node_id.clone() },
            node_id: self.node_id.clone(),
            metadata: None,
        };
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(event.clone());
        event
    }

    /// Reads events with sequence strictly greater than `from_sequence`
    /// (parse failures are treated as `0`, i.e. read from the start),
    /// optionally filtered by map name, up to `limit` entries (default
    /// 100). Returns the page and whether more events remain beyond it.
    #[must_use]
    pub fn read_from(&self, from_sequence: &str, map_name: Option<&str>, limit: Option<u32>) -> (Vec<JournalEventData>, bool) {
        let from: u64 = from_sequence.parse().unwrap_or(0);
        let limit = limit.map_or(100, |l| l as usize).max(1);
        let entries = self.entries.read();
        let matching: Vec<&JournalEventData> = entries
            .iter()
            .filter(|e| e.sequence.parse::<u64>().unwrap_or(0) > from)
            .filter(|e| map_name.map_or(true, |m| e.map_name == m))
            .collect();
        let has_more = matching.len() > limit;
        let page = matching.into_iter().take(limit).cloned().collect();
        (page, has_more)
    }

    /// Registers a live subscription, returning its assigned id (the
    /// caller's request id, reused as the subscription id).
    pub fn subscribe(
        &self,
        subscription_id: String,
        from_sequence: Option<String>,
        map_name: Option<String>,
        types: Option<Vec<JournalEventType>>,
        client_id: String,
    ) {
        let from_sequence = from_sequence.and_then(|s| s.parse().ok());
        self.subscriptions.insert(subscription_id, JournalSubscription { from_sequence, map_name, types, client_id });
    }

    pub fn unsubscribe(&self, subscription_id: &str) {
        self.subscriptions.remove(subscription_id);
    }

    pub fn remove_client(&self, client_id: &str) {
        let doomed: Vec<String> =
            self.subscriptions.iter().filter(|e| e.value().client_id == client_id).map(|e| e.key().clone()).collect();
        for id in doomed {
            self.subscriptions.remove(&id);
        }
    }

    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared handle, held by the persistence domain service, the CRDT domain
/// service (which appends on every write), and the coordinator context.
pub type SharedJournal = Arc<Journal>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_increasing_sequences() {
        let journal = Journal::new("n1".to_string());
        let e1 = journal.append("users", "k1", JournalEventType::PUT, Some(rmpv::Value::Integer(1.into())), None);
        let e2 = journal.append("users", "k2", JournalEventType::PUT, Some(rmpv::Value::Integer(2.into())), None);
        assert_eq!(e1.sequence, "1");
        assert_eq!(e2.sequence, "2");
    }

    #[test]
    fn read_from_respects_sequence_and_limit() {
        let journal = Journal::new("n1".to_string());
        for i in 0..5 {
            journal.append("users", &format!("k{i}"), JournalEventType::PUT, None, None);
        }
        let (page, has_more) = journal.read_from("2", None, Some(2));
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].sequence, "3");
        assert!(has_more);
    }

    #[test]
    fn read_from_filters_by_map_name() {
        let journal = Journal::new("n1".to_string());
        journal.append("users", "k1", JournalEventType::PUT, None, None);
        journal.append("orders", "k2", JournalEventType::PUT, None, None);
        let (page, _) = journal.read_from("0", Some("orders"), None);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].map_name, "orders");
    }

    #[test]
    fn capacity_evicts_oldest() {
        let journal = Journal::with_capacity("n1".to_string(), 2);
        journal.append("m", "a", JournalEventType::PUT, None, None);
        journal.append("m", "b", JournalEventType::PUT, None, None);
        journal.append("m", "c", JournalEventType::PUT, None, None);
        assert_eq!(journal.len(), 2);
        let (page, _) = journal.read_from("0", None, None);
        assert_eq!(page[0].key, "b");
    }

    #[test]
    fn subscribe_then_unsubscribe() {
        let journal = Journal::new("n1".to_string());
        journal.subscribe("s1".to_string(), None, None, None, "client-1".to_string());
        assert_eq!(journal.subscription_count(), 1);
        journal.unsubscribe("s1");
        assert_eq!(journal.subscription_count(), 0);
    }
}

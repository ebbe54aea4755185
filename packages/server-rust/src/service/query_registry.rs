//! Live query subscription registry.
//!
//! Tracks `QUERY_SUB`/`QUERY_UNSUB` subscriptions, indexes them by map name
//! for O(1) lookup of affected subscribers on each mutation, and emits
//! `ENTER`/`UPDATE`/`LEAVE` deltas as matching keys change.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use latticedb_core::messages::base::{ChangeEventType, Query};
use latticedb_core::messages::query::{QueryResultEntry, QueryRespPayload};
use latticedb_core::types::Value;
use parking_lot::RwLock;

/// One registered live-query subscription.
pub struct Subscription {
    pub query_id: String,
    pub map_name: String,
    pub client_id: String,
    pub query: Query,
    /// Keys currently satisfying the predicate, used to diff on the next
    /// change and decide ENTER vs UPDATE vs LEAVE.
    previous_result_keys: RwLock<std::collections::HashSet<String>>,
}

/// Registry of live query subscriptions, indexed by map name.
///
/// `by_query_id` holds the canonical subscription state; `by_map_name`
/// is a secondary index used purely for O(1) routing on each mutation and
/// for early-exit when a map has no subscribers.
#[derive(Default)]
pub struct QueryRegistry {
    by_query_id: DashMap<String, Arc<Subscription>>,
    by_map_name: DashMap<String, Vec<String>>,
}

/// One delta produced by re-evaluating subscriptions after a key changes.
#[derive(Debug, Clone)]
pub struct QueryDelta {
    pub query_id: String,
    pub client_id: String,
    pub change_type: ChangeEventType,
    pub key: String,
}

impl QueryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscription and evaluates it once against the current
    /// snapshot of the map (as provided by the caller), returning the
    /// initial `QueryRespPayload`.
    pub fn subscribe(
        &self,
        query_id: String,
        map_name: String,
        client_id: String,
        query: Query,
        snapshot: &[(String, Value)],
    ) -> QueryRespPayload {
        let matching: Vec<(String, Value)> = snapshot
            .iter()
            .filter(|(_, v)| matches_query(&query, v))
            .cloned()
            .collect();

        let sub = Arc::new(Subscription {
            query_id: query_id.clone(),
            map_name: map_name.clone(),
            client_id,
            query,
            previous_result_keys: RwLock::new(matching.iter().map(|(k, _)| k.clone()).collect()),
        });

        self.by_query_id.insert(query_id.clone(), sub);
        self.by_map_name
            .entry(map_name)
            .or_default()
            .push(query_id.clone());

        let limited: Vec<QueryResultEntry> = matching
            .into_iter()
            .map(|(key, value)| QueryResultEntry {
                key,
                value: value_to_rmpv(&value),
            })
            .collect();

        QueryRespPayload {
            query_id,
            results: limited,
            next_cursor: None,
            has_more: Some(false),
            cursor_status: None,
        }
    }

    /// Cancels a subscription.
    pub fn unsubscribe(&self, query_id: &str) {
        if let Some((_, sub)) = self.by_query_id.remove(query_id) {
            if let Some(mut ids) = self.by_map_name.get_mut(&sub.map_name) {
                ids.retain(|id| id != query_id);
            }
        }
    }

    /// Whether any subscription cares about `map_name` -- used for the
    /// early-exit on broadcasts with no subscribers.
    #[must_use]
    pub fn has_subscribers(&self, map_name: &str) -> bool {
        self.by_map_name
            .get(map_name)
            .is_some_and(|ids| !ids.is_empty())
    }

    /// Re-evaluates every subscription on `map_name` against a single
    /// changed key, returning the ENTER/UPDATE/LEAVE deltas to emit.
    pub fn on_change(&self, map_name: &str, key: &str, new_value: Option<&Value>) -> Vec<QueryDelta> {
        let Some(ids) = self.by_map_name.get(map_name).map(|v| v.clone()) else {
            return Vec::new();
        };

        let mut deltas = Vec::new();
        for id in ids {
            let Some(sub) = self.by_query_id.get(&id) else {
                continue;
            };
            let now_matches = new_value.is_some_and(|v| matches_query(&sub.query, v));
            let mut prev = sub.previous_result_keys.write();
            let was_matching = prev.contains(key);

            let change = match (was_matching, now_matches) {
                (false, true) => Some(ChangeEventType::ENTER),
                (true, true) => Some(ChangeEventType::UPDATE),
                (true, false) => Some(ChangeEventType::LEAVE),
                (false, false) => None,
            };

            if let Some(change_type) = change {
                if now_matches {
                    prev.insert(key.to_string());
                } else {
                    prev.remove(key);
                }
                deltas.push(QueryDelta {
                    query_id: sub.query_id.clone(),
                    client_id: sub.client_id.clone(),
                    change_type,
                    key: key.to_string(),
                });
            }
        }
        deltas
    }

    /// Drops every subscription belonging to a disconnected client.
    pub fn remove_client(&self, client_id: &str) {
        let doomed: Vec<String> = self
            .by_query_id
            .iter()
            .filter(|e| e.value().client_id == client_id)
            .map(|e| e.key().clone())
            .collect();
        for id in doomed {
            self.unsubscribe(&id);
        }
    }

    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.by_query_id.len()
    }
}

/// Evaluates a query's `where`/`predicate` clauses against a single value.
/// Sort/cursor/limit apply only to the initial batch result, not to
/// per-key incremental re-evaluation.
fn matches_query(query: &Query, value: &Value) -> bool {
    if let Some(where_clause) = &query.r#where {
        for (field, expected) in where_clause {
            let Some(actual) = value.get_path(field) else {
                return false;
            };
            if value_to_rmpv(actual) != *expected {
                return false;
            }
        }
    }
    true
}

fn value_to_rmpv(value: &Value) -> rmpv::Value {
    match value {
        Value::Null => rmpv::Value::Nil,
        Value::Bool(b) => rmpv::Value::Boolean(*b),
        Value::Int(i) => rmpv::Value::Integer((*i).into()),
        Value::Float(f) => rmpv::Value::F64(*f),
        Value::String(s) => rmpv::Value::String(s.clone().into()),
        Value::Bytes(b) => rmpv::Value::Binary(b.clone()),
        Value::Array(items) => rmpv::Value::Array(items.iter().map(value_to_rmpv).collect()),
        Value::Map(map) => rmpv::Value::Map(
            map.iter()
                .map(|(k, v)| (rmpv::Value::String(k.clone().into()), value_to_rmpv(v)))
                .collect(),
        ),
    }
}

/// Shared handle, held by the CRDT/query domain services and the
/// coordinator context.
pub type SharedQueryRegistry = Arc<QueryRegistry>;

/// Per-client index used to drop subscriptions on disconnect without a
/// linear scan -- exposed for the connection registry to populate.
pub type ClientSubscriptionIndex = HashMap<String, Vec<String>>;

#[cfg(test)]
mod tests {
    use super::*;

    fn value_map(pairs: &[(&str, &str)]) -> Value {
        let mut map = std::collections::BTreeMap::new();
        for (k, v) in pairs {
            map.insert((*k).to_string(), Value::String((*v).to_string()));
        }
        Value::Map(map)
    }

    #[test]
    fn subscribe_returns_matching_initial_results() {
        let registry = QueryRegistry::new();
        let snapshot = vec![
            ("k1".to_string(), value_map(&[("status", "active")])),
            ("k2".to_string(), value_map(&[("status", "inactive")])),
        ];
        let mut where_clause = HashMap::new();
        where_clause.insert("status".to_string(), rmpv::Value::String("active".into()));
        let query = Query {
            r#where: Some(where_clause),
            ..Default::default()
        };

        let resp = registry.subscribe(
            "q1".to_string(),
            "users".to_string(),
            "client-1".to_string(),
            query,
            &snapshot,
        );
        assert_eq!(resp.results.len(), 1);
        assert_eq!(resp.results[0].key, "k1");
    }

    #[test]
    fn on_change_emits_enter_then_leave() {
        let registry = QueryRegistry::new();
        let mut where_clause = HashMap::new();
        where_clause.insert("status".to_string(), rmpv::Value::String("active".into()));
        let query = Query {
            r#where: Some(where_clause),
            ..Default::default()
        };
        registry.subscribe(
            "q1".to_string(),
            "users".to_string(),
            "client-1".to_string(),
            query,
            &[],
        );

        let enter = registry.on_change("users", "k1", Some(&value_map(&[("status", "active")])));
        assert_eq!(enter.len(), 1);
        assert!(matches!(enter[0].change_type, ChangeEventType::ENTER));

        let leave = registry.on_change("users", "k1", Some(&value_map(&[("status", "inactive")])));
        assert_eq!(leave.len(), 1);
        assert!(matches!(leave[0].change_type, ChangeEventType::LEAVE));
    }

    #[test]
    fn unsubscribe_stops_further_deltas() {
        let registry = QueryRegistry::new();
        registry.subscribe(
            "q1".to_string(),
            "users".to_string(),
            "client-1".to_string(),
            Query::default(),
            &[],
        );
        registry.unsubscribe("q1");
        assert!(!registry.has_subscribers("users"));
    }

    #[test]
    fn remove_client_drops_its_subscriptions() {
        let registry = QueryRegistry::new();
        registry.subscribe(
            "q1".to_string(),
            "users".to_string(),
            "client-1".to_string(),
            Query::default(),
            &[],
        );
        registry.remove_client("client-1");
        assert_eq!(registry.subscription_count(), 0);
    }
}

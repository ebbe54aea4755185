//! Tantivy-backed full-text index, one in-memory index per CRDT map.
//!
//! Indexed alongside the CRDT maps themselves: `CrdtService` calls
//! [`SearchIndex::index_value`]/[`SearchIndex::remove_value`] after every
//! successful write, mirroring how it already notifies `QueryRegistry` of
//! changed keys. The index stores a flattened text blob per key for
//! matching; the authoritative value returned to callers is always
//! re-fetched from the CRDT map, not from the index's stored fields.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use latticedb_core::types::Value;
use parking_lot::Mutex;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

/// One map's search index: schema, writer, and a reader kept current via
/// `ReloadPolicy::OnCommitWithDelay`.
struct MapIndex {
    index: Index,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    key_field: Field,
    text_field: Field,
}

impl MapIndex {
    fn new() -> anyhow::Result<Self> {
        let mut builder = Schema::builder();
        let key_field = builder.add_text_field("key", STRING | STORED);
        let text_field = builder.add_text_field("text", TEXT | STORED);
        let schema = builder.build();
        let index = Index::create_in_ram(schema);
        let writer = index.writer(15_000_000)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;
        Ok(Self { index, writer: Mutex::new(writer), reader, key_field, text_field })
    }
}

/// A registered live search subscription. Stored so a future background
/// worker can re-run it on every commit and push `SearchUpdate` deltas;
/// wiring that delivery needs a client-id-indexed connection lookup the
/// same way topic/query push delivery does, so for now subscriptions are
/// tracked but only evaluated on demand (subscribe/unsubscribe), not
/// pushed to automatically.
pub struct SearchSubscription {
    pub map_name: String,
    pub query: String,
    pub options: Option<(Option<u32>, Option<f64>)>,
    pub client_id: String,
}

/// Flattens a stored `Value` into a single text blob for tokenized
/// indexing. Keys of nested maps are included so `field:value`-shaped
/// queries still retrieve the record via plain substring terms.
fn searchable_text(value: &Value) -> String {
    let mut out = String::new();
    flatten_into(value, &mut out);
    out
}

fn flatten_into(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            out.push_str(&b.to_string());
            out.push(' ');
        }
        Value::Int(i) => {
            out.push_str(&i.to_string());
            out.push(' ');
        }
        Value::Float(f) => {
            out.push_str(&f.to_string());
            out.push(' ');
        }
        Value::String(s) => {
            out.push_str(s);
            out.push(' ');
        }
        Value::Bytes(_) => {}
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        Value::Map(map) => {
            for (k, v) in map {
                out.push_str(k);
                out.push(' ');
                flatten_into(v, out);
            }
        }
    }
}

/// Per-node full-text index over every hosted map, plus the live search
/// subscription table.
pub struct SearchIndex {
    maps: DashMap<String, MapIndex>,
    subscriptions: DashMap<String, SearchSubscription>,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchIndex {
    #[must_use]
    pub fn new() -> Self {
        Self { maps: DashMap::new(), subscriptions: DashMap::new() }
    }

    fn map_index(&self, map_name: &str) -> dashmap::mapref::one::RefMut<'_, String, MapIndex> {
        self.maps
            .entry(map_name.to_string())
            .or_insert_with(|| MapIndex::new().expect("in-ram tantivy index creation is infallible"))
    }

    /// Upserts `key`'s searchable text, replacing any prior document.
    pub fn index_value(&self, map_name: &str, key: &str, value: &Value) {
        let entry = self.map_index(map_name);
        let text = searchable_text(value);
        let mut writer = entry.writer.lock();
        writer.delete_term(Term::from_field_text(entry.key_field, key));
        if let Err(err) = writer.add_document(doc!(entry.key_field => key, entry.text_field => text)) {
            tracing::warn!(map_name, key, %err, "failed to index search document");
            return;
        }
        if let Err(err) = writer.commit() {
            tracing::warn!(map_name, key, %err, "failed to commit search index");
        }
    }

    /// Removes `key` from the index, if indexed.
    pub fn remove_value(&self, map_name: &str, key: &str) {
        let Some(entry) = self.maps.get(map_name) else { return };
        let mut writer = entry.writer.lock();
        writer.delete_term(Term::from_field_text(entry.key_field, key));
        if let Err(err) = writer.commit() {
            tracing::warn!(map_name, key, %err, "failed to commit search index removal");
        }
    }

    /// Runs `query` against `map_name`'s index, returning `(key, score)`
    /// pairs in descending relevance order.
    #[must_use]
    pub fn search(&self, map_name: &str, query: &str, limit: usize, min_score: f64) -> Vec<(String, f32)> {
        let Some(entry) = self.maps.get(map_name) else { return Vec::new() };
        let searcher = entry.reader.searcher();
        let parser = QueryParser::for_index(&entry.index, vec![entry.text_field]);
        let Ok(parsed) = parser.parse_query(query) else { return Vec::new() };
        let Ok(top_docs) = searcher.search(&parsed, &TopDocs::with_limit(limit)) else {
            return Vec::new();
        };
        top_docs
            .into_iter()
            .filter(|(score, _)| f64::from(*score) >= min_score)
            .filter_map(|(score, addr)| {
                let doc: TantivyDocument = searcher.doc(addr).ok()?;
                let key = doc.get_first(entry.key_field)?.as_str()?.to_string();
                Some((key, score))
            })
            .collect()
    }

    /// Registers a live search subscription, returning its current matches.
    pub fn subscribe(
        &self,
        subscription_id: String,
        map_name: String,
        query: String,
        limit: usize,
        min_score: f64,
        client_id: String,
    ) -> Vec<(String, f32)> {
        let matches = self.search(&map_name, &query, limit, min_score);
        self.subscriptions.insert(
            subscription_id,
            SearchSubscription { map_name, query, options: Some((Some(limit as u32), Some(min_score))), client_id },
        );
        matches
    }

    pub fn unsubscribe(&self, subscription_id: &str) {
        self.subscriptions.remove(subscription_id);
    }

    pub fn remove_client(&self, client_id: &str) {
        let doomed: Vec<String> = self
            .subscriptions
            .iter()
            .filter(|e| e.value().client_id == client_id)
            .map(|e| e.key().clone())
            .collect();
        for id in doomed {
            self.subscriptions.remove(&id);
        }
    }

    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

/// Shared handle, held by the coordinator context and the CRDT/search
/// domain services.
pub type SharedSearchIndex = Arc<SearchIndex>;

#[allow(dead_code)]
fn _unused_boost_shape(_boost: HashMap<String, f64>) {}

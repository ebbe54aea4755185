//! Mutation observer trait and composite implementation.
//!
//! Defines [`MutationObserver`] for reacting to record mutations within a
//! [`RecordStore`](super::RecordStore), and [`CompositeMutationObserver`]
//! which fans out notifications to multiple observers.

use std::sync::Arc;

use super::record::{Record, RecordValue};

/// Observer for record mutations within a `RecordStore`.
///
/// Implementations can track statistics, maintain indexes, broadcast
/// change events, or perform other side effects in response to data changes.
///
/// Used as `Arc<dyn MutationObserver>`.
pub trait MutationObserver: Send + Sync {
    /// Called after a new record is inserted.
    fn on_put(
        &self,
        key: &str,
        record: &Record,
        old_value: Option<&RecordValue>,
        is_backup: bool,
    );

    /// Called after an existing record is updated in place.
    fn on_update(
        &self,
        key: &str,
        record: &Record,
        old_value: &RecordValue,
        new_value: &RecordValue,
        is_backup: bool,
    );

    /// Called after a record is removed.
    fn on_remove(&self, key: &str, record: &Record, is_backup: bool);

    /// Called after a record is evicted (e.g., due to memory pressure).
    fn on_evict(&self, key: &str, record: &Record, is_backup: bool);

    /// Called after a record is loaded from the backing `MapDataStore`.
    fn on_load(&self, key: &str, record: &Record, is_backup: bool);

    /// Called when a record is replicated from another node.
    fn on_replication_put(&self, key: &str, record: &Record, populate_index: bool);

    /// Called when all entries are cleared.
    fn on_clear(&self);

    /// Called when the record store is reset to initial state.
    fn on_reset(&self);

    /// Called when the record store is destroyed.
    fn on_destroy(&self, is_shutdown: bool);
}

/// Composite observer that fans out to multiple observers.
///
/// Iterates all registered observers for each notification method,
/// enabling multiple independent reactions to a single mutation event.
#[derive(Default)]
pub struct CompositeMutationObserver {
    observers: Vec<Arc<dyn MutationObserver>>,
}

impl CompositeMutationObserver {
    /// Creates a composite observer with the given list of observers.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn MutationObserver>>) -> Self {
        Self { observers }
    }

    /// Adds an observer after construction.
    pub fn add(&mut self, observer: Arc<dyn MutationObserver>) {
        self.observers.push(observer);
    }
}

impl MutationObserver for CompositeMutationObserver {
    fn on_put(
        &self,
        key: &str,
        record: &Record,
        old_value: Option<&RecordValue>,
        is_backup: bool,
    ) {
        for observer in &self.observers {
            observer.on_put(key, record, old_value, is_backup);
        }
    }

    fn on_update(
        &self,
        key: &str,
        record: &Record,
        old_value: &RecordValue,
        new_value: &RecordValue,
        is_backup: bool,
    ) {
        for observer in &self.observers {
            observer.on_update(key, record, old_value, new_value, is_backup);
        }
    }

    fn on_remove(&self, key: &str, record: &Record, is_backup: bool) {
        for observer in &self.observers {
            observer.on_remove(key, record, is_backup);
        }
    }

    fn on_evict(&self, key: &str, record: &Record, is_backup: bool) {
        for observer in &self.observers {
            observer.on_evict(key, record, is_backup);
        }
    }

    fn on_load(&self, key: &str, record: &Record, is_backup: bool) {
        for observer in &self.observers {
            observer.on_load(key, record, is_backup);
        }
    }

    fn on_replication_put(&self, key: &str, record: &Record, populate_index: bool) {
        for observer in &self.observers {
            observer.on_replication_put(key, record, populate_index);
        }
    }

    fn on_clear(&self) {
        for observer in &self.observers {
            observer.on_clear();
        }
    }

    fn on_reset(&self) {
        for observer in &self.observers {
            observer.on_reset();
        }
    }

    fn on_destroy(&self, is_shutdown: bool) {
        for observer in &self.observers {
            observer.on_destroy(is_shutdown);
        }
    }
}

//! Factory for creating fully-wired [`RecordStore`] instances.
//!
//! [`RecordStoreFactory`] is the dependency injection point that creates
//! [`DefaultRecordStore`] instances with all three layers connected:
//! [`HashMapStorage`] (Layer 1), a shared [`MapDataStore`] (Layer 3),
//! and a [`CompositeMutationObserver`] assembled from registered observers.

use std::sync::Arc;

use crate::storage::engines::HashMapStorage;
use crate::storage::impls::{DefaultRecordStore, StorageConfig};
use crate::storage::map_data_store::MapDataStore;
use crate::storage::mutation_observer::{CompositeMutationObserver, MutationObserver};
use crate::storage::record_store::RecordStore;

/// Factory for creating fully-wired [`RecordStore`] instances.
///
/// Holds shared configuration, the persistence backend, and a list of
/// mutation observers. Each call to [`create()`](RecordStoreFactory::create)
/// produces a new [`DefaultRecordStore`] for a specific `(map_name, partition_id)` pair.
pub struct RecordStoreFactory {
    config: StorageConfig,
    data_store: Arc<dyn MapDataStore>,
    observers: Vec<Arc<dyn MutationObserver>>,
}

impl RecordStoreFactory {
    /// Creates a new factory with the given configuration.
    #[must_use]
    pub fn new(
        config: StorageConfig,
        data_store: Arc<dyn MapDataStore>,
        observers: Vec<Arc<dyn MutationObserver>>,
    ) -> Self {
        Self {
            config,
            data_store,
            observers,
        }
    }

    /// Creates a [`RecordStore`] for the given map and partition.
    ///
    /// Assembles a fresh [`HashMapStorage`] engine, clones the shared
    /// [`MapDataStore`] reference, and builds a [`CompositeMutationObserver`]
    /// from the registered observer list.
    #[must_use]
    pub fn create(&self, map_name: &str, partition_id: u32) -> Box<dyn RecordStore> {
        let engine = Box::new(HashMapStorage::new());
        let observer = Arc::new(CompositeMutationObserver::new(
            self.observers.clone(),
        ));
        let record_store = DefaultRecordStore::new(
            map_name.to_string(),
            partition_id,
            engine,
            self.data_store.clone(),
            observer,
            self.config.clone(),
        );
        Box::new(record_store)
    }
}

//! [`StorageEngine`](super::StorageEngine) implementations.
//!
//! Currently includes [`HashMapStorage`], the default in-memory engine.

mod hashmap;

pub use hashmap::HashMapStorage;

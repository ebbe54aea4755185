//! Domain services.
//!
//! Each service implements both `ManagedService` (lifecycle) and
//! `tower::Service<Operation>` (request handling), and is constructed from
//! a shared `Arc<Coordinator>` so adding cross-cutting state (a registry, a
//! background index) never ripples through every constructor.

pub mod convert;
pub mod coordination;
pub mod crdt;
pub mod messaging;
pub mod persistence;
pub mod query;
pub mod search;
pub mod sync;

#[cfg(test)]
pub mod test_support;

pub use coordination::CoordinationService;
pub use crdt::CrdtService;
pub use messaging::MessagingService;
pub use persistence::PersistenceService;
pub use query::QueryService;
pub use search::SearchService;
pub use sync::SyncService;

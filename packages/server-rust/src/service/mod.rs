//! Operation routing and execution framework.
//!
//! This module implements the service-oriented operation pipeline:
//!
//! 1. **Classification** (`classify`): `Message` -> `Result<Operation, ClassifyError>`
//! 2. **Middleware** (`middleware`): Tower layers (timeout, metrics, load-shedding)
//! 3. **Routing** (`router`): Dispatch to domain services by `service_name`
//! 4. **Domain services** (`domain`): one real implementation per business domain
//! 5. **Background workers** (`worker`): periodic tasks (GC sweep, anti-entropy scan, ...)
//!
//! Everything domain services depend on but that isn't itself a
//! `tower::Service` lives alongside them: the batch/backpressure/coalescing
//! write path, the query/topic/lock registries, the write-ack and
//! replication state machines, anti-entropy repair, distributed GC, auth
//! policy, and the `coordinator` module that bundles all of it together.

pub mod backpressure;
pub mod classify;
pub mod coalescing;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod gc;
pub mod journal;
pub mod lock_manager;
pub mod middleware;
pub mod operation;
pub mod policy;
pub mod query_registry;
pub mod registry;
pub mod repair;
pub mod replication;
pub mod router;
pub mod search_index;
pub mod stripe;
pub mod topic_bus;
pub mod worker;
pub mod write_ack;

// Re-export key types for convenient access.
pub use classify::OperationService;
pub use config::ServerConfig;
pub use coordinator::Coordinator;
pub use operation::{
    service_names, CallerOrigin, ClassifyError, Operation, OperationContext, OperationError,
    OperationResponse,
};
pub use registry::{ManagedService, ServiceContext, ServiceRegistry};
pub use router::OperationRouter;
pub use worker::{BackgroundRunnable, BackgroundWorker};

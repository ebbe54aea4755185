//! Pipeline composition: combines all middleware layers into a single service stack.

use tower::ServiceBuilder;

use super::load_shed::LoadShedLayer;
use super::metrics::MetricsLayer;
use super::timeout::TimeoutLayer;
use crate::service::config::ServerConfig;
use crate::service::operation::{Operation, OperationError, OperationResponse};
use crate::service::router::OperationRouter;

/// Build the operation pipeline by wrapping the `OperationRouter` with middleware layers.
///
/// Layer order (outermost to innermost):
/// 1. `LoadShedLayer` -- reject when overloaded (fail fast before doing any work)
/// 2. `TimeoutLayer` -- enforce per-operation timeouts
/// 3. `MetricsLayer` -- record timing and outcome (closest to the actual handler)
///
/// The returned service implements `tower::Service<Operation>`.
#[must_use]
pub fn build_operation_pipeline(
    router: OperationRouter,
    config: &ServerConfig,
) -> impl tower::Service<Operation, Response = OperationResponse, Error = OperationError> {
    ServiceBuilder::new()
        .layer(LoadShedLayer::new(config.max_concurrent_operations))
        .layer(TimeoutLayer)
        .layer(MetricsLayer)
        .service(router)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

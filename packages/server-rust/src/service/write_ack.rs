//! Write-ack durability state machine.
//!
//! Tracks each in-flight client operation's progress through the ordered
//! durability levels (`FIRE_AND_FORGET < MEMORY < APPLIED < REPLICATED <
//! PERSISTED`) and resolves a pending handle once its target level (or a
//! timeout) is reached.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use latticedb_core::messages::base::WriteConcern;
use tokio::sync::oneshot;
use tokio::time::timeout;

/// Total ordering over write-concern levels, used to compare "achieved" vs
/// "target" levels and to find the highest level reached so far.
fn level_rank(level: &WriteConcern) -> u8 {
    match level {
        WriteConcern::FIRE_AND_FORGET => 0,
        WriteConcern::MEMORY => 1,
        WriteConcern::APPLIED => 2,
        WriteConcern::REPLICATED => 3,
        WriteConcern::PERSISTED => 4,
    }
}

/// Outcome delivered to whoever is awaiting a pending write's resolution.
#[derive(Debug, Clone)]
pub struct WriteAckOutcome {
    pub success: bool,
    pub achieved_level: WriteConcern,
    pub latency_ms: u64,
}

struct PendingEntry {
    target: WriteConcern,
    achieved_max: WriteConcern,
    started: std::time::Instant,
    resolver: Option<oneshot::Sender<WriteAckOutcome>>,
}

/// Tracks pending writes by `op_id` and resolves them as levels are notified.
///
/// Mirrors the spec's `registerPending` / `notifyLevel` / `failPending`
/// trio; `DashMap` gives per-op_id-bucket locking instead of one global
/// mutex, consistent with the registry's `ServiceRegistry` sharding idiom.
#[derive(Default)]
pub struct WriteAckCoordinator {
    pending: DashMap<String, PendingEntry>,
}

impl WriteAckCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Registers a pending write and returns a future resolving once
    /// `target` is reached or `timeout_ms` elapses.
    pub fn register_pending(
        &self,
        op_id: String,
        target: WriteConcern,
    ) -> oneshot::Receiver<WriteAckOutcome> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            op_id,
            PendingEntry {
                target,
                achieved_max: WriteConcern::FIRE_AND_FORGET,
                started: std::time::Instant::now(),
                resolver: Some(tx),
            },
        );
        rx
    }

    /// Awaits the outcome with a timeout; on timeout, resolves (locally)
    /// with `success=false` and the highest level achieved so far.
    pub async fn await_outcome(
        &self,
        op_id: &str,
        rx: oneshot::Receiver<WriteAckOutcome>,
        timeout_ms: u64,
    ) -> WriteAckOutcome {
        match timeout(Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(outcome)) => outcome,
            _ => {
                let achieved = self
                    .pending
                    .remove(op_id)
                    .map(|(_, e)| e.achieved_max)
                    .unwrap_or(WriteConcern::FIRE_AND_FORGET);
                WriteAckOutcome {
                    success: false,
                    achieved_level: achieved,
                    latency_ms: 0,
                }
            }
        }
    }

    /// Notifies that `level` has been reached for `op_id`. Resolves the
    /// pending handle if `level` meets or exceeds the registered target.
    pub fn notify_level(&self, op_id: &str, level: WriteConcern) {
        let mut resolve_with = None;
        if let Some(mut entry) = self.pending.get_mut(op_id) {
            if level_rank(&level) > level_rank(&entry.achieved_max) {
                entry.achieved_max = level.clone();
            }
            if level_rank(&entry.achieved_max) >= level_rank(&entry.target) {
                if let Some(resolver) = entry.resolver.take() {
                    resolve_with = Some((
                        resolver,
                        WriteAckOutcome {
                            success: true,
                            achieved_level: entry.achieved_max.clone(),
                            latency_ms: entry.started.elapsed().as_millis() as u64,
                        },
                    ));
                }
            }
        }
        if let Some((resolver, outcome)) = resolve_with {
            let _ = resolver.send(outcome);
            self.pending.remove(op_id);
        }
    }

    /// Fails a pending write outright (e.g. merge rejected, storage error).
    pub fn fail_pending(&self, op_id: &str) {
        if let Some((_, mut entry)) = self.pending.remove(op_id) {
            if let Some(resolver) = entry.resolver.take() {
                let _ = resolver.send(WriteAckOutcome {
                    success: false,
                    achieved_level: entry.achieved_max,
                    latency_ms: entry.started.elapsed().as_millis() as u64,
                });
            }
        }
    }

    /// Resolves every still-pending write with its currently achieved
    /// level, for use during graceful shutdown.
    pub fn resolve_all_on_shutdown(&self) {
        let keys: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, mut entry)) = self.pending.remove(&key) {
                if let Some(resolver) = entry.resolver.take() {
                    let _ = resolver.send(WriteAckOutcome {
                        success: false,
                        achieved_level: entry.achieved_max,
                        latency_ms: entry.started.elapsed().as_millis() as u64,
                    });
                }
            }
        }
    }

    /// Number of currently-pending writes, for diagnostics/metrics.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Shared handle, held by `OperationContext`-adjacent call sites and by
/// `service::coordinator::Coordinator`.
pub type SharedWriteAck = Arc<WriteAckCoordinator>;

/// Map of batch-level achieved levels keyed by op id, used by the batch
/// executor's early-ACK fast path to build `OpAckPayload::results`.
pub type AchievedLevels = HashMap<String, WriteConcern>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_when_target_level_notified() {
        let coord = Arc::new(WriteAckCoordinator::new());
        let rx = coord.register_pending("op-1".to_string(), WriteConcern::APPLIED);
        coord.notify_level("op-1", WriteConcern::MEMORY);
        coord.notify_level("op-1", WriteConcern::APPLIED);
        let outcome = coord.await_outcome("op-1", rx, 1000).await;
        assert!(outcome.success);
        assert_eq!(outcome.achieved_level, WriteConcern::APPLIED);
    }

    #[tokio::test]
    async fn times_out_with_highest_achieved() {
        let coord = Arc::new(WriteAckCoordinator::new());
        let rx = coord.register_pending("op-2".to_string(), WriteConcern::PERSISTED);
        coord.notify_level("op-2", WriteConcern::APPLIED);
        let outcome = coord.await_outcome("op-2", rx, 20).await;
        assert!(!outcome.success);
        assert_eq!(outcome.achieved_level, WriteConcern::APPLIED);
    }

    #[tokio::test]
    async fn fail_pending_resolves_with_failure() {
        let coord = Arc::new(WriteAckCoordinator::new());
        let rx = coord.register_pending("op-3".to_string(), WriteConcern::APPLIED);
        coord.fail_pending("op-3");
        let outcome = coord.await_outcome("op-3", rx, 1000).await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn shutdown_resolves_all_pending() {
        let coord = Arc::new(WriteAckCoordinator::new());
        let rx1 = coord.register_pending("a".to_string(), WriteConcern::APPLIED);
        let rx2 = coord.register_pending("b".to_string(), WriteConcern::PERSISTED);
        coord.resolve_all_on_shutdown();
        assert!(!coord.await_outcome("a", rx1, 1000).await.success);
        assert!(!coord.await_outcome("b", rx2, 1000).await.success);
        assert_eq!(coord.pending_count(), 0);
    }
}

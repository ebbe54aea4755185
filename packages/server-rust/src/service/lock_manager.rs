//! Distributed lock manager with fencing tokens.
//!
//! `acquire()` grants immediately if the lock is free, else queues the
//! waiter FIFO; `release()` (explicit or via TTL expiry) grants the oldest
//! waiter. The fencing token is a strictly increasing integer per lock name
//! across all acquisitions, so a stale holder's writes can always be
//! rejected downstream by comparing tokens.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

/// A queued or granted lock holder.
#[derive(Debug, Clone)]
pub struct Waiter {
    pub client_id: String,
    pub request_id: String,
    pub ttl_ms: Option<u64>,
}

struct LockState {
    holder: Option<(Waiter, u64, Instant)>,
    queue: VecDeque<Waiter>,
    next_token: AtomicU64,
}

impl LockState {
    fn new() -> Self {
        Self {
            holder: None,
            queue: VecDeque::new(),
            next_token: AtomicU64::new(1),
        }
    }
}

/// Result of an acquire attempt.
#[derive(Debug, Clone)]
pub enum AcquireResult {
    /// Lock granted immediately; carries the fencing token.
    Granted { fencing_token: u64 },
    /// Lock held by someone else; the waiter was queued.
    Queued,
}

/// One lock's grant/release lifecycle, indexed by lock name.
///
/// Per the spec, the owner of `partitionId(name)` is authoritative; this
/// struct implements the authoritative-node logic. Non-owner nodes forward
/// requests (left to the caller via `OperationContext::caller_origin` /
/// cluster forwarding, not duplicated here).
#[derive(Default)]
pub struct LockManager {
    locks: DashMap<String, Arc<Mutex<LockState>>>,
}

impl LockManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self, name: &str) -> Arc<Mutex<LockState>> {
        self.locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(LockState::new())))
            .clone()
    }

    /// Attempts to acquire `name` for `client_id`/`request_id`.
    pub fn acquire(
        &self,
        name: &str,
        client_id: String,
        request_id: String,
        ttl_ms: Option<u64>,
    ) -> AcquireResult {
        let state = self.lock_state(name);
        let mut guard = state.lock();

        self.expire_if_needed(&mut guard);

        let waiter = Waiter {
            client_id,
            request_id,
            ttl_ms,
        };

        if guard.holder.is_none() {
            let token = guard.next_token.fetch_add(1, Ordering::SeqCst);
            guard.holder = Some((waiter, token, Instant::now()));
            AcquireResult::Granted {
                fencing_token: token,
            }
        } else {
            guard.queue.push_back(waiter);
            AcquireResult::Queued
        }
    }

    /// Releases `name`, validating the caller presents the current fencing
    /// token. Grants the oldest waiter if one is queued, returning its
    /// identity and new fencing token so the caller can emit `LOCK_GRANTED`.
    pub fn release(
        &self,
        name: &str,
        client_id: &str,
        fencing_token: u64,
    ) -> Result<Option<(Waiter, u64)>, LockReleaseError> {
        let state = self.lock_state(name);
        let mut guard = state.lock();

        match &guard.holder {
            Some((holder, token, _)) if holder.client_id == client_id && *token == fencing_token => {}
            Some(_) => return Err(LockReleaseError::NotHolder),
            None => return Err(LockReleaseError::NotHeld),
        }

        guard.holder = None;
        Ok(self.grant_next(&mut guard))
    }

    /// Drops every lock held or queued by a disconnected client, granting
    /// the next waiter for any lock it was holding.
    pub fn remove_client(&self, client_id: &str) -> Vec<(String, Waiter, u64)> {
        let mut grants = Vec::new();
        for entry in &self.locks {
            let mut guard = entry.value().lock();
            let held_by_client = guard
                .holder
                .as_ref()
                .is_some_and(|(w, _, _)| w.client_id == client_id);
            if held_by_client {
                guard.holder = None;
                if let Some((waiter, token)) = self.grant_next(&mut guard) {
                    grants.push((entry.key().clone(), waiter, token));
                }
            }
            guard.queue.retain(|w| w.client_id != client_id);
        }
        grants
    }

    fn expire_if_needed(&self, guard: &mut LockState) {
        if let Some((waiter, _, granted_at)) = &guard.holder {
            if let Some(ttl) = waiter.ttl_ms {
                if granted_at.elapsed() >= Duration::from_millis(ttl) {
                    guard.holder = None;
                    self.grant_next(guard);
                }
            }
        }
    }

    fn grant_next(&self, guard: &mut LockState) -> Option<(Waiter, u64)> {
        guard.queue.pop_front().map(|waiter| {
            let token = guard.next_token.fetch_add(1, Ordering::SeqCst);
            guard.holder = Some((waiter.clone(), token, Instant::now()));
            (waiter, token)
        })
    }
}

/// Errors from a `release()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LockReleaseError {
    #[error("lock is not currently held")]
    NotHeld,
    #[error("caller is not the current holder")]
    NotHolder,
}

/// Shared handle, held by the coordination domain service.
pub type SharedLockManager = Arc<LockManager>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_acquire_is_granted_immediately() {
        let mgr = LockManager::new();
        let result = mgr.acquire("my-lock", "c1".into(), "r1".into(), None);
        assert!(matches!(result, AcquireResult::Granted { fencing_token: 1 }));
    }

    #[test]
    fn second_acquire_queues_until_release() {
        let mgr = LockManager::new();
        mgr.acquire("my-lock", "c1".into(), "r1".into(), None);
        let second = mgr.acquire("my-lock", "c2".into(), "r2".into(), None);
        assert!(matches!(second, AcquireResult::Queued));

        let granted = mgr.release("my-lock", "c1", 1).unwrap();
        let (waiter, token) = granted.expect("queued waiter should be granted");
        assert_eq!(waiter.client_id, "c2");
        assert_eq!(token, 2);
    }

    #[test]
    fn fencing_tokens_strictly_increase() {
        let mgr = LockManager::new();
        mgr.acquire("l", "a".into(), "r".into(), None);
        mgr.release("l", "a", 1).unwrap();
        let second = mgr.acquire("l", "b".into(), "r2".into(), None);
        assert!(matches!(second, AcquireResult::Granted { fencing_token: 2 }));
    }

    #[test]
    fn release_with_wrong_token_is_rejected() {
        let mgr = LockManager::new();
        mgr.acquire("l", "a".into(), "r".into(), None);
        let err = mgr.release("l", "a", 999).unwrap_err();
        assert_eq!(err, LockReleaseError::NotHolder);
    }

    #[test]
    fn disconnect_releases_held_lock_and_grants_next() {
        let mgr = LockManager::new();
        mgr.acquire("l", "a".into(), "r1".into(), None);
        mgr.acquire("l", "b".into(), "r2".into(), None);
        let grants = mgr.remove_client("a");
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].1.client_id, "b");
    }
}

//! Coalescing writer: batches outbound messages per connection to amortize
//! frame overhead, with urgent-message bypass for latency-sensitive replies.
//!
//! Flushes when queued messages reach `max_batch`, accumulated bytes reach
//! `max_bytes`, or `max_delay_ms` has elapsed since the first queued
//! message -- matching the three-way flush trigger in the spec's batch
//! executor section.

use std::time::{Duration, Instant};

use latticedb_core::messages::sync::BatchMessage;
use latticedb_core::messages::Message;
use tokio::sync::mpsc;

/// Coalescing thresholds. `LATTICEDB_COALESCE_PRESET` selects one of the
/// named presets or a custom triple.
#[derive(Debug, Clone, Copy)]
pub struct CoalesceConfig {
    pub max_batch: usize,
    pub max_bytes: usize,
    pub max_delay_ms: u64,
}

impl CoalesceConfig {
    /// Favors low latency: small batches, short delay.
    #[must_use]
    pub fn latency() -> Self {
        Self {
            max_batch: 8,
            max_bytes: 16 * 1024,
            max_delay_ms: 2,
        }
    }

    /// Favors throughput: large batches, longer delay tolerance.
    #[must_use]
    pub fn throughput() -> Self {
        Self {
            max_batch: 256,
            max_bytes: 256 * 1024,
            max_delay_ms: 20,
        }
    }
}

impl Default for CoalesceConfig {
    fn default() -> Self {
        Self::latency()
    }
}

enum Queued {
    Message(Message),
    Raw(Vec<u8>),
}

/// One connection's outbound message batcher.
///
/// `write()` enqueues; `write_urgent()` bypasses batching for AUTH_ACK,
/// ERROR, PONG, and SHUTDOWN_PENDING. The caller drives `maybe_flush()` (or
/// relies on `write`/`write_urgent` to flush synchronously when a
/// threshold is crossed) and reads flushed frames from `flushed`.
pub struct CoalescingWriter {
    config: CoalesceConfig,
    queue: Vec<Queued>,
    queued_bytes: usize,
    first_queued_at: Option<Instant>,
    flushed_tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl CoalescingWriter {
    #[must_use]
    pub fn new(config: CoalesceConfig) -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (flushed_tx, flushed_rx) = mpsc::unbounded_channel();
        (
            Self {
                config,
                queue: Vec::new(),
                queued_bytes: 0,
                first_queued_at: None,
                flushed_tx,
            },
            flushed_rx,
        )
    }

    /// Enqueues a message for batched delivery, flushing immediately if a
    /// threshold is already crossed.
    pub fn write(&mut self, msg: Message) {
        let estimate = rmp_serde::to_vec_named(&msg).map(|b| b.len()).unwrap_or(0);
        if self.first_queued_at.is_none() {
            self.first_queued_at = Some(Instant::now());
        }
        self.queued_bytes += estimate;
        self.queue.push(Queued::Message(msg));
        self.maybe_flush();
    }

    /// Writes pre-serialized bytes, bypassing message serialization but
    /// still subject to batching.
    pub fn write_raw(&mut self, bytes: Vec<u8>) {
        if self.first_queued_at.is_none() {
            self.first_queued_at = Some(Instant::now());
        }
        self.queued_bytes += bytes.len();
        self.queue.push(Queued::Raw(bytes));
        self.maybe_flush();
    }

    /// Bypasses batching entirely and flushes this one message immediately.
    /// Used for `AUTH_ACK`, `ERROR`, `PONG`, `SHUTDOWN_PENDING`.
    pub fn write_urgent(&mut self, msg: Message) {
        if let Ok(bytes) = rmp_serde::to_vec_named(&msg) {
            let _ = self.flushed_tx.send(bytes);
        }
    }

    /// Flushes now if any threshold is crossed; returns whether a flush happened.
    pub fn maybe_flush(&mut self) -> bool {
        let batch_full = self.queue.len() >= self.config.max_batch;
        let bytes_full = self.queued_bytes >= self.config.max_bytes;
        let aged_out = self
            .first_queued_at
            .is_some_and(|t| t.elapsed() >= Duration::from_millis(self.config.max_delay_ms));

        if batch_full || bytes_full || aged_out {
            self.flush();
            true
        } else {
            false
        }
    }

    /// Unconditionally serializes and sends every queued message as one
    /// length-prefixed batch frame via `BatchMessage`, then clears the queue.
    pub fn flush(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let mut data = Vec::with_capacity(self.queued_bytes);
        let mut count = 0u32;
        for item in self.queue.drain(..) {
            let bytes = match item {
                Queued::Message(msg) => rmp_serde::to_vec_named(&msg).unwrap_or_default(),
                Queued::Raw(bytes) => bytes,
            };
            data.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            data.extend_from_slice(&bytes);
            count += 1;
        }
        let batch = Message::Batch(BatchMessage {
            count: f64::from(count),
            data,
        });
        if let Ok(bytes) = rmp_serde::to_vec_named(&batch) {
            let _ = self.flushed_tx.send(bytes);
        }
        self.queued_bytes = 0;
        self.first_queued_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latticedb_core::messages::PingData;

    fn ping() -> Message {
        Message::Ping(PingData { timestamp: 1 })
    }

    #[test]
    fn flushes_on_batch_size() {
        let (mut writer, mut rx) = CoalescingWriter::new(CoalesceConfig {
            max_batch: 2,
            max_bytes: usize::MAX,
            max_delay_ms: u64::MAX,
        });
        writer.write(ping());
        assert!(rx.try_recv().is_err());
        writer.write(ping());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn urgent_bypasses_batching() {
        let (mut writer, mut rx) = CoalescingWriter::new(CoalesceConfig {
            max_batch: 1000,
            max_bytes: usize::MAX,
            max_delay_ms: u64::MAX,
        });
        writer.write_urgent(ping());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn flush_is_noop_on_empty_queue() {
        let (mut writer, mut rx) = CoalescingWriter::new(CoalesceConfig::default());
        writer.flush();
        assert!(rx.try_recv().is_err());
    }
}

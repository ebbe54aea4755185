//! Generic background worker: a `tokio` task that drains an mpsc channel of
//! tasks, ticking an interval in between for periodic maintenance (anti-entropy
//! scans, GC sweeps). Every periodic service in this crate (repair scheduler,
//! GC coordinator, write-ack timeout reaper) is driven by one of these rather
//! than hand-rolling its own loop.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Behavior plugged into a [`BackgroundWorker`]: how to process one task and
/// what to do on each tick / at shutdown.
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    type Task: Send + 'static;

    /// Processes a single task pulled off the queue.
    async fn run(&mut self, task: Self::Task);

    /// Called once per tick interval when the queue is otherwise idle.
    async fn on_tick(&mut self) {}

    /// Called once, after the task channel closes, before the worker exits.
    async fn shutdown(&mut self) {}
}

/// A handle to a spawned background worker: send tasks in, or request
/// shutdown. Dropping the handle closes the channel, which drains any
/// in-flight tasks and then runs `shutdown()` before the task exits.
pub struct BackgroundWorker<T> {
    sender: mpsc::Sender<T>,
    handle: JoinHandle<()>,
}

impl<T: Send + 'static> BackgroundWorker<T> {
    /// Spawns `runnable` on a new tokio task, draining `queue_capacity`
    /// buffered tasks and calling `on_tick` every `tick_interval` while idle.
    pub fn spawn<R>(mut runnable: R, queue_capacity: usize, tick_interval: Duration) -> Self
    where
        R: BackgroundRunnable<Task = T>,
    {
        let (sender, mut receiver) = mpsc::channel::<T>(queue_capacity.max(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    task = receiver.recv() => {
                        match task {
                            Some(task) => runnable.run(task).await,
                            None => break,
                        }
                        // Per-quantum yield so a burst of queued tasks
                        // doesn't starve the scheduler's other work.
                        tokio::task::yield_now().await;
                    }
                    _ = ticker.tick() => {
                        runnable.on_tick().await;
                    }
                }
            }
            runnable.shutdown().await;
        });

        Self { sender, handle }
    }

    /// Enqueues a task, waiting if the queue is full.
    pub async fn submit(&self, task: T) -> Result<(), mpsc::error::SendError<T>> {
        self.sender.send(task).await
    }

    /// Enqueues a task without waiting; fails if the queue is full.
    pub fn try_submit(&self, task: T) -> Result<(), mpsc::error::TrySendError<T>> {
        self.sender.try_send(task)
    }

    /// Closes the task channel and awaits the worker's graceful shutdown.
    pub async fn shutdown(self) {
        drop(self.sender);
        let _ = self.handle.await;
    }
}

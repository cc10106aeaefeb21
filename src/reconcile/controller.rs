//! # Reconciliation Controller
//!
//! Owns the work queue and the worker pool. Workers wait for the backing
//! cache to finish its initial synchronization, then loop: pop a key, resolve
//! it against the cache, hand a private working copy to the handler, and
//! apply the retry policy to the outcome.
//!
//! Stop handling follows the usual lifecycle shape: an atomic flag plus a
//! notify, so `stop()` can fire from anywhere while `run()` owns the
//! teardown. On stop, no new pulls begin; workers finish their current item
//! and exit before `run()` returns.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::logging;

use super::limiter::RateLimiter;
use super::queue::WorkQueue;
use super::store::Store;
use super::{QueueObject, ReconcileError, Reconciler};

/// Notification from the watch subsystem. Deletions may arrive as a
/// tombstone carrying only the key when the final object state is unknown.
#[derive(Debug, Clone)]
pub enum WatchEvent<T> {
    Added(T),
    Modified(T),
    Deleted(T),
    DeletedFinalStateUnknown { key: String },
}

pub struct Controller<T, S, R>
where
    T: QueueObject,
    S: Store<T>,
    R: Reconciler<T>,
{
    name: String,
    id: Uuid,
    store: Arc<S>,
    reconciler: Arc<R>,
    queue: Arc<WorkQueue>,
    sync_poll_interval: Duration,
    running: AtomicBool,
    stopping: AtomicBool,
    shutdown: Notify,
    _object: PhantomData<fn() -> T>,
}

impl<T, S, R> Controller<T, S, R>
where
    T: QueueObject,
    S: Store<T>,
    R: Reconciler<T>,
{
    pub fn new(
        name: impl Into<String>,
        store: Arc<S>,
        reconciler: Arc<R>,
        limiter: Box<dyn RateLimiter>,
        sync_poll_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            id: Uuid::new_v4(),
            store,
            reconciler,
            queue: WorkQueue::new(limiter),
            sync_poll_interval,
            running: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            shutdown: Notify::new(),
            _object: PhantomData,
        })
    }

    /// Enqueue a key for reconciliation.
    pub fn enqueue(&self, key: impl Into<String>) {
        self.queue.add(key);
    }

    /// Handle one watch notification: extract the key and enqueue it.
    /// Create, update, and delete are enqueued identically; the worker always
    /// resolves the key freshly, so a deleted object simply resolves to
    /// not-found.
    pub fn observe(&self, event: &WatchEvent<T>) {
        match event {
            WatchEvent::Added(obj) => {
                let key = obj.queue_key();
                debug!(controller = %self.name, key = %key, "adding certificate request");
                self.enqueue(key);
            }
            WatchEvent::Modified(obj) => {
                let key = obj.queue_key();
                debug!(controller = %self.name, key = %key, "updating certificate request");
                self.enqueue(key);
            }
            WatchEvent::Deleted(obj) => {
                let key = obj.queue_key();
                debug!(controller = %self.name, key = %key, "deleting certificate request");
                self.enqueue(key);
            }
            WatchEvent::DeletedFinalStateUnknown { key } => {
                debug!(
                    controller = %self.name,
                    key = %key,
                    "deleting certificate request from tombstone"
                );
                self.enqueue(key.clone());
            }
        }
    }

    /// Drain a stream of watch notifications into the queue. Returns when the
    /// stream ends.
    pub async fn observe_stream(&self, events: impl Stream<Item = WatchEvent<T>>) {
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            self.observe(&event);
        }
    }

    /// Run the controller with the given number of workers until [`stop`] is
    /// called. Workers do not start pulling until the backing cache reports
    /// its initial synchronization complete; if that never happens before the
    /// stop signal, the controller exits without processing anything.
    ///
    /// [`stop`]: Controller::stop
    pub async fn run(self: &Arc<Self>, workers: usize) {
        if self.running.swap(true, Ordering::AcqRel) {
            warn!(controller = %self.name, "controller is already running");
            return;
        }

        info!(
            controller = %self.name,
            controller_id = %self.id,
            workers,
            "🚀 starting certificate controller"
        );

        if !self.wait_for_store_sync().await {
            warn!(controller = %self.name, "cache never synced before shutdown");
            self.queue.shut_down();
            self.running.store(false, Ordering::Release);
            return;
        }

        let mut tasks = JoinSet::new();
        for worker_id in 0..workers {
            let controller = Arc::clone(self);
            tasks.spawn(async move {
                debug!(controller = %controller.name, worker_id, "worker started");
                while controller.process_next_item().await {}
                debug!(controller = %controller.name, worker_id, "worker exiting");
            });
        }

        self.stopped().await;
        self.queue.shut_down();
        while tasks.join_next().await.is_some() {}

        self.running.store(false, Ordering::Release);
        info!(controller = %self.name, "shut down certificate controller");
    }

    /// Signal the controller to stop. Safe to call from any task, any number
    /// of times.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
        self.shutdown.notify_waiters();
    }

    /// Process a single queue item. Returns `false` once the queue has shut
    /// down and the caller should exit.
    pub async fn process_next_item(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };

        match self.sync(&key).await {
            Ok(()) => {
                self.queue.forget(&key);
            }
            Err(err) => {
                self.queue.add_rate_limited(&key);
                if err.is_ignorable() {
                    debug!(
                        controller = %self.name,
                        key = %key,
                        error = %err,
                        "sync failed; retrying"
                    );
                } else {
                    logging::report_sync_error(&self.name, &key, &err);
                }
            }
        }

        self.queue.done(&key);
        true
    }

    /// Resolve a key and hand a working copy to the handler.
    async fn sync(&self, key: &str) -> Result<(), R::Error> {
        let start = Instant::now();

        let Some(cached) = self.store.get(key) else {
            // already deleted; nothing to reconcile
            debug!(controller = %self.name, key = %key, "certificate request has been deleted");
            return Ok(());
        };

        if cached.is_terminal() {
            debug!(
                controller = %self.name,
                key = %key,
                "certificate request already settled; skipping"
            );
            return Ok(());
        }

        // never mutate the cached object in place; it is shared with other readers
        let working_copy = (*cached).clone();
        let result = self.reconciler.reconcile(working_copy).await;

        debug!(
            controller = %self.name,
            key = %key,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "finished syncing certificate request"
        );
        result
    }

    /// Poll the cache's sync flag until it reports ready or stop fires.
    async fn wait_for_store_sync(&self) -> bool {
        loop {
            if self.stopping.load(Ordering::Acquire) {
                return false;
            }
            if self.store.has_synced() {
                return true;
            }
            tokio::time::sleep(self.sync_poll_interval).await;
        }
    }

    /// Wait until [`stop`] has been signaled.
    ///
    /// [`stop`]: Controller::stop
    async fn stopped(&self) {
        loop {
            let notified = self.shutdown.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.stopping.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }

    /// Keys waiting to be picked up.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Failures recorded for a key by the retry limiter.
    pub fn retries(&self, key: &str) -> u32 {
        self.queue.retries(key)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

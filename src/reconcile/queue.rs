//! # Deduplicating Delay Queue
//!
//! A set-backed work queue with the semantics the reconciliation loop relies
//! on:
//!
//! - adding a key that is queued but not yet picked up is a no-op;
//! - adding a key that a worker is currently processing marks it dirty, and
//!   [`WorkQueue::done`] re-queues it once the in-flight pass completes — the
//!   queue never hands the same key to two workers at once;
//! - [`WorkQueue::add_rate_limited`] re-queues a failed key after the delay
//!   its rate limiter dictates;
//! - after [`WorkQueue::shut_down`], no new pulls begin: blocked getters wake
//!   and return `None` even if items remain.
//!
//! Delayed adds are spawned sleep tasks, so they respect a paused test clock.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::limiter::RateLimiter;

struct QueueState {
    queue: VecDeque<String>,
    dirty: HashSet<String>,
    processing: HashSet<String>,
    shutting_down: bool,
}

pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    limiter: Box<dyn RateLimiter>,
}

impl WorkQueue {
    pub fn new(limiter: Box<dyn RateLimiter>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                dirty: HashSet::new(),
                processing: HashSet::new(),
                shutting_down: false,
            }),
            notify: Notify::new(),
            limiter,
        })
    }

    /// Enqueue a key. Deduplicates against pending work; defers if the key is
    /// currently being processed.
    pub fn add(&self, key: impl Into<String>) {
        let key = key.into();
        {
            let mut state = self.state.lock();
            if state.shutting_down {
                return;
            }
            if !state.dirty.insert(key.clone()) {
                return;
            }
            if state.processing.contains(&key) {
                // re-queued by done() once the in-flight pass completes
                return;
            }
            state.queue.push_back(key);
        }
        self.notify.notify_waiters();
    }

    /// Enqueue a key after a delay.
    pub fn add_after(self: &Arc<Self>, key: impl Into<String>, delay: Duration) {
        let key = key.into();
        if delay.is_zero() {
            self.add(key);
            return;
        }
        if self.state.lock().shutting_down {
            return;
        }
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Enqueue a failed key after the delay its limiter dictates.
    pub fn add_rate_limited(self: &Arc<Self>, key: impl Into<String>) {
        let key = key.into();
        let delay = self.limiter.when(&key);
        self.add_after(key, delay);
    }

    /// Block until a key is available or the queue shuts down. The returned
    /// key is marked in-flight until [`WorkQueue::done`] is called for it.
    pub async fn get(&self) -> Option<String> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
            }

            notified.await;
        }
    }

    /// Mark an in-flight key finished. If the key went dirty while being
    /// processed, it is re-queued for another pass.
    pub fn done(&self, key: &str) {
        let requeued = {
            let mut state = self.state.lock();
            state.processing.remove(key);
            if state.dirty.contains(key) {
                state.queue.push_back(key.to_string());
                true
            } else {
                false
            }
        };
        if requeued {
            self.notify.notify_waiters();
        }
    }

    /// Clear the key's backoff state after a successful pass.
    pub fn forget(&self, key: &str) {
        self.limiter.forget(key);
    }

    /// Failures recorded for the key by the backing limiter.
    pub fn retries(&self, key: &str) -> u32 {
        self.limiter.retries(key)
    }

    /// Keys waiting to be picked up (excludes in-flight keys).
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop handing out work. Blocked getters wake and return `None`;
    /// subsequent adds are dropped.
    pub fn shut_down(&self) {
        self.state.lock().shutting_down = true;
        self.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }
}

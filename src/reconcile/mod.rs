//! # Reconciliation Engine
//!
//! A generic, reusable work-queue reconciliation loop: a deduplicating delay
//! queue keyed by object identity, drained by a configurable number of
//! concurrent workers, each resolving the key against a read-only cache and
//! invoking a pluggable handler on a private working copy.
//!
//! ## Guarantees
//!
//! - **At most one in-flight handler invocation per key.** Enqueuing a key
//!   that is queued but not yet picked up is a no-op; enqueuing a key that is
//!   being processed defers reprocessing until the in-flight pass completes.
//! - **Fresh resolves.** A worker always re-reads the current object for a
//!   key; it never sees a stale enqueued payload.
//! - **Failure-class-aware retry.** Every handler failure is retried with a
//!   delay combining per-key exponential backoff and a global token bucket;
//!   only the logging severity distinguishes ignorable failures.
//!
//! The engine knows nothing about certificate semantics. Objects supply their
//! own key and terminal-state rule through [`QueueObject`]; handlers plug in
//! through [`Reconciler`].

pub mod controller;
pub mod limiter;
pub mod queue;
pub mod store;

use async_trait::async_trait;

pub use controller::{Controller, WatchEvent};
pub use limiter::{
    FixedDelayLimiter, ItemExponentialBackoff, MaxOfRateLimiter, RateLimiter, TokenBucketLimiter,
};
pub use queue::WorkQueue;
pub use store::{MemoryStore, Store};

/// An object the engine can queue and resolve.
pub trait QueueObject: Clone + Send + Sync + 'static {
    /// Stable identity used as the queue key.
    fn queue_key(&self) -> String;

    /// Terminal objects are dropped without a handler invocation.
    fn is_terminal(&self) -> bool {
        false
    }
}

/// Handler failure as seen by the engine: opaque except for its severity
/// class. Ignorable errors are retried identically but logged quietly.
pub trait ReconcileError: std::error::Error + Send + Sync + 'static {
    fn is_ignorable(&self) -> bool {
        false
    }
}

/// The pluggable handler contract. Invoked with a private working copy; the
/// cached object is never handed out mutably.
#[async_trait]
pub trait Reconciler<T>: Send + Sync + 'static {
    type Error: ReconcileError;

    async fn reconcile(&self, obj: T) -> Result<(), Self::Error>;
}

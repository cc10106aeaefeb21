#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Vnode CSR Approver
//!
//! Auto-approves a narrow class of cluster-identity client certificate
//! requests: requests from a virtual-node identity asking for a client
//! certificate usable to authenticate back to the control plane.
//!
//! ## Architecture
//!
//! Two components, the second plugged into the first:
//!
//! - [`reconcile`] — a generic work-queue reconciliation engine:
//!   deduplicating delay queue, configurable worker pool, cache-sync startup
//!   gate, and backoff-based retry with failure-class-aware logging. At most
//!   one handler invocation is ever in flight per key.
//! - [`approver`] — the handler: parses the embedded PKCS#10 request, matches
//!   it against an ordered recognizer list, authorizes each match through a
//!   subject access review, and durably records the approval. First
//!   authorized match wins; recognized-but-denied requests are retried
//!   quietly.
//!
//! This controller only ever approves or leaves pending. It never signs,
//! never denies, and never deletes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use vnode_csr_approver::approver::new_csr_approving_controller;
//! use vnode_csr_approver::config::ApproverConfig;
//! use vnode_csr_approver::reconcile::MemoryStore;
//!
//! # async fn example(client: Arc<impl vnode_csr_approver::client::ControlPlaneClient + 'static>) {
//! vnode_csr_approver::logging::init_structured_logging();
//!
//! let config = ApproverConfig::load().expect("load configuration");
//! let store = Arc::new(MemoryStore::new());
//! let controller = new_csr_approving_controller(store, client, &config);
//!
//! // the watch subsystem feeds controller.observe(..) / controller.enqueue(..)
//! controller.run(config.controller.workers).await;
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`reconcile`] - generic queue, limiters, store boundary, controller
//! - [`approver`] - recognizers, validation, parsing, the approval handler
//! - [`models`] - certificate signing request and access review objects
//! - [`client`] - outbound control-plane trait boundary
//! - [`config`] - layered configuration management
//! - [`logging`] - structured logging and the sync error reporter
//! - [`error`] - handler error taxonomy

pub mod approver;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod reconcile;

pub use approver::{new_csr_approving_controller, CsrRecognizer, SarApprover};
pub use client::{ClientError, ControlPlaneClient};
pub use config::{ApproverConfig, BackoffConfig, ControllerConfig};
pub use error::{ApproverError, Result};
pub use models::{
    CertificateSigningRequest, CertificateSigningRequestCondition, CertificateSigningRequestSpec,
    CertificateSigningRequestStatus, ConditionStatus, ConditionType, KeyUsage, ResourceAttributes,
    SubjectAccessReview,
};
pub use reconcile::{
    Controller, MemoryStore, QueueObject, ReconcileError, Reconciler, Store, WatchEvent, WorkQueue,
};

//! # CSR Approver
//!
//! The pluggable handler behind the reconciliation engine. Parses the
//! embedded certificate request, matches it against an ordered list of
//! recognizers, confirms via subject access review that the requester is
//! authorized to obtain that shape of certificate, and on success appends an
//! Approved condition and persists it — the single mutating call this
//! controller ever issues.
//!
//! The recognizer walk is a small explicit state machine: no-match returns
//! cleanly, matched-but-denied falls through to the next recognizer, and the
//! first authorized match wins.

pub mod csr;
pub mod validation;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::client::ControlPlaneClient;
use crate::config::ApproverConfig;
use crate::constants;
use crate::error::ApproverError;
use crate::logging;
use crate::models::{CertificateSigningRequest, ResourceAttributes, SubjectAccessReview};
use crate::reconcile::{Controller, Reconciler, Store};

use self::csr::{parse_csr, CertificateRequestInfo};

/// One approvable request shape: a predicate, the permission the requester
/// must hold, and the message recorded on approval.
pub struct CsrRecognizer {
    pub recognize: fn(&CertificateSigningRequest, &CertificateRequestInfo) -> bool,
    pub permission: ResourceAttributes,
    pub success_message: &'static str,
}

/// The fixed, ordered recognizer table. Order matters: the most specific
/// shape is tried first.
pub fn recognizers() -> Vec<CsrRecognizer> {
    vec![
        CsrRecognizer {
            recognize: is_self_node_client_cert,
            permission: ResourceAttributes::certificate_create(
                constants::authorization::SELF_NODE_CLIENT_SUBRESOURCE,
            ),
            success_message: "Auto approving self vnode client certificate after SubjectAccessReview.",
        },
        CsrRecognizer {
            recognize: is_node_client_cert,
            permission: ResourceAttributes::certificate_create(
                constants::authorization::NODE_CLIENT_SUBRESOURCE,
            ),
            success_message: "Auto approving vnode client certificate after SubjectAccessReview.",
        },
    ]
}

/// Approves recognized certificate requests after a subject access review.
pub struct SarApprover<C> {
    client: Arc<C>,
    recognizers: Vec<CsrRecognizer>,
}

impl<C: ControlPlaneClient> SarApprover<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            recognizers: recognizers(),
        }
    }

    /// Decide one request. Called with a private working copy; safe to call
    /// directly on any object, including terminal ones.
    pub async fn handle(&self, mut csr: CertificateSigningRequest) -> Result<(), ApproverError> {
        if !csr.status.certificate.is_empty() {
            return Ok(());
        }
        let approval = csr.status.approval_state();
        if approval.approved || approval.denied {
            return Ok(());
        }

        let info = parse_csr(&csr.spec.request).map_err(|source| ApproverError::Parse {
            name: csr.name.clone(),
            source,
        })?;

        let mut tried = Vec::new();

        for recognizer in &self.recognizers {
            if !(recognizer.recognize)(&csr, &info) {
                continue;
            }

            tried.push(recognizer.permission.subresource.clone());

            if self.authorize(&csr, &recognizer.permission).await? {
                csr.status.append_approval_condition(recognizer.success_message);
                self.client.update_approval(&csr).await.map_err(|source| {
                    ApproverError::UpdateApproval {
                        name: csr.name.clone(),
                        source,
                    }
                })?;
                logging::log_approval(
                    &csr.name,
                    &recognizer.permission.subresource,
                    recognizer.success_message,
                );
                return Ok(());
            }
        }

        if !tried.is_empty() {
            return Err(ApproverError::AccessReviewDenied {
                name: csr.name,
                tried,
            });
        }

        // not a shape this controller handles; leave it for other approvers
        Ok(())
    }

    async fn authorize(
        &self,
        csr: &CertificateSigningRequest,
        permission: &ResourceAttributes,
    ) -> Result<bool, ApproverError> {
        let review = SubjectAccessReview::for_request(csr, permission);
        let review = self
            .client
            .create_subject_access_review(review)
            .await
            .map_err(|source| ApproverError::AccessReview {
                name: csr.name.clone(),
                source,
            })?;
        Ok(review.status.allowed)
    }
}

#[async_trait]
impl<C: ControlPlaneClient + 'static> Reconciler<CertificateSigningRequest> for SarApprover<C> {
    type Error = ApproverError;

    async fn reconcile(&self, csr: CertificateSigningRequest) -> Result<(), ApproverError> {
        self.handle(csr).await
    }
}

/// The requester asks for its own client certificate: declared username must
/// equal the request's subject common name, and the node-client shape must
/// hold.
fn is_self_node_client_cert(
    csr: &CertificateSigningRequest,
    info: &CertificateRequestInfo,
) -> bool {
    if csr.spec.username != info.common_name {
        return false;
    }
    is_node_client_cert(csr, info)
}

/// Any vnode client certificate: declared signer must be the fixed vnode
/// client signer and strict validation must pass.
fn is_node_client_cert(csr: &CertificateSigningRequest, info: &CertificateRequestInfo) -> bool {
    if csr.spec.signer_name != constants::VNODE_CLIENT_SIGNER_NAME {
        return false;
    }
    match validation::validate_vnode_client_csr(info, &csr.usage_set()) {
        Ok(()) => true,
        Err(reason) => {
            debug!(csr = %csr.name, %reason, "request is not a vnode client certificate");
            false
        }
    }
}

/// Wire a [`SarApprover`] into a reconciliation controller, the way the
/// process bootstrap consumes this crate.
pub fn new_csr_approving_controller<S, C>(
    store: Arc<S>,
    client: Arc<C>,
    config: &ApproverConfig,
) -> Arc<Controller<CertificateSigningRequest, S, SarApprover<C>>>
where
    S: Store<CertificateSigningRequest>,
    C: ControlPlaneClient + 'static,
{
    Controller::new(
        "csrapproving",
        store,
        Arc::new(SarApprover::new(client)),
        Box::new(config.backoff.rate_limiter()),
        config.controller.cache_sync_poll_interval(),
    )
}

//! Shared helpers for scenario tests: runtime-generated certificate
//! requests, a recording control-plane double, and a recording reconciler.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rcgen::{CertificateParams, DnType, KeyPair, SanType};

use vnode_csr_approver::client::{ClientError, ControlPlaneClient};
use vnode_csr_approver::constants;
use vnode_csr_approver::models::{
    CertificateSigningRequest, CertificateSigningRequestSpec, KeyUsage, SubjectAccessReview,
};
use vnode_csr_approver::reconcile::{ReconcileError, Reconciler};

pub const WORKER_COMMON_NAME: &str = "system:vnode:worker-1";

/// Generate a PEM-encoded PKCS#10 request at test runtime.
pub fn csr_pem(common_name: &str, organizations: &[&str], sans: Vec<SanType>) -> Vec<u8> {
    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    for organization in organizations {
        params
            .distinguished_name
            .push(DnType::OrganizationName, *organization);
    }
    params.subject_alt_names = sans;

    let key_pair = KeyPair::generate().expect("generate key pair");
    let csr = params
        .serialize_request(&key_pair)
        .expect("serialize certificate request");
    csr.pem().expect("encode certificate request PEM").into_bytes()
}

/// The conforming vnode client request payload.
pub fn vnode_csr_pem() -> Vec<u8> {
    csr_pem(WORKER_COMMON_NAME, &[constants::SUBJECT_ORGANIZATION], vec![])
}

pub fn vnode_client_usages() -> Vec<KeyUsage> {
    vec![
        KeyUsage::DigitalSignature,
        KeyUsage::KeyEncipherment,
        KeyUsage::ClientAuth,
    ]
}

/// Build a request object around the given payload.
pub fn csr_object(name: &str, username: &str, request: Vec<u8>) -> CertificateSigningRequest {
    CertificateSigningRequest::new(
        name,
        CertificateSigningRequestSpec {
            request,
            signer_name: constants::VNODE_CLIENT_SIGNER_NAME.to_string(),
            username: username.to_string(),
            uid: "vnode-uid-1234".to_string(),
            groups: vec![
                "system:vnodes".to_string(),
                "system:authenticated".to_string(),
            ],
            extra: Default::default(),
            usages: vnode_client_usages(),
        },
    )
}

/// A fully conforming vnode client request object: the username equals the
/// subject common name, so the self-node-client shape matches first.
pub fn vnode_client_csr(name: &str) -> CertificateSigningRequest {
    csr_object(name, WORKER_COMMON_NAME, vnode_csr_pem())
}

/// Control-plane double that records every review and every persisted
/// approval, and answers reviews from a fixed allow-list of subresources.
#[derive(Default)]
pub struct MockControlPlaneClient {
    allowed_subresources: Mutex<Vec<String>>,
    review_error: Mutex<Option<ClientError>>,
    update_error: Mutex<Option<ClientError>>,
    pub reviews: Mutex<Vec<SubjectAccessReview>>,
    pub approvals: Mutex<Vec<CertificateSigningRequest>>,
}

impl MockControlPlaneClient {
    pub fn allowing(subresources: &[&str]) -> Arc<Self> {
        let client = Self::default();
        *client.allowed_subresources.lock() =
            subresources.iter().map(|s| (*s).to_string()).collect();
        Arc::new(client)
    }

    pub fn denying() -> Arc<Self> {
        Self::allowing(&[])
    }

    pub fn failing_reviews(error: ClientError) -> Arc<Self> {
        let client = Self::default();
        *client.review_error.lock() = Some(error);
        Arc::new(client)
    }

    pub fn failing_updates(subresources: &[&str], error: ClientError) -> Arc<Self> {
        let client = Self::allowing(subresources);
        *client.update_error.lock() = Some(error);
        client
    }

    pub fn review_count(&self) -> usize {
        self.reviews.lock().len()
    }

    pub fn approval_count(&self) -> usize {
        self.approvals.lock().len()
    }

    pub fn reviewed_subresources(&self) -> Vec<String> {
        self.reviews
            .lock()
            .iter()
            .map(|review| review.spec.resource_attributes.subresource.clone())
            .collect()
    }
}

#[async_trait]
impl ControlPlaneClient for MockControlPlaneClient {
    async fn create_subject_access_review(
        &self,
        mut review: SubjectAccessReview,
    ) -> Result<SubjectAccessReview, ClientError> {
        if let Some(error) = self.review_error.lock().clone() {
            return Err(error);
        }
        review.status.allowed = self
            .allowed_subresources
            .lock()
            .contains(&review.spec.resource_attributes.subresource);
        self.reviews.lock().push(review.clone());
        Ok(review)
    }

    async fn update_approval(
        &self,
        csr: &CertificateSigningRequest,
    ) -> Result<CertificateSigningRequest, ClientError> {
        if let Some(error) = self.update_error.lock().clone() {
            return Err(error);
        }
        self.approvals.lock().push(csr.clone());
        Ok(csr.clone())
    }
}

/// Deterministic handler failure for engine tests.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TestSyncError {
    pub message: String,
    pub ignorable: bool,
}

impl ReconcileError for TestSyncError {
    fn is_ignorable(&self) -> bool {
        self.ignorable
    }
}

/// Reconciler double recording every invocation, optionally failing or
/// dawdling so tests can hold an item in flight.
#[derive(Default)]
pub struct RecordingReconciler {
    pub handled: Mutex<Vec<String>>,
    pub fail_with: Mutex<Option<TestSyncError>>,
    pub delay: Mutex<Option<Duration>>,
}

impl RecordingReconciler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(message: &str, ignorable: bool) -> Arc<Self> {
        let reconciler = Self::default();
        *reconciler.fail_with.lock() = Some(TestSyncError {
            message: message.to_string(),
            ignorable,
        });
        Arc::new(reconciler)
    }

    pub fn succeed_from_now_on(&self) {
        *self.fail_with.lock() = None;
    }

    pub fn handled_count(&self) -> usize {
        self.handled.lock().len()
    }
}

#[async_trait]
impl Reconciler<CertificateSigningRequest> for RecordingReconciler {
    type Error = TestSyncError;

    async fn reconcile(&self, csr: CertificateSigningRequest) -> Result<(), TestSyncError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.handled.lock().push(csr.name.clone());
        match self.fail_with.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

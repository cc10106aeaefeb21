//! # Control-Plane Client Boundary
//!
//! The two outbound calls this controller ever makes, behind one trait so the
//! transport can be swapped (production client, in-memory test double). Both
//! calls are assumed safe for concurrent use by multiple workers.

use async_trait::async_trait;

use crate::models::{CertificateSigningRequest, SubjectAccessReview};

/// Failures at the transport boundary. Always retried by the engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request rejected by control plane: {0}")]
    Rejected(String),
}

/// Outbound interface to the control plane.
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    /// Submit an access review and return it with the status filled in.
    async fn create_subject_access_review(
        &self,
        review: SubjectAccessReview,
    ) -> Result<SubjectAccessReview, ClientError>;

    /// Persist an approval by updating the request's approval subresource
    /// with the full object and its appended condition.
    async fn update_approval(
        &self,
        csr: &CertificateSigningRequest,
    ) -> Result<CertificateSigningRequest, ClientError>;
}

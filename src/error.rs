//! Handler error taxonomy.
//!
//! Nothing here is fatal: every failure is handed back to the engine, which
//! retries with backoff. The engine never inspects an error beyond its
//! ignorable classification.

use crate::approver::csr::ParseCsrError;
use crate::client::ClientError;
use crate::reconcile::ReconcileError;

#[derive(Debug, thiserror::Error)]
pub enum ApproverError {
    /// The embedded request bytes are not a well-formed PEM PKCS#10 request.
    /// Permanent until the object itself changes, so the key stalls under
    /// capped backoff.
    #[error("unable to parse csr {name:?}: {source}")]
    Parse {
        name: String,
        source: ParseCsrError,
    },

    /// The access review call itself failed.
    #[error("subject access review for csr {name:?} failed: {source}")]
    AccessReview {
        name: String,
        source: ClientError,
    },

    /// The approval persist call failed.
    #[error("error updating approval for csr {name:?}: {source}")]
    UpdateApproval {
        name: String,
        source: ClientError,
    },

    /// Recognized shape, access denied. Expected policy outcome rather than a
    /// system fault, so it is logged quietly; still retried like the rest.
    #[error("recognized csr {name:?} as {tried:?} but subject access review was not approved")]
    AccessReviewDenied {
        name: String,
        tried: Vec<String>,
    },
}

impl ReconcileError for ApproverError {
    fn is_ignorable(&self) -> bool {
        matches!(self, ApproverError::AccessReviewDenied { .. })
    }
}

pub type Result<T> = std::result::Result<T, ApproverError>;

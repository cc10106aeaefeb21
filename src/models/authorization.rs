//! Subject access reviews: the question "may this identity perform this
//! action on this resource", answered synchronously by the control plane.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::authorization as attrs;
use crate::models::csr::CertificateSigningRequest;

/// The resource half of an access review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAttributes {
    pub group: String,
    pub resource: String,
    pub verb: String,
    pub subresource: String,
}

impl ResourceAttributes {
    /// Attributes for creating a certificate signing request with the given
    /// approval subresource.
    pub fn certificate_create(subresource: &str) -> Self {
        Self {
            group: attrs::API_GROUP.to_string(),
            resource: attrs::RESOURCE.to_string(),
            verb: attrs::VERB.to_string(),
            subresource: subresource.to_string(),
        }
    }
}

/// The requester half of an access review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectAccessReviewSpec {
    pub user: String,
    pub uid: String,
    pub groups: Vec<String>,
    pub extra: HashMap<String, Vec<String>>,
    pub resource_attributes: ResourceAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectAccessReviewStatus {
    pub allowed: bool,
    pub reason: String,
}

/// A review as submitted to and returned from the control plane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectAccessReview {
    pub spec: SubjectAccessReviewSpec,
    pub status: SubjectAccessReviewStatus,
}

impl SubjectAccessReview {
    /// Build the review for a request's declared identity against the given
    /// permission.
    pub fn for_request(
        csr: &CertificateSigningRequest,
        permission: &ResourceAttributes,
    ) -> Self {
        Self {
            spec: SubjectAccessReviewSpec {
                user: csr.spec.username.clone(),
                uid: csr.spec.uid.clone(),
                groups: csr.spec.groups.clone(),
                extra: csr.spec.extra.clone(),
                resource_attributes: permission.clone(),
            },
            status: SubjectAccessReviewStatus::default(),
        }
    }
}

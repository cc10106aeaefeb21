//! # Strict Vnode Client Validation
//!
//! A request only qualifies as a vnode client certificate when every rule
//! holds. Checks short-circuit on the first violation; each rule has its own
//! failure value so predicate logs can name what went wrong. A single relaxed
//! check here is a privilege-escalation bug.

use std::collections::BTreeSet;

use crate::constants::{SUBJECT_COMMON_NAME_PREFIX, SUBJECT_ORGANIZATION};
use crate::models::KeyUsage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("subject organization is not system:vnodes")]
    Organization,
    #[error("DNS subjectAltNames are not allowed")]
    DnsSanNotAllowed,
    #[error("Email subjectAltNames are not allowed")]
    EmailSanNotAllowed,
    #[error("IP subjectAltNames are not allowed")]
    IpSanNotAllowed,
    #[error("URI subjectAltNames are not allowed")]
    UriSanNotAllowed,
    #[error("subject common name does not begin with system:vnode")]
    CommonNamePrefix,
    #[error("usages did not match the required vnode client usages")]
    UsageMismatch,
}

/// The exact usage set a vnode client request must declare. Not a subset,
/// not a superset.
pub fn vnode_client_required_usages() -> BTreeSet<KeyUsage> {
    BTreeSet::from([
        KeyUsage::DigitalSignature,
        KeyUsage::KeyEncipherment,
        KeyUsage::ClientAuth,
    ])
}

/// Validate a parsed request plus its declared usage set against the vnode
/// client shape.
pub fn validate_vnode_client_csr(
    info: &crate::approver::csr::CertificateRequestInfo,
    usages: &BTreeSet<KeyUsage>,
) -> Result<(), ValidationError> {
    if info.organization != [SUBJECT_ORGANIZATION] {
        return Err(ValidationError::Organization);
    }

    if !info.dns_names.is_empty() {
        return Err(ValidationError::DnsSanNotAllowed);
    }

    if !info.email_addresses.is_empty() {
        return Err(ValidationError::EmailSanNotAllowed);
    }

    if !info.ip_addresses.is_empty() {
        return Err(ValidationError::IpSanNotAllowed);
    }

    if !info.uris.is_empty() {
        return Err(ValidationError::UriSanNotAllowed);
    }

    if !info.common_name.starts_with(SUBJECT_COMMON_NAME_PREFIX) {
        return Err(ValidationError::CommonNamePrefix);
    }

    if *usages != vnode_client_required_usages() {
        return Err(ValidationError::UsageMismatch);
    }

    Ok(())
}

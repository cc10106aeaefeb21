//! # Certificate Signing Requests
//!
//! The unit of work for the approval controller. The spec is immutable after
//! creation; the status is mutable with append-only conditions. Once an
//! Approved or Denied condition exists, or a certificate has been issued, the
//! object is terminal and no further processing ever happens to it.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::reconcile::QueueObject;

/// Key usages a requester may declare. Values carry the wire spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyUsage {
    #[serde(rename = "digital signature")]
    DigitalSignature,
    #[serde(rename = "key encipherment")]
    KeyEncipherment,
    #[serde(rename = "client auth")]
    ClientAuth,
    #[serde(rename = "server auth")]
    ServerAuth,
}

impl KeyUsage {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyUsage::DigitalSignature => "digital signature",
            KeyUsage::KeyEncipherment => "key encipherment",
            KeyUsage::ClientAuth => "client auth",
            KeyUsage::ServerAuth => "server auth",
        }
    }
}

impl std::fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition types an approver or denier may append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    Approved,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// One entry in the status condition list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateSigningRequestCondition {
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    pub last_update_time: DateTime<Utc>,
}

/// Requester-supplied half of the object. Immutable after creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CertificateSigningRequestSpec {
    /// Raw PEM-encoded PKCS#10 request bytes.
    pub request: Vec<u8>,
    pub signer_name: String,
    pub username: String,
    pub uid: String,
    pub groups: Vec<String>,
    /// Open-ended attribute bag forwarded verbatim to access reviews.
    pub extra: HashMap<String, Vec<String>>,
    pub usages: Vec<KeyUsage>,
}

/// Mutable half of the object. Conditions are append-only; the certificate
/// is populated by an external signer, never by this controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CertificateSigningRequestStatus {
    pub conditions: Vec<CertificateSigningRequestCondition>,
    pub certificate: Vec<u8>,
}

/// Approved/Denied presence summary for a status condition list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovalState {
    pub approved: bool,
    pub denied: bool,
}

impl CertificateSigningRequestStatus {
    /// Report whether Approved and/or Denied conditions are present.
    pub fn approval_state(&self) -> ApprovalState {
        let mut state = ApprovalState::default();
        for condition in &self.conditions {
            match condition.condition_type {
                ConditionType::Approved => state.approved = true,
                ConditionType::Denied => state.denied = true,
            }
        }
        state
    }

    /// Append the single Approved condition this controller ever writes.
    pub fn append_approval_condition(&mut self, message: &str) {
        self.conditions.push(CertificateSigningRequestCondition {
            condition_type: ConditionType::Approved,
            status: ConditionStatus::True,
            reason: constants::APPROVAL_REASON.to_string(),
            message: message.to_string(),
            last_update_time: Utc::now(),
        });
    }
}

/// A certificate signing request as delivered by the watch subsystem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CertificateSigningRequest {
    /// Unique name; doubles as the work-queue key.
    pub name: String,
    pub spec: CertificateSigningRequestSpec,
    pub status: CertificateSigningRequestStatus,
}

impl CertificateSigningRequest {
    pub fn new(name: impl Into<String>, spec: CertificateSigningRequestSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            status: CertificateSigningRequestStatus::default(),
        }
    }

    /// Approved and not denied.
    pub fn is_approved(&self) -> bool {
        let state = self.status.approval_state();
        state.approved && !state.denied
    }

    /// True when a condition of the given type exists with status True.
    pub fn has_true_condition(&self, condition_type: ConditionType) -> bool {
        self.status
            .conditions
            .iter()
            .any(|c| c.condition_type == condition_type && c.status == ConditionStatus::True)
    }

    /// Declared usages as a set, so equality checks are order-insensitive.
    pub fn usage_set(&self) -> BTreeSet<KeyUsage> {
        self.spec.usages.iter().copied().collect()
    }
}

impl QueueObject for CertificateSigningRequest {
    fn queue_key(&self) -> String {
        self.name.clone()
    }

    /// An issued certificate or any Approved/Denied condition settles the
    /// object for good.
    fn is_terminal(&self) -> bool {
        if !self.status.certificate.is_empty() {
            return true;
        }
        let state = self.status.approval_state();
        state.approved || state.denied
    }
}

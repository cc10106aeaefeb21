//! Approver handler scenarios: terminal short-circuits, validation exactness,
//! recognizer precedence, and the approve / deny / failure outcomes.

mod common;

use rcgen::SanType;
use tokio_test::assert_ok;

use vnode_csr_approver::constants::authorization::{
    NODE_CLIENT_SUBRESOURCE, SELF_NODE_CLIENT_SUBRESOURCE,
};
use vnode_csr_approver::error::ApproverError;
use vnode_csr_approver::models::{ConditionType, KeyUsage};
use vnode_csr_approver::reconcile::ReconcileError;
use vnode_csr_approver::SarApprover;

use common::{
    csr_object, csr_pem, vnode_client_csr, vnode_csr_pem, MockControlPlaneClient,
    WORKER_COMMON_NAME,
};

#[tokio::test]
async fn already_approved_request_makes_zero_remote_calls() {
    let client = MockControlPlaneClient::allowing(&[SELF_NODE_CLIENT_SUBRESOURCE]);
    let approver = SarApprover::new(client.clone());

    let mut csr = vnode_client_csr("approved-csr");
    csr.status.append_approval_condition("already handled");

    assert_ok!(approver.handle(csr).await);
    assert_eq!(client.review_count(), 0);
    assert_eq!(client.approval_count(), 0);
}

#[tokio::test]
async fn issued_certificate_makes_zero_remote_calls() {
    let client = MockControlPlaneClient::allowing(&[SELF_NODE_CLIENT_SUBRESOURCE]);
    let approver = SarApprover::new(client.clone());

    let mut csr = vnode_client_csr("issued-csr");
    csr.status.certificate = b"-----BEGIN CERTIFICATE-----".to_vec();

    assert_ok!(approver.handle(csr).await);
    assert_eq!(client.review_count(), 0);
    assert_eq!(client.approval_count(), 0);
}

#[tokio::test]
async fn usage_superset_is_not_recognized() {
    let client = MockControlPlaneClient::allowing(&[
        SELF_NODE_CLIENT_SUBRESOURCE,
        NODE_CLIENT_SUBRESOURCE,
    ]);
    let approver = SarApprover::new(client.clone());

    let mut csr = vnode_client_csr("superset-csr");
    csr.spec.usages.push(KeyUsage::ServerAuth);

    // strict superset of the required usages fails validation; no recognizer
    // matches, so the request is left alone
    assert_ok!(approver.handle(csr).await);
    assert_eq!(client.review_count(), 0);
    assert_eq!(client.approval_count(), 0);
}

#[tokio::test]
async fn wrong_organization_is_not_recognized() {
    let client = MockControlPlaneClient::allowing(&[
        SELF_NODE_CLIENT_SUBRESOURCE,
        NODE_CLIENT_SUBRESOURCE,
    ]);
    let approver = SarApprover::new(client.clone());

    let csr = csr_object(
        "other-org-csr",
        WORKER_COMMON_NAME,
        csr_pem(WORKER_COMMON_NAME, &["other-org"], vec![]),
    );

    assert_ok!(approver.handle(csr).await);
    assert_eq!(client.review_count(), 0);
    assert_eq!(client.approval_count(), 0);
}

#[tokio::test]
async fn san_bearing_request_is_not_recognized() {
    let client = MockControlPlaneClient::allowing(&[NODE_CLIENT_SUBRESOURCE]);
    let approver = SarApprover::new(client.clone());

    let csr = csr_object(
        "san-csr",
        WORKER_COMMON_NAME,
        csr_pem(
            WORKER_COMMON_NAME,
            &["system:vnodes"],
            vec![SanType::DnsName("worker-1.example".try_into().unwrap())],
        ),
    );

    assert_ok!(approver.handle(csr).await);
    assert_eq!(client.review_count(), 0);
}

#[tokio::test]
async fn self_node_client_permission_is_checked_first() {
    let client = MockControlPlaneClient::allowing(&[SELF_NODE_CLIENT_SUBRESOURCE]);
    let approver = SarApprover::new(client.clone());

    // username equals the subject common name, so the self shape matches and
    // its permission - not the generic node-client one - is the one reviewed
    let csr = vnode_client_csr("self-csr");
    assert_ok!(approver.handle(csr).await);

    assert_eq!(
        client.reviewed_subresources(),
        vec![SELF_NODE_CLIENT_SUBRESOURCE.to_string()]
    );
    assert_eq!(client.approval_count(), 1);
}

#[tokio::test]
async fn approves_with_exactly_one_condition_and_one_persist() {
    let client = MockControlPlaneClient::allowing(&[NODE_CLIENT_SUBRESOURCE]);
    let approver = SarApprover::new(client.clone());

    // username differs from the common name, so only the generic node-client
    // shape matches
    let csr = csr_object("e2e-csr", "system:bootstrap:worker-1", vnode_csr_pem());
    assert_ok!(approver.handle(csr).await);

    let approvals = client.approvals.lock();
    assert_eq!(approvals.len(), 1);
    let persisted = &approvals[0];
    assert_eq!(persisted.name, "e2e-csr");
    assert_eq!(persisted.status.conditions.len(), 1);

    let condition = &persisted.status.conditions[0];
    assert_eq!(condition.condition_type, ConditionType::Approved);
    assert_eq!(condition.reason, "AutoApproved");
    assert_eq!(
        condition.message,
        "Auto approving vnode client certificate after SubjectAccessReview."
    );
}

#[tokio::test]
async fn first_authorized_match_wins_without_further_reviews() {
    let client = MockControlPlaneClient::allowing(&[
        SELF_NODE_CLIENT_SUBRESOURCE,
        NODE_CLIENT_SUBRESOURCE,
    ]);
    let approver = SarApprover::new(client.clone());

    assert_ok!(approver.handle(vnode_client_csr("first-wins")).await);

    // both shapes match, but the second recognizer is never consulted
    assert_eq!(
        client.reviewed_subresources(),
        vec![SELF_NODE_CLIENT_SUBRESOURCE.to_string()]
    );
    assert_eq!(client.approval_count(), 1);
}

#[tokio::test]
async fn denied_reviews_surface_an_ignorable_error_naming_every_tried_shape() {
    let client = MockControlPlaneClient::denying();
    let approver = SarApprover::new(client.clone());

    let err = approver
        .handle(vnode_client_csr("denied-csr"))
        .await
        .unwrap_err();

    assert!(err.is_ignorable());
    match err {
        ApproverError::AccessReviewDenied { name, tried } => {
            assert_eq!(name, "denied-csr");
            assert_eq!(
                tried,
                vec![
                    SELF_NODE_CLIENT_SUBRESOURCE.to_string(),
                    NODE_CLIENT_SUBRESOURCE.to_string(),
                ]
            );
        }
        other => panic!("expected AccessReviewDenied, got {other:?}"),
    }

    // every matching recognizer was tried, nothing was persisted
    assert_eq!(client.review_count(), 2);
    assert_eq!(client.approval_count(), 0);
}

#[tokio::test]
async fn malformed_request_bytes_fail_without_remote_calls() {
    let client = MockControlPlaneClient::allowing(&[SELF_NODE_CLIENT_SUBRESOURCE]);
    let approver = SarApprover::new(client.clone());

    let csr = csr_object("garbage-csr", WORKER_COMMON_NAME, b"not a pem block".to_vec());
    let err = approver.handle(csr).await.unwrap_err();

    assert!(matches!(err, ApproverError::Parse { .. }));
    assert!(!err.is_ignorable());
    assert_eq!(client.review_count(), 0);
    assert_eq!(client.approval_count(), 0);
}

#[tokio::test]
async fn review_transport_failure_is_retryable_and_not_ignorable() {
    let client = MockControlPlaneClient::failing_reviews(
        vnode_csr_approver::client::ClientError::Transport("connection reset".to_string()),
    );
    let approver = SarApprover::new(client.clone());

    let err = approver
        .handle(vnode_client_csr("transport-csr"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApproverError::AccessReview { .. }));
    assert!(!err.is_ignorable());
    assert_eq!(client.approval_count(), 0);
}

#[tokio::test]
async fn persist_failure_is_retryable_and_not_ignorable() {
    let client = MockControlPlaneClient::failing_updates(
        &[SELF_NODE_CLIENT_SUBRESOURCE],
        vnode_csr_approver::client::ClientError::Transport("timeout".to_string()),
    );
    let approver = SarApprover::new(client.clone());

    let err = approver
        .handle(vnode_client_csr("persist-csr"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApproverError::UpdateApproval { .. }));
    assert!(!err.is_ignorable());
    assert_eq!(client.approval_count(), 0);
}

#[tokio::test]
async fn foreign_signer_is_left_for_other_approvers() {
    let client = MockControlPlaneClient::allowing(&[
        SELF_NODE_CLIENT_SUBRESOURCE,
        NODE_CLIENT_SUBRESOURCE,
    ]);
    let approver = SarApprover::new(client.clone());

    let mut csr = vnode_client_csr("foreign-signer");
    csr.spec.signer_name = "example.com/legacy-serving".to_string();

    assert_ok!(approver.handle(csr).await);
    assert_eq!(client.review_count(), 0);
    assert_eq!(client.approval_count(), 0);
}

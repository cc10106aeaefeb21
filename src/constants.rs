//! Fixed identity values for virtual-node client certificate requests.
//!
//! These mirror the cluster-side contract: the signer that issues client
//! certificates, and the subject shape a virtual node is allowed to request.

/// Signer that issues control-plane client certificates.
pub const VNODE_CLIENT_SIGNER_NAME: &str = "kubernetes.io/kube-apiserver-client";

/// Required prefix for the subject common name of a vnode client request.
pub const SUBJECT_COMMON_NAME_PREFIX: &str = "system:vnode";

/// The single organization a vnode client request must carry.
pub const SUBJECT_ORGANIZATION: &str = "system:vnodes";

/// Condition reason recorded on every approval this controller performs.
pub const APPROVAL_REASON: &str = "AutoApproved";

/// Resource attributes checked against the authorization endpoint.
pub mod authorization {
    pub const API_GROUP: &str = "certificates.k8s.io";
    pub const RESOURCE: &str = "certificatesigningrequests";
    pub const VERB: &str = "create";

    /// Subresource granting approval of a node's own client certificate.
    pub const SELF_NODE_CLIENT_SUBRESOURCE: &str = "selfnodeclient";
    /// Subresource granting approval of any vnode client certificate.
    pub const NODE_CLIENT_SUBRESOURCE: &str = "nodeclient";
}

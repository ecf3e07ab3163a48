//! # Service Context
//!
//! The per-operation identity bundle passed into every core operation:
//! tenant, acting user, request correlation, and audit provenance. Always
//! supplied by the calling layer — the core never derives tenancy from
//! ambient state.

use serde::{Deserialize, Serialize};

use crate::identity::{ActorId, RequestId, SessionId, TenantId};

/// Identity and provenance for one service operation.
///
/// Tenant isolation is enforced by passing this context explicitly through
/// every call; storage backends bind `tenant_id` on every query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceContext {
    /// The tenant the operation acts on.
    pub tenant_id: TenantId,
    /// The acting user, as authenticated by the upstream layer.
    pub actor_id: ActorId,
    /// Request correlation id.
    pub request_id: RequestId,
    /// Session identifier, when the upstream layer tracks one.
    pub session_id: Option<SessionId>,
    /// Client IP address, for audit provenance.
    pub ip_address: Option<String>,
    /// Client user agent, for audit provenance.
    pub user_agent: Option<String>,
}

impl ServiceContext {
    /// Create a context with a freshly generated request id and no
    /// provenance.
    pub fn new(tenant_id: TenantId, actor_id: ActorId) -> Self {
        Self {
            tenant_id,
            actor_id,
            request_id: RequestId::generate(),
            session_id: None,
            ip_address: None,
            user_agent: None,
        }
    }

    /// Attach an explicit request id.
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Attach session provenance.
    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Attach network provenance.
    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

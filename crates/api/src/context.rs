use stockroom_auth::Principal;
use stockroom_core::{TenantId, UserId};

/// Tenant context for a request.
///
/// Taken from the verified token; every domain route reads it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn name(&self) -> &str {
        &self.principal.name
    }

    pub fn is_admin(&self) -> bool {
        self.principal.is_admin
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

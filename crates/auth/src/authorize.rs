use thiserror::Error;

use stockroom_core::{TenantId, UserId};

use crate::claims::SessionClaims;
use crate::Permission;

/// An authenticated caller, resolved from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub name: String,
    pub is_admin: bool,
}

impl Principal {
    /// Permissions granted to this caller. Administrators hold the wildcard;
    /// everyone else holds no privileged permission.
    pub fn permissions(&self) -> Vec<Permission> {
        if self.is_admin {
            vec![Permission::WILDCARD]
        } else {
            Vec::new()
        }
    }
}

impl From<&SessionClaims> for Principal {
    fn from(claims: &SessionClaims) -> Self {
        Self {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            name: claims.name.clone(),
            is_admin: claims.is_admin,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// No valid identity was presented.
    #[error("unauthorized")]
    Unauthorized,

    /// Valid identity, missing privilege.
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// The access gate: one predicate every privileged operation goes through.
///
/// `None` means the caller is anonymous. No IO, no special cases for the
/// caller acting on their own account.
pub fn authorize(principal: Option<&Principal>, required: &Permission) -> Result<(), AuthzError> {
    let principal = principal.ok_or(AuthzError::Unauthorized)?;
    let granted = principal
        .permissions()
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

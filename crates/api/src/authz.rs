//! API-side authorization guard.
//!
//! Privileged handlers call `require_admin` before dispatching anything, so
//! domain aggregates and infra stay auth-agnostic.

use axum::response::Response;

use stockroom_auth::{Permission, authorize};

use crate::app::errors::authz_error_to_response;
use crate::context::PrincipalContext;

/// Allow the request only if the caller holds `permission` (admins hold all).
pub fn require_admin(principal: &PrincipalContext, permission: &Permission) -> Result<(), Response> {
    authorize(Some(principal.principal()), permission).map_err(|e| {
        tracing::info!(
            user_id = %principal.user_id(),
            permission = %permission,
            "privileged operation refused"
        );
        authz_error_to_response(e)
    })
}

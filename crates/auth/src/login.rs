//! Name + safe-word exchange.
//!
//! Every failure mode (unknown name, wrong secret, unreadable stored hash)
//! collapses into `LoginError::InvalidCredentials` so callers cannot tell
//! which accounts exist.

use thiserror::Error;

use stockroom_core::{TenantId, UserId};

use crate::identity_claim::normalize_key;
use crate::password::{verify_against_dummy, verify_secret};
use crate::token::SessionSubject;

/// What a credential lookup yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub name: String,
    pub password_hash: String,
    pub is_admin: bool,
}

/// Read side that knows how to find credentials. Implemented by the users
/// projection in infra.
pub trait CredentialDirectory: Send + Sync {
    /// Email registered for a display name (case-insensitive).
    fn email_for_name(&self, tenant_id: TenantId, name: &str) -> Option<String>;

    /// Credential registered for an email (case-insensitive).
    fn credential_for_email(&self, tenant_id: TenantId, email: &str) -> Option<StoredCredential>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoginError {
    #[error("invalid credentials")]
    InvalidCredentials,
}

/// Resolve name → email → credential and verify the secret.
pub fn exchange_credentials(
    directory: &dyn CredentialDirectory,
    tenant_id: TenantId,
    name: &str,
    safe_word: &str,
) -> Result<SessionSubject, LoginError> {
    let credential = directory
        .email_for_name(tenant_id, &normalize_key(name))
        .and_then(|email| directory.credential_for_email(tenant_id, &email));

    let Some(credential) = credential else {
        verify_against_dummy(safe_word);
        tracing::debug!(%tenant_id, "login for unknown name");
        return Err(LoginError::InvalidCredentials);
    };

    match verify_secret(safe_word, &credential.password_hash) {
        Ok(true) => Ok(SessionSubject {
            user_id: credential.user_id,
            tenant_id: credential.tenant_id,
            name: credential.name,
            is_admin: credential.is_admin,
        }),
        Ok(false) => Err(LoginError::InvalidCredentials),
        Err(err) => {
            tracing::warn!(user_id = %credential.user_id, error = %err, "stored credential unreadable");
            Err(LoginError::InvalidCredentials)
        }
    }
}

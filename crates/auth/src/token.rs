//! HS256 bearer tokens (issue + verify).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use thiserror::Error;

use stockroom_core::{TenantId, UserId};

use crate::claims::{SessionClaims, TokenKind, TokenValidationError, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed or badly signed token: {0}")]
    Invalid(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),

    #[error("expected a {expected:?} token")]
    WrongKind { expected: TokenKind },

    #[error("failed to sign token: {0}")]
    Encode(String),
}

/// Who a session is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSubject {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub name: String,
    pub is_admin: bool,
}

/// Access + refresh pair returned by login and refresh.
#[derive(Debug, Clone, Serialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
}

/// Verifies bearer tokens presented by callers.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, kind: TokenKind, now: DateTime<Utc>) -> Result<SessionClaims, TokenError>;
}

/// Issues session token pairs.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, subject: &SessionSubject, now: DateTime<Utc>) -> Result<SessionTokens, TokenError>;
}

/// Shared-secret HS256 implementation of both traits.
#[derive(Clone)]
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl Hs256Jwt {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    fn sign(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    fn claims_for(&self, subject: &SessionSubject, kind: TokenKind, now: DateTime<Utc>) -> SessionClaims {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        SessionClaims {
            sub: subject.user_id,
            tenant_id: subject.tenant_id,
            name: subject.name.clone(),
            is_admin: subject.is_admin,
            kind,
            iat: now,
            exp: now + ttl,
        }
    }
}

impl core::fmt::Debug for Hs256Jwt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Jwt")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, kind: TokenKind, now: DateTime<Utc>) -> Result<SessionClaims, TokenError> {
        // Expiry is checked by `validate_claims` against the injected clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let claims = decode::<SessionClaims>(token, &self.decoding, &validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?
            .claims;

        validate_claims(&claims, now)?;
        if claims.kind != kind {
            return Err(TokenError::WrongKind { expected: kind });
        }
        Ok(claims)
    }
}

impl TokenIssuer for Hs256Jwt {
    fn issue(&self, subject: &SessionSubject, now: DateTime<Utc>) -> Result<SessionTokens, TokenError> {
        let access = self.claims_for(subject, TokenKind::Access, now);
        let refresh = self.claims_for(subject, TokenKind::Refresh, now);
        Ok(SessionTokens {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
            token_type: "Bearer",
            expires_in: self.access_ttl.num_seconds(),
            expires_at: access.exp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt() -> Hs256Jwt {
        Hs256Jwt::new(b"test-secret", Duration::minutes(15), Duration::hours(24))
    }

    fn subject() -> SessionSubject {
        SessionSubject {
            user_id: UserId::new(),
            tenant_id: TenantId::new(),
            name: "alice".to_string(),
            is_admin: true,
        }
    }

    #[test]
    fn issued_pair_validates_by_kind() {
        let jwt = jwt();
        let now = Utc::now();
        let s = subject();
        let tokens = jwt.issue(&s, now).unwrap();

        let access = jwt.validate(&tokens.access_token, TokenKind::Access, now).unwrap();
        assert_eq!(access.sub, s.user_id);
        assert!(access.is_admin);

        let err = jwt.validate(&tokens.refresh_token, TokenKind::Access, now).unwrap_err();
        assert_eq!(err, TokenError::WrongKind { expected: TokenKind::Access });
        assert!(jwt.validate(&tokens.refresh_token, TokenKind::Refresh, now).is_ok());
    }

    #[test]
    fn expired_access_token_is_rejected() {
        let jwt = jwt();
        let now = Utc::now();
        let tokens = jwt.issue(&subject(), now).unwrap();

        let later = now + Duration::minutes(16);
        let err = jwt.validate(&tokens.access_token, TokenKind::Access, later).unwrap_err();
        assert_eq!(err, TokenError::Claims(TokenValidationError::Expired));
    }

    #[test]
    fn other_secret_is_rejected() {
        let now = Utc::now();
        let tokens = jwt().issue(&subject(), now).unwrap();
        let other = Hs256Jwt::new(b"other", Duration::minutes(15), Duration::hours(1));
        assert!(matches!(
            other.validate(&tokens.access_token, TokenKind::Access, now),
            Err(TokenError::Invalid(_))
        ));
    }
}

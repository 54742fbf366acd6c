//! Registration, name + safe-word login, and session refresh.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;

use stockroom_auth::{
    ClaimCommand, IdentityClaim, IdentityKind, JwtValidator, RecordSignIn, RegisterUser,
    RegistrationRequest, SessionSubject, TokenIssuer, TokenKind, UserCommand, UserEvent, UserProfile,
    exchange_credentials, hash_secret, normalize_key,
};
use stockroom_core::{TenantId, UserId};

use crate::app::dto::{
    LoginRequest, ProfileView, RefreshRequest, RegisterRequest, SessionResponse, SessionUser,
};
use crate::app::errors::{self, ApiResult};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult {
    let req = errors::body(body)?;
    let tenant_id = req.tenant_id.unwrap_or(services.config().default_tenant_id);

    let valid = RegistrationRequest {
        name: req.name,
        email: req.email,
        secret: req.secret,
    }
    .validate()
    .map_err(errors::domain_error_to_response)?;

    let secret = valid.secret;
    let password_hash = tokio::task::spawn_blocking(move || hash_secret(&secret))
        .await
        .map_err(errors::internal_error)?
        .map_err(errors::internal_error)?;

    let user_id = UserId::new();
    let name_key = normalize_key(&valid.name);
    let email_key = normalize_key(&valid.email);

    // Name and email are unique per tenant: claim both before the profile exists.
    claim(&services, tenant_id, IdentityKind::Name, &name_key, user_id).await?;
    if let Err(resp) = claim(&services, tenant_id, IdentityKind::Email, &email_key, user_id).await {
        release(&services, tenant_id, IdentityKind::Name, &name_key, user_id).await;
        return Err(resp);
    }

    let is_admin = services.is_bootstrap_admin(tenant_id, &valid.name);
    let cmd = UserCommand::Register(RegisterUser {
        tenant_id,
        user_id,
        name: valid.name,
        email: valid.email,
        password_hash,
        is_admin,
        occurred_at: Utc::now(),
    });
    let committed = match services
        .execute::<UserProfile>(tenant_id, cmd, |id| UserProfile::empty(UserId::from(id)))
        .await
    {
        Ok(committed) => committed,
        Err(e) => {
            release(&services, tenant_id, IdentityKind::Email, &email_key, user_id).await;
            release(&services, tenant_id, IdentityKind::Name, &name_key, user_id).await;
            return Err(errors::dispatch_error_to_response(e));
        }
    };

    tracing::info!(%tenant_id, %user_id, is_admin, "user registered");

    let profile = committed
        .events
        .iter()
        .find_map(|e| match e {
            UserEvent::Registered(r) => Some(ProfileView::registered(r)),
            _ => None,
        })
        .ok_or_else(|| errors::internal_error("registration committed without a profile event"))?;
    Ok((StatusCode::CREATED, Json(profile)).into_response())
}

async fn claim(
    services: &AppServices,
    tenant_id: TenantId,
    kind: IdentityKind,
    key: &str,
    user_id: UserId,
) -> Result<(), Response> {
    let cmd = ClaimCommand::Claim {
        tenant_id,
        kind,
        key: key.to_string(),
        user_id,
        occurred_at: Utc::now(),
    };
    services
        .execute::<IdentityClaim>(tenant_id, cmd, IdentityClaim::empty)
        .await
        .map(|_| ())
        .map_err(errors::dispatch_error_to_response)
}

/// Compensation for a failed registration. Failure leaves a dangling claim,
/// which is logged but not surfaced.
async fn release(services: &AppServices, tenant_id: TenantId, kind: IdentityKind, key: &str, user_id: UserId) {
    let cmd = ClaimCommand::Release {
        tenant_id,
        kind,
        key: key.to_string(),
        user_id,
        occurred_at: Utc::now(),
    };
    if let Err(e) = services
        .execute::<IdentityClaim>(tenant_id, cmd, IdentityClaim::empty)
        .await
    {
        tracing::warn!(%tenant_id, %user_id, kind = kind.as_str(), error = %e, "failed to release identity claim");
    }
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult {
    let req = errors::body(body)?;
    let tenant_id = req.tenant_id.unwrap_or(services.config().default_tenant_id);

    let models = services.read_models().clone();
    let subject = tokio::task::spawn_blocking(move || {
        exchange_credentials(&models.users, tenant_id, &req.name, &req.secret)
    })
    .await
    .map_err(errors::internal_error)?
    .map_err(errors::login_error_to_response)?;

    let cmd = UserCommand::RecordSignIn(RecordSignIn {
        tenant_id,
        user_id: subject.user_id,
        occurred_at: Utc::now(),
    });
    if let Err(e) = services
        .execute::<UserProfile>(tenant_id, cmd, |id| UserProfile::empty(UserId::from(id)))
        .await
    {
        tracing::warn!(%tenant_id, user_id = %subject.user_id, error = %e, "failed to record sign-in");
    }

    issue_session(&services, subject)
}

pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult {
    let req = errors::body(body)?;
    let unauthorized =
        || errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "invalid or expired refresh token");

    let claims = services
        .jwt()
        .validate(&req.refresh_token, TokenKind::Refresh, Utc::now())
        .map_err(|e| {
            tracing::debug!(error = %e, "rejected refresh token");
            unauthorized()
        })?;

    // Re-read the profile so name and admin changes reach the new pair.
    let user = services
        .read_models()
        .users
        .get(claims.tenant_id, &claims.sub)
        .ok_or_else(unauthorized)?;

    issue_session(
        &services,
        SessionSubject {
            user_id: user.user_id,
            tenant_id: user.tenant_id,
            name: user.name,
            is_admin: user.is_admin,
        },
    )
}

fn issue_session(services: &AppServices, subject: SessionSubject) -> ApiResult {
    let tokens = services
        .jwt()
        .issue(&subject, Utc::now())
        .map_err(errors::internal_error)?;

    Ok(Json(SessionResponse {
        tokens,
        user: SessionUser {
            id: subject.user_id,
            tenant_id: subject.tenant_id,
            name: subject.name,
            is_admin: subject.is_admin,
        },
    })
    .into_response())
}

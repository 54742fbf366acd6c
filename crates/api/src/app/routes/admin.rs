//! User administration. Every route here requires an admin permission.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use stockroom_auth::{Permission, SetAdmin, UserCommand, UserEvent, UserProfile};
use stockroom_core::UserId;

use crate::app::dto::{AdminFlagView, ProfileView};
use crate::app::errors::{self, ApiResult};
use crate::app::services::AppServices;
use crate::authz::require_admin;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id/promote", post(promote))
        .route("/users/:id/demote", post(demote))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    require_admin(&principal, &Permission::LIST_USERS)?;
    let users: Vec<ProfileView> = services
        .read_models()
        .users
        .list(tenant.tenant_id())
        .into_iter()
        .map(ProfileView::from)
        .collect();
    Ok(Json(users).into_response())
}

pub async fn promote(
    services: Extension<Arc<AppServices>>,
    tenant: Extension<TenantContext>,
    principal: Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    set_admin(services, tenant, principal, &id, true).await
}

pub async fn demote(
    services: Extension<Arc<AppServices>>,
    tenant: Extension<TenantContext>,
    principal: Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    set_admin(services, tenant, principal, &id, false).await
}

async fn set_admin(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    id: &str,
    is_admin: bool,
) -> ApiResult {
    require_admin(&principal, &Permission::MANAGE_ADMINS)?;
    let user_id = id.parse::<UserId>().map_err(|_| errors::invalid_id("user"))?;
    let tenant_id = tenant.tenant_id();

    let cmd = UserCommand::SetAdmin(SetAdmin {
        tenant_id,
        user_id,
        is_admin,
        actor: principal.user_id(),
        occurred_at: Utc::now(),
    });
    let committed = services
        .execute::<UserProfile>(tenant_id, cmd, |id| UserProfile::empty(UserId::from(id)))
        .await
        .map_err(errors::dispatch_error_to_response)?;

    tracing::info!(%tenant_id, %user_id, is_admin, actor = %principal.user_id(), "admin flag changed");

    // Setting the flag it already has commits nothing.
    let is_admin = committed
        .events
        .iter()
        .find_map(|e| match e {
            UserEvent::AdminFlagChanged(c) => Some(c.is_admin),
            _ => None,
        })
        .unwrap_or(is_admin);
    Ok(Json(AdminFlagView {
        id: user_id,
        name: services.read_models().users.display_name(tenant_id, &user_id),
        is_admin,
    })
    .into_response())
}

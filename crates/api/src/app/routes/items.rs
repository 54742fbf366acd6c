use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
};
use chrono::Utc;

use stockroom_auth::Permission;
use stockroom_core::{AggregateId, Quantity, TenantId};
use stockroom_infra::projections::{CatalogItem, CatalogQuery};
use stockroom_inventory::{
    CreateItem, InitialStock, Item, ItemCommand, ItemDetails, ItemDetailsPatch, ItemEvent, ItemId,
    LowStockThreshold, MovementId, SetLowStockThreshold, UpdateItemDetails,
};

use crate::app::dto::{CreateItemRequest, MovementView, ThresholdRequest};
use crate::app::errors::{self, ApiResult};
use crate::app::services::AppServices;
use crate::authz::require_admin;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/items", get(list).post(create))
        .route("/items/:id", get(get_item).patch(update))
        .route("/items/:id/threshold", put(set_threshold))
        .route("/items/:id/movements", get(movements))
}

pub(crate) fn parse_item_id(raw: &str) -> Result<ItemId, Response> {
    raw.parse::<AggregateId>()
        .map(ItemId::new)
        .map_err(|_| errors::invalid_id("item"))
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    query: Result<Query<CatalogQuery>, QueryRejection>,
) -> ApiResult {
    let query = errors::query(query)?;
    let items = services.read_models().catalog.list(tenant.tenant_id(), &query);
    Ok(Json(items).into_response())
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<CreateItemRequest>, JsonRejection>,
) -> ApiResult {
    let req = errors::body(body)?;
    let tenant_id = tenant.tenant_id();

    if req.low_stock_threshold.is_some() {
        require_admin(&principal, &Permission::MANAGE_THRESHOLDS)?;
    }
    let threshold = req
        .low_stock_threshold
        .map(Quantity::new)
        .transpose()
        .map_err(errors::domain_error_to_response)?;
    let initial_stock = req
        .initial_stock
        .map(Quantity::new)
        .transpose()
        .map_err(errors::domain_error_to_response)?
        .map(|quantity| InitialStock {
            movement_id: MovementId::new(),
            quantity,
            reason: req.initial_reason.unwrap_or_default(),
            image_refs: req.image_refs,
        });

    let item_id = ItemId::new(AggregateId::new());
    let cmd = ItemCommand::CreateItem(CreateItem {
        tenant_id,
        item_id,
        details: ItemDetails {
            name: req.name,
            category: req.category,
            unit: req.unit,
            is_regular: req.is_regular,
            location: req.location,
            notes: req.notes,
        },
        threshold: LowStockThreshold::from(threshold),
        initial_stock,
        actor: principal.user_id(),
        occurred_at: Utc::now(),
    });

    let committed = services
        .execute::<Item>(tenant_id, cmd, |id| Item::empty(ItemId::new(id)))
        .await
        .map_err(errors::dispatch_error_to_response)?;

    tracing::info!(%tenant_id, %item_id, actor = %principal.user_id(), "item created");

    // The stream is new, so its committed events are the whole row.
    let item = CatalogItem::from_events(&committed.events)
        .ok_or_else(|| errors::internal_error("item committed without a creation event"))?;
    Ok((StatusCode::CREATED, Json(item)).into_response())
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let item_id = parse_item_id(&id)?;
    let item = services
        .read_models()
        .catalog
        .get(tenant.tenant_id(), &item_id)
        .ok_or_else(|| errors::not_found("item"))?;
    Ok(Json(item).into_response())
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<ItemDetailsPatch>, JsonRejection>,
) -> ApiResult {
    let item_id = parse_item_id(&id)?;
    let patch = errors::body(body)?;
    let tenant_id = tenant.tenant_id();

    let cmd = ItemCommand::UpdateDetails(UpdateItemDetails {
        tenant_id,
        item_id,
        patch,
        actor: principal.user_id(),
        occurred_at: Utc::now(),
    });
    let committed = services
        .execute::<Item>(tenant_id, cmd, |id| Item::empty(ItemId::new(id)))
        .await
        .map_err(errors::dispatch_error_to_response)?;

    Ok(Json(settled(&services, tenant_id, item_id, committed.events)?).into_response())
}

pub async fn set_threshold(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<ThresholdRequest>, JsonRejection>,
) -> ApiResult {
    require_admin(&principal, &Permission::MANAGE_THRESHOLDS)?;
    let item_id = parse_item_id(&id)?;
    let req = errors::body(body)?;
    let tenant_id = tenant.tenant_id();

    let threshold = req
        .threshold
        .map(Quantity::new)
        .transpose()
        .map_err(errors::domain_error_to_response)?;

    let cmd = ItemCommand::SetThreshold(SetLowStockThreshold {
        tenant_id,
        item_id,
        threshold: LowStockThreshold::from(threshold),
        actor: principal.user_id(),
        occurred_at: Utc::now(),
    });
    let committed = services
        .execute::<Item>(tenant_id, cmd, |id| Item::empty(ItemId::new(id)))
        .await
        .map_err(errors::dispatch_error_to_response)?;

    tracing::info!(%tenant_id, %item_id, threshold = ?threshold, "low-stock threshold set");

    Ok(Json(settled(&services, tenant_id, item_id, committed.events)?).into_response())
}

/// The catalog row with a detail or threshold write folded in, whether or not
/// the read model has caught up with it yet.
fn settled(
    services: &AppServices,
    tenant_id: TenantId,
    item_id: ItemId,
    events: Vec<ItemEvent>,
) -> Result<CatalogItem, Response> {
    let mut item = services
        .read_models()
        .catalog
        .get(tenant_id, &item_id)
        .ok_or_else(|| errors::internal_error("updated item missing from catalog"))?;
    for event in events {
        item.evolve(event);
    }
    Ok(item)
}

pub async fn movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let item_id = parse_item_id(&id)?;
    let tenant_id = tenant.tenant_id();
    let models = services.read_models();

    let item = models
        .catalog
        .get(tenant_id, &item_id)
        .ok_or_else(|| errors::not_found("item"))?;

    let records: Vec<MovementView> = models
        .ledger
        .for_item(tenant_id, item_id)
        .into_iter()
        .map(|record| {
            let actor = models.users.display_name(tenant_id, &record.recorded_by);
            MovementView::new(record, Some(item.name.clone()), actor)
        })
        .collect();
    Ok(Json(records).into_response())
}

/// Regular items with their threshold and current level.
pub async fn thresholds(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult {
    let items = services.read_models().catalog.thresholds(tenant.tenant_id());
    Ok(Json(items).into_response())
}

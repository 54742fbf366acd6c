use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use serde_json::json;

use stockroom_core::{Quantity, TenantId};
use stockroom_infra::projections::{MovementRecord, ReadModels};
use stockroom_infra::read_model::Pagination;
use stockroom_inventory::{Direction, Item, ItemCommand, ItemEvent, ItemId, MovementId, RecordMovement};

use super::items::parse_item_id;
use crate::app::dto::{MovementRecorded, MovementView, PageQuery, RecordMovementRequest};
use crate::app::errors::{self, ApiResult};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/movements", get(list).post(record))
        .route("/movements/:id", get(get_movement))
}

fn view(models: &ReadModels, tenant_id: TenantId, record: MovementRecord) -> MovementView {
    let item_name = models.catalog.get(tenant_id, &record.item_id).map(|i| i.name);
    let actor = models.users.display_name(tenant_id, &record.recorded_by);
    MovementView::new(record, item_name, actor)
}

pub async fn record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<RecordMovementRequest>, JsonRejection>,
) -> ApiResult {
    let req = errors::body(body)?;
    let tenant_id = tenant.tenant_id();

    let item_id = parse_item_id(&req.item_id)?;
    let direction = req
        .direction
        .parse::<Direction>()
        .map_err(errors::domain_error_to_response)?;
    let quantity = Quantity::positive(req.quantity).map_err(errors::domain_error_to_response)?;

    let movement_id = MovementId::new();
    let cmd = ItemCommand::RecordMovement(RecordMovement {
        tenant_id,
        item_id,
        movement_id,
        direction,
        quantity,
        reason: req.reason,
        image_refs: req.image_refs,
        actor: principal.user_id(),
        occurred_at: Utc::now(),
    });

    let committed = services
        .execute::<Item>(tenant_id, cmd, |id| Item::empty(ItemId::new(id)))
        .await
        .map_err(errors::dispatch_error_to_response)?;

    let moved = committed
        .events
        .iter()
        .find_map(|e| match e {
            ItemEvent::StockMoved(m) => Some(m),
            _ => None,
        })
        .ok_or_else(|| errors::internal_error("movement committed without a stock event"))?;
    let warnings = moved.warnings();

    tracing::info!(
        %tenant_id,
        %item_id,
        %movement_id,
        direction = direction.as_str(),
        quantity = %quantity,
        stock_after = %moved.stock_after,
        "stock movement recorded"
    );

    // Names are joined best-effort; the movement itself comes from the commit.
    let models = services.read_models();
    let item_name = models.catalog.get(tenant_id, &item_id).map(|i| i.name);
    let actor = models.users.display_name(tenant_id, &moved.recorded_by);

    Ok((
        StatusCode::CREATED,
        Json(MovementRecorded {
            movement: MovementView::from_event(moved, item_name, actor),
            stock_after: moved.stock_after,
            warnings,
        }),
    )
        .into_response())
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult {
    let page_query = errors::query(query)?;
    let tenant_id = tenant.tenant_id();
    let models = services.read_models();

    let page = models
        .ledger
        .list(tenant_id, Pagination::new(page_query.limit, page_query.offset));
    let has_more = page.has_more();
    let items: Vec<MovementView> = page
        .items
        .into_iter()
        .map(|record| view(models, tenant_id, record))
        .collect();

    Ok(Json(json!({
        "items": items,
        "total": page.total,
        "limit": page.limit,
        "offset": page.offset,
        "has_more": has_more,
    }))
    .into_response())
}

pub async fn get_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let movement_id = id
        .parse::<MovementId>()
        .map_err(|_| errors::invalid_id("movement"))?;
    let tenant_id = tenant.tenant_id();
    let models = services.read_models();

    let record = models
        .ledger
        .get(tenant_id, &movement_id)
        .ok_or_else(|| errors::not_found("movement"))?;
    Ok(Json(view(models, tenant_id, record)).into_response())
}

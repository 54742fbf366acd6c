//! Image uploads referenced by movement records.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Extension, Path, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};

use stockroom_infra::blob_store::decode_data_url;

use crate::app::dto::{UploadRequest, UploadResponse};
use crate::app::errors::{self, ApiResult};
use crate::app::services::AppServices;
use crate::context::TenantContext;

/// Base64 inflates by 4/3; leave room for the JSON envelope.
fn body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes / 3 * 4 + 1024
}

pub fn router(max_upload_bytes: usize) -> Router {
    Router::new()
        .route(
            "/uploads",
            post(upload).layer(DefaultBodyLimit::max(body_limit(max_upload_bytes))),
        )
        .route("/uploads/:name", get(download))
}

pub async fn upload(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    body: Result<Json<UploadRequest>, JsonRejection>,
) -> ApiResult {
    let req = errors::body(body)?;
    let tenant_id = tenant.tenant_id();

    let image = decode_data_url(&req.data, services.config().max_upload_bytes)
        .map_err(errors::blob_error_to_response)?;
    let size = image.bytes.len();
    let image_ref = services
        .blobs()
        .put(tenant_id, image)
        .await
        .map_err(errors::blob_error_to_response)?;

    tracing::info!(%tenant_id, %image_ref, size, "image stored");
    Ok((StatusCode::CREATED, Json(UploadResponse { image_ref })).into_response())
}

pub async fn download(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(name): Path<String>,
) -> ApiResult {
    let blob = services
        .blobs()
        .get(tenant.tenant_id(), &name)
        .await
        .map_err(errors::blob_error_to_response)?;
    Ok(([(header::CONTENT_TYPE, blob.content_type)], blob.bytes).into_response())
}

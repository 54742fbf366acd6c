use axum::{Router, routing::get};

pub mod admin;
pub mod auth;
pub mod items;
pub mod movements;
pub mod system;
pub mod uploads;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router(max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .route("/thresholds", get(items::thresholds))
        .merge(items::router())
        .merge(movements::router())
        .merge(uploads::router(max_upload_bytes))
        .nest("/admin", admin::router())
}

//! HTTP application wiring (axum router + service wiring).
//!
//! - `services.rs`: backend wiring (event store, dispatcher, read models, blobs)
//! - `routes/`: HTTP handlers, one file per area
//! - `dto.rs`: request bodies and response views
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use stockroom_auth::JwtValidator;
use stockroom_infra::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, BuildError};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: AppConfig) -> Result<Router, BuildError> {
    let services = Arc::new(services::build_services(config).await?);
    Ok(router(services))
}

/// Router over already constructed services.
pub fn router(services: Arc<AppServices>) -> Router {
    let jwt: Arc<dyn JwtValidator> = services.jwt().clone();
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require an access token; tenant comes from it.
    let protected = routes::router(services.config().max_upload_bytes).layer(
        axum::middleware::from_fn_with_state(auth_state, middleware::auth_middleware),
    );

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/auth", routes::auth::router())
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(Extension(services)),
        )
}

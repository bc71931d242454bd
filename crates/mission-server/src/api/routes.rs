//! REST API routes.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::missions;
use crate::api::request_id::{ensure_request_id, RequestId};
use crate::config::Config;
use crate::state::AppState;

/// Create the API router.
pub fn create_router(config: &Config) -> Router<Arc<AppState>> {
    let mission_routes = Router::new()
        .route(
            "/missions",
            get(missions::list_missions).post(missions::create_mission),
        )
        // Accept the trailing-slash form too.
        .route(
            "/missions/",
            get(missions::list_missions).post(missions::create_mission),
        )
        .route(
            "/missions/:id",
            get(missions::get_mission)
                .put(missions::update_mission)
                .delete(missions::delete_mission),
        )
        .route("/missions/:id/annotations", post(missions::create_annotation))
        .route("/missions/:id/no_fly_zones", post(missions::create_no_fly_zone));

    Router::new()
        .nest("/api", mission_routes)
        .route("/health", get(|| async { "OK" }))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(middleware::from_fn(ensure_request_id))
}

async fn not_found(request_id: RequestId) -> Response {
    ApiError::NotFound("Resource not found".to_string()).into_envelope(&request_id)
}

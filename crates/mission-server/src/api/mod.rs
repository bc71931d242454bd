//! API routes for the mission server.

pub mod error;
pub mod missions;
pub mod request_id;
pub mod response;
mod routes;

use crate::config::Config;
use crate::state::AppState;
use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn routes(config: &Config) -> Router<Arc<AppState>> {
    routes::create_router(config)
}

/// Full application: routes, state, request tracing and CORS.
pub fn app(state: Arc<AppState>) -> Router {
    let config = state.config().clone();
    routes(&config)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests;

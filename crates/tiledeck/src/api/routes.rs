//! API route definitions.

use std::path::PathBuf;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::handlers;
use super::state::AppState;
use crate::admission::admission_middleware;

/// Create the application router.
///
/// Every `/api` route sits behind admission. Static assets, when a directory
/// is given, are served without a token.
pub fn create_router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let api_routes = Router::new()
        .route("/api/health", get(handlers::health))
        .route(
            "/api/settings",
            get(handlers::get_settings).post(handlers::update_settings),
        )
        .route("/api/settings/launcher", post(handlers::set_launcher))
        .route("/api/settings/autodetect", post(handlers::autodetect))
        .route("/api/tiles", get(handlers::list_tiles))
        .route("/api/tiles/upsert", post(handlers::upsert_tile))
        .route("/api/tiles/delete", post(handlers::delete_tile))
        .route("/api/tiles/{id}", get(handlers::get_tile))
        .route("/api/programs", get(handlers::list_programs))
        .route("/api/programs/resolve", post(handlers::resolve_program))
        .route("/api/programs/refresh", post(handlers::refresh_programs))
        .route("/api/run", post(handlers::run_tile))
        .route("/api/actions/{name}", post(handlers::run_action))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admission_middleware,
        ))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => api_routes.fallback_service(ServeDir::new(dir)),
        None => api_routes,
    };
    router.layer(trace_layer)
}

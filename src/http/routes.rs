use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let assets = ServeDir::new(state.assets_dir.as_path());

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Scenario background
        .route("/scenario/image", post(handlers::scenario_image))
        // Session control
        .route("/sessions", post(handlers::create_session))
        .route("/sessions/:session_id/audio", post(handlers::upload_audio))
        .route("/sessions/:session_id/stop", post(handlers::stop_session))
        // Session queries
        .route(
            "/sessions/:session_id/status",
            get(handlers::get_session_status),
        )
        .route(
            "/sessions/:session_id/transcript",
            get(handlers::get_session_transcript),
        )
        // Generated images, uploads and rendered replies
        .nest_service("/assets", assets)
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

mod handlers;
pub mod middleware;
mod state;

pub use state::*;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use middleware::SecurityConfig;

/// Pasted feedback can be far larger than axum's default body limit.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Router without authentication (local use and tests).
pub fn create_router(state: AppState) -> Router {
    create_router_with_security(state, SecurityConfig::disabled())
}

pub fn create_router_with_security(state: AppState, security: SecurityConfig) -> Router {
    let cors = middleware::cors_layer(&security);

    let api = Router::new()
        // Sessions
        .route(
            "/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route(
            "/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/{id}/summary", get(handlers::get_summary))
        .route("/sessions/{id}/export", get(handlers::export_session))
        // Review edits
        .route(
            "/sessions/{id}/records/{index}",
            put(handlers::update_record),
        )
        .route(
            "/sessions/{id}/records/{index}/toggle-incorrect",
            post(handlers::toggle_incorrect),
        )
        .route_layer(from_fn_with_state(security, middleware::auth_middleware))
        // Health (unauthenticated)
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

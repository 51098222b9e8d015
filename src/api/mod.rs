//! HTTP layer - handlers and routing
//!
//! - `/noticias` - news list, details, background create/edit forms, delete
//! - `/tags` - tag CRUD pages
//! - `/usuarios` - user CRUD pages
//! - `/static` - embedded client script
//! - `/health` - database liveness

pub mod antiforgery;
pub mod common;
pub mod flash;
pub mod middleware;
pub mod news;
pub mod static_files;
pub mod tags;
pub mod users;

use axum::{
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use tower_http::trace::TraceLayer;

pub use antiforgery::AntiForgery;
pub use middleware::{AppError, AppState};

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::to("/noticias") }))
        .route("/health", get(health))
        .route("/static/{*path}", get(static_files::serve_static))
        .nest("/noticias", news::router())
        .nest("/tags", tags::router())
        .nest("/usuarios", users::router())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            antiforgery::protect,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health(State(state): State<AppState>) -> Response {
    match state.pool.ping().await {
        Ok(()) => Json(serde_json::json!({ "status": "ok" })).into_response(),
        Err(e) => {
            tracing::error!("Health check failed: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "error" })),
            )
                .into_response()
        }
    }
}

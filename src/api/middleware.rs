//! Shared state and error responses for the HTTP layer

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::api::antiforgery::AntiForgery;
use crate::db::repositories::{SqlxNewsRepository, SqlxTagRepository, SqlxUserRepository};
use crate::db::DynDatabasePool;
use crate::services::{NewsService, TagService, UserService};
use crate::views::ViewEngine;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub tag_service: Arc<TagService>,
    pub news_service: Arc<NewsService>,
    pub views: Arc<ViewEngine>,
    pub antiforgery: Arc<AntiForgery>,
}

impl AppState {
    /// Wire the sqlx repositories and services over one pool.
    pub fn new(pool: DynDatabasePool, views: ViewEngine, antiforgery: AntiForgery) -> Self {
        Self {
            user_service: Arc::new(UserService::new(SqlxUserRepository::boxed(pool.clone()))),
            tag_service: Arc::new(TagService::new(SqlxTagRepository::boxed(pool.clone()))),
            news_service: Arc::new(NewsService::new(SqlxNewsRepository::boxed(pool.clone()))),
            pool,
            views: Arc::new(views),
            antiforgery: Arc::new(antiforgery),
        }
    }
}

/// Error returned by handlers
#[derive(Debug)]
pub enum AppError {
    /// Unknown id, or a route id that disagrees with the submitted one
    NotFound,
    /// Rejected request rendered as an HTML page
    BadRequest(String),
    /// Rejected background post, rendered as `{ok:false,error}`
    JsonFailure(String),
    /// Unanticipated failure; logged, never shown
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                Html(ViewEngine::simple_error_page(
                    "Not found",
                    "The requested item does not exist.",
                )),
            )
                .into_response(),
            AppError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Html(ViewEngine::simple_error_page("Bad request", &message)),
            )
                .into_response(),
            AppError::JsonFailure(error) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "ok": false, "error": error })),
            )
                .into_response(),
            AppError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html(ViewEngine::simple_error_page(
                        "Error",
                        "Something went wrong while processing your request.",
                    )),
                )
                    .into_response()
            }
        }
    }
}

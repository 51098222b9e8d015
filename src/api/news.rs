//! News pages
//!
//! The list and details pages are server-rendered. Creating and editing go
//! through a partial form loaded in the background; the client script posts
//! the form as JSON and gets `{ok, id}` or `{ok:false, error}` back.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tera::Context as TeraContext;

use crate::api::common::Page;
use crate::api::flash::{redirect_with_flash, Flash};
use crate::api::middleware::{AppError, AppState};
use crate::models::NewsInput;
use crate::services::NewsServiceError;

const INDEX: &str = "/noticias";
const SAVE_FAILED: &str = "Could not save the news item.";

/// Build the news router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/details/{id}", get(details))
        .route("/create", get(create_form).post(create))
        .route("/edit/{id}", get(edit_form).post(edit))
        .route("/delete/{id}", get(delete_confirm).post(delete))
}

async fn index(State(state): State<AppState>, page: Page) -> Result<Response, AppError> {
    let news = state.news_service.list().await.map_err(anyhow::Error::from)?;

    let mut ctx = page.context("news");
    ctx.insert("news_list", &news);
    page.render(&state, "news/index.html", &ctx)
}

async fn show(state: &AppState, page: &Page, id: i64, template: &str) -> Result<Response, AppError> {
    let news = state
        .news_service
        .get_by_id(id)
        .await
        .map_err(anyhow::Error::from)?
        .ok_or(AppError::NotFound)?;

    let mut ctx = page.context("news");
    ctx.insert("news", &news);
    page.render(state, template, &ctx)
}

async fn details(
    State(state): State<AppState>,
    page: Page,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    show(&state, &page, id, "news/details.html").await
}

async fn delete_confirm(
    State(state): State<AppState>,
    page: Page,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    show(&state, &page, id, "news/delete.html").await
}

/// Render the partial form with the author and tag choices.
async fn render_form(
    state: &AppState,
    page: &Page,
    action: &str,
    mut input: NewsInput,
) -> Result<Response, AppError> {
    let users = state.user_service.list().await.map_err(anyhow::Error::from)?;
    let tags = state.tag_service.list().await.map_err(anyhow::Error::from)?;

    if input.author_id == 0 {
        input.author_id = users.first().map_or(0, |u| u.id);
    }

    let mut ctx = TeraContext::new();
    ctx.insert("csrf_token", &page.token);
    ctx.insert("action", action);
    ctx.insert("form", &FormView::from(&input));
    ctx.insert("users", &users);
    ctx.insert("tags", &tags);

    Ok(Html(state.views.render("news/_form.html", &ctx)?).into_response())
}

/// Form values with template-friendly names
#[derive(serde::Serialize)]
struct FormView<'a> {
    id: i64,
    title: &'a str,
    body: &'a str,
    author_id: i64,
    tag_ids: &'a [i64],
}

impl<'a> From<&'a NewsInput> for FormView<'a> {
    fn from(input: &'a NewsInput) -> Self {
        Self {
            id: input.id,
            title: &input.title,
            body: &input.body,
            author_id: input.author_id,
            tag_ids: &input.tag_ids,
        }
    }
}

async fn create_form(State(state): State<AppState>, page: Page) -> Result<Response, AppError> {
    render_form(&state, &page, "/noticias/create", NewsInput::default()).await
}

async fn edit_form(
    State(state): State<AppState>,
    page: Page,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let edit = state
        .news_service
        .get_for_edit(id)
        .await
        .map_err(anyhow::Error::from)?
        .ok_or(AppError::NotFound)?;

    let input = NewsInput {
        id: edit.news.id,
        title: edit.news.title,
        body: edit.news.body,
        author_id: edit.news.author_id,
        tag_ids: edit.tag_ids,
    };
    render_form(&state, &page, &format!("/noticias/edit/{}", id), input).await
}

fn parse(body: Result<Json<NewsInput>, JsonRejection>) -> Result<NewsInput, AppError> {
    let Json(input) = body.map_err(|e| {
        tracing::debug!("Rejected news body: {}", e);
        AppError::JsonFailure("Invalid data.".to_string())
    })?;
    Ok(input)
}

fn validate(input: &NewsInput) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::JsonFailure(errors.to_string()))
}

async fn create(
    State(state): State<AppState>,
    body: Result<Json<NewsInput>, JsonRejection>,
) -> Result<Response, AppError> {
    let input = parse(body)?;
    validate(&input)?;

    match state
        .news_service
        .create(input.to_news(0), &input.distinct_tag_ids())
        .await
    {
        Ok(id) => Ok(Json(json!({ "ok": true, "id": id })).into_response()),
        Err(NewsServiceError::InternalError(e)) => {
            tracing::error!("Failed to create news: {:#}", e);
            Err(AppError::JsonFailure(SAVE_FAILED.to_string()))
        }
        Err(e) => Err(AppError::JsonFailure(e.to_string())),
    }
}

async fn edit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Result<Json<NewsInput>, JsonRejection>,
) -> Result<Response, AppError> {
    let input = parse(body)?;
    if input.id != id {
        return Err(AppError::NotFound);
    }
    validate(&input)?;

    match state
        .news_service
        .update(input.to_news(id), &input.distinct_tag_ids())
        .await
    {
        Ok(()) => Ok(Json(json!({ "ok": true })).into_response()),
        Err(NewsServiceError::InternalError(e)) => {
            tracing::error!("Failed to update news {}: {:#}", id, e);
            Err(AppError::JsonFailure(SAVE_FAILED.to_string()))
        }
        Err(e) => Err(AppError::JsonFailure(e.to_string())),
    }
}

async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let flash = match state.news_service.delete(id).await {
        Ok(()) => Flash::success("News item deleted successfully."),
        Err(NewsServiceError::InternalError(e)) => {
            tracing::error!("Failed to delete news {}: {:#}", id, e);
            Flash::error("Could not delete the news item.")
        }
        Err(e) => Flash::error(e.to_string()),
    };
    redirect_with_flash(INDEX, flash)
}

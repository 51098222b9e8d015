//! Tag pages
//!
//! - GET  /tags                - list
//! - GET  /tags/details/{id}   - details
//! - GET|POST /tags/create     - create form
//! - GET|POST /tags/edit/{id}  - edit form
//! - GET|POST /tags/delete/{id} - delete confirmation

use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Form, Router,
};

use crate::api::common::{insert_errors, Page};
use crate::api::flash::{redirect_with_flash, Flash};
use crate::api::middleware::{AppError, AppState};
use crate::models::{Tag, TagInput, ValidationErrors};
use crate::services::TagServiceError;

const INDEX: &str = "/tags";

/// Build the tags router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/details/{id}", get(details))
        .route("/create", get(create_form).post(create))
        .route("/edit/{id}", get(edit_form).post(edit))
        .route("/delete/{id}", get(delete_confirm).post(delete))
}

async fn index(State(state): State<AppState>, page: Page) -> Result<Response, AppError> {
    let tags = state.tag_service.list().await.map_err(anyhow::Error::from)?;

    let mut ctx = page.context("tags");
    ctx.insert("tags", &tags);
    page.render(&state, "tags/index.html", &ctx)
}

async fn find(state: &AppState, id: i64) -> Result<Tag, AppError> {
    state
        .tag_service
        .get_by_id(id)
        .await
        .map_err(anyhow::Error::from)?
        .ok_or(AppError::NotFound)
}

async fn details(
    State(state): State<AppState>,
    page: Page,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let tag = find(&state, id).await?;

    let mut ctx = page.context("tags");
    ctx.insert("tag", &tag);
    page.render(&state, "tags/details.html", &ctx)
}

fn render_form(
    state: &AppState,
    page: &Page,
    template: &str,
    input: &TagInput,
    errors: &ValidationErrors,
) -> Result<Response, AppError> {
    let mut ctx = page.context("tags");
    ctx.insert("tag", input);
    insert_errors(&mut ctx, errors);
    page.render(state, template, &ctx)
}

async fn create_form(State(state): State<AppState>, page: Page) -> Result<Response, AppError> {
    render_form(
        &state,
        &page,
        "tags/create.html",
        &TagInput::default(),
        &ValidationErrors::new(),
    )
}

async fn create(
    State(state): State<AppState>,
    page: Page,
    Form(input): Form<TagInput>,
) -> Result<Response, AppError> {
    let mut errors = match input.validate() {
        Ok(()) => ValidationErrors::new(),
        Err(errors) => errors,
    };

    if errors.is_empty() {
        match state.tag_service.create(input.clone().into_tag(0)).await {
            Ok(_) => return Ok(redirect_with_flash(INDEX, Flash::success("Tag created successfully."))),
            Err(TagServiceError::DuplicateDescription(msg)) => errors.add("description", msg),
            Err(e) => {
                tracing::error!("Failed to create tag: {:#}", e);
                errors.add("", "Could not save the tag.");
            }
        }
    }

    render_form(&state, &page, "tags/create.html", &input, &errors)
}

async fn edit_form(
    State(state): State<AppState>,
    page: Page,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let tag = find(&state, id).await?;
    render_form(
        &state,
        &page,
        "tags/edit.html",
        &TagInput::from(&tag),
        &ValidationErrors::new(),
    )
}

async fn edit(
    State(state): State<AppState>,
    page: Page,
    Path(id): Path<i64>,
    Form(input): Form<TagInput>,
) -> Result<Response, AppError> {
    if input.id != id {
        return Err(AppError::NotFound);
    }

    let mut errors = match input.validate() {
        Ok(()) => ValidationErrors::new(),
        Err(errors) => errors,
    };

    if errors.is_empty() {
        match state.tag_service.update(input.clone().into_tag(id)).await {
            Ok(_) => return Ok(redirect_with_flash(INDEX, Flash::success("Tag updated successfully."))),
            Err(TagServiceError::NotFound(_)) => return Err(AppError::NotFound),
            Err(TagServiceError::DuplicateDescription(msg)) | Err(TagServiceError::InUse(msg)) => {
                errors.add("description", msg)
            }
            Err(TagServiceError::InternalError(e)) => {
                tracing::error!("Failed to update tag {}: {:#}", id, e);
                errors.add("", "Could not save the tag.");
            }
        }
    }

    render_form(&state, &page, "tags/edit.html", &input, &errors)
}

async fn delete_confirm(
    State(state): State<AppState>,
    page: Page,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let tag = find(&state, id).await?;

    let mut ctx = page.context("tags");
    ctx.insert("tag", &tag);
    page.render(&state, "tags/delete.html", &ctx)
}

async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let flash = match state.tag_service.delete(id).await {
        Ok(()) => Flash::success("Tag deleted successfully."),
        Err(TagServiceError::InternalError(e)) => {
            tracing::error!("Failed to delete tag {}: {:#}", id, e);
            Flash::error("Could not delete the tag.")
        }
        Err(e) => Flash::error(e.to_string()),
    };
    redirect_with_flash(INDEX, flash)
}

//! User pages
//!
//! Same page set as tags, mounted under `/usuarios`.

use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Form, Router,
};

use crate::api::common::{insert_errors, Page};
use crate::api::flash::{redirect_with_flash, Flash};
use crate::api::middleware::{AppError, AppState};
use crate::models::{User, UserInput, ValidationErrors};
use crate::services::UserServiceError;

const INDEX: &str = "/usuarios";

/// Build the users router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/details/{id}", get(details))
        .route("/create", get(create_form).post(create))
        .route("/edit/{id}", get(edit_form).post(edit))
        .route("/delete/{id}", get(delete_confirm).post(delete))
}

async fn index(State(state): State<AppState>, page: Page) -> Result<Response, AppError> {
    let users = state.user_service.list().await.map_err(anyhow::Error::from)?;

    let mut ctx = page.context("users");
    ctx.insert("users", &users);
    page.render(&state, "users/index.html", &ctx)
}

async fn find(state: &AppState, id: i64) -> Result<User, AppError> {
    state
        .user_service
        .get_by_id(id)
        .await
        .map_err(anyhow::Error::from)?
        .ok_or(AppError::NotFound)
}

async fn show(state: &AppState, page: &Page, id: i64, template: &str) -> Result<Response, AppError> {
    let user = find(state, id).await?;

    let mut ctx = page.context("users");
    ctx.insert("user", &user);
    page.render(state, template, &ctx)
}

async fn details(
    State(state): State<AppState>,
    page: Page,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    show(&state, &page, id, "users/details.html").await
}

async fn delete_confirm(
    State(state): State<AppState>,
    page: Page,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    show(&state, &page, id, "users/delete.html").await
}

fn render_form(
    state: &AppState,
    page: &Page,
    template: &str,
    input: &UserInput,
    errors: &ValidationErrors,
) -> Result<Response, AppError> {
    let mut ctx = page.context("users");
    ctx.insert("user", input);
    insert_errors(&mut ctx, errors);
    page.render(state, template, &ctx)
}

async fn create_form(State(state): State<AppState>, page: Page) -> Result<Response, AppError> {
    render_form(
        &state,
        &page,
        "users/create.html",
        &UserInput::default(),
        &ValidationErrors::new(),
    )
}

async fn create(
    State(state): State<AppState>,
    page: Page,
    Form(input): Form<UserInput>,
) -> Result<Response, AppError> {
    let mut errors = input.validate().err().unwrap_or_default();

    if errors.is_empty() {
        match state.user_service.create(input.clone().into_user(0)).await {
            Ok(_) => return Ok(redirect_with_flash(INDEX, Flash::success("User created successfully."))),
            Err(UserServiceError::DuplicateEmail(msg)) => errors.add("", msg),
            Err(e) => {
                tracing::error!("Failed to create user: {:#}", e);
                errors.add("", "Could not save the user.");
            }
        }
    }

    render_form(&state, &page, "users/create.html", &input, &errors)
}

async fn edit_form(
    State(state): State<AppState>,
    page: Page,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let user = find(&state, id).await?;
    render_form(
        &state,
        &page,
        "users/edit.html",
        &UserInput::from(&user),
        &ValidationErrors::new(),
    )
}

async fn edit(
    State(state): State<AppState>,
    page: Page,
    Path(id): Path<i64>,
    Form(input): Form<UserInput>,
) -> Result<Response, AppError> {
    if input.id != id {
        return Err(AppError::NotFound);
    }

    let mut errors = input.validate().err().unwrap_or_default();

    if errors.is_empty() {
        match state.user_service.update(input.clone().into_user(id)).await {
            Ok(_) => return Ok(redirect_with_flash(INDEX, Flash::success("User updated successfully."))),
            Err(UserServiceError::NotFound(_)) => return Err(AppError::NotFound),
            Err(UserServiceError::DuplicateEmail(msg)) => errors.add("", msg),
            Err(UserServiceError::InternalError(e)) => {
                tracing::error!("Failed to update user {}: {:#}", id, e);
                errors.add("", "Could not save the user.");
            }
        }
    }

    render_form(&state, &page, "users/edit.html", &input, &errors)
}

async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let flash = match state.user_service.delete(id).await {
        Ok(()) => Flash::success("User deleted successfully."),
        Err(UserServiceError::InternalError(e)) => {
            // Usually the user still authors news
            tracing::error!("Failed to delete user {}: {:#}", id, e);
            Flash::error("Could not delete the user.")
        }
        Err(e) => Flash::error(e.to_string()),
    };
    redirect_with_flash(INDEX, flash)
}

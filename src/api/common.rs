//! Page rendering helpers shared by the entity handlers

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderValue},
    response::{Html, IntoResponse, Response},
};
use tera::Context as TeraContext;

use crate::api::antiforgery::AntiForgeryToken;
use crate::api::flash::Flash;
use crate::api::middleware::{AppError, AppState};
use crate::models::ValidationErrors;

/// Per-request data every page needs: the form token and a pending flash
#[derive(Debug, Clone)]
pub struct Page {
    pub token: String,
    pub flash: Option<Flash>,
}

impl FromRequestParts<AppState> for Page {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AntiForgeryToken(token) = AntiForgeryToken::from_request_parts(parts, state).await?;
        Ok(Page {
            token,
            flash: Flash::from_headers(&parts.headers),
        })
    }
}

impl Page {
    /// Base context with the token, the flash and the active section
    pub fn context(&self, section: &str) -> TeraContext {
        let mut ctx = TeraContext::new();
        ctx.insert("csrf_token", &self.token);
        ctx.insert("flash", &self.flash);
        ctx.insert("section", section);
        ctx
    }

    /// Render a template as a 200 page, consuming any flash it displayed.
    pub fn render(&self, state: &AppState, template: &str, ctx: &TeraContext) -> Result<Response, AppError> {
        let html = state.views.render(template, ctx)?;
        let mut response = Html(html).into_response();
        if self.flash.is_some() {
            response
                .headers_mut()
                .append(header::SET_COOKIE, HeaderValue::from_static(Flash::clear_cookie()));
        }
        Ok(response)
    }
}

/// Insert field messages under `errors`, plus the form-wide ones under
/// `summary`.
pub fn insert_errors(ctx: &mut TeraContext, errors: &ValidationErrors) {
    ctx.insert("errors", &errors.to_map());
    let summary: Vec<&str> = errors
        .iter()
        .filter(|e| e.field.is_empty())
        .map(|e| e.message.as_str())
        .collect();
    ctx.insert("summary", &summary);
}

//! One-shot status messages carried across a redirect in a cookie

use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Serialize;

use crate::api::antiforgery::read_cookie;

pub const COOKIE_NAME: &str = "noticias_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    /// `Set-Cookie` value storing this message
    pub fn to_cookie(&self) -> String {
        let kind = match self.kind {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        };
        format!(
            "{}={}:{}; Path=/; Max-Age=60; HttpOnly; SameSite=Lax",
            COOKIE_NAME,
            kind,
            urlencoding::encode(&self.message)
        )
    }

    /// `Set-Cookie` value removing the message once shown
    pub fn clear_cookie() -> &'static str {
        "noticias_flash=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax"
    }

    pub fn parse(value: &str) -> Option<Self> {
        let (kind, message) = value.split_once(':')?;
        let kind = match kind {
            "success" => FlashKind::Success,
            "error" => FlashKind::Error,
            _ => return None,
        };
        let message = urlencoding::decode(message).ok()?.into_owned();
        Some(Self { kind, message })
    }

    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        read_cookie(headers, COOKIE_NAME).and_then(Self::parse)
    }
}

/// 303 redirect carrying a flash message
pub fn redirect_with_flash(to: &str, flash: Flash) -> Response {
    let mut response = Redirect::to(to).into_response();
    if let Ok(value) = HeaderValue::from_str(&flash.to_cookie()) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_cookie_round_trip_keeps_punctuation() {
        let flash = Flash::error("Cannot delete; it is in use: really!");
        let cookie = flash.to_cookie();
        let value = cookie
            .strip_prefix("noticias_flash=")
            .and_then(|rest| rest.split(';').next())
            .unwrap();

        assert!(!value.contains(' '));
        assert_eq!(Flash::parse(value), Some(flash));
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        assert_eq!(Flash::parse("info:hello"), None);
        assert_eq!(Flash::parse("no-separator"), None);
    }

    #[test]
    fn test_redirect_with_flash() {
        let response = redirect_with_flash("/tags", Flash::success("Tag created successfully."));
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/tags");
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("noticias_flash=success:Tag%20created"));
    }
}

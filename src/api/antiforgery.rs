//! Request forgery protection
//!
//! Double-submit scheme without server-side storage:
//! - every browser gets a random nonce in an HttpOnly cookie
//! - pages embed `nonce.HMAC-SHA256(secret, nonce)` as the token
//! - a POST must echo the token, either in the `RequestVerificationToken`
//!   header or in the `__RequestVerificationToken` form field, and its nonce
//!   must match the cookie

use axum::{
    body::{to_bytes, Body},
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::api::middleware::{AppError, AppState};
use crate::config::SecurityConfig;

type HmacSha256 = Hmac<Sha256>;

pub const COOKIE_NAME: &str = "noticias_af";
pub const HEADER_NAME: &str = "RequestVerificationToken";
pub const FORM_FIELD: &str = "__RequestVerificationToken";

/// Largest form body buffered while looking for the token
const MAX_FORM_BYTES: usize = 1024 * 1024;

const INVALID_TOKEN: &str = "The anti-forgery token is missing or invalid.";

/// Token issuer and verifier
pub struct AntiForgery {
    mac: HmacSha256,
}

impl AntiForgery {
    pub fn new(secret: &[u8]) -> anyhow::Result<Self> {
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| anyhow::anyhow!("Invalid anti-forgery secret: {}", e))?;
        Ok(Self { mac })
    }

    /// Use the configured secret, or a random one for this process.
    pub fn from_config(config: &SecurityConfig) -> anyhow::Result<Self> {
        match config.antiforgery_secret.as_deref() {
            Some(secret) => Self::new(secret.as_bytes()),
            None => {
                tracing::info!("No anti-forgery secret configured, generating one");
                let mut secret = Vec::with_capacity(32);
                secret.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
                secret.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
                Self::new(&secret)
            }
        }
    }

    pub fn new_nonce() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// Token to embed in pages served to the holder of `nonce`.
    pub fn token_for(&self, nonce: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(nonce.as_bytes());
        format!("{}.{}", nonce, HEXLOWER.encode(&mac.finalize().into_bytes()))
    }

    /// Check a submitted token against the cookie nonce.
    pub fn verify(&self, token: &str, cookie_nonce: &str) -> bool {
        let Some((nonce, signature)) = token.split_once('.') else {
            return false;
        };
        if nonce.is_empty() || nonce != cookie_nonce {
            return false;
        }
        let Ok(signature) = HEXLOWER.decode(signature.as_bytes()) else {
            return false;
        };

        let mut mac = self.mac.clone();
        mac.update(nonce.as_bytes());
        mac.verify_slice(&signature).is_ok()
    }
}

/// Nonce of the current browser, set by [`protect`]
#[derive(Debug, Clone)]
struct CookieNonce(String);

/// Token for the current browser, for embedding in forms
#[derive(Debug, Clone)]
pub struct AntiForgeryToken(pub String);

impl FromRequestParts<AppState> for AntiForgeryToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let nonce = parts
            .extensions
            .get::<CookieNonce>()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Anti-forgery layer is not installed")))?;
        Ok(AntiForgeryToken(state.antiforgery.token_for(&nonce.0)))
    }
}

/// Read a cookie value from the request headers
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(cookies) = value.to_str() else {
            continue;
        };
        for cookie in cookies.split(';') {
            if let Some((key, val)) = cookie.trim().split_once('=') {
                if key == name && !val.is_empty() {
                    return Some(val);
                }
            }
        }
    }
    None
}

/// Find a field in an `application/x-www-form-urlencoded` body
fn form_field(body: &[u8], name: &str) -> Option<String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body).ok()?;
    pairs
        .into_iter()
        .find_map(|(key, value)| (key == name).then_some(value))
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.starts_with("application/x-www-form-urlencoded"))
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Anti-forgery middleware
///
/// Hands out the nonce cookie and rejects unsafe requests whose token does
/// not verify with 400.
pub async fn protect(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let existing = read_cookie(request.headers(), COOKIE_NAME).map(str::to_string);

    let request = if is_safe(request.method()) {
        request
    } else {
        match check_token(&state, existing.as_deref(), request).await {
            Ok(request) => request,
            Err(rejection) => return rejection.into_response(),
        }
    };

    let (nonce, is_new) = match existing {
        Some(nonce) => (nonce, false),
        None => (AntiForgery::new_nonce(), true),
    };

    let mut request = request;
    request.extensions_mut().insert(CookieNonce(nonce.clone()));
    let mut response = next.run(request).await;

    if is_new {
        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Strict", COOKIE_NAME, nonce);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

async fn check_token(
    state: &AppState,
    cookie_nonce: Option<&str>,
    request: Request,
) -> Result<Request, AppError> {
    let path = request.uri().path().to_string();

    if let Some(token) = request.headers().get(HEADER_NAME) {
        let valid = match (token.to_str(), cookie_nonce) {
            (Ok(token), Some(nonce)) => state.antiforgery.verify(token, nonce),
            _ => false,
        };
        if !valid {
            tracing::warn!("Rejected anti-forgery header token on {}", path);
            return Err(AppError::JsonFailure(INVALID_TOKEN.to_string()));
        }
        return Ok(request);
    }

    if !is_form(request.headers()) {
        tracing::warn!("Missing anti-forgery token on {}", path);
        return Err(AppError::BadRequest(INVALID_TOKEN.to_string()));
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|_| AppError::BadRequest("The form is too large.".to_string()))?;

    let valid = match (form_field(&bytes, FORM_FIELD), cookie_nonce) {
        (Some(token), Some(nonce)) => state.antiforgery.verify(&token, nonce),
        _ => false,
    };
    if !valid {
        tracing::warn!("Rejected anti-forgery form token on {}", path);
        return Err(AppError::BadRequest(INVALID_TOKEN.to_string()));
    }

    Ok(Request::from_parts(parts, Body::from(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> AntiForgery {
        AntiForgery::new(b"test-secret").unwrap()
    }

    #[test]
    fn test_token_verifies_for_its_nonce() {
        let af = issuer();
        let token = af.token_for("abc123");

        assert!(token.starts_with("abc123."));
        assert!(af.verify(&token, "abc123"));
        assert!(!af.verify(&token, "other"));
    }

    #[test]
    fn test_tampered_or_foreign_tokens_fail() {
        let af = issuer();
        let token = af.token_for("abc123");

        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('0') { '1' } else { '0' });
        assert!(!af.verify(&tampered, "abc123"));

        let foreign = AntiForgery::new(b"another-secret").unwrap().token_for("abc123");
        assert!(!af.verify(&foreign, "abc123"));

        assert!(!af.verify("", "abc123"));
        assert!(!af.verify("abc123", "abc123"));
        assert!(!af.verify("abc123.zz", "abc123"));
        assert!(!af.verify(".deadbeef", ""));
    }

    #[test]
    fn test_random_secret_per_instance() {
        let a = AntiForgery::from_config(&SecurityConfig::default()).unwrap();
        let b = AntiForgery::from_config(&SecurityConfig::default()).unwrap();
        let token = a.token_for("n");
        assert!(a.verify(&token, "n"));
        assert!(!b.verify(&token, "n"));
    }

    #[test]
    fn test_configured_secret_is_stable() {
        let config = SecurityConfig {
            antiforgery_secret: Some("shared".into()),
        };
        let token = AntiForgery::from_config(&config).unwrap().token_for("n");
        assert!(AntiForgery::from_config(&config).unwrap().verify(&token, "n"));
    }

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("a=1; noticias_af=xyz; b=2"),
        );
        assert_eq!(read_cookie(&headers, COOKIE_NAME), Some("xyz"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_form_field_decoding() {
        let body = b"description=Hello+world&__RequestVerificationToken=n.ab%2Bc";
        assert_eq!(form_field(body, FORM_FIELD).as_deref(), Some("n.ab+c"));
        assert_eq!(form_field(body, "description").as_deref(), Some("Hello world"));
        assert_eq!(form_field(body, "absent"), None);
    }

    #[test]
    fn test_form_field_first_occurrence_and_bad_bodies() {
        let body = b"__RequestVerificationToken=first&__RequestVerificationToken=second";
        assert_eq!(form_field(body, FORM_FIELD).as_deref(), Some("first"));

        let encoded = b"name=Jos%C3%A9+Silva&__RequestVerificationToken=";
        assert_eq!(form_field(encoded, "name").as_deref(), Some("José Silva"));
        assert_eq!(form_field(encoded, FORM_FIELD).as_deref(), Some(""));

        assert_eq!(form_field(&[0xff, 0xfe, b'='], FORM_FIELD), None);
    }
}

//! Embedded static assets served under `/static`

use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::api::middleware::AppError;
use crate::views::StaticAssets;

/// GET /static/{*path}
pub async fn serve_static(Path(path): Path<String>) -> Result<Response, AppError> {
    // URL decode the path to handle encoded characters
    let decoded = urlencoding::decode(&path).map_err(|_| AppError::NotFound)?;
    let asset_path = decoded.trim_start_matches('/');

    if asset_path.split('/').any(|segment| segment == "..") {
        return Err(AppError::NotFound);
    }

    let content = StaticAssets::get(asset_path).ok_or(AppError::NotFound)?;
    Ok(build_response(asset_path, content.data.into_owned()))
}

fn build_response(path: &str, data: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, get_content_type(path)),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        data,
    )
        .into_response()
}

/// Get content type from file extension
fn get_content_type(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("") {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(get_content_type("js/noticias.js"), "application/javascript");
        assert_eq!(get_content_type("css/site.css"), "text/css");
        assert_eq!(get_content_type("README"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_serve_embedded_script() {
        let response = serve_static(Path("js/noticias.js".to_string())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/javascript"
        );
    }

    #[tokio::test]
    async fn test_missing_or_escaping_paths_are_not_found() {
        assert!(matches!(
            serve_static(Path("js/missing.js".to_string())).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(
            serve_static(Path("../Cargo.toml".to_string())).await,
            Err(AppError::NotFound)
        ));
    }
}

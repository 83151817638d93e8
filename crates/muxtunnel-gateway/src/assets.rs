//! Static files and the background-image asset.

use std::path::{Component, Path, PathBuf};

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::SharedGateway;

/// `GET /api/settings/background` — streams the configured background file.
pub async fn background(State(gateway): State<SharedGateway>) -> Result<Response, ApiError> {
    let path = gateway
        .settings
        .background_image_path()
        .ok_or_else(|| ApiError::not_found("no local background image configured"))?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::internal(format!("failed to read background image: {e}")))?;

    Ok(([(header::CONTENT_TYPE, content_type_for(&path))], bytes).into_response())
}

/// Fallback handler: static files with traversal stripped, SPA routing for
/// extension-less paths.
pub async fn static_fallback(State(gateway): State<SharedGateway>, uri: Uri) -> Response {
    let Some(static_dir) = gateway.static_dir.clone() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let requested = sanitize_path(uri.path());
    let file_path = if requested.as_os_str().is_empty() {
        static_dir.join("index.html")
    } else {
        static_dir.join(&requested)
    };

    match tokio::fs::read(&file_path).await {
        Ok(bytes) => {
            ([(header::CONTENT_TYPE, content_type_for(&file_path))], bytes).into_response()
        }
        Err(_) => {
            // Unknown non-dotted paths are SPA routes.
            let last = requested
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if !last.contains('.') {
                match tokio::fs::read(static_dir.join("index.html")).await {
                    Ok(bytes) => {
                        ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], bytes)
                            .into_response()
                    }
                    Err(_) => StatusCode::NOT_FOUND.into_response(),
                }
            } else {
                StatusCode::NOT_FOUND.into_response()
            }
        }
    }
}

/// Strip anything that could escape the static root: leading slashes,
/// `..` components, and absolute prefixes.
pub(crate) fn sanitize_path(raw: &str) -> PathBuf {
    let decoded = raw.trim_start_matches('/');
    let mut clean = PathBuf::new();
    for component in Path::new(decoded).components() {
        if let Component::Normal(part) = component {
            clean.push(part);
        }
    }
    clean
}

pub(crate) fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "text/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

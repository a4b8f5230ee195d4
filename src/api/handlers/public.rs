use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::layout::Category;
use crate::storage::models::UserId;
use crate::AppState;

// Downloads are keyed only by `{user_id}/{file_name}`; there is no ownership
// check beyond the file existing.

/// Route: GET /upload/converted/:user_id/:file_name
pub async fn serve_converted(
    State(state): State<Arc<AppState>>,
    Path((user_id, file_name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    serve_artifact(&state, Category::Converted, &user_id, &file_name).await
}

/// Route: GET /upload/origin/:user_id/:file_name
pub async fn serve_origin(
    State(state): State<Arc<AppState>>,
    Path((user_id, file_name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    serve_artifact(&state, Category::Origin, &user_id, &file_name).await
}

async fn serve_artifact(
    state: &AppState,
    category: Category,
    user_id: &str,
    file_name: &str,
) -> Result<Response, ApiError> {
    let user_id: UserId = user_id
        .parse()
        .map_err(|_| ApiError::not_found("File not found"))?;
    let path = state
        .pipeline
        .layout()
        .artifact_path(category, user_id, file_name)
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return Err(ApiError::not_found("File not found")),
    }

    let data = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to read file: {e}")))?;

    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();

    let mime = mime_guess::from_path(file_name).first_or_octet_stream();
    headers.insert(
        header::CONTENT_TYPE,
        mime.as_ref()
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );

    if let Ok(value) = format!("inline; filename=\"{file_name}\"").parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    // Stored names carry a random suffix and are never rewritten
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("public, max-age=3600"),
    );

    Ok(response)
}

use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::actor::Actor;
use crate::api::response::{ApiError, AppQuery, JSend, JSendPaginated, Pagination};
use crate::pipeline::IncomingFile;
use crate::quota::QuotaUsage;
use crate::storage::models::{FileRecord, UserId};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AuthorResponse {
    pub id: UserId,
}

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub author: AuthorResponse,
    pub converted_file_path: String,
    pub created_at: String,
    pub file_name: String,
    pub id: String,
    pub origin_file_path: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ListFilesParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn create_file(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    mut multipart: Multipart,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    let mut incoming: Option<IncomingFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        if field.name() != Some("file") {
            // Ignore unknown fields
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;

        if data.len() as u64 > state.config.max_upload_size {
            return Err(ApiError::payload_too_large(format!(
                "File exceeds maximum upload size of {} bytes",
                state.config.max_upload_size
            )));
        }

        incoming = Some(IncomingFile {
            original_name,
            data,
        });
    }

    let pipeline = state.pipeline.clone();
    let record = tokio::task::spawn_blocking(move || pipeline.upload(&actor, incoming))
        .await
        .map_err(|e| ApiError::internal(format!("Upload task failed: {e}")))??;

    Ok(JSend::success(file_to_response(&record)))
}

pub async fn get_file(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    let file = state.pipeline.find_owned(&actor, &id)?;
    Ok(JSend::success(file_to_response(&file)))
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    let file = state.pipeline.find_owned(&actor, &id)?;

    let pipeline = state.pipeline.clone();
    let report = tokio::task::spawn_blocking(move || pipeline.delete(&file))
        .await
        .map_err(|e| ApiError::internal(format!("Delete task failed: {e}")))??;

    if !report.is_clean() {
        tracing::warn!(
            file_id = %id,
            failed = report.failed.len(),
            "Record deleted but some artifacts remain on disk"
        );
    }

    Ok(JSend::success(()))
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    AppQuery(params): AppQuery<ListFilesParams>,
) -> Result<Json<JSendPaginated<FileResponse>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let (files, total) = state
        .db
        .list_files_by_author(actor.id, params.limit as usize, params.offset as usize)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(JSendPaginated::success(
        files.iter().map(file_to_response).collect(),
        Pagination {
            limit: params.limit,
            offset: params.offset,
            total,
        },
    ))
}

pub async fn usage(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<JSend<QuotaUsage>>, ApiError> {
    let usage = state
        .pipeline
        .quota()
        .usage(actor.id)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(JSend::success(usage))
}

// ============================================================================
// Helpers
// ============================================================================

fn file_to_response(file: &FileRecord) -> FileResponse {
    FileResponse {
        author: AuthorResponse { id: file.author_id },
        converted_file_path: file.converted_file_path.clone(),
        created_at: file.created_at.to_rfc3339(),
        file_name: file.file_name.clone(),
        id: file.id.clone(),
        origin_file_path: file.origin_file_path.clone(),
        updated_at: file.updated_at.to_rfc3339(),
    }
}

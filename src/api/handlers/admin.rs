use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::layout::Category;
use crate::pipeline::CleanupReport;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub files_deleted: u64,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn admin_purge(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<PurgeResponse>>, ApiError> {
    let stats = state
        .db
        .purge_all()
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let root = state.pipeline.layout().root().to_path_buf();
    let report = tokio::task::spawn_blocking(move || {
        let mut report = CleanupReport::default();
        for category in [Category::Origin, Category::Converted] {
            report.remove(&root.join(category.dir_name()));
        }
        report
    })
    .await
    .map_err(|e| ApiError::internal(format!("Purge task failed: {e}")))?;

    tracing::warn!(
        files = stats.files,
        artifact_failures = report.failed.len(),
        "Purged all data"
    );

    Ok(JSend::success(PurgeResponse {
        files_deleted: stats.files,
    }))
}

//! Shared test helpers for asset-converter unit tests.

use std::sync::Arc;

use crate::config::{Config, NodeConfig, StorageConfig};
use crate::layout::StorageLayout;
use crate::pipeline::UploadPipeline;
use crate::quota::QuotaLimits;
use crate::storage::Database;
use crate::AppState;

/// Create a test AppState with a temporary database and upload root.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    test_state_with_limits(temp_dir, QuotaLimits::default())
}

pub fn test_state_with_limits(temp_dir: &tempfile::TempDir, limits: QuotaLimits) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let upload_root = temp_dir.path().join("upload");

    let config = Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
        },
        storage: StorageConfig {
            upload_root: upload_root.to_string_lossy().to_string(),
        },
        quota: limits,
        test_mode: true,
        max_upload_size: 10 * 1024 * 1024, // 10MB for tests
        max_extracted_size: 50 * 1024 * 1024,
    };

    let db = Database::open(&data_dir).expect("Failed to open test database");
    let pipeline = UploadPipeline::new(db.clone(), StorageLayout::new(&upload_root), limits)
        .with_max_extracted_size(config.max_extracted_size);

    Arc::new(AppState {
        config,
        db,
        pipeline,
    })
}

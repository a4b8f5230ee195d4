//! asset-converter - Upload, convert and serve 3D scene assets per user
//!
//! This crate accepts binary glTF (`.glb`) files and zip archives holding a
//! text glTF scene, converts each to the other representation, and keeps:
//! - Original and converted artifacts in a per-user directory layout
//! - File records in a redb embedded database (ACID, MVCC, crash-safe)
//! - Lifetime and monthly upload quotas counted from those records
//! - A REST API with multipart upload support

pub mod actor;
pub mod api;
pub mod archive;
pub mod config;
pub mod convert;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod quota;
pub mod slug;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use config::Config;
use pipeline::UploadPipeline;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub pipeline: UploadPipeline,
}

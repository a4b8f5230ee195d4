use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the owning user, as issued by the auth gateway.
pub type UserId = u64;

/// Upload formats the pipeline knows how to convert.
///
/// Detected once from the original file name; anything else is rejected
/// before the pipeline touches the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Binary glTF, converted to a `.gltf` scene.
    Glb,
    /// Archive holding a `.gltf` scene and its resources, converted to `.glb`.
    Zip,
}

impl AssetKind {
    /// Classify a file name by its final extension (case-insensitive).
    /// Returns `None` for unsupported types.
    pub fn detect(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name).extension()?.to_str()?;
        match extension.to_ascii_lowercase().as_str() {
            "glb" => Some(AssetKind::Glb),
            "zip" => Some(AssetKind::Zip),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            AssetKind::Glb => "glb",
            AssetKind::Zip => "zip",
        }
    }

    /// Extension of the artifact this kind converts into.
    pub fn converted_extension(self) -> &'static str {
        match self {
            AssetKind::Glb => "gltf",
            AssetKind::Zip => "glb",
        }
    }
}

/// A converted asset stored in redb
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    /// Generated name of the stored origin upload, e.g. `castle-k3j9x0ab.glb`
    pub file_name: String,
    pub origin_file_path: String,
    pub converted_file_path: String,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    /// Kind of the original upload, recovered from the stored file name.
    pub fn kind(&self) -> Option<AssetKind> {
        AssetKind::detect(&self.file_name)
    }

    /// File name without its extension; also the name of a zip's scratch folder.
    pub fn base_name(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file_name)
    }
}

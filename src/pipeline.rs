//! Upload-to-converted-artifact orchestration and the matching delete flow.
//!
//! An upload runs validate -> quota check -> relocate -> convert -> persist.
//! Nothing touches the filesystem before the quota check passes; anything
//! written after that is removed again if a later step fails.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::Utc;

use crate::actor::Actor;
use crate::archive;
use crate::convert::{ConvertedPaths, Converter};
use crate::error::{ConversionError, PipelineError};
use crate::layout::{Category, StorageLayout};
use crate::quota::{QuotaLimits, QuotaTracker};
use crate::slug;
use crate::storage::models::{AssetKind, FileRecord};
use crate::storage::Database;

/// A file as received from the client, before any validation.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    /// Client-supplied name, used for type detection and the stored name's title
    pub original_name: String,
    pub data: Bytes,
}

/// Paths removed (or not) by a best-effort cleanup.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

impl CleanupReport {
    /// Remove a file or directory tree. An already-missing path counts as
    /// neither removed nor failed; other errors are logged and recorded.
    pub fn remove(&mut self, path: &Path) {
        let result = match std::fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
            Ok(_) => std::fs::remove_file(path),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => self.removed.push(path.to_path_buf()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove artifact");
                self.failed.push(path.to_path_buf());
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Where one upload's artifacts live on disk.
struct Placement {
    kind: AssetKind,
    file_name: String,
    origin_path: PathBuf,
    /// Extraction folder next to the origin file (zip uploads only)
    scratch_dir: PathBuf,
    converted_path: PathBuf,
}

impl Placement {
    fn discard(&self) -> CleanupReport {
        let mut report = CleanupReport::default();
        report.remove(&self.converted_path);
        if self.kind == AssetKind::Zip {
            report.remove(&self.scratch_dir);
        }
        report.remove(&self.origin_path);
        report
    }
}

#[derive(Clone)]
pub struct UploadPipeline {
    db: Database,
    layout: StorageLayout,
    converter: Converter,
    quota: QuotaTracker,
    max_extracted_size: u64,
}

impl UploadPipeline {
    pub fn new(db: Database, layout: StorageLayout, limits: QuotaLimits) -> Self {
        Self {
            converter: Converter::new(layout.clone()),
            quota: QuotaTracker::new(db.clone(), limits),
            db,
            layout,
            max_extracted_size: archive::DEFAULT_MAX_EXTRACTED_SIZE,
        }
    }

    /// Cap on the uncompressed size of an uploaded archive.
    pub fn with_max_extracted_size(mut self, bytes: u64) -> Self {
        self.max_extracted_size = bytes;
        self
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    // ========================================================================
    // Upload
    // ========================================================================

    /// Store, convert and record one upload on behalf of `actor`.
    pub fn upload(
        &self,
        actor: &Actor,
        file: Option<IncomingFile>,
    ) -> Result<FileRecord, PipelineError> {
        let (file, kind) = validate(file)?;
        self.quota.check(actor.id)?;

        let placement = self.relocate(actor, &file, kind)?;

        let result = self
            .convert(&placement)
            .and_then(|paths| self.persist(actor, &placement, paths));

        match result {
            Ok(record) => {
                tracing::info!(
                    file_id = %record.id,
                    user_id = actor.id,
                    roles = ?actor.roles,
                    file_name = %record.file_name,
                    "Stored converted upload"
                );
                Ok(record)
            }
            Err(e) => {
                let report = placement.discard();
                tracing::debug!(
                    user_id = actor.id,
                    file_name = %placement.file_name,
                    removed = report.removed.len(),
                    error = %e,
                    "Upload failed, discarded artifacts"
                );
                Err(e)
            }
        }
    }

    /// Write the received bytes into the user's origin folder under a generated name.
    fn relocate(
        &self,
        actor: &Actor,
        file: &IncomingFile,
        kind: AssetKind,
    ) -> Result<Placement, PipelineError> {
        let title = Path::new(&file.original_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let file_name = slug::stored_file_name(title, kind.extension());
        let base_name = file_name
            .strip_suffix(&format!(".{}", kind.extension()))
            .unwrap_or(&file_name)
            .to_string();

        let origin_dir = self.layout.origin_folder(actor.id)?;
        let converted_dir = self.layout.converted_folder(actor.id)?;

        let placement = Placement {
            kind,
            origin_path: origin_dir.join(&file_name),
            scratch_dir: origin_dir.join(&base_name),
            converted_path: converted_dir
                .join(format!("{base_name}.{}", kind.converted_extension())),
            file_name,
        };

        write_origin(&placement.origin_path, &file.data)?;
        tracing::debug!(
            user_id = actor.id,
            path = %placement.origin_path.display(),
            bytes = file.data.len(),
            "Relocated upload"
        );
        Ok(placement)
    }

    fn convert(&self, placement: &Placement) -> Result<ConvertedPaths, PipelineError> {
        match placement.kind {
            AssetKind::Glb => Ok(self
                .converter
                .glb_to_gltf(&placement.origin_path, &placement.converted_path)?),
            AssetKind::Zip => {
                archive::extract(
                    &placement.origin_path,
                    &placement.scratch_dir,
                    self.max_extracted_size,
                )?;

                let scene = archive::find_by_extension(&placement.scratch_dir, "gltf")
                    .next()
                    .ok_or(ConversionError::NoSceneDescriptor)?;

                // URIs resolve next to the scene but may not leave the extraction
                Ok(self.converter.gltf_to_glb(
                    &scene,
                    &placement.converted_path,
                    &placement.scratch_dir,
                )?)
            }
        }
    }

    fn persist(
        &self,
        actor: &Actor,
        placement: &Placement,
        paths: ConvertedPaths,
    ) -> Result<FileRecord, PipelineError> {
        let now = Utc::now();
        let record = FileRecord {
            id: uuid::Uuid::new_v4().to_string(),
            file_name: placement.file_name.clone(),
            origin_file_path: paths.origin_file_path,
            converted_file_path: paths.converted_file_path,
            author_id: actor.id,
            created_at: now,
            updated_at: now,
        };
        self.db.put_file(&record)?;
        Ok(record)
    }

    // ========================================================================
    // Lookup and delete
    // ========================================================================

    /// A record owned by `actor`. Records of other users are reported as missing.
    pub fn find_owned(&self, actor: &Actor, id: &str) -> Result<FileRecord, PipelineError> {
        self.db
            .get_file(id)?
            .filter(|file| file.author_id == actor.id)
            .ok_or_else(|| PipelineError::NotFound(format!("The file with id {id} doesn't exist")))
    }

    /// Remove a record's artifacts, then the record itself.
    ///
    /// Artifact removal is best-effort: failures are logged and reported but
    /// never stop the metadata delete, so the record store and quota counts
    /// always match what the user can see.
    pub fn delete(&self, record: &FileRecord) -> Result<CleanupReport, PipelineError> {
        let mut report = CleanupReport::default();

        match self.layout.resolve_public(&record.converted_file_path) {
            Some(path) => report.remove(&path),
            None => tracing::warn!(
                file_id = %record.id,
                path = %record.converted_file_path,
                "Converted path does not map into the upload root"
            ),
        }

        match record.kind() {
            Some(AssetKind::Glb) => match self.layout.resolve_public(&record.origin_file_path) {
                Some(path) => report.remove(&path),
                None => tracing::warn!(
                    file_id = %record.id,
                    path = %record.origin_file_path,
                    "Origin path does not map into the upload root"
                ),
            },
            Some(AssetKind::Zip) => {
                // origin_file_path points at the extracted scene; the zip and
                // its scratch folder sit side by side in the origin folder
                let origin_dir = self.layout.user_dir(Category::Origin, record.author_id);
                report.remove(&origin_dir.join(&record.file_name));
                report.remove(&origin_dir.join(record.base_name()));
            }
            None => tracing::warn!(
                file_id = %record.id,
                file_name = %record.file_name,
                "Unknown upload type, origin artifacts left in place"
            ),
        }

        if !self.db.delete_file(&record.id)? {
            return Err(PipelineError::NotFound(format!(
                "The file with id {} doesn't exist",
                record.id
            )));
        }

        tracing::info!(
            file_id = %record.id,
            removed = report.removed.len(),
            failed = report.failed.len(),
            "Deleted file"
        );
        Ok(report)
    }
}

/// Write an upload to disk, removing whatever a failed write left behind.
fn write_origin(path: &Path, data: &[u8]) -> io::Result<()> {
    std::fs::write(path, data).inspect_err(|e| {
        let mut report = CleanupReport::default();
        report.remove(path);
        tracing::warn!(
            path = %path.display(),
            error = %e,
            cleaned = report.is_clean(),
            "Failed to write upload"
        );
    })
}

fn validate(file: Option<IncomingFile>) -> Result<(IncomingFile, AssetKind), PipelineError> {
    let file = file.ok_or_else(|| PipelineError::Validation("file is required".to_string()))?;

    match AssetKind::detect(&file.original_name) {
        Some(kind) => Ok((file, kind)),
        None => {
            let extension = Path::new(&file.original_name)
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            Err(PipelineError::Validation(format!(
                "Unsupported file type {extension}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_origin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("castle.glb");

        write_origin(&path, b"glTF").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"glTF");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_write_origin_removes_partial_file() {
        if !Path::new("/dev/full").exists() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("castle.glb");
        // Every write through this link fails with "no space left on device"
        std::os::unix::fs::symlink("/dev/full", &path).unwrap();

        assert!(write_origin(&path, b"glTF").is_err());
        assert!(std::fs::symlink_metadata(&path).is_err());
        assert!(Path::new("/dev/full").exists());
    }

    #[test]
    fn test_validate() {
        assert!(matches!(validate(None), Err(PipelineError::Validation(_))));

        let file = IncomingFile {
            original_name: "Castle.GLB".to_string(),
            data: Bytes::from_static(b"glTF"),
        };
        let (_, kind) = validate(Some(file)).unwrap();
        assert_eq!(kind, AssetKind::Glb);

        let file = IncomingFile {
            original_name: "castle.fbx".to_string(),
            data: Bytes::new(),
        };
        assert!(
            matches!(validate(Some(file)), Err(PipelineError::Validation(m)) if m == "Unsupported file type .fbx")
        );
    }
}

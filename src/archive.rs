//! Zip extraction and scene lookup.

use std::fs::File;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::ExtractionError;

/// Ceiling on the combined uncompressed size of an archive's entries.
pub const DEFAULT_MAX_EXTRACTED_SIZE: u64 = 200 * 1024 * 1024;

/// Unpack `archive_path` into `dest_dir`, creating it if needed.
///
/// Archives with entry names that would escape `dest_dir` are rejected as
/// malformed. Archives declaring more than `max_total` uncompressed bytes are
/// rejected before anything is written.
pub fn extract(
    archive_path: &Path,
    dest_dir: &Path,
    max_total: u64,
) -> Result<(), ExtractionError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    let mut total: u64 = 0;
    for index in 0..archive.len() {
        total = total.saturating_add(archive.by_index_raw(index)?.size());
    }
    if total > max_total {
        return Err(ExtractionError::TooLarge {
            size: total,
            limit: max_total,
        });
    }

    std::fs::create_dir_all(dest_dir)?;
    archive.extract(dest_dir)?;

    tracing::debug!(
        archive = %archive_path.display(),
        dest = %dest_dir.display(),
        entries = archive.len(),
        "Extracted archive"
    );
    Ok(())
}

/// Every non-directory entry under `root` whose extension equals `extension`
/// (ASCII case-insensitive), depth-first with siblings in file-name order.
///
/// Symlinks are not followed and are matched like regular files. Unreadable
/// entries are skipped.
pub fn find_by_extension<'a>(
    root: &Path,
    extension: &'a str,
) -> impl Iterator<Item = PathBuf> + 'a {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| !entry.file_type().is_dir())
        .filter(move |entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        })
        .map(|entry| entry.into_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, data) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_extract_and_find_nested() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("scene.zip");
        write_zip(
            &archive,
            &[
                ("models/scene.gltf", &b"{}"[..]),
                ("models/textures/wood.png", &b"png"[..]),
                ("readme.txt", &b"hi"[..]),
            ],
        );

        let dest = dir.path().join("scene");
        extract(&archive, &dest, DEFAULT_MAX_EXTRACTED_SIZE).unwrap();

        assert!(dest.join("models/textures/wood.png").is_file());

        let found: Vec<PathBuf> = find_by_extension(&dest, "gltf").collect();
        assert_eq!(found, vec![dest.join("models/scene.gltf")]);
    }

    #[test]
    fn test_find_by_extension_no_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested.gltf")).unwrap();

        // A directory named like a scene is not a match
        assert_eq!(find_by_extension(dir.path(), "gltf").count(), 0);
    }

    #[test]
    fn test_find_by_extension_deterministic_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("b/one.GLTF"), b"{}").unwrap();
        std::fs::write(dir.path().join("a.gltf"), b"{}").unwrap();

        let found: Vec<PathBuf> = find_by_extension(dir.path(), "gltf").collect();
        assert_eq!(
            found,
            vec![dir.path().join("a.gltf"), dir.path().join("b/one.GLTF")]
        );
    }

    #[test]
    fn test_extract_malformed_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        std::fs::write(&archive, b"definitely not a zip").unwrap();

        let result = extract(
            &archive,
            &dir.path().join("out"),
            DEFAULT_MAX_EXTRACTED_SIZE,
        );
        assert!(matches!(result, Err(ExtractionError::Malformed(_))));
    }

    #[test]
    fn test_extract_rejects_oversized_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bomb.zip");
        let padding = vec![0u8; 4096];
        write_zip(&archive, &[("a.bin", &padding[..]), ("b.bin", &padding[..])]);

        let dest = dir.path().join("out");
        let result = extract(&archive, &dest, 6000);
        assert!(matches!(
            result,
            Err(ExtractionError::TooLarge { size: 8192, limit: 6000 })
        ));
        assert!(!dest.exists());

        extract(&archive, &dest, 8192).unwrap();
        assert!(dest.join("b.bin").is_file());
    }
}

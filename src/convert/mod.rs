mod codec;

pub use codec::{decode_glb, encode_glb, ResourceScope};

use std::io;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::ConversionError;
use crate::layout::StorageLayout;

/// Public (download-route) paths of a conversion's input and output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertedPaths {
    pub origin_file_path: String,
    pub converted_file_path: String,
}

/// File-level glTF <-> GLB conversion inside the storage layout.
#[derive(Debug, Clone)]
pub struct Converter {
    layout: StorageLayout,
}

impl Converter {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// Read a GLB from `origin` and write the equivalent `.gltf` to `dest`.
    pub fn glb_to_gltf(&self, origin: &Path, dest: &Path) -> Result<ConvertedPaths, ConversionError> {
        let bytes = std::fs::read(origin)?;
        let scene = decode_glb(&bytes)?;
        let json = serde_json::to_vec(&scene)
            .map_err(|e| ConversionError::InvalidGltf(e.to_string()))?;
        std::fs::write(dest, json)?;

        tracing::debug!(origin = %origin.display(), dest = %dest.display(), "Converted GLB to glTF");
        self.public_paths(origin, dest)
    }

    /// Read a `.gltf` from `origin`, resolve its resources next to it without
    /// leaving `resource_dir`, and write the packed GLB to `dest`.
    pub fn gltf_to_glb(
        &self,
        origin: &Path,
        dest: &Path,
        resource_dir: &Path,
    ) -> Result<ConvertedPaths, ConversionError> {
        let text = std::fs::read(origin)?;
        let scene: Value = serde_json::from_slice(&text)
            .map_err(|e| ConversionError::InvalidGltf(e.to_string()))?;
        let scope = ResourceScope {
            base: origin.parent().unwrap_or(resource_dir),
            boundary: resource_dir,
        };
        let glb = encode_glb(scene, scope)?;
        std::fs::write(dest, glb)?;

        tracing::debug!(origin = %origin.display(), dest = %dest.display(), "Converted glTF to GLB");
        self.public_paths(origin, dest)
    }

    fn public_paths(&self, origin: &Path, dest: &Path) -> Result<ConvertedPaths, ConversionError> {
        let public = |path: &Path| {
            self.layout.public_path(path).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} is outside the upload root", path.display()),
                )
            })
        };
        Ok(ConvertedPaths {
            origin_file_path: public(origin)?,
            converted_file_path: public(dest)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        let converter = Converter::new(layout.clone());

        let origin_dir = layout.origin_folder(3).unwrap();
        let converted_dir = layout.converted_folder(3).unwrap();

        let scene = json!({
            "asset": { "version": "2.0", "generator": "test" },
            "nodes": [{ "name": "tower" }],
            "scenes": [{ "nodes": [0] }]
        });
        std::fs::write(origin_dir.join("tower.gltf"), scene.to_string()).unwrap();

        let paths = converter
            .gltf_to_glb(
                &origin_dir.join("tower.gltf"),
                &converted_dir.join("tower.glb"),
                &origin_dir,
            )
            .unwrap();
        assert_eq!(paths.origin_file_path, "/upload/origin/3/tower.gltf");
        assert_eq!(paths.converted_file_path, "/upload/converted/3/tower.glb");

        let paths = converter
            .glb_to_gltf(
                &converted_dir.join("tower.glb"),
                &converted_dir.join("tower.gltf"),
            )
            .unwrap();
        assert_eq!(paths.converted_file_path, "/upload/converted/3/tower.gltf");

        let written: Value =
            serde_json::from_slice(&std::fs::read(converted_dir.join("tower.gltf")).unwrap())
                .unwrap();
        assert_eq!(written["nodes"][0]["name"], "tower");
        assert_eq!(written["asset"]["generator"], "test");
    }

    #[test]
    fn test_gltf_to_glb_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        let converter = Converter::new(layout.clone());
        let origin_dir = layout.origin_folder(3).unwrap();
        std::fs::write(origin_dir.join("broken.gltf"), b"{ not json").unwrap();

        let result = converter.gltf_to_glb(
            &origin_dir.join("broken.gltf"),
            &origin_dir.join("broken.glb"),
            &origin_dir,
        );
        assert!(matches!(result, Err(ConversionError::InvalidGltf(_))));
        assert!(!origin_dir.join("broken.glb").exists());
    }
}

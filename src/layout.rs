//! Deterministic per-user directory layout under the upload root.
//!
//! ```text
//! {root}/origin/{user_id}/...     original uploads and extracted archives
//! {root}/converted/{user_id}/...  conversion output
//! ```
//!
//! Paths handed back to clients are "public" paths: the root is replaced by
//! [`PUBLIC_PREFIX`] so they double as download routes.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::storage::models::UserId;

/// Route prefix that stands in for the upload root in public paths.
pub const PUBLIC_PREFIX: &str = "/upload";

/// The two artifact categories kept per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Origin,
    Converted,
}

impl Category {
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Origin => "origin",
            Category::Converted => "converted",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a user's folder for `category`, without touching the filesystem.
    pub fn user_dir(&self, category: Category, user_id: UserId) -> PathBuf {
        self.root
            .join(category.dir_name())
            .join(user_id.to_string())
    }

    /// The user's origin folder, created if absent.
    pub fn origin_folder(&self, user_id: UserId) -> io::Result<PathBuf> {
        self.ensure(Category::Origin, user_id)
    }

    /// The user's converted folder, created if absent.
    pub fn converted_folder(&self, user_id: UserId) -> io::Result<PathBuf> {
        self.ensure(Category::Converted, user_id)
    }

    fn ensure(&self, category: Category, user_id: UserId) -> io::Result<PathBuf> {
        let dir = self.user_dir(category, user_id);
        // create_dir_all creates root, category and user folder in order and
        // treats a directory that appeared concurrently as success.
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Rewrite a path under the root into its public form, e.g.
    /// `{root}/converted/7/castle.gltf` -> `/upload/converted/7/castle.gltf`.
    ///
    /// Returns `None` when `path` is not inside the root.
    pub fn public_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut public = PUBLIC_PREFIX.to_string();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    public.push('/');
                    public.push_str(part.to_str()?);
                }
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(public)
    }

    /// Map a public path back onto the filesystem. Rejects anything that
    /// does not start with the public prefix or that would climb out of the root.
    pub fn resolve_public(&self, public: &str) -> Option<PathBuf> {
        let relative = public.strip_prefix(PUBLIC_PREFIX)?;
        let relative = relative.strip_prefix('/')?;
        let mut resolved = self.root.clone();
        for part in relative.split('/') {
            if !is_plain_segment(part) {
                return None;
            }
            resolved.push(part);
        }
        Some(resolved)
    }

    /// Location of a single stored artifact addressed by `{user_id}/{file_name}`.
    pub fn artifact_path(
        &self,
        category: Category,
        user_id: UserId,
        file_name: &str,
    ) -> Option<PathBuf> {
        is_plain_segment(file_name).then(|| self.user_dir(category, user_id).join(file_name))
    }
}

/// A single path segment with no separators or parent references.
fn is_plain_segment(part: &str) -> bool {
    !part.is_empty() && part != "." && part != ".." && !part.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folders_created_lazily_and_idempotently() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("upload"));

        assert!(!layout.root().exists());

        let origin = layout.origin_folder(7).unwrap();
        assert_eq!(origin, dir.path().join("upload").join("origin").join("7"));
        assert!(origin.is_dir());

        // Second call must not fail on the existing directory
        assert_eq!(layout.origin_folder(7).unwrap(), origin);

        let converted = layout.converted_folder(7).unwrap();
        assert!(converted.ends_with("converted/7"));
        assert!(converted.is_dir());
    }

    #[test]
    fn test_concurrent_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("upload"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let layout = layout.clone();
                std::thread::spawn(move || layout.converted_folder(42))
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
    }

    #[test]
    fn test_public_path_round_trip() {
        let layout = StorageLayout::new("/srv/data/upload");
        let path = layout.user_dir(Category::Converted, 7).join("castle.gltf");

        let public = layout.public_path(&path).unwrap();
        assert_eq!(public, "/upload/converted/7/castle.gltf");
        assert_eq!(layout.resolve_public(&public).unwrap(), path);
    }

    #[test]
    fn test_public_path_outside_root() {
        let layout = StorageLayout::new("/srv/data/upload");
        assert!(layout.public_path(Path::new("/etc/passwd")).is_none());
    }

    #[test]
    fn test_resolve_public_rejects_traversal() {
        let layout = StorageLayout::new("./upload");
        assert!(layout.resolve_public("/upload/../secret").is_none());
        assert!(layout.resolve_public("/other/converted/7/a.glb").is_none());
        assert!(layout.resolve_public("/upload//x").is_none());
    }

    #[test]
    fn test_artifact_path() {
        let layout = StorageLayout::new("./upload");
        assert!(layout
            .artifact_path(Category::Origin, 1, "..")
            .is_none());
        assert_eq!(
            layout.artifact_path(Category::Origin, 1, "a.glb").unwrap(),
            PathBuf::from("./upload/origin/1/a.glb")
        );
    }
}

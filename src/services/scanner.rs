//! Directory scanning: find the image files under a root directory.

use anyhow::{Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::collections::HashSet;
use walkdir::{DirEntry, WalkDir};

/// Produces the image files to load from a directory.
#[cfg_attr(test, mockall::automock)]
pub trait DirectoryLister {
    /// List image files under `root` in a deterministic order.
    ///
    /// Paths in `exclude` (already loaded) are left out. Hidden entries are
    /// skipped when recursing.
    fn list_images(
        &self,
        root: &Utf8Path,
        recursive: bool,
        exclude: &HashSet<Utf8PathBuf>,
    ) -> Result<Vec<Utf8PathBuf>>;
}

/// [`DirectoryLister`] backed by the file system.
pub struct FsLister {
    /// Matches the supported image extensions, case-insensitively
    image_pattern: Regex,
}

impl FsLister {
    pub fn new() -> Self {
        Self {
            image_pattern: Regex::new(r"(?i)\.(jpe?g|jpe|png)$")
                .expect("Invalid image extension regex"),
        }
    }

    pub fn is_image(&self, file_name: &str) -> bool {
        self.image_pattern.is_match(file_name)
    }
}

impl Default for FsLister {
    fn default() -> Self {
        Self::new()
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

impl DirectoryLister for FsLister {
    fn list_images(
        &self,
        root: &Utf8Path,
        recursive: bool,
        exclude: &HashSet<Utf8PathBuf>,
    ) -> Result<Vec<Utf8PathBuf>> {
        if !root.is_dir() {
            bail!("Not a directory: {}", root);
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !(recursive && entry.depth() > 0 && is_hidden(entry)));

        let mut images = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {}: {}", root, e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = match Utf8PathBuf::from_path_buf(entry.into_path()) {
                Ok(path) => path,
                Err(path) => {
                    tracing::warn!("Skipping non UTF-8 path: {}", path.display());
                    continue;
                }
            };

            let is_image = path.file_name().is_some_and(|name| self.is_image(name));
            if is_image && !exclude.contains(&path) {
                images.push(path);
            }
        }

        tracing::info!(
            "Found {} new images in {} (recursive={})",
            images.len(),
            root,
            recursive
        );
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        for name in ["b.jpg", "a.PNG", "c.jpe", "notes.txt", ".hidden.jpg"] {
            fs::write(root.join(name), b"x").unwrap();
        }
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub").join("d.jpeg"), b"x").unwrap();
        fs::create_dir(root.join(".cache")).unwrap();
        fs::write(root.join(".cache").join("e.jpg"), b"x").unwrap();
        (temp_dir, root)
    }

    fn names(root: &Utf8Path, paths: &[Utf8PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().as_str().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_is_image() {
        let lister = FsLister::new();
        assert!(lister.is_image("IMG_1.JPG"));
        assert!(lister.is_image("x.jpeg"));
        assert!(lister.is_image("x.jpe"));
        assert!(lister.is_image("x.png"));
        assert!(!lister.is_image("x.gif"));
        assert!(!lister.is_image("jpg"));
    }

    #[test]
    fn test_flat_listing() {
        let (_temp_dir, root) = tree();
        let images = FsLister::new()
            .list_images(&root, false, &HashSet::new())
            .unwrap();

        assert_eq!(names(&root, &images), vec![".hidden.jpg", "a.PNG", "b.jpg", "c.jpe"]);
    }

    #[test]
    fn test_recursive_listing_skips_hidden() {
        let (_temp_dir, root) = tree();
        let images = FsLister::new()
            .list_images(&root, true, &HashSet::new())
            .unwrap();

        assert_eq!(names(&root, &images), vec!["a.PNG", "b.jpg", "c.jpe", "sub/d.jpeg"]);
    }

    #[test]
    fn test_excludes_loaded() {
        let (_temp_dir, root) = tree();
        let exclude = HashSet::from([root.join("b.jpg")]);
        let images = FsLister::new().list_images(&root, false, &exclude).unwrap();

        assert!(!images.contains(&root.join("b.jpg")));
        assert_eq!(images.len(), 3);
    }

    #[test]
    fn test_missing_root() {
        let (_temp_dir, root) = tree();
        let result = FsLister::new().list_images(&root.join("nope"), false, &HashSet::new());
        assert!(result.is_err());
    }
}

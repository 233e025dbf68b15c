//! Flat-directory storage backend, the production default.
//!
//! Every blob is one regular file directly inside the store directory; the
//! blob name is the file name. Subdirectories and non-UTF-8 file names are
//! not blobs and are skipped during listing.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::{BlobEntry, BlobStore, StorageError, validate_name};

/// A storage backend rooted at one directory.
///
/// Cheap to clone; holds only the directory path.
///
/// # Examples
///
/// ```no_run
/// # use hermes_storage::FsBlobStore;
/// let store = FsBlobStore::open("./docs").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open the store at `path`, creating the directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the directory cannot be created or the
    /// path exists but is not a directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(|e| StorageError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        if !path.is_dir() {
            return Err(StorageError::Open {
                path: path.display().to_string(),
                reason: "path is not a directory".to_owned(),
            });
        }

        Ok(Self {
            root: path.to_path_buf(),
        })
    }

    /// Return the directory this store writes into.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

#[async_trait::async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.blob_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Read {
                name: name.to_owned(),
                reason: e.to_string(),
            }),
        }
    }

    async fn put(&self, name: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.blob_path(name)?;
        let write_err = |e: std::io::Error| StorageError::Write {
            name: name.to_owned(),
            reason: e.to_string(),
        };

        let mut file = tokio::fs::File::create(&path).await.map_err(write_err)?;
        file.write_all(value).await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.blob_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Delete {
                name: name.to_owned(),
                reason: e.to_string(),
            }),
        }
    }

    async fn list(&self) -> Result<Vec<BlobEntry>, StorageError> {
        let list_err = |e: std::io::Error| StorageError::List {
            reason: format!("{}: {e}", self.root.display()),
        };

        let mut dir = tokio::fs::read_dir(&self.root).await.map_err(list_err)?;
        let mut entries = Vec::new();

        while let Some(entry) = dir.next_entry().await.map_err(list_err)? {
            let Ok(name) = entry.file_name().into_string() else {
                warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
                continue;
            };

            // An entry can vanish between read_dir and metadata under a
            // concurrent delete; skip it rather than failing the listing.
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(list_err(e)),
            };

            if !metadata.is_file() {
                continue;
            }

            entries.push(BlobEntry {
                name,
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        Ok(entries)
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.blob_path(name)?;
        match tokio::fs::metadata(&path).await {
            Ok(m) => Ok(m.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Read {
                name: name.to_owned(),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, FsBlobStore) {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::open(dir.path().join("docs")).unwrap();
        (dir, store)
    }

    #[test]
    fn open_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nested").join("docs");
        let store = FsBlobStore::open(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
    }

    #[test]
    fn open_rejects_a_regular_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            FsBlobStore::open(&file),
            Err(StorageError::Open { .. })
        ));
    }

    #[tokio::test]
    async fn put_writes_a_plain_file_under_its_name() {
        let (_dir, store) = open_temp();
        store.put("report.pdf", b"%PDF-1.7").await.unwrap();

        let on_disk = std::fs::read(store.root().join("report.pdf")).unwrap();
        assert_eq!(on_disk, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn put_overwrites_existing() {
        let (_dir, store) = open_temp();
        store.put("a.txt", b"v1").await.unwrap();
        store.put("a.txt", b"version two").await.unwrap();
        assert_eq!(store.get("a.txt").await.unwrap(), Some(b"version two".to_vec()));
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let (_dir, store) = open_temp();
        assert_eq!(store.get("missing.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_missing_is_noop() {
        let (_dir, store) = open_temp();
        store.delete("missing.txt").await.unwrap();
    }

    #[tokio::test]
    async fn list_reports_sizes_and_skips_directories() {
        let (_dir, store) = open_temp();
        store.put("a.txt", b"abc").await.unwrap();
        store.put("b.txt", b"").await.unwrap();
        std::fs::create_dir(store.root().join("subdir")).unwrap();

        let mut entries = store.list().await.unwrap();
        entries.sort_by(|x, y| x.name.cmp(&y.name));

        let summary: Vec<(&str, u64)> = entries.iter().map(|e| (e.name.as_str(), e.size)).collect();
        assert_eq!(summary, vec![("a.txt", 3), ("b.txt", 0)]);
        assert!(entries.iter().all(|e| e.modified.is_some()));
    }

    #[tokio::test]
    async fn exists_is_false_for_directories() {
        let (_dir, store) = open_temp();
        std::fs::create_dir(store.root().join("subdir")).unwrap();
        assert!(!store.exists("subdir").await.unwrap());
    }

    #[tokio::test]
    async fn unsafe_names_never_touch_disk() {
        let (dir, store) = open_temp();
        let result = store.put("../escape.txt", b"x").await;
        assert!(matches!(result, Err(StorageError::InvalidName { .. })));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[tokio::test]
    async fn list_fails_when_directory_is_gone() {
        let (_dir, store) = open_temp();
        std::fs::remove_dir_all(store.root()).unwrap();
        assert!(matches!(store.list().await, Err(StorageError::List { .. })));
    }
}

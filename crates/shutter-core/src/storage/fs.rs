//! Artifact store trait and the filesystem backend.

use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use crate::error::StorageError;

use super::path::validate_path;

/// Byte store addressed by relative `/`-separated paths.
///
/// All methods are blocking; the pipeline calls them from the blocking pool.
pub trait ArtifactStore: Send + Sync + 'static {
    /// Durably write `bytes` at `path`. Fails if `path` already exists.
    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Read back the bytes stored at `path`.
    fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Delete `path`. Returns `false` if it did not exist.
    fn remove(&self, path: &str) -> Result<bool, StorageError>;

    fn exists(&self, path: &str) -> Result<bool, StorageError>;
}

/// Stores artifacts as files under a root directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute filesystem location of a relative storage path.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(validate_path(path)?))
    }
}

impl ArtifactStore for FsStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let dest = self.resolve(path)?;
        let write_failed = |source| StorageError::WriteFailed {
            path: path.to_string(),
            source,
        };

        let dir = dest.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(dir).map_err(write_failed)?;

        // Temp file lives next to the destination so the rename stays on one
        // filesystem. It is deleted on drop if anything below fails.
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_failed)?;
        tmp.write_all(bytes).map_err(write_failed)?;
        tmp.as_file().sync_all().map_err(write_failed)?;

        tmp.persist_noclobber(&dest)
            .map_err(|e| StorageError::RenameFailed {
                path: path.to_string(),
                source: e.error,
            })?;
        Ok(())
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let file = self.resolve(path)?;
        std::fs::read(&file).map_err(|source| StorageError::ReadFailed {
            path: path.to_string(),
            source,
        })
    }

    fn remove(&self, path: &str) -> Result<bool, StorageError> {
        let file = self.resolve(path)?;
        match std::fs::remove_file(&file) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StorageError::RemoveFailed {
                path: path.to_string(),
                source,
            }),
        }
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let file = self.resolve(path)?;
        file.try_exists().map_err(|source| StorageError::ReadFailed {
            path: path.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        store.put("2026/01/02/7/a_original.jpg", b"abc").unwrap();
        assert!(store.exists("2026/01/02/7/a_original.jpg").unwrap());
        assert_eq!(store.read("2026/01/02/7/a_original.jpg").unwrap(), b"abc");

        assert!(store.remove("2026/01/02/7/a_original.jpg").unwrap());
        assert!(!store.exists("2026/01/02/7/a_original.jpg").unwrap());
        assert!(!store.remove("2026/01/02/7/a_original.jpg").unwrap());
    }

    #[test]
    fn test_put_never_clobbers() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        store.put("x/a.jpg", b"first").unwrap();
        let err = store.put("x/a.jpg", b"second").unwrap_err();
        assert_eq!(err.code(), "rename_failed");
        assert_eq!(store.read("x/a.jpg").unwrap(), b"first");

        // No temp files left behind
        let entries = std::fs::read_dir(dir.path().join("x")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_remove_keeps_partition_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        store.put("2026/01/02/7/a.jpg", b"a").unwrap();
        store.remove("2026/01/02/7/a.jpg").unwrap();

        assert!(dir.path().join("2026/01/02/7").is_dir());
        store.put("2026/01/02/7/b.jpg", b"b").unwrap();
        assert!(store.exists("2026/01/02/7/b.jpg").unwrap());
    }

    #[test]
    fn test_concurrent_put_and_remove_in_one_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(FsStore::new(dir.path()));

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let path = format!("2026/10/19/7/{worker}-{i}_original.jpg");
                        store.put(&path, b"bytes").unwrap();
                        assert!(store.remove(&path).unwrap());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let left = std::fs::read_dir(dir.path().join("2026/10/19/7")).unwrap().count();
        assert_eq!(left, 0);
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        assert_eq!(store.put("../evil.jpg", b"x").unwrap_err().code(), "invalid_path");
        assert_eq!(store.read("/etc/passwd").unwrap_err().code(), "invalid_path");
    }

    #[test]
    fn test_read_missing_is_read_failed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        assert_eq!(store.read("nope.jpg").unwrap_err().code(), "read_failed");
    }
}

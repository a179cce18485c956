//! Local filesystem backend
//!
//! Layout: `{root}/{employee_key}/{file_name}`. Writes go to a sibling
//! `.partial` file first and are renamed into place, so a crash never leaves a
//! truncated artifact under the final name. Each write gets its own partial
//! file; concurrent writers of the same artifact last-rename-wins.

use super::{validate_component, StorageBackend, StorageError, StorageLocator};
use async_trait::async_trait;
use payroll_common::config::StorageKind;
use std::path::{Path, PathBuf};

pub struct FilesystemStorage {
    root: PathBuf,
}

impl FilesystemStorage {
    /// Create the root if missing and resolve it to an absolute path
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination path for an artifact
    pub fn artifact_path(&self, employee_key: &str, file_name: &str) -> Result<PathBuf, StorageError> {
        validate_component(employee_key)?;
        validate_component(file_name)?;
        Ok(self.root.join(employee_key).join(file_name))
    }
}

#[async_trait]
impl StorageBackend for FilesystemStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Filesystem
    }

    async fn exists(&self, locator: &StorageLocator) -> Result<bool, StorageError> {
        match locator {
            StorageLocator::File { path } => Ok(tokio::fs::try_exists(path).await?),
            StorageLocator::Object { .. } => Ok(false),
        }
    }

    async fn persist(
        &self,
        bytes: &[u8],
        _identifier: &str,
        employee_key: &str,
        file_name: &str,
    ) -> Result<StorageLocator, StorageError> {
        let dest_path = self.artifact_path(employee_key, file_name)?;
        if let Some(dest_dir) = dest_path.parent() {
            tokio::fs::create_dir_all(dest_dir).await?;
        }

        let partial_path =
            dest_path.with_file_name(format!(".{}.{}.partial", file_name, uuid::Uuid::new_v4()));
        tokio::fs::write(&partial_path, bytes).await?;
        tokio::fs::rename(&partial_path, &dest_path).await?;

        tracing::debug!(path = %dest_path.display(), size = bytes.len(), "Stored artifact on filesystem");

        Ok(StorageLocator::File { path: dest_path })
    }

    async fn fetch(&self, locator: &StorageLocator) -> Result<Vec<u8>, StorageError> {
        match locator {
            StorageLocator::File { path } => match tokio::fs::read(path).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(StorageError::NotFound(locator.to_string()))
                }
                Err(e) => Err(e.into()),
            },
            StorageLocator::Object { .. } => Err(StorageError::NotFound(locator.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_persist_creates_employee_directory() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp_dir.path().join("receipts")).unwrap();

        let locator = storage
            .persist(b"%PDF-1.5 test", "ABCD850101XYZ", "1234", "ABCD850101XYZ_a.pdf")
            .await
            .unwrap();

        let StorageLocator::File { path } = &locator else {
            panic!("expected file locator, got {:?}", locator);
        };
        assert!(path.is_absolute());
        assert_eq!(path, &storage.root().join("1234").join("ABCD850101XYZ_a.pdf"));
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF-1.5 test");
        let entries = std::fs::read_dir(storage.root().join("1234")).unwrap().count();
        assert_eq!(entries, 1, "partial files must not be left behind");
    }

    #[tokio::test]
    async fn test_exists_reflects_deletion() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp_dir.path()).unwrap();

        let locator = storage.persist(b"bytes", "ABCD850101XYZ", "1234", "a.pdf").await.unwrap();
        assert!(storage.exists(&locator).await.unwrap());

        let StorageLocator::File { path } = &locator else { unreachable!() };
        std::fs::remove_file(path).unwrap();
        assert!(!storage.exists(&locator).await.unwrap());
    }

    #[tokio::test]
    async fn test_fetch_returns_stored_bytes_until_deleted() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp_dir.path()).unwrap();

        let locator = storage.persist(b"%PDF stored", "ABCD850101XYZ", "1234", "a.pdf").await.unwrap();
        assert_eq!(storage.fetch(&locator).await.unwrap(), b"%PDF stored");

        let StorageLocator::File { path } = &locator else { unreachable!() };
        std::fs::remove_file(path).unwrap();
        assert!(storage.fetch(&locator).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_persist_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp_dir.path()).unwrap();

        storage.persist(b"first", "ID", "1", "a.pdf").await.unwrap();
        let locator = storage.persist(b"second", "ID", "1", "a.pdf").await.unwrap();

        let StorageLocator::File { path } = &locator else { unreachable!() };
        assert_eq!(std::fs::read(path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_object_locator_is_not_addressable() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp_dir.path()).unwrap();

        let locator = StorageLocator::Object {
            bucket: "b".to_string(),
            key: "k".to_string(),
        };
        assert!(!storage.exists(&locator).await.unwrap());
        assert!(storage.fetch(&locator).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rejects_escaping_names() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp_dir.path()).unwrap();

        let err = storage.persist(b"x", "ID", "..", "a.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidName(_)));

        let err = storage.persist(b"x", "ID", "1", "../a.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidName(_)));
    }
}

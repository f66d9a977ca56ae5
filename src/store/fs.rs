//! Filesystem-backed object store, for running against a locally synced
//! bucket mirror.

use std::path::PathBuf;

use async_trait::async_trait;

use super::{ObjectStore, StoreError};

pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.root.join(prefix);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Transport(e.to_string())),
        };

        let mut names = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    if let Some(name) = entry.file_name().to_str() {
                        names.push(name.to_string());
                    }
                }
                Ok(None) => break,
                Err(e) => return Err(StoreError::Transport(e.to_string())),
            }
        }
        Ok(names)
    }

    async fn get_object(&self, prefix: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.root.join(prefix).join(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(format!("{}/{}", prefix, name)))
            }
            Err(e) => Err(StoreError::Transport(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn list_and_get() {
        let dir = TempDir::new().unwrap();
        let prefix = "segments/node-1";
        std::fs::create_dir_all(dir.path().join(prefix)).unwrap();
        std::fs::write(dir.path().join(prefix).join("f1.seg"), b"hello").unwrap();

        let store = FsObjectStore::new(dir.path().to_path_buf());
        let names = store.list_objects(prefix).await.unwrap();
        assert_eq!(names, vec!["f1.seg".to_string()]);
        assert_eq!(store.get_object(prefix, "f1.seg").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn missing_prefix_lists_empty() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path().to_path_buf());
        assert!(store.list_objects("segments/nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path().to_path_buf());
        assert!(matches!(
            store.get_object("p", "missing").await,
            Err(StoreError::NotFound(_))
        ));
    }
}

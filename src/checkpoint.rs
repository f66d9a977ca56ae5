//! Durable checkpoint of the last chain-validated segment.
//!
//! A single JSON file written with temp-file + rename so an interrupted
//! write can never leave a torn checkpoint. The in-memory copy is updated
//! only after the rename succeeds; a crash in between is safe to redo.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::importer::ContentHash;

/// The persisted pair: last validated filename and its content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub filename: String,
    pub hash: ContentHash,
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointRecord {
    filename: String,
    /// Hex-encoded 48-byte content hash.
    hash: String,
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint file is corrupt: {0}")]
    Corrupt(String),
    #[error("checkpoint may only advance: {current} -> {proposed}")]
    NotMonotonic { current: String, proposed: String },
}

pub struct CheckpointStore {
    path: PathBuf,
    current: Option<Checkpoint>,
}

impl CheckpointStore {
    /// Load the checkpoint at startup. A missing file means no segment has
    /// ever been validated.
    pub fn load(path: PathBuf) -> Result<Self, CheckpointError> {
        let current = match std::fs::read_to_string(&path) {
            Ok(content) => {
                let record: CheckpointRecord = serde_json::from_str(&content)
                    .map_err(|e| CheckpointError::Corrupt(e.to_string()))?;
                let hash = ContentHash::from_hex(&record.hash)
                    .ok_or_else(|| CheckpointError::Corrupt(record.hash.clone()))?;
                Some(Checkpoint {
                    filename: record.filename,
                    hash,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, current })
    }

    pub fn current(&self) -> Option<&Checkpoint> {
        self.current.as_ref()
    }

    /// Persist a new checkpoint, then update the in-memory copy.
    ///
    /// Filenames are timestamp-ordered, so the new filename must sort
    /// strictly after the current one.
    pub fn advance(&mut self, filename: &str, hash: ContentHash) -> Result<(), CheckpointError> {
        if let Some(current) = &self.current {
            if filename <= current.filename.as_str() {
                return Err(CheckpointError::NotMonotonic {
                    current: current.filename.clone(),
                    proposed: filename.to_string(),
                });
            }
        }

        let record = CheckpointRecord {
            filename: filename.to_string(),
            hash: hash.to_hex(),
        };
        let encoded = serde_json::to_vec_pretty(&record)
            .map_err(|e| CheckpointError::Corrupt(e.to_string()))?;

        let tmp_path = self.path.with_extension("tmp");
        let mut file = File::create(&tmp_path)?;
        file.write_all(&encoded)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, &self.path)?;

        self.current = Some(Checkpoint {
            filename: filename.to_string(),
            hash,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_empty_checkpoint() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::load(dir.path().join("checkpoint.json")).unwrap();
        assert!(store.current().is_none());
    }

    #[test]
    fn advance_persists_and_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");
        let hash = ContentHash::of(b"segment one");

        let mut store = CheckpointStore::load(path.clone()).unwrap();
        store.advance("f1.seg", hash).unwrap();
        assert_eq!(store.current().unwrap().filename, "f1.seg");

        // Restart resumes from the persisted checkpoint.
        let reloaded = CheckpointStore::load(path).unwrap();
        let current = reloaded.current().unwrap();
        assert_eq!(current.filename, "f1.seg");
        assert_eq!(current.hash, hash);
    }

    #[test]
    fn advance_rejects_non_monotonic_filename() {
        let dir = TempDir::new().unwrap();
        let mut store = CheckpointStore::load(dir.path().join("cp.json")).unwrap();
        store.advance("f2.seg", ContentHash::of(b"two")).unwrap();

        let before = store.current().cloned();
        assert!(matches!(
            store.advance("f1.seg", ContentHash::of(b"one")),
            Err(CheckpointError::NotMonotonic { .. })
        ));
        assert!(matches!(
            store.advance("f2.seg", ContentHash::of(b"two again")),
            Err(CheckpointError::NotMonotonic { .. })
        ));
        assert_eq!(store.current().cloned(), before);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cp.json");
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            CheckpointStore::load(path),
            Err(CheckpointError::Corrupt(_))
        ));
    }
}

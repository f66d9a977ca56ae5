//! Object-storage collaborator boundary.
//!
//! The importer only ever lists and gets objects under a node's storage
//! prefix; every failure here is retryable from the core's point of view.

pub mod fs;
pub mod http;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use fs::FsObjectStore;
pub use http::HttpObjectStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("storage transport error: {0}")]
    Transport(String),
}

/// Bucket-like remote storage. Listing a prefix no node has written yet is
/// an empty result, not an error.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
    async fn get_object(&self, prefix: &str, name: &str) -> Result<Vec<u8>, StoreError>;
}

//! In-memory object store used by pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ObjectStore, StoreError};

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    failing_prefixes: Mutex<HashSet<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, prefix: &str, name: &str, bytes: Vec<u8>) {
        self.objects
            .lock()
            .unwrap()
            .insert((prefix.to_string(), name.to_string()), bytes);
    }

    /// Make every call against `prefix` fail with a transport error,
    /// simulating an unreachable node.
    pub fn set_failing(&self, prefix: &str) {
        self.failing_prefixes
            .lock()
            .unwrap()
            .insert(prefix.to_string());
    }

    fn check_reachable(&self, prefix: &str) -> Result<(), StoreError> {
        if self.failing_prefixes.lock().unwrap().contains(prefix) {
            return Err(StoreError::Transport(format!("{} unreachable", prefix)));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check_reachable(prefix)?;
        let mut names: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(p, _)| p == prefix)
            .map(|(_, n)| n.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn get_object(&self, prefix: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        self.check_reachable(prefix)?;
        self.objects
            .lock()
            .unwrap()
            .get(&(prefix.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", prefix, name)))
    }
}

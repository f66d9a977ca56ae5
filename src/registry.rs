//! Node registry — the externally maintained address book mapping node
//! identity to its public key and storage prefix.
//!
//! The registry is read-only to the importer and reloaded at cycle
//! boundaries; a failed reload keeps the previous registry in effect.

use std::path::Path;

use ed25519_dalek::VerifyingKey;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// One registered node. Immutable for the duration of a cycle.
#[derive(Debug, Clone)]
pub struct Node {
    /// Stable account/node identity.
    pub id: String,
    /// Ed25519 key the node signs attestations with.
    pub public_key: VerifyingKey,
    /// Object-storage prefix the node publishes under.
    pub storage_prefix: String,
}

/// Address-book entry as stored on disk.
#[derive(Debug, Deserialize)]
struct NodeRecord {
    id: String,
    /// Hex-encoded 32-byte ed25519 public key.
    public_key: String,
    storage_prefix: String,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read address book: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse address book: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("node {0} has an invalid public key")]
    InvalidKey(String),
    #[error("duplicate node id {0}")]
    DuplicateNode(String),
}

/// The set of known nodes, ordered by node identity.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: Vec<Node>,
}

impl NodeRegistry {
    pub fn from_nodes(mut nodes: Vec<Node>) -> Self {
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        Self { nodes }
    }

    /// Load the address book from a JSON file.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        let records: Vec<NodeRecord> = serde_json::from_str(&content)?;

        let mut nodes = Vec::with_capacity(records.len());
        for record in records {
            let key_bytes = hex::decode(&record.public_key)
                .ok()
                .and_then(|b| <[u8; 32]>::try_from(b).ok())
                .ok_or_else(|| RegistryError::InvalidKey(record.id.clone()))?;
            let public_key = VerifyingKey::from_bytes(&key_bytes)
                .map_err(|_| RegistryError::InvalidKey(record.id.clone()))?;
            nodes.push(Node {
                id: record.id,
                public_key,
                storage_prefix: record.storage_prefix,
            });
        }

        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        for pair in nodes.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(RegistryError::DuplicateNode(pair[0].id.clone()));
            }
        }

        if nodes.is_empty() {
            warn!(path = %path.display(), "address book contains no nodes");
        }

        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Total known node count — the quorum denominator.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

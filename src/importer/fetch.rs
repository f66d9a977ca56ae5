//! Segment retrieval with fallback across endorsing nodes.
//!
//! A signature attests to a claimed hash, not to whatever bytes the node's
//! storage actually serves, so the fetched content is re-hashed and the
//! next endorsing node tried on any mismatch or fetch failure.

use std::sync::Arc;

use tracing::{info, warn};

use crate::registry::NodeRegistry;
use crate::store::ObjectStore;

use super::{ContentHash, QuorumDecision, Segment};

pub struct SegmentFetcher {
    store: Arc<dyn ObjectStore>,
}

impl SegmentFetcher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Try each endorsing node in the decision's deterministic order and
    /// return the first segment whose bytes hash to the endorsed value.
    ///
    /// Exhausting every candidate defers the filename to a later cycle;
    /// nothing here is fatal.
    pub async fn fetch(
        &self,
        decision: &QuorumDecision,
        registry: &NodeRegistry,
    ) -> Option<Segment> {
        for node_id in &decision.nodes {
            // Endorsers are registry nodes by construction, but the
            // registry may have been refreshed since the decision was made.
            let Some(node) = registry.get(node_id) else {
                continue;
            };

            let bytes = match self
                .store
                .get_object(&node.storage_prefix, &decision.filename)
                .await
            {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(
                        filename = %decision.filename,
                        node_id = %node.id,
                        error = %e,
                        "segment fetch failed, trying next endorsing node"
                    );
                    continue;
                }
            };

            let fetched_hash = ContentHash::of(&bytes);
            if fetched_hash == decision.hash {
                return Some(Segment {
                    filename: decision.filename.clone(),
                    bytes,
                    content_hash: fetched_hash,
                });
            }
            warn!(
                filename = %decision.filename,
                node_id = %node.id,
                endorsed = %decision.hash,
                fetched = %fetched_hash,
                "fetched segment does not hash to the endorsed value, trying next endorsing node"
            );
        }

        info!(
            filename = %decision.filename,
            candidates = decision.nodes.len(),
            "all endorsing nodes exhausted, deferring to next cycle"
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Node;
    use crate::store::memory::MemoryObjectStore;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    fn test_registry(ids: &[&str]) -> NodeRegistry {
        NodeRegistry::from_nodes(
            ids.iter()
                .map(|id| Node {
                    id: id.to_string(),
                    public_key: SigningKey::generate(&mut OsRng).verifying_key(),
                    storage_prefix: format!("segments/{}", id),
                })
                .collect(),
        )
    }

    fn decision_for(bytes: &[u8], nodes: &[&str]) -> QuorumDecision {
        QuorumDecision {
            filename: "f1.seg".to_string(),
            hash: ContentHash::of(bytes),
            nodes: nodes.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn returns_first_matching_candidate() {
        let store = Arc::new(MemoryObjectStore::new());
        let registry = test_registry(&["node-1", "node-2"]);
        store.insert("segments/node-1", "f1.seg", b"authentic".to_vec());

        let fetcher = SegmentFetcher::new(store);
        let decision = decision_for(b"authentic", &["node-1", "node-2"]);
        let segment = fetcher.fetch(&decision, &registry).await.unwrap();
        assert_eq!(segment.bytes, b"authentic");
        assert_eq!(segment.content_hash, decision.hash);
    }

    #[tokio::test]
    async fn falls_back_on_hash_mismatch() {
        // First endorser serves substituted bytes; second serves the real
        // segment.
        let store = Arc::new(MemoryObjectStore::new());
        let registry = test_registry(&["node-1", "node-2"]);
        store.insert("segments/node-1", "f1.seg", b"substituted".to_vec());
        store.insert("segments/node-2", "f1.seg", b"authentic".to_vec());

        let fetcher = SegmentFetcher::new(store);
        let decision = decision_for(b"authentic", &["node-1", "node-2"]);
        let segment = fetcher.fetch(&decision, &registry).await.unwrap();
        assert_eq!(segment.bytes, b"authentic");
    }

    #[tokio::test]
    async fn falls_back_on_fetch_failure() {
        let store = Arc::new(MemoryObjectStore::new());
        let registry = test_registry(&["node-1", "node-2"]);
        store.set_failing("segments/node-1");
        store.insert("segments/node-2", "f1.seg", b"authentic".to_vec());

        let fetcher = SegmentFetcher::new(store);
        let decision = decision_for(b"authentic", &["node-1", "node-2"]);
        assert!(fetcher.fetch(&decision, &registry).await.is_some());
    }

    #[tokio::test]
    async fn exhausted_candidates_yield_none() {
        let store = Arc::new(MemoryObjectStore::new());
        let registry = test_registry(&["node-1", "node-2"]);
        store.insert("segments/node-1", "f1.seg", b"bad".to_vec());

        let fetcher = SegmentFetcher::new(store);
        let decision = decision_for(b"authentic", &["node-1", "node-2"]);
        assert!(fetcher.fetch(&decision, &registry).await.is_none());
    }

    #[tokio::test]
    async fn never_returns_mismatching_segment() {
        // Every candidate serves corrupt bytes.
        let store = Arc::new(MemoryObjectStore::new());
        let registry = test_registry(&["node-1", "node-2"]);
        store.insert("segments/node-1", "f1.seg", b"corrupt-a".to_vec());
        store.insert("segments/node-2", "f1.seg", b"corrupt-b".to_vec());

        let fetcher = SegmentFetcher::new(store);
        let decision = decision_for(b"authentic", &["node-1", "node-2"]);
        assert!(fetcher.fetch(&decision, &registry).await.is_none());
    }
}

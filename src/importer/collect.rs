//! Signature collection — one pass over every registered node's storage
//! prefix, gathering attestation objects for segments past the checkpoint.
//!
//! No verification happens here. A node that is unreachable or has published
//! nothing simply contributes no attestations this cycle.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::registry::{Node, NodeRegistry};
use crate::store::ObjectStore;

use super::{Attestation, SIG_SUFFIX};

pub struct SignatureCollector {
    store: Arc<dyn ObjectStore>,
    worker_count: usize,
}

impl SignatureCollector {
    pub fn new(store: Arc<dyn ObjectStore>, worker_count: usize) -> Self {
        Self {
            store,
            worker_count: worker_count.max(1),
        }
    }

    /// Gather attestations for every segment filename strictly after
    /// `boundary` (the checkpointed filename), grouped by filename in
    /// ascending timestamp order.
    ///
    /// Node prefixes are read concurrently, bounded by the worker count.
    pub async fn collect(
        &self,
        registry: &NodeRegistry,
        boundary: Option<&str>,
    ) -> BTreeMap<String, Vec<Attestation>> {
        let per_node: Vec<Vec<Attestation>> = stream::iter(registry.nodes())
            .map(|node| self.collect_node(node, boundary))
            .buffer_unordered(self.worker_count)
            .collect()
            .await;

        let mut pending: BTreeMap<String, Vec<Attestation>> = BTreeMap::new();
        for attestations in per_node {
            for attestation in attestations {
                pending
                    .entry(attestation.filename.clone())
                    .or_default()
                    .push(attestation);
            }
        }
        pending
    }

    async fn collect_node(&self, node: &Node, boundary: Option<&str>) -> Vec<Attestation> {
        let names = match self.store.list_objects(&node.storage_prefix).await {
            Ok(names) => names,
            Err(e) => {
                debug!(node_id = %node.id, error = %e, "node storage unreachable, no attestations this cycle");
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        for name in names {
            let Some(filename) = name.strip_suffix(SIG_SUFFIX) else {
                continue;
            };
            if let Some(boundary) = boundary {
                if filename <= boundary {
                    continue;
                }
            }
            match self.store.get_object(&node.storage_prefix, &name).await {
                Ok(bytes) => match Attestation::parse(filename, &node.id, &bytes) {
                    Ok(attestation) => out.push(attestation),
                    Err(e) => {
                        warn!(node_id = %node.id, object = %name, error = %e, "malformed attestation dropped");
                    }
                },
                Err(e) => {
                    warn!(node_id = %node.id, object = %name, error = %e, "attestation fetch failed, skipping");
                }
            }
        }
        out
    }
}

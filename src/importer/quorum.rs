//! Signature verification and quorum computation.
//!
//! Pure functions of the attestation list and the registry: no I/O, so the
//! Byzantine-threshold reasoning is directly testable.

use std::collections::{BTreeMap, BTreeSet};

use ed25519_dalek::Signature;
use tracing::{debug, info, warn};

use crate::registry::NodeRegistry;

use super::{Attestation, ContentHash, QuorumDecision};

/// Largest supporter count that still fails quorum: floor(2T/3) of the
/// total known node count. A hash qualifies only with strictly more
/// supporters than this.
pub fn quorum_threshold(total_nodes: usize) -> usize {
    2 * total_nodes / 3
}

/// Verify one filename's attestations and decide whether any claimed hash
/// has quorum support.
///
/// Attestations with unverifiable signatures, or from nodes not in the
/// registry, are dropped as if the node never attested. A node counts once
/// per hash no matter how many attestations it published. Zero qualifying
/// groups defers the filename; more than one (possible only if a node signs
/// conflicting hashes) selects none — stalling is safer than picking
/// arbitrarily.
pub fn evaluate(
    filename: &str,
    attestations: &[Attestation],
    registry: &NodeRegistry,
) -> Option<QuorumDecision> {
    let mut support: BTreeMap<ContentHash, BTreeSet<String>> = BTreeMap::new();

    for attestation in attestations {
        let Some(node) = registry.get(&attestation.node_id) else {
            warn!(filename, node_id = %attestation.node_id, "attestation from unknown node dropped");
            continue;
        };
        let signature = Signature::from_bytes(&attestation.signature);
        if node
            .public_key
            .verify_strict(&attestation.claimed_hash.0, &signature)
            .is_err()
        {
            warn!(filename, node_id = %node.id, "attestation signature failed verification, dropped");
            continue;
        }
        support
            .entry(attestation.claimed_hash)
            .or_default()
            .insert(node.id.clone());
    }

    let threshold = quorum_threshold(registry.len());
    let mut qualifying: Vec<(ContentHash, BTreeSet<String>)> = support
        .into_iter()
        .filter(|(_, supporters)| supporters.len() > threshold)
        .collect();

    match qualifying.len() {
        0 => {
            info!(
                filename,
                total_nodes = registry.len(),
                "no hash reached quorum, deferring to next cycle"
            );
            None
        }
        1 => {
            let (hash, supporters) = qualifying.pop()?;
            debug!(filename, %hash, supporters = supporters.len(), "quorum reached");
            Some(QuorumDecision {
                filename: filename.to_string(),
                hash,
                // BTreeSet iteration gives the deterministic node order
                // retries depend on.
                nodes: supporters.into_iter().collect(),
            })
        }
        groups => {
            warn!(filename, groups, "multiple hashes reached quorum, selecting none");
            None
        }
    }
}

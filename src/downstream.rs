//! Handoff of validated segments to the downstream parser/publisher.
//!
//! The importer sends and moves on; downstream durability and retry are the
//! collaborator's responsibility, decoupled from chain-validation
//! correctness.

use tokio::sync::mpsc;
use tracing::info;

use crate::importer::ContentHash;

/// What downstream receives for each chain-validated segment.
#[derive(Debug, Clone)]
pub struct ValidatedSegment {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub hash: ContentHash,
}

pub fn channel(capacity: usize) -> (mpsc::Sender<ValidatedSegment>, mpsc::Receiver<ValidatedSegment>) {
    mpsc::channel(capacity.max(1))
}

/// Default sink: log each validated segment. A real deployment replaces
/// this task with a parser/publisher consuming the same receiver.
pub async fn run_logging_sink(mut rx: mpsc::Receiver<ValidatedSegment>) {
    while let Some(segment) = rx.recv().await {
        info!(
            filename = %segment.filename,
            hash = %segment.hash,
            size = segment.bytes.len(),
            "validated segment handed off"
        );
    }
}

//! Hash-chain continuity validation and checkpoint advancement.
//!
//! Single-writer by construction: exactly one validation is in flight at a
//! time, and the checkpoint is persisted before the next filename is
//! attempted.

use thiserror::Error;
use tracing::debug;

use crate::checkpoint::{Checkpoint, CheckpointError, CheckpointStore};

use super::{ContentHash, Segment, SegmentFormatError, GENESIS_HASH};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Format(#[from] SegmentFormatError),
    #[error("chain discontinuity at {filename}: previous hash {found} does not match checkpoint {expected}")]
    Discontinuity {
        filename: String,
        expected: String,
        found: String,
    },
    #[error("checkpoint persistence failed: {0}")]
    Persist(#[from] CheckpointError),
}

impl ChainError {
    /// Persistence failures abort the cycle but are not chain breaks.
    pub fn is_persist(&self) -> bool {
        matches!(self, ChainError::Persist(_))
    }
}

/// Continuity holds when the segment's declared predecessor is the
/// checkpointed hash, or the genesis marker (first segment ever, or a
/// legitimate chain restart).
pub fn continuity_holds(previous: &ContentHash, checkpoint: Option<&Checkpoint>) -> bool {
    match checkpoint {
        None => previous.is_genesis(),
        Some(cp) => *previous == cp.hash || previous.is_genesis(),
    }
}

pub struct ChainValidator {
    checkpoints: CheckpointStore,
}

impl ChainValidator {
    pub fn new(checkpoints: CheckpointStore) -> Self {
        Self { checkpoints }
    }

    pub fn checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoints.current()
    }

    /// Confirm the segment extends the checkpointed chain, then advance and
    /// persist the checkpoint. On any error the checkpoint is untouched.
    pub fn validate(&mut self, segment: &Segment) -> Result<(), ChainError> {
        let previous = segment.previous_hash()?;

        if !continuity_holds(&previous, self.checkpoints.current()) {
            let expected = self
                .checkpoints
                .current()
                .map(|cp| cp.hash.to_hex())
                .unwrap_or_else(|| GENESIS_HASH.to_hex());
            return Err(ChainError::Discontinuity {
                filename: segment.filename.clone(),
                expected,
                found: previous.to_hex(),
            });
        }

        self.checkpoints
            .advance(&segment.filename, segment.content_hash)?;
        debug!(
            filename = %segment.filename,
            hash = %segment.content_hash,
            "chain extended, checkpoint persisted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn validator(dir: &TempDir) -> ChainValidator {
        ChainValidator::new(
            CheckpointStore::load(dir.path().join("checkpoint.json")).unwrap(),
        )
    }

    fn segment(filename: &str, previous: &ContentHash, body: &[u8]) -> Segment {
        Segment::new(filename.to_string(), Segment::encode(1, previous, body))
    }

    #[test]
    fn genesis_segment_starts_the_chain() {
        let dir = TempDir::new().unwrap();
        let mut validator = validator(&dir);

        let seg = segment("f1.seg", &GENESIS_HASH, b"first");
        validator.validate(&seg).unwrap();

        let cp = validator.checkpoint().unwrap();
        assert_eq!(cp.filename, "f1.seg");
        assert_eq!(cp.hash, seg.content_hash);
    }

    #[test]
    fn empty_checkpoint_rejects_non_genesis_predecessor() {
        let dir = TempDir::new().unwrap();
        let mut validator = validator(&dir);

        let seg = segment("f1.seg", &ContentHash::of(b"somewhere"), b"first");
        assert!(matches!(
            validator.validate(&seg),
            Err(ChainError::Discontinuity { .. })
        ));
        assert!(validator.checkpoint().is_none());
    }

    #[test]
    fn chain_extends_when_previous_hash_matches() {
        let dir = TempDir::new().unwrap();
        let mut validator = validator(&dir);

        let first = segment("f1.seg", &GENESIS_HASH, b"first");
        validator.validate(&first).unwrap();

        let second = segment("f2.seg", &first.content_hash, b"second");
        validator.validate(&second).unwrap();
        assert_eq!(validator.checkpoint().unwrap().filename, "f2.seg");
    }

    #[test]
    fn discontinuity_leaves_checkpoint_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut validator = validator(&dir);

        let first = segment("f1.seg", &GENESIS_HASH, b"first");
        validator.validate(&first).unwrap();
        let before = validator.checkpoint().cloned();

        let broken = segment("f2.seg", &ContentHash::of(b"not f1"), b"second");
        assert!(matches!(
            validator.validate(&broken),
            Err(ChainError::Discontinuity { .. })
        ));
        assert_eq!(validator.checkpoint().cloned(), before);
    }

    #[test]
    fn genesis_marker_mid_stream_is_a_valid_restart() {
        let dir = TempDir::new().unwrap();
        let mut validator = validator(&dir);

        let first = segment("f1.seg", &GENESIS_HASH, b"first");
        validator.validate(&first).unwrap();

        let restarted = segment("f2.seg", &GENESIS_HASH, b"restart");
        validator.validate(&restarted).unwrap();
        assert_eq!(validator.checkpoint().unwrap().filename, "f2.seg");
    }

    #[test]
    fn malformed_header_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut validator = validator(&dir);

        let seg = Segment::new("f1.seg".to_string(), vec![1, 2, 3]);
        assert!(matches!(
            validator.validate(&seg),
            Err(ChainError::Format(_))
        ));
        assert!(validator.checkpoint().is_none());
    }
}

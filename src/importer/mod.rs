//! Core import pipeline: collect attestations, establish quorum, fetch the
//! endorsed segment, and extend the verified hash chain.
//!
//! Shared types live here; each pipeline stage has its own module.

pub mod chain;
pub mod collect;
pub mod cycle;
pub mod fetch;
pub mod quorum;

use std::fmt;

use sha2::{Digest, Sha384};
use thiserror::Error;

/// Width of the segment content digest (SHA-384).
pub const HASH_LEN: usize = 48;

/// Ed25519 signature length.
pub const SIGNATURE_LEN: usize = 64;

/// Attestation file markers, in publication order.
const MARKER_HASH: u8 = 0x04;
const MARKER_SIGNATURE: u8 = 0x03;

/// Segment header marker preceding the previous-hash field.
const MARKER_PREV_HASH: u8 = 0x01;

/// Segment format versions this importer understands.
const SUPPORTED_VERSIONS: [u32; 2] = [1, 2];

/// Suffix of attestation objects in a node's storage prefix.
pub const SIG_SUFFIX: &str = ".sig";

/// A SHA-384 content digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(pub [u8; HASH_LEN]);

/// Reserved all-zero digest denoting "no predecessor".
pub const GENESIS_HASH: ContentHash = ContentHash([0u8; HASH_LEN]);

impl ContentHash {
    /// Digest of raw segment bytes.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha384::new();
        hasher.update(bytes);
        let digest = hasher.finalize();
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(&digest);
        Self(out)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != HASH_LEN {
            return None;
        }
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(bytes);
        Some(Self(out))
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        hex::decode(s).ok().and_then(|b| Self::from_slice(&b))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn is_genesis(&self) -> bool {
        *self == GENESIS_HASH
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

/// A node's signed claim of one segment's content hash.
///
/// Created by the collector each cycle and discarded with the cycle; never
/// persisted.
#[derive(Debug, Clone)]
pub struct Attestation {
    /// Segment filename this attestation covers.
    pub filename: String,
    /// Identity of the publishing node.
    pub node_id: String,
    /// Content hash the node claims for the segment.
    pub claimed_hash: ContentHash,
    /// Ed25519 signature over the 48 claimed-hash bytes.
    pub signature: [u8; SIGNATURE_LEN],
}

#[derive(Debug, Error)]
pub enum AttestationFormatError {
    #[error("attestation truncated ({0} bytes)")]
    Truncated(usize),
    #[error("bad hash marker {0:#04x}")]
    BadHashMarker(u8),
    #[error("bad signature marker {0:#04x}")]
    BadSignatureMarker(u8),
    #[error("unexpected signature length {0}")]
    BadSignatureLength(u32),
}

impl Attestation {
    /// Parse a raw attestation object published by `node_id` for `filename`.
    ///
    /// Layout (big-endian): `0x04`, 48 hash bytes, `0x03`, u32 signature
    /// length (must be 64), signature bytes.
    pub fn parse(
        filename: &str,
        node_id: &str,
        bytes: &[u8],
    ) -> Result<Self, AttestationFormatError> {
        const SIG_LEN_OFFSET: usize = 1 + HASH_LEN + 1;
        const SIG_OFFSET: usize = SIG_LEN_OFFSET + 4;

        if bytes.len() < SIG_OFFSET {
            return Err(AttestationFormatError::Truncated(bytes.len()));
        }
        if bytes[0] != MARKER_HASH {
            return Err(AttestationFormatError::BadHashMarker(bytes[0]));
        }
        if bytes[1 + HASH_LEN] != MARKER_SIGNATURE {
            return Err(AttestationFormatError::BadSignatureMarker(bytes[1 + HASH_LEN]));
        }

        let mut len_buf = [0u8; 4];
        len_buf.copy_from_slice(&bytes[SIG_LEN_OFFSET..SIG_LEN_OFFSET + 4]);
        let sig_len = u32::from_be_bytes(len_buf);
        if sig_len as usize != SIGNATURE_LEN {
            return Err(AttestationFormatError::BadSignatureLength(sig_len));
        }
        if bytes.len() < SIG_OFFSET + SIGNATURE_LEN {
            return Err(AttestationFormatError::Truncated(bytes.len()));
        }

        let claimed_hash = ContentHash::from_slice(&bytes[1..1 + HASH_LEN])
            .ok_or(AttestationFormatError::Truncated(bytes.len()))?;
        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&bytes[SIG_OFFSET..SIG_OFFSET + SIGNATURE_LEN]);

        Ok(Self {
            filename: filename.to_string(),
            node_id: node_id.to_string(),
            claimed_hash,
            signature,
        })
    }

    /// Encode into the published wire layout. Used by nodes and by tests.
    pub fn encode(hash: &ContentHash, signature: &[u8; SIGNATURE_LEN]) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + HASH_LEN + 1 + 4 + SIGNATURE_LEN);
        out.push(MARKER_HASH);
        out.extend_from_slice(&hash.0);
        out.push(MARKER_SIGNATURE);
        out.extend_from_slice(&(SIGNATURE_LEN as u32).to_be_bytes());
        out.extend_from_slice(signature);
        out
    }
}

/// One filename's winning hash and the nodes whose verified attestations
/// endorse it, ordered by node identity for reproducible fetch retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuorumDecision {
    pub filename: String,
    pub hash: ContentHash,
    pub nodes: Vec<String>,
}

#[derive(Debug, Error)]
pub enum SegmentFormatError {
    #[error("segment truncated ({0} bytes)")]
    Truncated(usize),
    #[error("unsupported segment format version {0}")]
    UnsupportedVersion(u32),
    #[error("bad previous-hash marker {0:#04x}")]
    BadPrevHashMarker(u8),
}

/// Byte length of the segment header: u32 version, marker, previous hash.
pub const SEGMENT_HEADER_LEN: usize = 4 + 1 + HASH_LEN;

/// A fetched, hash-endorsed segment. Immutable once fetched; the body past
/// the header is opaque to the importer.
#[derive(Debug, Clone)]
pub struct Segment {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub content_hash: ContentHash,
}

impl Segment {
    pub fn new(filename: String, bytes: Vec<u8>) -> Self {
        let content_hash = ContentHash::of(&bytes);
        Self {
            filename,
            bytes,
            content_hash,
        }
    }

    /// Read the embedded previous-segment hash from the header.
    pub fn previous_hash(&self) -> Result<ContentHash, SegmentFormatError> {
        if self.bytes.len() < SEGMENT_HEADER_LEN {
            return Err(SegmentFormatError::Truncated(self.bytes.len()));
        }
        let mut version_buf = [0u8; 4];
        version_buf.copy_from_slice(&self.bytes[0..4]);
        let version = u32::from_be_bytes(version_buf);
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(SegmentFormatError::UnsupportedVersion(version));
        }
        if self.bytes[4] != MARKER_PREV_HASH {
            return Err(SegmentFormatError::BadPrevHashMarker(self.bytes[4]));
        }
        Ok(ContentHash::from_slice(&self.bytes[5..5 + HASH_LEN])
            .unwrap_or(GENESIS_HASH))
    }

    /// Encode a segment with the given previous hash and body. Used by
    /// publishing nodes and by tests.
    pub fn encode(version: u32, previous_hash: &ContentHash, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(SEGMENT_HEADER_LEN + body.len());
        out.extend_from_slice(&version.to_be_bytes());
        out.push(MARKER_PREV_HASH);
        out.extend_from_slice(&previous_hash.0);
        out.extend_from_slice(body);
        out
    }
}

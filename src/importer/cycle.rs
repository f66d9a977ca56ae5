//! Per-cycle orchestration: Collecting, then for each pending filename in
//! ascending order Verifying, Fetching, Validating; back to Idle on
//! completion, stop request, or chain break.
//!
//! Filenames are strictly ordered because chain validation is sequentially
//! dependent; a validation failure aborts the remainder of the cycle since
//! later segments cannot link past the break.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::downstream::ValidatedSegment;
use crate::registry::NodeRegistry;
use crate::stop::StopFlag;
use crate::store::ObjectStore;

use super::chain::ChainValidator;
use super::collect::SignatureCollector;
use super::fetch::SegmentFetcher;
use super::quorum;
use super::Segment;

/// What one polling cycle accomplished.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Filenames with at least one attestation past the checkpoint.
    pub pending: usize,
    /// Segments validated and checkpointed this cycle.
    pub validated: usize,
    /// Filenames deferred to a later cycle (no quorum, or fetch exhausted).
    pub deferred: usize,
    /// Filename at which the chain broke, if it did.
    pub chain_break: Option<String>,
    /// Whether a stop request ended the cycle early.
    pub stopped: bool,
}

impl CycleReport {
    pub fn is_idle(&self) -> bool {
        self.pending == 0
    }
}

pub struct Orchestrator {
    /// Address book to reload at cycle boundaries; `None` pins the initial
    /// registry (used by tests).
    registry_path: Option<PathBuf>,
    registry: NodeRegistry,
    collector: SignatureCollector,
    fetcher: SegmentFetcher,
    validator: ChainValidator,
    downstream: mpsc::Sender<ValidatedSegment>,
    stop: StopFlag,
    /// Consecutive cycles stuck on the same discontinuity before the log
    /// escalates to an operator-attention event; 0 disables escalation.
    escalate_after: u32,
    break_streak: u32,
    last_break: Option<String>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        registry_path: Option<PathBuf>,
        registry: NodeRegistry,
        validator: ChainValidator,
        downstream: mpsc::Sender<ValidatedSegment>,
        stop: StopFlag,
        worker_count: usize,
        escalate_after: u32,
    ) -> Self {
        Self {
            registry_path,
            registry,
            collector: SignatureCollector::new(store.clone(), worker_count),
            fetcher: SegmentFetcher::new(store),
            validator,
            downstream,
            stop,
            escalate_after,
            break_streak: 0,
            last_break: None,
        }
    }

    /// Drive one polling cycle end-to-end.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        self.refresh_registry();

        let boundary = self.validator.checkpoint().map(|cp| cp.filename.clone());
        let pending = self
            .collector
            .collect(&self.registry, boundary.as_deref())
            .await;
        report.pending = pending.len();
        if pending.is_empty() {
            return report;
        }

        for (filename, attestations) in pending {
            if self.stop.is_set() {
                info!("stop requested, ending cycle");
                report.stopped = true;
                break;
            }

            // Idempotent resume: anything at or before the checkpoint has
            // already been validated and persisted.
            if let Some(cp) = self.validator.checkpoint() {
                if filename.as_str() <= cp.filename.as_str() {
                    continue;
                }
            }

            let Some(decision) = quorum::evaluate(&filename, &attestations, &self.registry)
            else {
                report.deferred += 1;
                continue;
            };

            let Some(segment) = self.fetcher.fetch(&decision, &self.registry).await else {
                report.deferred += 1;
                continue;
            };

            match self.validator.validate(&segment) {
                Ok(()) => {
                    report.validated += 1;
                    self.break_streak = 0;
                    self.last_break = None;
                    self.hand_off(segment);
                }
                Err(e) if e.is_persist() => {
                    error!(filename = %filename, error = %e, "checkpoint persistence failed, ending cycle");
                    break;
                }
                Err(e) => {
                    error!(filename = %filename, error = %e, "chain validation failed, ending cycle");
                    self.note_chain_break(&filename);
                    report.chain_break = Some(filename);
                    break;
                }
            }
        }

        report
    }

    /// Reload the externally maintained address book. A failed reload keeps
    /// the previous registry in effect for this cycle.
    fn refresh_registry(&mut self) {
        let Some(path) = &self.registry_path else {
            return;
        };
        match NodeRegistry::load(path) {
            Ok(registry) => {
                if registry.len() != self.registry.len() {
                    info!(
                        previous = self.registry.len(),
                        current = registry.len(),
                        "node registry changed"
                    );
                }
                self.registry = registry;
            }
            Err(e) => {
                error!(error = %e, "address book reload failed, keeping previous registry");
            }
        }
    }

    fn note_chain_break(&mut self, filename: &str) {
        if self.last_break.as_deref() == Some(filename) {
            self.break_streak += 1;
        } else {
            self.last_break = Some(filename.to_string());
            self.break_streak = 1;
        }
        if self.escalate_after > 0 && self.break_streak >= self.escalate_after {
            error!(
                filename,
                cycles = self.break_streak,
                "chain discontinuity persists, operator attention required"
            );
        }
    }

    /// Send the validated segment downstream without waiting; downstream
    /// durability is not the importer's concern.
    fn hand_off(&self, segment: Segment) {
        let handoff = ValidatedSegment {
            filename: segment.filename,
            hash: segment.content_hash,
            bytes: segment.bytes,
        };
        match self.downstream.try_send(handoff) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(seg)) => {
                warn!(filename = %seg.filename, "downstream channel full, dropping handoff");
            }
            Err(mpsc::error::TrySendError::Closed(seg)) => {
                warn!(filename = %seg.filename, "downstream channel closed, dropping handoff");
            }
        }
    }
}

//! Checkpointed batch loop.
//!
//! Records are evaluated one at a time in input order. Every
//! `checkpoint_every` evaluations the full record set is handed to the sink,
//! so a crash loses at most `checkpoint_every - 1` evaluations. The sink is
//! responsible for making each write a complete snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::engine::Reconcile;
use crate::error::ReconError;
use crate::model::{Outcome, ProductRecord, RunSummary, SkipReason};

/// Destination for checkpoints and the pending list.
pub trait RecordSink {
    /// Overwrite the output with the full current record set.
    fn checkpoint(&mut self, records: &[ProductRecord]) -> Result<(), ReconError>;

    /// Write records no tier could resolve. Only called with a non-empty
    /// slice, once, at the end of a complete run.
    fn pending(&mut self, records: &[ProductRecord]) -> Result<(), ReconError>;
}

/// Shared stop flag. Set from a signal handler or another thread; the runner
/// checks it between records.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct BatchRunner {
    checkpoint_every: usize,
    cancel: CancelToken,
}

impl BatchRunner {
    pub fn new(checkpoint_every: usize) -> Self {
        Self {
            checkpoint_every: checkpoint_every.max(1),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Evaluate every record with `step`, checkpointing into `sink`.
    ///
    /// Records that already carry a result (loaded from an earlier run's
    /// output) are carried over without evaluation. On cancellation the loop
    /// stops before the next record, writes a final checkpoint and returns
    /// with `interrupted` set; the pending list is not written in that case.
    pub fn run(
        &self,
        records: &mut [ProductRecord],
        step: &mut dyn Reconcile,
        sink: &mut dyn RecordSink,
    ) -> Result<RunSummary, ReconError> {
        let total = records.len();
        let mut summary = RunSummary { total, ..Default::default() };
        let mut pending_rows: Vec<usize> = Vec::new();
        let mut since_checkpoint = 0usize;

        log::info!("{}: evaluating {} record(s)", step.mode(), total);

        for i in 0..total {
            if self.cancel.is_cancelled() {
                log::warn!("interrupted after {i} of {total} record(s)");
                summary.interrupted = true;
                break;
            }

            if records[i].is_resolved() {
                summary.carried_over += 1;
                continue;
            }

            let outcome = step.evaluate(&mut records[i]);
            match outcome {
                Outcome::Resolved(result) => {
                    summary.resolved += 1;
                    *summary.tier_counts.entry(result.tier.to_string()).or_insert(0) += 1;
                    if result.rejected_code.is_some() {
                        summary.rejected_codes += 1;
                    }
                }
                Outcome::Pending(result) => {
                    summary.pending += 1;
                    *summary.tier_counts.entry(result.tier.to_string()).or_insert(0) += 1;
                    if result.rejected_code.is_some() {
                        summary.rejected_codes += 1;
                    }
                    if result.rejected_proposal.is_some() {
                        summary.rejected_proposals += 1;
                    }
                    pending_rows.push(i);
                }
                Outcome::Skipped(SkipReason::AlreadyResolved) => {
                    summary.carried_over += 1;
                    continue;
                }
                Outcome::Skipped(_) => {
                    summary.skipped += 1;
                    continue;
                }
            }

            since_checkpoint += 1;
            if since_checkpoint == self.checkpoint_every {
                sink.checkpoint(records)?;
                summary.checkpoints += 1;
                since_checkpoint = 0;
                log::info!("checkpoint saved ({}/{total})", i + 1);
            }
        }

        sink.checkpoint(records)?;
        summary.checkpoints += 1;

        if !summary.interrupted && !pending_rows.is_empty() {
            let pending: Vec<ProductRecord> =
                pending_rows.iter().map(|&i| records[i].clone()).collect();
            sink.pending(&pending)?;
            log::warn!("{} record(s) left pending", pending.len());
        }

        log::info!(
            "{}: {} total, {} resolved, {} pending, {} carried over, {} skipped",
            step.mode(),
            summary.total,
            summary.resolved,
            summary.pending,
            summary.carried_over,
            summary.skipped,
        );

        Ok(summary)
    }
}

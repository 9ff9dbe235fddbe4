//! Everything one update run reads and writes, owned in one place

use crate::state::batch::{Batch, RunStatus};
use crate::state::metadata::Metadata;
use crate::state::stats::{RepoCounts, RunStats};
use crate::state::Dataset;

/// Mutable state of a single run
///
/// Built from the checkpoint at run start, mutated only by the batch
/// processor, and folded back into [`Metadata`] by [`RunContext::finish`].
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Package name to canonical repository URL (`None` when unresolved)
    pub dataset: Dataset,

    /// Cumulative metadata as loaded; updated in place by `finish`
    pub metadata: Metadata,

    pub batch: Batch,

    /// Counters for this run only
    pub stats: RunStats,

    /// Repository count deltas for this run only
    pub repos: RepoCounts,

    /// Whether a checkpoint existed before this run
    pub resumed: bool,
}

impl RunContext {
    /// Prepares a run from a loaded checkpoint
    ///
    /// If the previous run ended in error the budget is narrowed to a single
    /// change so a poison change fails alone. If it was already narrowed (a
    /// limit of one or less), the offending sequence is skipped and recorded
    /// as ignored.
    ///
    /// # Arguments
    ///
    /// * `checkpoint` - Previous metadata and dataset, if any
    /// * `limit` - Configured change budget (`0` = unbounded)
    /// * `latest` - Upstream high-water mark
    pub fn start(checkpoint: Option<(Metadata, Dataset)>, limit: u64, latest: u64) -> Self {
        let resumed = checkpoint.is_some();
        let (mut metadata, dataset) = checkpoint.unwrap_or_default();
        let mut stats = RunStats::default();
        let mut limit = limit;

        if metadata.error {
            let previous_limit = metadata
                .batch
                .as_ref()
                .map_or(limit, |batch| batch.limit);

            if previous_limit > 1 {
                tracing::warn!(
                    "previous run failed after sequence {}; retrying a single change",
                    metadata.last_sequence
                );
                limit = 1;
            } else {
                tracing::warn!(
                    "previous run failed on the change after sequence {}; skipping it",
                    metadata.last_sequence
                );
                metadata.last_sequence += 1;
                metadata.ignored.push(metadata.last_sequence);
                stats.ignored += 1;
            }
        }

        metadata.error = false;
        let batch = Batch::plan(metadata.last_sequence, limit, latest);

        Self {
            dataset,
            metadata,
            batch,
            stats,
            repos: RepoCounts::default(),
            resumed,
        }
    }

    /// Picks the status of a run that stopped without an explicit reason
    pub fn natural_status(&self) -> RunStatus {
        match (self.batch.found, self.resumed) {
            (0, false) => RunStatus::Init,
            (0, true) => RunStatus::Empty,
            _ => RunStatus::Ok,
        }
    }

    /// Folds this run into the cumulative metadata and returns it
    ///
    /// `status` of `None` means the run ended on its own; see
    /// [`RunContext::natural_status`].
    pub fn finish(&mut self, status: Option<RunStatus>, error: Option<String>) -> &Metadata {
        let status = status.unwrap_or_else(|| self.natural_status());

        self.batch.error = error;
        self.batch.finish(status);

        let metadata = &mut self.metadata;
        metadata.packages = self.dataset.len() as u64;
        metadata.last_sequence = self.batch.index;
        metadata.latest_sequence = self.batch.latest;
        metadata.runs.record(status);
        metadata.stats.merge(&self.stats);
        metadata.repos.merge(&self.repos);
        metadata.error = status.is_error();
        metadata.batch = Some(self.batch.clone());

        tracing::debug!(
            "run finished with status {} after {} changes",
            status,
            self.batch.found
        );

        metadata
    }
}

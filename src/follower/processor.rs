//! Batch processor: applies ordered changes to the run context
//!
//! This is the only code that mutates the dataset and the counters. It
//! consumes feed events one at a time, in sequence order.

use crate::follower::feed::{Change, FeedEvent};
use crate::follower::progress::ProgressTracker;
use crate::state::{RunContext, RunStatus};
use crate::storage::ChangeCache;
use crate::url::Classifier;
use crate::RegistryError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// What the run loop should do after an event
#[derive(Debug)]
pub enum Flow {
    Continue,

    /// The batch is complete or the feed is caught up
    Finished,

    /// A fatal error stopped the run
    Failed(RegistryError),
}

/// Consumer side of the change pipeline
#[derive(Debug)]
pub struct BatchProcessor {
    classifier: Classifier,
    cache: Option<ChangeCache>,
    progress: ProgressTracker,
}

impl BatchProcessor {
    pub fn new(classifier: Classifier, cache: Option<ChangeCache>, progress: ProgressTracker) -> Self {
        Self {
            classifier,
            cache,
            progress,
        }
    }

    /// Applies one change to the dataset and the run counters
    ///
    /// Does not touch the cursor; see [`BatchProcessor::consume`].
    pub fn apply(&self, ctx: &mut RunContext, change: &Change) {
        ctx.stats.changes += 1;

        if ctx.metadata.not_found.clear(&change.id) {
            ctx.stats.not_found -= 1;
            tracing::debug!("{} is available again at sequence {}", change.id, change.seq);
        }

        if change.deleted {
            if let Some(previous) = ctx.dataset.remove(&change.id) {
                ctx.repos.decrement(previous.as_deref());
            }
            ctx.stats.deletes += 1;
            tracing::trace!("{}: deleted at sequence {}", change.id, change.seq);
            return;
        }

        let url = change
            .repository
            .as_ref()
            .and_then(|descriptor| self.classifier.resolve(descriptor));

        if url.is_none() {
            ctx.stats.invalid += 1;
        }

        match ctx.dataset.get(&change.id) {
            Some(previous) => {
                if previous.is_some() {
                    ctx.stats.updates += 1;
                } else {
                    ctx.stats.inserts += 1;
                }
                ctx.repos.decrement(previous.as_deref());
            }
            None => ctx.stats.inserts += 1,
        }

        ctx.repos.increment(url.as_deref());
        tracing::trace!("{}: {:?} at sequence {}", change.id, url, change.seq);
        ctx.dataset.insert(change.id.clone(), url);
    }

    /// Applies a change and advances the cursor past it
    pub fn consume(&mut self, ctx: &mut RunContext, change: &Change) {
        self.apply(ctx, change);
        ctx.batch.index = change.seq;
        ctx.batch.found += 1;
    }

    /// Handles one event from the follower
    pub fn handle(&mut self, ctx: &mut RunContext, event: FeedEvent) -> Flow {
        match event {
            FeedEvent::Change(change) => {
                if let Some(cache) = self.cache.as_mut() {
                    if let Err(e) = cache.record(&change) {
                        tracing::warn!("failed to write change cache: {}", e);
                    }
                }

                self.consume(ctx, &change);
                self.progress.report(&ctx.batch, false);
            }

            FeedEvent::Failed { seq, id, error } if error.is_not_found() => {
                if ctx.metadata.not_found.record(&id, seq) {
                    ctx.stats.not_found += 1;
                }
                tracing::debug!("{} not found at sequence {}, skipped", id, seq);
                ctx.batch.index = seq;
                self.progress.report(&ctx.batch, false);
            }

            FeedEvent::Failed { seq, id, error } => {
                tracing::error!("failed to fetch {} at sequence {}: {}", id, seq, error);
                return Flow::Failed(error);
            }

            FeedEvent::Fatal(error) => {
                tracing::error!("change feed failed: {}", error);
                return Flow::Failed(error);
            }

            FeedEvent::CaughtUp => {
                tracing::info!("up to date!");
                return Flow::Finished;
            }
        }

        if ctx.batch.is_complete() {
            tracing::info!("finish!");
            Flow::Finished
        } else {
            Flow::Continue
        }
    }

    /// Replays cached changes in the window `(since, until]` of the batch
    ///
    /// Replayed changes are applied but not cached again. After replay the
    /// batch resumes from the last replayed sequence. Replay stops early when
    /// `cancel` fires or `deadline` passes; the returned status says which.
    pub fn replay_cache(
        &mut self,
        ctx: &mut RunContext,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> Option<RunStatus> {
        let cache = self.cache.as_ref().filter(|cache| cache.is_readable())?;

        tracing::info!("reading cache...");
        let changes = match cache.load_window(ctx.batch.index, ctx.batch.until) {
            Ok(changes) => changes,
            Err(e) => {
                tracing::warn!("failed to read change cache: {}", e);
                return None;
            }
        };

        let mut stopped = None;
        for change in &changes {
            if cancel.is_cancelled() {
                stopped = Some(RunStatus::Cancelled);
                break;
            }
            if Instant::now() >= deadline {
                stopped = Some(RunStatus::Killed);
                break;
            }

            self.consume(ctx, change);
            ctx.batch.since = ctx.batch.index;
        }

        tracing::info!(" -> added {} entries", ctx.batch.found);
        stopped
    }

    /// Forces a progress line, e.g. on an operator signal
    pub fn dump_progress(&mut self, ctx: &RunContext) {
        self.progress.report(&ctx.batch, true);
    }

    /// Starts the progress clock
    pub fn start_progress(&mut self, ctx: &RunContext) {
        tracing::info!("applying changes...");
        self.progress.report(&ctx.batch, false);
    }

    /// Writes any buffered cache entries
    pub fn flush_cache(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            if let Err(e) = cache.flush() {
                tracing::warn!("failed to write change cache: {}", e);
            }
        }
    }
}

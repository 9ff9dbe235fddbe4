//! Run orchestration
//!
//! This module wires one update run together:
//! - Loading the checkpoint and planning the batch
//! - Replaying the change cache
//! - Spawning the follower and draining its events in order
//! - Applying the wall-clock budget, inactivity timeout and cancellation
//! - Writing the checkpoint exactly once, whatever the outcome

use crate::config::Config;
use crate::follower::client::RegistryClient;
use crate::follower::feed::Follower;
use crate::follower::processor::{BatchProcessor, Flow};
use crate::follower::progress::ProgressTracker;
use crate::state::{Metadata, RunContext, RunStatus};
use crate::storage::{ChangeCache, CheckpointStore};
use crate::url::Classifier;
use crate::{RegistryError, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// External inputs that steer a running update
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    /// Stops the run with status `cancelled`
    pub cancel: CancellationToken,

    /// Forces a progress line
    pub dump: Arc<Notify>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }
}

/// How the event loop ended
struct Outcome {
    status: Option<RunStatus>,
    error: Option<RegistryError>,
}

impl Outcome {
    fn natural() -> Self {
        Self {
            status: None,
            error: None,
        }
    }

    fn stopped(status: RunStatus) -> Self {
        Self {
            status: Some(status),
            error: None,
        }
    }

    fn failed(status: RunStatus, error: RegistryError) -> Self {
        Self {
            status: Some(status),
            error: Some(error),
        }
    }
}

/// Runs one update against the registry
///
/// # Flow
///
/// 1. Load the checkpoint and read the upstream high-water mark
/// 2. Plan the batch (narrowing it after a failed run)
/// 3. Replay cached changes inside the batch window
/// 4. Follow the live feed until the batch is complete, the feed is caught
///    up, a fatal error occurs, the feed goes quiet, the wall-clock budget
///    expires, or the run is cancelled
/// 5. Write the checkpoint
///
/// The wall-clock budget and cancellation cover every step from the first
/// request on, cache replay included.
///
/// # Returns
///
/// * `Ok(Metadata)` - The updated metadata; cancelled and killed runs are
///   clean stops and end up here too
/// * `Err(RegistryError)` - A fatal or inactivity error, returned after the
///   checkpoint was written
pub async fn run_update<S: CheckpointStore>(
    config: &Config,
    store: &S,
    control: RunControl,
) -> Result<Metadata> {
    let deadline = Instant::now() + config.batch.kill_after();
    let client = RegistryClient::new(&config.feed)?;

    let checkpoint = store.load()?;

    let (latest, stopped) = tokio::select! {
        biased;

        _ = control.cancel.cancelled() => (None, Some(RunStatus::Cancelled)),
        _ = tokio::time::sleep_until(deadline) => (None, Some(RunStatus::Killed)),
        latest = client.latest_sequence() => (Some(latest?), None),
    };

    // stopped before the registry answered: keep the last known high-water mark
    let latest = latest.unwrap_or_else(|| {
        checkpoint
            .as_ref()
            .map_or(0, |(metadata, _)| metadata.latest_sequence)
    });

    let mut ctx = RunContext::start(checkpoint, config.batch.limit, latest);
    tracing::info!(
        "batch: since {} until {} (limit {}, latest {})",
        ctx.batch.since,
        ctx.batch.until,
        ctx.batch.limit,
        latest
    );

    let mut processor = BatchProcessor::new(
        Classifier::new(&config.classifier),
        ChangeCache::from_config(&config.cache),
        ProgressTracker::new(&config.progress),
    );

    let stopped =
        stopped.or_else(|| processor.replay_cache(&mut ctx, &control.cancel, deadline));

    let outcome = if let Some(status) = stopped {
        tracing::info!("{} before following the feed", status);
        Outcome::stopped(status)
    } else if ctx.batch.is_complete() {
        tracing::info!("nothing to follow after sequence {}", ctx.batch.index);
        Outcome::natural()
    } else {
        follow(config, client, &mut ctx, &mut processor, &control, deadline).await
    };

    processor.flush_cache();

    tracing::info!("writing changes...");
    let error = outcome.error;
    let metadata = ctx
        .finish(outcome.status, error.as_ref().map(ToString::to_string))
        .clone();

    let dataset = (ctx.batch.found > 0).then_some(&ctx.dataset);
    let saved = store.save(&metadata, dataset);

    if let Some(status) = metadata.batch.as_ref().and_then(|batch| batch.status) {
        tracing::info!(
            "run finished: {} ({} changes applied, last sequence {})",
            status,
            ctx.batch.found,
            metadata.last_sequence
        );
    }

    match error {
        Some(error) => {
            if let Err(e) = saved {
                tracing::error!("failed to write checkpoint: {}", e);
            }
            Err(error)
        }
        None => {
            saved?;
            Ok(metadata)
        }
    }
}

/// Spawns the follower and drains its events until the run stops
async fn follow(
    config: &Config,
    client: RegistryClient,
    ctx: &mut RunContext,
    processor: &mut BatchProcessor,
    control: &RunControl,
    deadline: Instant,
) -> Outcome {
    let (tx, mut rx) = mpsc::channel(config.feed.concurrency.max(1) as usize * 4);
    let feed_cancel = control.cancel.child_token();

    let follower = Follower::new(client, &config.feed);
    let handle = tokio::spawn(follower.run(
        ctx.batch.index,
        Some(ctx.batch.remaining()),
        tx,
        feed_cancel.clone(),
    ));

    let kill = tokio::time::sleep_until(deadline);
    tokio::pin!(kill);
    let inactivity = config.feed.inactivity();

    processor.start_progress(ctx);

    let outcome = loop {
        tokio::select! {
            biased;

            _ = control.cancel.cancelled() => {
                tracing::info!("cancelled!");
                break Outcome::stopped(RunStatus::Cancelled);
            }

            _ = &mut kill => {
                tracing::info!("killed!");
                break Outcome::stopped(RunStatus::Killed);
            }

            _ = control.dump.notified() => processor.dump_progress(ctx),

            event = tokio::time::timeout(inactivity, rx.recv()) => match event {
                Err(_) => {
                    tracing::warn!("timeout!");
                    break Outcome::failed(
                        RunStatus::Timeout,
                        RegistryError::Inactivity {
                            seconds: inactivity.as_secs(),
                        },
                    );
                }
                Ok(None) => break Outcome::natural(),
                Ok(Some(event)) => match processor.handle(ctx, event) {
                    Flow::Continue => {}
                    Flow::Finished => break Outcome::natural(),
                    Flow::Failed(error) => break Outcome::failed(RunStatus::Error, error),
                },
            },
        }
    };

    feed_cancel.cancel();
    drop(rx);

    match handle.await {
        Ok(state) => tracing::debug!("follower stopped in state {:?}", state),
        Err(e) => tracing::warn!("follower task failed: {}", e),
    }

    outcome
}

//! Change feed follower
//!
//! The follower pages through the registry's change feed, enriches every
//! non-deleted change with the package's current document, and sends the
//! results over a channel strictly in feed order. Document fetches run
//! concurrently up to a fixed width but are drained in submission order.

use crate::config::FeedConfig;
use crate::follower::backoff::RetryState;
use crate::follower::client::{RawChange, RegistryClient};
use crate::RegistryError;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A change ready to be applied
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub seq: u64,
    pub id: String,
    pub deleted: bool,

    /// Raw `repository` descriptor of the current document
    pub repository: Option<Value>,
}

impl Change {
    pub fn deleted(seq: u64, id: impl Into<String>) -> Self {
        Self {
            seq,
            id: id.into(),
            deleted: true,
            repository: None,
        }
    }

    pub fn updated(seq: u64, id: impl Into<String>, repository: Option<Value>) -> Self {
        Self {
            seq,
            id: id.into(),
            deleted: false,
            repository,
        }
    }
}

/// Items the follower hands to the batch processor
#[derive(Debug)]
pub enum FeedEvent {
    /// An enriched change
    Change(Change),

    /// The document fetch for one change failed
    Failed {
        seq: u64,
        id: String,
        error: RegistryError,
    },

    /// The feed itself misbehaved; no further events follow
    Fatal(RegistryError),

    /// The budget is spent or the feed has nothing newer
    CaughtUp,
}

/// Lifecycle of a follower
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerState {
    Idle,
    Running,
    CaughtUp,
    Error,
    Stopped,
}

/// Producer side of the change pipeline
#[derive(Debug)]
pub struct Follower {
    client: RegistryClient,
    page_size: u64,
    concurrency: usize,
    retry: RetryState,
    state: FollowerState,
}

impl Follower {
    pub fn new(client: RegistryClient, config: &FeedConfig) -> Self {
        Self {
            client,
            page_size: u64::from(config.page_size.max(1)),
            concurrency: config.concurrency.max(1) as usize,
            retry: RetryState::new(config.retry_base(), config.retry_max()),
            state: FollowerState::Idle,
        }
    }

    /// Follows the feed from `since` until the budget is spent
    ///
    /// # Arguments
    ///
    /// * `since` - Last sequence already applied
    /// * `budget` - How many items may be emitted, `None` for unbounded
    /// * `tx` - Channel to the batch processor
    /// * `cancel` - Stops the follower promptly, abandoning the current page
    ///
    /// Returns the final state. Page failures that are transient are retried
    /// with backoff until they succeed or the follower is cancelled.
    pub async fn run(
        mut self,
        since: u64,
        budget: Option<u64>,
        tx: mpsc::Sender<FeedEvent>,
        cancel: CancellationToken,
    ) -> FollowerState {
        self.state = FollowerState::Running;
        let mut cursor = since;
        let mut remaining = budget;

        loop {
            if remaining == Some(0) {
                self.state = FollowerState::CaughtUp;
                let _ = tx.send(FeedEvent::CaughtUp).await;
                break;
            }

            let limit = remaining.map_or(self.page_size, |left| left.min(self.page_size));

            let page = tokio::select! {
                _ = cancel.cancelled() => {
                    self.state = FollowerState::Stopped;
                    break;
                }
                page = self.client.changes(cursor, limit) => page,
            };

            let page = match page {
                Ok(page) => {
                    self.retry.reset();
                    page
                }
                Err(e) if e.is_transient() => {
                    let delay = self.retry.failed();
                    tracing::warn!(
                        "page after sequence {} failed (attempt {}): {}; retrying in {:?}",
                        cursor,
                        self.retry.attempt(),
                        e,
                        delay
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            self.state = FollowerState::Stopped;
                            break;
                        }
                        _ = tokio::time::sleep(delay) => continue,
                    }
                }
                Err(e) => {
                    tracing::error!("change feed failed after sequence {}: {}", cursor, e);
                    self.state = FollowerState::Error;
                    let _ = tx.send(FeedEvent::Fatal(e)).await;
                    break;
                }
            };

            let mut results = page.results;
            if let Some(left) = remaining {
                results.truncate(usize::try_from(left).unwrap_or(usize::MAX));
            }

            let Some(last) = results.last().map(|change| change.seq) else {
                tracing::debug!("no changes after sequence {}", cursor);
                self.state = FollowerState::CaughtUp;
                let _ = tx.send(FeedEvent::CaughtUp).await;
                break;
            };

            tracing::debug!(
                "page of {} changes ({}..={})",
                results.len(),
                cursor + 1,
                last
            );

            let client = &self.client;
            let mut events = stream::iter(results)
                .map(|raw| enrich(client, raw))
                .buffered(self.concurrency);

            loop {
                let event = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    event = events.next() => Some(event),
                };

                match event {
                    None => {
                        self.state = FollowerState::Stopped;
                        return self.state;
                    }
                    Some(None) => break,
                    Some(Some(event)) => {
                        if tx.send(event).await.is_err() {
                            self.state = FollowerState::Stopped;
                            return self.state;
                        }
                        if let Some(left) = remaining.as_mut() {
                            *left = left.saturating_sub(1);
                        }
                    }
                }
            }

            cursor = last;
        }

        self.state
    }
}

/// Attaches the current document to a listed change
async fn enrich(client: &RegistryClient, raw: RawChange) -> FeedEvent {
    if raw.deleted {
        return FeedEvent::Change(Change::deleted(raw.seq, raw.id));
    }

    match client.document(&raw.id).await {
        Ok(document) => FeedEvent::Change(Change::updated(raw.seq, raw.id, document.repository)),
        Err(error) => {
            tracing::trace!("document {} at sequence {} failed: {}", raw.id, raw.seq, error);
            FeedEvent::Failed {
                seq: raw.seq,
                id: raw.id,
                error,
            }
        }
    }
}

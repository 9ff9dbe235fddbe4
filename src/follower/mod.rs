//! Follower module for tailing the registry change feed
//!
//! This module contains the incremental ingestion pipeline, including:
//! - The registry HTTP client
//! - The paging follower with ordered, concurrency-bounded enrichment
//! - The batch processor that applies changes to the run context
//! - Throttled progress reporting
//! - Overall run orchestration

mod backoff;
mod client;
mod coordinator;
mod feed;
mod processor;
mod progress;

pub use backoff::RetryState;
pub use client::{build_http_client, ChangesPage, Document, RawChange, RegistryClient};
pub use coordinator::{run_update, RunControl};
pub use feed::{Change, FeedEvent, Follower, FollowerState};
pub use processor::{BatchProcessor, Flow};
pub use progress::ProgressTracker;

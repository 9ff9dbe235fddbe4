//! State module for tracking the dataset and its statistics
//!
//! # Components
//!
//! - `Metadata`: The cross-run checkpoint (cursor, counters, run history)
//! - `Batch`: Bookkeeping for the changes processed by one run
//! - `RunContext`: Everything a single run owns, built from the checkpoint
//! - `RunStats` / `RepoCounts`: Counters merged additively at run end

mod batch;
mod context;
mod metadata;
mod stats;

use std::collections::BTreeMap;

// Re-export main types
pub use batch::{Batch, RunStatus};
pub use context::RunContext;
pub use metadata::{Metadata, NotFoundRegistry, RunHistory};
pub use stats::{RepoCounts, RunStats};

/// Package name to canonical repository URL, `None` meaning "no repository"
///
/// A `BTreeMap` so the persisted snapshot is sorted by key.
pub type Dataset = BTreeMap<String, Option<String>>;

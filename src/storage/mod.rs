//! Storage module for persisting run state
//!
//! This module handles everything the updater writes to disk:
//! - The checkpoint (`metadata.json` plus the sorted `packages.json` snapshot)
//! - The optional replay cache of consumed changes

mod cache;
mod json;
mod traits;

pub use cache::{CachedChange, CachedDocument, ChangeCache};
pub use json::JsonStore;
pub use traits::{CheckpointStore, StorageError, StorageResult};

use std::path::Path;

/// Opens the JSON checkpoint store in `data_dir`
///
/// # Arguments
///
/// * `data_dir` - Directory holding `packages.json` and `metadata.json`
pub fn open_store(data_dir: &Path) -> JsonStore {
    JsonStore::new(data_dir)
}

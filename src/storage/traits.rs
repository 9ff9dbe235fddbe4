//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use crate::state::{Dataset, Metadata};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt state file {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for checkpoint backend implementations
///
/// The checkpoint is the metadata plus the dataset it describes. A backend
/// must treat "nothing stored yet" as `Ok(None)`, never as an error.
pub trait CheckpointStore {
    /// Loads the previous checkpoint, if any
    fn load(&self) -> StorageResult<Option<(Metadata, Dataset)>>;

    /// Persists the checkpoint
    ///
    /// # Arguments
    ///
    /// * `metadata` - Cumulative metadata after the run
    /// * `dataset` - The dataset snapshot, or `None` to keep the stored one
    fn save(&self, metadata: &Metadata, dataset: Option<&Dataset>) -> StorageResult<()>;

    /// Discards the stored checkpoint so the next run starts from sequence 0
    fn reset(&self) -> StorageResult<()>;
}

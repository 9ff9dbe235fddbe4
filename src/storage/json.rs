//! JSON file checkpoint implementation
//!
//! The checkpoint lives in a data directory as two files:
//! `packages.json` (the dataset, keys sorted) and `metadata.json`.

use crate::state::{Dataset, Metadata};
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const PACKAGES_FILE: &str = "packages.json";
const METADATA_FILE: &str = "metadata.json";

/// Checkpoint backend storing pretty-printed JSON files in a directory
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Creates a store rooted at `dir`; the directory is created on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn packages_path(&self) -> PathBuf {
        self.dir.join(PACKAGES_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// Reads and decodes a JSON file, `Ok(None)` when it does not exist
    fn read<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StorageError::Corrupt {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Writes through a temporary sibling so a crash never leaves half a file
    fn write<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
        let mut text = serde_json::to_string_pretty(value)?;
        text.push('\n');

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn remove(path: &Path) -> StorageResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl CheckpointStore for JsonStore {
    fn load(&self) -> StorageResult<Option<(Metadata, Dataset)>> {
        let Some(metadata) = Self::read::<Metadata>(&self.metadata_path())? else {
            return Ok(None);
        };

        let dataset = Self::read::<Dataset>(&self.packages_path())?.unwrap_or_default();

        tracing::debug!(
            "loaded checkpoint at sequence {} with {} packages",
            metadata.last_sequence,
            dataset.len()
        );

        Ok(Some((metadata, dataset)))
    }

    fn save(&self, metadata: &Metadata, dataset: Option<&Dataset>) -> StorageResult<()> {
        fs::create_dir_all(&self.dir)?;

        Self::write(&self.metadata_path(), metadata)?;

        if let Some(dataset) = dataset {
            Self::write(&self.packages_path(), dataset)?;
        }

        tracing::debug!("checkpoint written to {}", self.dir.display());
        Ok(())
    }

    fn reset(&self) -> StorageResult<()> {
        Self::remove(&self.metadata_path())?;
        Self::remove(&self.packages_path())?;
        Ok(())
    }
}

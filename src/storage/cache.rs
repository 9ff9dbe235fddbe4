//! On-disk replay cache of consumed changes
//!
//! Consumed changes are trimmed to what the batch processor needs and
//! written in numbered segments (`0.json`, `1.json`, ...). A later run can
//! replay a sequence window from the segments instead of the network.

use crate::config::CacheConfig;
use crate::follower::Change;
use crate::storage::traits::{StorageError, StorageResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

/// A change as written to a cache segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedChange {
    pub seq: u64,
    pub id: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<CachedDocument>,
}

/// The part of a package document kept in the cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl From<&Change> for CachedChange {
    fn from(change: &Change) -> Self {
        let doc = (!change.deleted).then(|| CachedDocument {
            repository: change.repository.clone(),
        });

        Self {
            seq: change.seq,
            id: change.id.clone(),
            deleted: change.deleted,
            doc,
        }
    }
}

impl From<CachedChange> for Change {
    fn from(cached: CachedChange) -> Self {
        Self {
            seq: cached.seq,
            id: cached.id,
            deleted: cached.deleted,
            repository: cached.doc.and_then(|doc| doc.repository),
        }
    }
}

/// Buffered writer and window reader for cache segments
#[derive(Debug)]
pub struct ChangeCache {
    dir: PathBuf,
    read: bool,
    write: bool,
    size: usize,
    buffer: Vec<CachedChange>,

    /// Index of the last segment this instance wrote
    index: Option<u64>,
}

impl ChangeCache {
    /// Builds the cache from configuration; `None` when no directory is set
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        let dir = config.dir.clone()?;
        Some(Self {
            dir,
            read: config.read,
            write: config.write,
            size: config.size.max(1),
            buffer: Vec::new(),
            index: None,
        })
    }

    pub fn is_readable(&self) -> bool {
        self.read
    }

    /// Number of buffered entries not yet flushed
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Buffers a consumed change, flushing a segment once the buffer is full
    pub fn record(&mut self, change: &Change) -> StorageResult<()> {
        if !self.write {
            return Ok(());
        }

        self.buffer.push(CachedChange::from(change));

        if self.buffer.len() >= self.size {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes buffered entries to the next free segment
    ///
    /// The buffer is emptied even when the write fails; the cache is never
    /// authoritative.
    pub fn flush(&mut self) -> StorageResult<Option<PathBuf>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let entries = std::mem::take(&mut self.buffer);
        fs::create_dir_all(&self.dir)?;

        let mut next = self.index.map_or(0, |index| index + 1);
        let mut file = self.segment_path(next);
        while file.exists() {
            next += 1;
            file = self.segment_path(next);
        }

        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        entries.serialize(&mut serializer)?;
        fs::write(&file, out)?;

        self.index = Some(next);
        tracing::debug!("cached {} changes in {}", entries.len(), file.display());
        Ok(Some(file))
    }

    fn segment_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("{}.json", index))
    }

    /// Lists segment files ordered by their numeric index
    fn segments(&self) -> StorageResult<Vec<(u64, PathBuf)>> {
        let pattern = Regex::new(r"^(\d+)\.json$").map_err(|e| StorageError::Corrupt {
            path: self.dir.clone(),
            message: e.to_string(),
        })?;

        let mut segments = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(captures) = name.to_str().and_then(|name| pattern.captures(name)) else {
                continue;
            };
            if let Ok(index) = captures[1].parse::<u64>() {
                segments.push((index, entry.path()));
            }
        }

        segments.sort();
        Ok(segments)
    }

    /// Reads every cached change in the window `(since, until]`
    ///
    /// The result is sorted by sequence with duplicates dropped, the first
    /// occurrence winning. A missing cache directory yields no changes.
    pub fn load_window(&self, since: u64, until: u64) -> StorageResult<Vec<Change>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let segments = self.segments()?;
        let mut total = 0usize;
        let mut window = Vec::new();

        for (_, path) in &segments {
            let text = fs::read_to_string(path)?;
            let entries: Vec<CachedChange> =
                serde_json::from_str(&text).map_err(|e| StorageError::Corrupt {
                    path: path.clone(),
                    message: e.to_string(),
                })?;

            total += entries.len();
            window.extend(
                entries
                    .into_iter()
                    .filter(|entry| since < entry.seq && entry.seq <= until),
            );
        }

        window.sort_by_key(|entry| entry.seq);
        window.dedup_by_key(|entry| entry.seq);

        tracing::info!(
            "cache: {} files, {} changes, {} in window ({}, {}]",
            segments.len(),
            total,
            window.len(),
            since,
            until
        );

        Ok(window.into_iter().map(Change::from).collect())
    }
}

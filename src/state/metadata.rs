//! Cross-run checkpoint: cursor, cumulative counters and run history

use crate::state::batch::{Batch, RunStatus};
use crate::state::stats::{RepoCounts, RunStats};
use crate::state::Dataset;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Persisted metadata describing the dataset snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Number of packages in the dataset
    pub packages: u64,

    /// Last sequence applied
    #[serde(rename = "last")]
    pub last_sequence: u64,

    /// Upstream high-water mark seen at the start of the last run
    #[serde(rename = "latest")]
    pub latest_sequence: u64,

    pub repos: RepoCounts,
    pub stats: RunStats,
    pub runs: RunHistory,

    /// The most recent batch
    pub batch: Option<Batch>,

    /// Whether the most recent run ended in error
    pub error: bool,

    /// Sequences skipped to get past poison changes
    pub ignored: Vec<u64>,

    pub not_found: NotFoundRegistry,
}

/// Count of runs by terminal status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunHistory {
    pub total: u64,
    pub status: BTreeMap<RunStatus, u64>,
}

impl RunHistory {
    pub fn record(&mut self, status: RunStatus) {
        self.total += 1;
        *self.status.entry(status).or_insert(0) += 1;
    }

    pub fn count(&self, status: RunStatus) -> u64 {
        self.status.get(&status).copied().unwrap_or(0)
    }
}

/// Packages whose document fetch answered "not found", with the offending sequences
///
/// Serialized as an array of `[id, [seq, ...]]` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotFoundRegistry(BTreeMap<String, Vec<u64>>);

impl NotFoundRegistry {
    /// Flags `id` at `seq`; returns true only when `id` was not flagged yet
    pub fn record(&mut self, id: &str, seq: u64) -> bool {
        match self.0.get_mut(id) {
            Some(sequences) => {
                if !sequences.contains(&seq) {
                    sequences.push(seq);
                }
                false
            }
            None => {
                self.0.insert(id.to_string(), vec![seq]);
                true
            }
        }
    }

    /// Clears the flag on `id`; returns true if it was flagged
    pub fn clear(&mut self, id: &str) -> bool {
        self.0.remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn sequences(&self, id: &str) -> Option<&[u64]> {
        self.0.get(id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for NotFoundRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for NotFoundRegistry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pairs = Vec::<(String, Vec<u64>)>::deserialize(deserializer)?;
        Ok(Self(pairs.into_iter().collect()))
    }
}

impl Metadata {
    /// Lists every way the metadata disagrees with `dataset`
    ///
    /// An empty list means the snapshot and its statistics are consistent.
    pub fn consistency_issues(&self, dataset: &Dataset) -> Vec<String> {
        let mut issues = Vec::new();
        let real = dataset.len() as u64;

        if self.packages != real {
            issues.push(format!(
                "packages is {} but the dataset holds {}",
                self.packages, real
            ));
        }

        if self.repos.total() != real as i64 {
            issues.push(format!(
                "repository counts sum to {} but the dataset holds {}",
                self.repos.total(),
                real
            ));
        }

        let unset = dataset.values().filter(|url| url.is_none()).count() as i64;
        if self.repos.unset != unset {
            issues.push(format!(
                "unset count is {} but {} packages have no repository",
                self.repos.unset, unset
            ));
        }

        if !self.stats.is_balanced() {
            issues.push(format!(
                "changes ({}) do not match inserts ({}) + updates ({}) + deletes ({}) with invalid ({})",
                self.stats.changes,
                self.stats.inserts,
                self.stats.updates,
                self.stats.deletes,
                self.stats.invalid
            ));
        }

        if self.stats.not_found != self.not_found.len() as i64 {
            issues.push(format!(
                "not_found count is {} but {} packages are flagged",
                self.stats.not_found,
                self.not_found.len()
            ));
        }

        issues
    }
}

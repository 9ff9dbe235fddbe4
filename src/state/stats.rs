//! Counters kept per run and merged into the cumulative metadata
use crate::url::RepoCategory;
use serde::{Deserialize, Serialize};

/// Statistics gathered while applying changes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunStats {
    /// Changes applied to the dataset
    pub changes: u64,

    // Operations executed
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,

    /// Applied changes whose repository could not be resolved
    pub invalid: u64,

    /// Sequences skipped to get past a poison change
    pub ignored: u64,

    /// Net change in packages flagged as not found; negative when flags healed
    pub not_found: i64,
}

impl RunStats {
    /// Adds another set of counters into this one
    pub fn merge(&mut self, other: &RunStats) {
        self.changes += other.changes;
        self.inserts += other.inserts;
        self.updates += other.updates;
        self.deletes += other.deletes;
        self.invalid += other.invalid;
        self.ignored += other.ignored;
        self.not_found += other.not_found;
    }

    /// Whether every applied change was exactly one insert, update or delete
    pub fn is_balanced(&self) -> bool {
        self.changes == self.inserts + self.updates + self.deletes
            && self.invalid <= self.inserts + self.updates
    }
}

/// Package counts per repository provider
///
/// Run-scoped instances hold signed deltas; the cumulative instance in the
/// metadata holds absolute counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoCounts {
    pub github: i64,
    pub gitlab: i64,
    pub bitbucket: i64,
    pub others: i64,
    pub unset: i64,
}

impl RepoCounts {
    pub fn get(&self, category: RepoCategory) -> i64 {
        match category {
            RepoCategory::Github => self.github,
            RepoCategory::Gitlab => self.gitlab,
            RepoCategory::Bitbucket => self.bitbucket,
            RepoCategory::Others => self.others,
            RepoCategory::Unset => self.unset,
        }
    }

    fn slot(&mut self, category: RepoCategory) -> &mut i64 {
        match category {
            RepoCategory::Github => &mut self.github,
            RepoCategory::Gitlab => &mut self.gitlab,
            RepoCategory::Bitbucket => &mut self.bitbucket,
            RepoCategory::Others => &mut self.others,
            RepoCategory::Unset => &mut self.unset,
        }
    }

    /// Counts one more package for the category of `url`
    pub fn increment(&mut self, url: Option<&str>) {
        *self.slot(RepoCategory::of(url)) += 1;
    }

    /// Counts one package less for the category of `url`
    pub fn decrement(&mut self, url: Option<&str>) {
        *self.slot(RepoCategory::of(url)) -= 1;
    }

    /// Sum over every category, `unset` included
    pub fn total(&self) -> i64 {
        RepoCategory::all().iter().map(|c| self.get(*c)).sum()
    }

    /// Packages with a repository URL
    pub fn with_repository(&self) -> i64 {
        self.total() - self.unset
    }

    pub fn merge(&mut self, other: &RepoCounts) {
        for category in RepoCategory::all() {
            *self.slot(category) += other.get(category);
        }
    }
}

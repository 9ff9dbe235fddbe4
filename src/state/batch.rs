//! Run-scoped batch bookkeeping and terminal run statuses

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal status of an update run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Nothing applied on the very first run
    Init,

    /// Nothing applied although a checkpoint existed
    Empty,

    /// At least one change applied and no failure
    Ok,

    /// A change could not be fetched or the feed misbehaved
    Error,

    /// The feed went silent for longer than the inactivity window
    Timeout,

    /// Stopped on operator request
    Cancelled,

    /// Stopped by the wall-clock budget
    Killed,
}

impl RunStatus {
    /// Whether the next run should narrow its budget to isolate a poison change
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error | Self::Timeout)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Empty => "empty",
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Killed => "killed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of the changes processed by one run
///
/// Created from the checkpoint at run start and folded into the metadata
/// when the run ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Sequence the run resumed from (exclusive)
    pub since: u64,

    /// Last sequence this run may apply (inclusive)
    pub until: u64,

    /// How many changes the run may apply
    pub limit: u64,

    /// Upstream high-water mark at run start
    #[serde(default)]
    pub latest: u64,

    /// Sequence of the last change consumed
    pub index: u64,

    /// Changes applied during the run
    pub found: u64,

    pub started: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,
    pub took_ms: i64,

    pub status: Option<RunStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Batch {
    /// Plans a run starting after `since`
    ///
    /// # Arguments
    ///
    /// * `since` - Last sequence already applied
    /// * `limit` - Maximum number of changes to apply, `0` for unbounded
    /// * `latest` - Upstream high-water mark at run start
    ///
    /// With an unbounded limit the stored `limit` becomes the size of the
    /// sequence window, so progress can be computed either way.
    pub fn plan(since: u64, limit: u64, latest: u64) -> Self {
        let until = if limit > 0 {
            since.saturating_add(limit).min(latest)
        } else {
            latest
        };

        let limit = if limit > 0 {
            limit
        } else {
            until.saturating_sub(since)
        };

        Self {
            since,
            until,
            limit,
            latest,
            index: since,
            found: 0,
            started: Utc::now(),
            finished: None,
            took_ms: -1,
            status: None,
            error: None,
        }
    }

    /// Whether the cursor has reached the planned end of the run
    pub fn is_complete(&self) -> bool {
        self.index >= self.until
    }

    /// Changes still allowed in this run
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.found)
    }

    /// Completed fraction of the sequence window, in `[0, 1]`
    pub fn completion(&self) -> f64 {
        if self.limit == 0 {
            return 1.0;
        }
        let left = self.until.saturating_sub(self.index) as f64;
        (1.0 - left / self.limit as f64).clamp(0.0, 1.0)
    }

    /// Stamps the finish time and duration
    pub fn finish(&mut self, status: RunStatus) {
        let finished = Utc::now();
        self.took_ms = (finished - self.started).num_milliseconds();
        self.finished = Some(finished);
        self.status = Some(status);
    }
}

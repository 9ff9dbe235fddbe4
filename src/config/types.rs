use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Registry-Repos
///
/// Every section is optional; an empty file yields the defaults used
/// against the public npm replica.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub batch: BatchConfig,
    pub cache: CacheConfig,
    pub output: OutputConfig,
    pub progress: ProgressConfig,
    pub classifier: ClassifierConfig,
}

/// Change feed connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FeedConfig {
    /// Base URL of the registry database
    pub registry_url: String,

    /// Maximum number of changes requested per page
    pub page_size: u32,

    /// Maximum number of in-flight document fetches
    pub concurrency: u32,

    /// Timeout for a single HTTP request (seconds)
    pub request_timeout_secs: u64,

    /// Stop the run when the feed yields nothing for this long (seconds)
    pub inactivity_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,

    /// Unit of the page retry backoff; the n-th retry waits n³ units (milliseconds)
    pub retry_base_millis: u64,

    /// Upper bound of a single page retry delay (seconds)
    pub retry_max_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            registry_url: "https://replicate.npmjs.com/registry".to_string(),
            page_size: 10_000,
            concurrency: 40,
            request_timeout_secs: 60,
            inactivity_secs: 60 * 60,
            user_agent: format!("registry-repos/{}", env!("CARGO_PKG_VERSION")),
            retry_base_millis: 1_000,
            retry_max_secs: 60,
        }
    }
}

impl FeedConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn inactivity(&self) -> Duration {
        Duration::from_secs(self.inactivity_secs)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_millis)
    }

    pub fn retry_max(&self) -> Duration {
        Duration::from_secs(self.retry_max_secs)
    }
}

/// Per-run budget settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BatchConfig {
    /// How many changes to apply during one run (`0` means unbounded)
    pub limit: u64,

    /// Maximum wall-clock time of a run (milliseconds)
    pub kill_after_millis: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            limit: 0,
            // 5.75 hours
            kill_after_millis: 20_700_000,
        }
    }
}

impl BatchConfig {
    pub fn kill_after(&self) -> Duration {
        Duration::from_millis(self.kill_after_millis)
    }
}

/// On-disk change cache settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheConfig {
    /// Directory holding cache segments, or `None` to disable caching
    pub dir: Option<PathBuf>,

    /// Replay cached segments before following the live feed
    pub read: bool,

    /// Record consumed changes into new segments
    pub write: bool,

    /// Entries per segment file
    pub size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            read: false,
            write: false,
            size: 10_000,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory holding `packages.json` and `metadata.json`
    pub data_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Progress reporting cadence
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProgressConfig {
    /// Percent advance between two progress lines, range (0, 100]
    pub steps: f64,

    /// Longest silence before a progress line is forced (seconds)
    pub delay_secs: u64,

    /// Rounding granularity of the reported percentage, range (0, 1]
    pub scale: f64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            steps: 5.0,
            delay_secs: 15 * 60,
            scale: 0.01,
        }
    }
}

/// Repository recognizer toggles
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClassifierConfig {
    /// Enable the Bitbucket shorthand recognizer
    pub bitbucket: bool,
}

//! Registry-Repos: a follower for package registry change feeds
//!
//! This crate tails a registry's append-only change feed, resolves each
//! package's repository descriptor into a canonical URL, and maintains a
//! sorted snapshot of `package -> repository` plus running statistics that
//! stay consistent with the snapshot across resumable runs.

pub mod config;
pub mod follower;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Registry-Repos operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Unexpected HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Document not found: {id}")]
    NotFound { id: String },

    #[error("Protocol error for {url}: {message}")]
    Protocol { url: String, message: String },

    #[error("No feed activity for {seconds} seconds")]
    Inactivity { seconds: u64 },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Returns true when the registry reported the document as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for failures worth retrying on the same request
    ///
    /// Transport failures and non-success statuses are transient; protocol
    /// errors (an undecodable body) and everything local are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::Status { .. } | Self::Reqwest(_)
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid value for environment variable {name}: {value}")]
    Env { name: String, value: String },
}

/// URL recognizer errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Not a recognized repository location: {0}")]
    NotRecognized(String),
}

/// Result type alias for Registry-Repos operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use follower::{run_update, RunControl};
pub use state::{Batch, Metadata, RunStatus};
pub use url::{Classifier, RepoCategory};

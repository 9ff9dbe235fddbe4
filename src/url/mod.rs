//! Repository URL handling for Registry-Repos
//!
//! This module turns the free-form `repository` descriptors found in package
//! documents into canonical URLs, and buckets canonical URLs into provider
//! categories for statistics.

mod domain;
mod hosted;

use crate::config::ClassifierConfig;
use crate::{UrlError, UrlResult};
use serde_json::Value;
use std::fmt;
use url::Url;

// Re-export main functions
pub use domain::{extract_hostname, hostname_of};
pub use hosted::{bitbucket, github};

/// A recognizer maps a raw repository string to a canonical URL
///
/// Any error means "no match"; the classifier moves on to the next one.
pub type Recognizer = fn(&str) -> UrlResult<String>;

/// Provider categories tracked in the repository statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoCategory {
    Github,
    Gitlab,
    Bitbucket,
    /// Any other host
    Others,
    /// No repository URL
    Unset,
}

impl RepoCategory {
    /// Categorizes a canonical URL, `None` being [`RepoCategory::Unset`]
    ///
    /// # Examples
    ///
    /// ```
    /// use registry_repos::url::RepoCategory;
    ///
    /// assert_eq!(RepoCategory::of(Some("https://github.com/a/b")), RepoCategory::Github);
    /// assert_eq!(RepoCategory::of(Some("https://sr.ht/~a/b")), RepoCategory::Others);
    /// assert_eq!(RepoCategory::of(None), RepoCategory::Unset);
    /// ```
    pub fn of(url: Option<&str>) -> Self {
        let Some(url) = url else {
            return Self::Unset;
        };

        match hostname_of(url) {
            Some(host) if host.starts_with("github.") => Self::Github,
            Some(host) if host.starts_with("gitlab.") => Self::Gitlab,
            Some(host) if host.starts_with("bitbucket.") => Self::Bitbucket,
            _ => Self::Others,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Gitlab => "gitlab",
            Self::Bitbucket => "bitbucket",
            Self::Others => "others",
            Self::Unset => "unset",
        }
    }

    pub fn all() -> [Self; 5] {
        [
            Self::Github,
            Self::Gitlab,
            Self::Bitbucket,
            Self::Others,
            Self::Unset,
        ]
    }
}

impl fmt::Display for RepoCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Accepts any absolute `http`/`https` URL with a plausible host, unchanged
pub fn plain_url(raw: &str) -> UrlResult<String> {
    if raw.chars().any(char::is_whitespace) {
        return Err(UrlError::Parse(format!("whitespace in '{}'", raw)));
    }

    let url = Url::parse(raw).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    match url.host_str() {
        Some(host) if host.contains('.') || host == "localhost" => Ok(raw.to_string()),
        _ => Err(UrlError::NotRecognized(raw.to_string())),
    }
}

/// Resolves repository descriptors through an ordered chain of recognizers
///
/// The first recognizer to produce a URL wins.
#[derive(Clone)]
pub struct Classifier {
    recognizers: Vec<(&'static str, Recognizer)>,
}

impl Classifier {
    /// Builds the standard chain: GitHub, optionally Bitbucket, then plain URLs
    pub fn new(config: &ClassifierConfig) -> Self {
        let mut recognizers: Vec<(&'static str, Recognizer)> = vec![("github", github)];
        if config.bitbucket {
            recognizers.push(("bitbucket", bitbucket));
        }
        recognizers.push(("plain", plain_url));
        Self { recognizers }
    }

    /// Builds a classifier from an explicit recognizer chain
    pub fn with_recognizers(recognizers: Vec<(&'static str, Recognizer)>) -> Self {
        Self { recognizers }
    }

    /// Resolves a `repository` descriptor, either a string or an object with a `url`
    pub fn resolve(&self, descriptor: &Value) -> Option<String> {
        let raw = match descriptor {
            Value::String(s) => s.as_str(),
            Value::Object(map) => map.get("url")?.as_str()?,
            _ => return None,
        };

        self.resolve_str(raw)
    }

    /// Runs the recognizer chain over a raw repository string
    pub fn resolve_str(&self, raw: &str) -> Option<String> {
        for (name, recognize) in &self.recognizers {
            match recognize(raw) {
                Ok(url) => return Some(url),
                Err(e) => tracing::trace!("{} recognizer skipped '{}': {}", name, raw, e),
            }
        }
        None
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.recognizers.iter().map(|(name, _)| name))
            .finish()
    }
}

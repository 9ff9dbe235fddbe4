//! HTTP client for the registry database
//!
//! This module handles all HTTP requests to the registry, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - Reading the upstream high-water mark
//! - Paging through the change feed
//! - Fetching the current document of a package
//! - Error classification (transient, not found, protocol)

use crate::config::FeedConfig;
use crate::{RegistryError, Result};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

/// A change as listed by the feed, before enrichment
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawChange {
    pub seq: u64,
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
}

/// One page of the change feed
#[derive(Debug, Clone, Deserialize)]
pub struct ChangesPage {
    #[serde(default)]
    pub results: Vec<RawChange>,
    #[serde(default)]
    pub last_seq: Option<u64>,
}

/// The part of a package document the updater cares about
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub repository: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct DatabaseInfo {
    update_seq: u64,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The feed configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FeedConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout())
        .connect_timeout(config.request_timeout().min(std::time::Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Data source adapter for a CouchDB-style registry database
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    base: Url,
}

impl RegistryClient {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let client = build_http_client(config)?;
        let base = Url::parse(&config.registry_url)?;
        Ok(Self { client, base })
    }

    /// Appends one percent-encoded path segment to the base URL
    fn endpoint(&self, segment: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RegistryError::Protocol {
                url: self.base.to_string(),
                message: "registry URL cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    async fn send(&self, url: &Url) -> Result<Response> {
        self.client
            .get(url.clone())
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|source| RegistryError::Http {
                url: url.to_string(),
                source,
            })
    }

    /// Reads the body and decodes it; an undecodable body is a protocol error
    async fn decode<T: DeserializeOwned>(url: &Url, response: Response) -> Result<T> {
        let body = response
            .bytes()
            .await
            .map_err(|source| RegistryError::Http {
                url: url.to_string(),
                source,
            })?;

        serde_json::from_slice(&body).map_err(|e| RegistryError::Protocol {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    fn check_status(url: &Url, response: &Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RegistryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }

    /// Reads the upstream high-water mark
    pub async fn latest_sequence(&self) -> Result<u64> {
        let url = self.base.clone();
        let response = self.send(&url).await?;
        Self::check_status(&url, &response)?;
        let info: DatabaseInfo = Self::decode(&url, response).await?;
        Ok(info.update_seq)
    }

    /// Lists up to `limit` changes after sequence `since`
    pub async fn changes(&self, since: u64, limit: u64) -> Result<ChangesPage> {
        let mut url = self.endpoint("_changes")?;
        url.query_pairs_mut()
            .append_pair("since", &since.to_string())
            .append_pair("limit", &limit.to_string());

        tracing::debug!("requesting changes since {} (limit {})", since, limit);

        let response = self.send(&url).await?;
        Self::check_status(&url, &response)?;
        Self::decode(&url, response).await
    }

    /// Fetches the current document of a package
    ///
    /// A 404 becomes [`RegistryError::NotFound`]; the package was removed
    /// between the change and this fetch.
    pub async fn document(&self, id: &str) -> Result<Document> {
        let url = self.endpoint(id)?;
        let response = self.send(&url).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound { id: id.to_string() });
        }

        Self::check_status(&url, &response)?;
        Self::decode(&url, response).await
    }
}

use crate::config::types::{BatchConfig, CacheConfig, Config, FeedConfig, ProgressConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_feed_config(&config.feed)?;
    validate_batch_config(&config.batch)?;
    validate_cache_config(&config.cache)?;
    validate_progress_config(&config.progress)?;
    Ok(())
}

/// Validates change feed configuration
fn validate_feed_config(config: &FeedConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.registry_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid registry-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "registry-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.page_size < 1 {
        return Err(ConfigError::Validation(
            "page-size must be >= 1, got 0".to_string(),
        ));
    }

    if config.concurrency < 1 || config.concurrency > 1000 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 1000, got {}",
            config.concurrency
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1, got 0".to_string(),
        ));
    }

    if config.inactivity_secs < 1 {
        return Err(ConfigError::Validation(
            "inactivity-secs must be >= 1, got 0".to_string(),
        ));
    }

    if config.retry_base_millis < 1 || config.retry_max_secs < 1 {
        return Err(ConfigError::Validation(
            "retry-base-millis and retry-max-secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates batch configuration
fn validate_batch_config(config: &BatchConfig) -> Result<(), ConfigError> {
    if config.kill_after_millis < 1 {
        return Err(ConfigError::Validation(
            "kill-after-millis must be >= 1, got 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates cache configuration
fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.size < 1 {
        return Err(ConfigError::Validation(
            "cache size must be >= 1, got 0".to_string(),
        ));
    }

    if config.dir.is_none() && (config.read || config.write) {
        tracing::warn!("cache read/write enabled without a cache dir; caching stays disabled");
    }

    Ok(())
}

/// Validates progress configuration
fn validate_progress_config(config: &ProgressConfig) -> Result<(), ConfigError> {
    if !(config.steps > 0.0 && config.steps <= 100.0) {
        return Err(ConfigError::Validation(format!(
            "progress steps must be in (0, 100], got {}",
            config.steps
        )));
    }

    if !(config.scale > 0.0 && config.scale <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "progress scale must be in (0, 1], got {}",
            config.scale
        )));
    }

    Ok(())
}

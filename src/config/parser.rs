use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Loads the configuration from an optional file plus the process environment
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file, or `None` for defaults
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, override, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use registry_repos::config::load_config;
///
/// let config = load_config(Some(Path::new("registry-repos.toml"))).unwrap();
/// println!("Page size: {}", config.feed.page_size);
/// ```
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate(&config)?;

    Ok(config)
}

/// Parses TOML content into a configuration without validating it
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Applies the recognized environment variables on top of `config`
///
/// `lookup` resolves a variable name to its value; empty values count as unset.
///
/// | Variable | Effect |
/// |----------|--------|
/// | `BATCH_LIMIT` | `batch.limit` (`0` = unbounded) |
/// | `KILL_AFTER_MILLIS` | `batch.kill-after-millis` |
/// | `CACHE_DIR` | `cache.dir` |
/// | `CACHE_READ` | `cache.read`, enabled only by `1` |
/// | `CACHE_WRITE` | `cache.write`, enabled only by `1` |
/// | `DATA_DIR` | `output.data-dir` |
/// | `REGISTRY_URL` | `feed.registry-url` |
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    if let Some(value) = get("BATCH_LIMIT") {
        config.batch.limit = parse_env("BATCH_LIMIT", &value)?;
    }

    if let Some(value) = get("KILL_AFTER_MILLIS") {
        config.batch.kill_after_millis = parse_env("KILL_AFTER_MILLIS", &value)?;
    }

    if let Some(value) = get("CACHE_DIR") {
        config.cache.dir = Some(PathBuf::from(value));
    }

    if let Some(value) = get("CACHE_READ") {
        config.cache.read = value.trim() == "1";
    }

    if let Some(value) = get("CACHE_WRITE") {
        config.cache.write = value.trim() == "1";
    }

    if let Some(value) = get("DATA_DIR") {
        config.output.data_dir = PathBuf::from(value);
    }

    if let Some(value) = get("REGISTRY_URL") {
        config.feed.registry_url = value;
    }

    Ok(())
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Computes a SHA-256 hash of the configuration file content
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns it with the hash of the file it came from
///
/// The hash is `None` when no file was given.
pub fn load_config_with_hash(path: Option<&Path>) -> Result<(Config, Option<String>), ConfigError> {
    let config = load_config(path)?;
    let hash = path.map(compute_config_hash).transpose()?;
    Ok((config, hash))
}

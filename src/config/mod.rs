//! Configuration module for Registry-Repos
//!
//! Configuration comes from an optional TOML file, then environment
//! overrides, then validation.
//!
//! # Example
//!
//! ```no_run
//! use registry_repos::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Some(Path::new("registry-repos.toml"))).unwrap();
//! println!("Following {}", config.feed.registry_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BatchConfig, CacheConfig, ClassifierConfig, Config, FeedConfig, OutputConfig, ProgressConfig,
};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_with_hash, parse_config,
};
pub use validation::validate;

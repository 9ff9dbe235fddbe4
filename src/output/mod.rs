//! Output module for reporting on the dataset
//!
//! This module handles:
//! - Regenerating the statistics block of a markdown report
//! - Printing checkpoint statistics and host counts

pub mod report;
pub mod stats;

pub use report::{format_stats_block, replace_stats_block, update_report};
pub use stats::{hostname_counts, print_statistics};

use thiserror::Error;

/// Errors that can occur while producing output
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("Document has no <!-- stats --> ... <!-- /stats --> block")]
    MissingMarker,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

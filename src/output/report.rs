//! Markdown statistics block embedded in a larger document
//!
//! The block sits between `<!-- stats -->` and `<!-- /stats -->` markers and
//! is regenerated from the metadata alone.

use crate::output::{OutputError, OutputResult};
use crate::state::Metadata;
use regex::{NoExpand, Regex};
use std::fs;
use std::path::Path;

const STATS_PATTERN: &str = r"(?s)<!-- stats -->.+?<!-- /stats -->";

fn percent(value: i64, total: i64) -> String {
    if total == 0 {
        return "0.00".to_string();
    }
    format!("{:.2}", value as f64 * 100.0 / total as f64)
}

/// Formats the statistics block for `metadata`
pub fn format_stats_block(metadata: &Metadata) -> String {
    let total = metadata.packages as i64;
    let repos = &metadata.repos;
    let unset = repos.unset;
    let with_repo = total - unset;

    let mut md = String::new();
    md.push_str("<!-- stats -->\n");

    md.push_str("Packages | Count | Percentage\n");
    md.push_str(":------- | -----:| ----------:\n");
    md.push_str(&format!(
        "With repository | {} | {}%\n",
        with_repo,
        percent(with_repo, total)
    ));
    md.push_str(&format!(
        "Null repository | {} | {}%\n",
        unset,
        percent(unset, total)
    ));
    md.push_str(&format!("**Total** | {} | {}%\n", total, percent(total, total)));
    md.push('\n');

    md.push_str("Providers | Count | Percentage\n");
    md.push_str(":-------- | -----:| ----------:\n");
    for (name, count) in [
        ("GitHub", repos.github),
        ("GitLab", repos.gitlab),
        ("Bitbucket", repos.bitbucket),
        ("Others", repos.others),
    ] {
        md.push_str(&format!("{} | {} | {}%\n", name, count, percent(count, total)));
    }
    md.push_str(&format!(
        "**Total** | {} | {}%\n",
        with_repo,
        percent(with_repo, total)
    ));

    md.push_str("<!-- /stats -->");
    md
}

/// Replaces the marked statistics region of `document`
pub fn replace_stats_block(document: &str, metadata: &Metadata) -> OutputResult<String> {
    let pattern = Regex::new(STATS_PATTERN).map_err(|e| OutputError::Format(e.to_string()))?;

    if !pattern.is_match(document) {
        return Err(OutputError::MissingMarker);
    }

    let block = format_stats_block(metadata);
    Ok(pattern.replace(document, NoExpand(&block)).into_owned())
}

/// Rewrites the statistics block of the file at `path` in place
///
/// # Arguments
///
/// * `path` - Markdown document containing the markers
/// * `metadata` - Source of the statistics
pub fn update_report(path: &Path, metadata: &Metadata) -> OutputResult<()> {
    let document = fs::read_to_string(path)?;
    let updated = replace_stats_block(&document, metadata)?;

    if updated != document {
        fs::write(path, updated)?;
        tracing::info!("updated statistics in {}", path.display());
    } else {
        tracing::debug!("statistics in {} already current", path.display());
    }

    Ok(())
}

//! Statistics display for a stored dataset
//!
//! This module provides functionality for summarizing the checkpoint and
//! counting repository hosts in the dataset.

use crate::state::{Dataset, Metadata, RunStatus};
use crate::url::{hostname_of, RepoCategory};
use std::collections::HashMap;

/// Counts packages per repository hostname, most frequent first
///
/// Hostnames are lowercased with a leading `www.` stripped. Packages
/// without a repository are not counted. Ties are ordered by hostname.
pub fn hostname_counts(dataset: &Dataset) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();

    for url in dataset.values().flatten() {
        if let Some(host) = hostname_of(url) {
            *counts.entry(host).or_insert(0) += 1;
        }
    }

    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

fn percentage(count: i64, total: u64) -> f64 {
    if total > 0 {
        (count as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `metadata` - The stored metadata
/// * `dataset` - The stored dataset
/// * `top` - How many hostnames to list
pub fn print_statistics(metadata: &Metadata, dataset: &Dataset, top: usize) {
    println!("=== Registry Statistics ===\n");

    println!("Overview:");
    println!("  Packages: {}", metadata.packages);
    println!("  Last sequence: {}", metadata.last_sequence);
    println!("  Latest known sequence: {}", metadata.latest_sequence);
    println!();

    println!("Repositories:");
    for category in RepoCategory::all() {
        let count = metadata.repos.get(category);
        println!(
            "  {}: {} ({:.1}%)",
            category,
            count,
            percentage(count, metadata.packages)
        );
    }
    println!();

    let stats = &metadata.stats;
    println!("Changes:");
    println!("  Applied: {}", stats.changes);
    println!("  Inserts: {}", stats.inserts);
    println!("  Updates: {}", stats.updates);
    println!("  Deletes: {}", stats.deletes);
    println!("  Invalid: {}", stats.invalid);
    println!("  Ignored: {}", stats.ignored);
    println!("  Not found: {}", stats.not_found);
    println!();

    println!("Runs ({}):", metadata.runs.total);
    for status in [
        RunStatus::Init,
        RunStatus::Empty,
        RunStatus::Ok,
        RunStatus::Error,
        RunStatus::Timeout,
        RunStatus::Cancelled,
        RunStatus::Killed,
    ] {
        let count = metadata.runs.count(status);
        if count > 0 {
            println!("  {}: {}", status, count);
        }
    }
    if let Some(batch) = &metadata.batch {
        println!(
            "  Last batch: {} changes in ({}, {}], took {} ms",
            batch.found, batch.since, batch.until, batch.took_ms
        );
    }
    println!();

    let hosts = hostname_counts(dataset);
    if !hosts.is_empty() {
        println!("Top Hosts ({} distinct):", hosts.len());
        let width = hosts
            .iter()
            .take(top)
            .map(|(host, _)| host.len())
            .max()
            .unwrap_or(0);
        for (host, count) in hosts.iter().take(top) {
            println!("  {:<width$}   {}", host, count, width = width);
        }
        println!();
    }

    if metadata.error {
        println!("The last run ended in error; the next run will narrow its batch.");
    }
}

//! Throttled progress reporting

use crate::config::ProgressConfig;
use crate::state::Batch;
use std::time::{Duration, Instant};

/// Emits a progress line only when the run advanced enough or went quiet too long
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    steps: f64,
    delay: Duration,
    scale: f64,

    /// Percentage that triggers the next line; `None` before the first call
    next: Option<f64>,
    last: Instant,
}

impl ProgressTracker {
    pub fn new(config: &ProgressConfig) -> Self {
        Self {
            steps: config.steps,
            delay: Duration::from_secs(config.delay_secs),
            scale: config.scale,
            next: None,
            last: Instant::now(),
        }
    }

    /// Whether the progress clock has been started
    pub fn is_started(&self) -> bool {
        self.next.is_some()
    }

    /// Completed percentage of `batch`, rounded to the configured scale
    pub fn percent(&self, batch: &Batch) -> f64 {
        let mul = 100.0 / self.scale;
        let div = 1.0 / self.scale;
        (batch.completion() * mul).round() / div
    }

    /// Returns the percentage to report, or `None` when the line is throttled
    ///
    /// The first call only starts the clock.
    pub fn tick(&mut self, batch: &Batch, now: Instant, force: bool) -> Option<f64> {
        let Some(next) = self.next else {
            self.next = Some(0.0);
            self.last = now;
            return None;
        };

        let percent = self.percent(batch);
        let advanced = percent >= next;
        let quiet = now.saturating_duration_since(self.last) >= self.delay;

        if force || advanced || quiet {
            self.next = Some(percent + self.steps);
            self.last = now;
            Some(percent)
        } else {
            None
        }
    }

    /// Logs a progress line when one is due
    pub fn report(&mut self, batch: &Batch, force: bool) {
        if let Some(percent) = self.tick(batch, Instant::now(), force) {
            if force {
                tracing::info!(
                    "- {}% (sequence {} of {}, {} applied)",
                    percent,
                    batch.index,
                    batch.until,
                    batch.found
                );
            } else {
                tracing::info!("- {}%", percent);
            }
        }
    }
}

//! Render counters shared by the classifier, renderer and scheduler.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use metrics::{counter, histogram};
use serde::Serialize;

const METRIC_RENDER_SUCCESS: &str = "tutor_render_success_total";
const METRIC_RENDER_FAILURE: &str = "tutor_render_failure_total";
const METRIC_SVG_ERROR: &str = "tutor_render_svg_error_total";
const METRIC_METADATA_HIT: &str = "tutor_render_metadata_hit_total";
const METRIC_METADATA_MISS: &str = "tutor_render_metadata_miss_total";
const METRIC_RENDER_DURATION_MS: &str = "tutor_render_duration_ms";

#[derive(Debug, Default)]
pub struct RenderStats {
    successful: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    metadata_hits: AtomicU64,
    metadata_misses: AtomicU64,
    svg_errors: AtomicU64,
    total_render_micros: AtomicU64,
}

impl RenderStats {
    pub fn record_success(&self, elapsed: Duration) {
        self.record_time(elapsed);
        self.successful.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_RENDER_SUCCESS).increment(1);
    }

    pub fn record_failure(&self, elapsed: Duration) {
        self.record_time(elapsed);
        self.failed.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_RENDER_FAILURE).increment(1);
    }

    pub fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_metadata_hit(&self) {
        self.metadata_hits.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_METADATA_HIT).increment(1);
    }

    pub fn record_metadata_miss(&self) {
        self.metadata_misses.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_METADATA_MISS).increment(1);
    }

    pub fn record_svg_error(&self) {
        self.svg_errors.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_SVG_ERROR).increment(1);
    }

    fn record_time(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_render_micros
            .fetch_add(micros, Ordering::Relaxed);
        histogram!(METRIC_RENDER_DURATION_MS).record(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn reset(&self) {
        for value in [
            &self.successful,
            &self.failed,
            &self.retried,
            &self.metadata_hits,
            &self.metadata_misses,
            &self.svg_errors,
            &self.total_render_micros,
        ] {
            value.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let successful = self.successful.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let metadata_hits = self.metadata_hits.load(Ordering::Relaxed);
        let metadata_misses = self.metadata_misses.load(Ordering::Relaxed);
        let svg_errors = self.svg_errors.load(Ordering::Relaxed);
        let total_render_time_ms =
            self.total_render_micros.load(Ordering::Relaxed) as f64 / 1000.0;

        let total_renders = successful + failed;
        let metadata_lookups = metadata_hits + metadata_misses;
        let metadata_efficiency = if total_renders > 0 && metadata_lookups > 0 {
            metadata_hits as f64 / metadata_lookups as f64 * 100.0
        } else {
            0.0
        };
        let svg_error_rate = if total_renders > 0 {
            svg_errors as f64 / total_renders as f64 * 100.0
        } else {
            0.0
        };

        StatsSnapshot {
            successful,
            failed,
            retried: self.retried.load(Ordering::Relaxed),
            metadata_hits,
            metadata_misses,
            svg_errors,
            total_render_time_ms,
            // One extra in the divisor, so the average is defined before the first render.
            avg_render_time_ms: total_render_time_ms / (total_renders + 1) as f64,
            metadata_efficiency,
            svg_error_rate,
            ..StatsSnapshot::default()
        }
    }
}

/// Point-in-time view of the render counters plus manager state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub successful: u64,
    pub failed: u64,
    pub retried: u64,
    pub metadata_hits: u64,
    pub metadata_misses: u64,
    pub svg_errors: u64,
    pub total_render_time_ms: f64,
    pub avg_render_time_ms: f64,
    /// Percentage of classifier lookups answered by render metadata.
    pub metadata_efficiency: f64,
    /// Percentage of renders that produced an invalid SVG.
    pub svg_error_rate: f64,
    pub engine_ready: bool,
    pub has_metadata: bool,
    pub content_cache_size: usize,
    pub batch_size: usize,
    pub advanced_math: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_derives_rates() {
        let stats = RenderStats::default();
        stats.record_success(Duration::from_millis(4));
        stats.record_failure(Duration::from_millis(2));
        stats.record_svg_error();
        stats.record_metadata_hit();
        stats.record_metadata_miss();
        stats.record_metadata_miss();
        stats.record_metadata_miss();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.successful, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.svg_errors, 1);
        assert!((snapshot.total_render_time_ms - 6.0).abs() < 1e-9);
        assert!((snapshot.avg_render_time_ms - 2.0).abs() < 1e-9);
        assert!((snapshot.metadata_efficiency - 25.0).abs() < 1e-9);
        assert!((snapshot.svg_error_rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn rates_are_zero_before_any_render() {
        let stats = RenderStats::default();
        stats.record_metadata_hit();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.metadata_efficiency, 0.0);
        assert_eq!(snapshot.svg_error_rate, 0.0);
        assert_eq!(snapshot.avg_render_time_ms, 0.0);
    }

    #[test]
    fn reset_clears_every_counter() {
        let stats = RenderStats::default();
        stats.record_success(Duration::from_millis(1));
        stats.record_svg_error();
        stats.record_retry();

        stats.reset();

        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}

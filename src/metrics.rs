//! Launch metrics and Prometheus export

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use anyhow::Context;
use once_cell::sync::OnceCell;
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub launches_started: IntCounterVec,
    pub launches_succeeded: IntCounterVec,
    pub launches_failed: IntCounterVec,
    pub partial_successes: IntCounter,
    pub duplicate_rejections: IntCounter,
    pub confirmation_outcomes: IntCounterVec,
    pub uploads: IntCounterVec,

    // Gauges
    pub launches_in_flight: IntGauge,

    // Histograms
    pub build_latency: Histogram,
    pub signing_latency: Histogram,
    pub submission_latency: Histogram,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let launches_started = IntCounterVec::new(
            Opts::new("launches_started_total", "Launches that entered Minting"),
            &["mode"],
        )?;

        let launches_succeeded = IntCounterVec::new(
            Opts::new("launches_succeeded_total", "Launches that reached Success"),
            &["mode"],
        )?;

        let launches_failed = IntCounterVec::new(
            Opts::new("launches_failed_total", "Launches returned to Review"),
            &["category"],
        )?;

        let partial_successes = IntCounter::with_opts(Opts::new(
            "launch_partial_successes_total",
            "Pool launches whose first purchase was skipped",
        ))?;

        let duplicate_rejections = IntCounter::with_opts(Opts::new(
            "launch_duplicate_rejections_total",
            "Mint attempts refused by the submission guard",
        ))?;

        let confirmation_outcomes = IntCounterVec::new(
            Opts::new("confirmation_outcomes_total", "Confirmation checks by status"),
            &["status"],
        )?;

        let uploads = IntCounterVec::new(
            Opts::new("uploads_total", "Image and metadata uploads"),
            &["kind", "outcome"],
        )?;

        let launches_in_flight = IntGauge::with_opts(Opts::new(
            "launches_in_flight",
            "Launches currently holding a submission ticket",
        ))?;

        let build_latency = Histogram::with_opts(
            HistogramOpts::new("launch_build_latency_seconds", "Bundle preparation latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0]),
        )?;

        let signing_latency = Histogram::with_opts(
            HistogramOpts::new("launch_signing_latency_seconds", "Time spent waiting on the wallet")
                .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        )?;

        let submission_latency = Histogram::with_opts(
            HistogramOpts::new("launch_submission_latency_seconds", "Bundle submission latency")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 15.0]),
        )?;

        registry.register(Box::new(launches_started.clone()))?;
        registry.register(Box::new(launches_succeeded.clone()))?;
        registry.register(Box::new(launches_failed.clone()))?;
        registry.register(Box::new(partial_successes.clone()))?;
        registry.register(Box::new(duplicate_rejections.clone()))?;
        registry.register(Box::new(confirmation_outcomes.clone()))?;
        registry.register(Box::new(uploads.clone()))?;
        registry.register(Box::new(launches_in_flight.clone()))?;
        registry.register(Box::new(build_latency.clone()))?;
        registry.register(Box::new(signing_latency.clone()))?;
        registry.register(Box::new(submission_latency.clone()))?;

        Ok(Self {
            registry,
            launches_started,
            launches_succeeded,
            launches_failed,
            partial_successes,
            duplicate_rejections,
            confirmation_outcomes,
            uploads,
            launches_in_flight,
            build_latency,
            signing_latency,
            submission_latency,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of every registered metric
    pub fn gather_text(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

static METRICS: OnceCell<Metrics> = OnceCell::new();

/// Global metrics instance, registering every collector on first use
pub fn try_metrics() -> anyhow::Result<&'static Metrics> {
    METRICS
        .get_or_try_init(Metrics::new)
        .context("Failed to initialize metrics")
}

/// Global metrics instance for recording paths
///
/// Startup goes through [`try_metrics`] first, so registration errors
/// surface there instead of here.
pub fn metrics() -> &'static Metrics {
    try_metrics().expect("Failed to initialize metrics")
}

/// Measures one operation into a histogram
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn observe(self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_and_export() {
        let m = Metrics::new().unwrap();
        m.launches_started.with_label_values(&["direct"]).inc();
        m.confirmation_outcomes.with_label_values(&["confirmed"]).inc();
        Timer::start().observe(&m.build_latency);

        let text = m.gather_text().unwrap();
        assert!(text.contains("launches_started_total"));
        assert!(text.contains("confirmation_outcomes_total"));
        assert!(text.contains("launch_build_latency_seconds"));
    }

    #[test]
    fn test_fallible_accessor_returns_the_global_instance() {
        let global = try_metrics().unwrap();
        assert!(std::ptr::eq(global, metrics()));
        assert!(global.gather_text().unwrap().contains("launches_in_flight"));
    }

    #[test]
    fn test_global_instance_is_shared() {
        let before = metrics().duplicate_rejections.get();
        metrics().duplicate_rejections.inc();
        assert!(metrics().duplicate_rejections.get() > before);
    }
}

// Prometheus registry for request, latency and custom KPI metrics

use anyhow::{Context, Result};
use prometheus::{GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Metrics exposed on `/metrics`
pub struct ServingMetrics {
    registry: Registry,
    requests: IntCounterVec,
    latency: HistogramVec,
    custom: GaugeVec,
}

impl ServingMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("modelserve_requests_total", "Route invocations by outcome"),
            &["route", "status"],
        )
        .context("Failed to create request counter")?;

        let latency = HistogramVec::new(
            HistogramOpts::new(
                "modelserve_route_latency_seconds",
                "Time spent in a single route's inference pipeline",
            ),
            &["route"],
        )
        .context("Failed to create latency histogram")?;

        let custom = GaugeVec::new(
            Opts::new("modelserve_custom_metric", "Last value of a model-emitted KPI"),
            &["model", "name"],
        )
        .context("Failed to create custom metric gauge")?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(latency.clone()))?;
        registry.register(Box::new(custom.clone()))?;

        Ok(Self {
            registry,
            requests,
            latency,
            custom,
        })
    }

    /// Record one route invocation
    pub fn observe_route(&self, route: &str, ok: bool, elapsed: Duration) {
        let status = if ok { "ok" } else { "error" };
        self.requests.with_label_values(&[route, status]).inc();
        self.latency
            .with_label_values(&[route])
            .observe(elapsed.as_secs_f64());
    }

    /// Set a custom KPI gauge
    pub fn record_custom(&self, model: Option<&str>, name: &str, value: f64) {
        self.custom
            .with_label_values(&[model.unwrap_or(""), name])
            .set(value);
    }

    /// Total invocations recorded for a route and status
    pub fn request_count(&self, route: &str, status: &str) -> u64 {
        self.requests.with_label_values(&[route, status]).get()
    }

    /// Current value of a custom KPI gauge
    pub fn custom_value(&self, model: Option<&str>, name: &str) -> f64 {
        self.custom
            .with_label_values(&[model.unwrap_or(""), name])
            .get()
    }

    /// Prometheus text exposition format
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        encoder
            .encode_to_string(&self.registry.gather())
            .context("Failed to encode metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_route_counts() {
        let metrics = ServingMetrics::new().unwrap();
        metrics.observe_route("champion", true, Duration::from_millis(3));
        metrics.observe_route("champion", false, Duration::from_millis(3));
        metrics.observe_route("champion", true, Duration::from_millis(3));
        assert_eq!(metrics.request_count("champion", "ok"), 2);
        assert_eq!(metrics.request_count("champion", "error"), 1);
    }

    #[test]
    fn test_render_contains_custom_metric() {
        let metrics = ServingMetrics::new().unwrap();
        metrics.record_custom(Some("iris"), "my_kpi", 7.5);
        let text = metrics.render().unwrap();
        assert!(text.contains("modelserve_custom_metric"));
        assert!(text.contains("my_kpi"));
    }
}

//! Metrics collection for the API service.

use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;

/// Webhook delivery metrics
///
/// Metrics live in a dedicated [`Registry`] owned by the application state,
/// so several routers (tests in particular) can coexist in one process.
#[derive(Debug)]
pub struct ServiceMetrics {
    registry: Registry,

    /// Deliveries by outcome label (`synced`, `duplicate`, `ignored`, or a
    /// failure reason)
    pub webhook_deliveries_total: IntCounterVec,

    /// End-to-end webhook processing time
    pub webhook_duration_seconds: Histogram,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let webhook_deliveries_total = IntCounterVec::new(
            Opts::new(
                "glowboost_webhook_deliveries_total",
                "Webhook deliveries grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(webhook_deliveries_total.clone()))?;

        let webhook_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "glowboost_webhook_duration_seconds",
                "Webhook processing time distribution",
            )
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        )?;
        registry.register(Box::new(webhook_duration_seconds.clone()))?;

        Ok(Arc::new(Self {
            registry,
            webhook_deliveries_total,
            webhook_duration_seconds,
        }))
    }

    /// Record one finished delivery
    pub fn record_delivery(&self, outcome: &str, elapsed: Duration) {
        self.webhook_deliveries_total
            .with_label_values(&[outcome])
            .inc();
        self.webhook_duration_seconds
            .observe(elapsed.as_secs_f64());
    }

    /// Number of deliveries recorded for an outcome
    pub fn deliveries(&self, outcome: &str) -> u64 {
        self.webhook_deliveries_total
            .with_label_values(&[outcome])
            .get()
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;

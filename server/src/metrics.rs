//! # Prometheus Metrics
//!
//! Operational metrics for the commerce server, scraped at `/metrics`
//! on the dedicated metrics port. All metrics live in a custom
//! [`prometheus::Registry`] so nothing collides with other registry
//! consumers in the process.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use std::sync::Arc;

/// Shared handle to the server's metric set.
pub type SharedMetrics = Arc<CommerceMetrics>;

/// Holds all Prometheus metric handles for the server.
#[derive(Clone)]
pub struct CommerceMetrics {
    registry: Registry,
    /// Purchases fulfilled (virtual currency and external receipts).
    pub purchases_succeeded_total: IntCounter,
    /// Purchase attempts rejected by a precondition or failed in flight.
    pub purchases_failed_total: IntCounter,
    /// Receipts rejected by signature verification.
    pub receipts_rejected_total: IntCounter,
    /// Receipts rejected as replays of an already-fulfilled transaction.
    pub receipts_replayed_total: IntCounter,
    /// Inventory rows created by grants.
    pub items_granted_total: IntCounter,
    /// Purchase-path request latency in seconds.
    pub purchase_latency_seconds: Histogram,
}

impl CommerceMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("arcadia".into()), None)
            .expect("failed to create prometheus registry");

        fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
            let counter = IntCounter::new(name, help).expect("metric creation");
            registry
                .register(Box::new(counter.clone()))
                .expect("metric registration");
            counter
        }

        let purchases_succeeded_total = counter(
            &registry,
            "purchases_succeeded_total",
            "Purchases fulfilled across all payment providers",
        );
        let purchases_failed_total = counter(
            &registry,
            "purchases_failed_total",
            "Purchase attempts that were rejected or failed",
        );
        let receipts_rejected_total = counter(
            &registry,
            "receipts_rejected_total",
            "Receipts that failed provider signature verification",
        );
        let receipts_replayed_total = counter(
            &registry,
            "receipts_replayed_total",
            "Receipts rejected by replay protection",
        );
        let items_granted_total = counter(
            &registry,
            "items_granted_total",
            "Inventory entries created by the grant engine",
        );

        let purchase_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "purchase_latency_seconds",
                "Wall-clock latency of purchase and receipt requests",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(purchase_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            purchases_succeeded_total,
            purchases_failed_total,
            receipts_rejected_total,
            receipts_replayed_total,
            items_granted_total,
            purchase_latency_seconds,
        }
    }

    /// Renders the registry in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(err) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!(error = %err, "failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for CommerceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// `GET /metrics` — Prometheus scrape endpoint.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    (StatusCode::OK, metrics.render())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_render_with_namespace() {
        let metrics = CommerceMetrics::new();
        metrics.purchases_succeeded_total.inc();
        metrics.items_granted_total.inc_by(3);

        let rendered = metrics.render();
        assert!(rendered.contains("arcadia_purchases_succeeded_total 1"));
        assert!(rendered.contains("arcadia_items_granted_total 3"));
    }
}

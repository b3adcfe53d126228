//! # Prometheus Metrics
//!
//! Operational metrics for the election server, scraped from `/metrics`
//! on the dedicated metrics port. All metrics live in their own
//! [`prometheus::Registry`] under the `ballot` namespace so they never
//! collide with a default global registry.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the server.
///
/// Clone-friendly (prometheus handles are internally reference-counted) so
/// it can be shared across request handlers.
#[derive(Clone)]
pub struct ServerMetrics {
    /// Registry that owns all metrics below.
    registry: Registry,
    /// Votes accepted into the ledger.
    pub votes_accepted_total: IntCounter,
    /// Vote requests rejected by the acceptance procedure.
    pub votes_rejected_total: IntCounter,
    /// Requests refused because their origin was fraud-blocked.
    pub origins_blocked_total: IntCounter,
    /// Requests refused by the transport-layer rate limiter.
    pub rate_limited_total: IntCounter,
    /// Registered houses.
    pub registered_houses: IntGauge,
    /// End-to-end vote handling latency in seconds.
    pub vote_latency_seconds: Histogram,
}

impl ServerMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("ballot".into()), None)
            .expect("failed to create prometheus registry");

        let votes_accepted_total =
            IntCounter::new("votes_accepted_total", "Votes accepted into the ledger")
                .expect("metric creation");
        registry
            .register(Box::new(votes_accepted_total.clone()))
            .expect("metric registration");

        let votes_rejected_total = IntCounter::new(
            "votes_rejected_total",
            "Vote requests rejected by validation or duplicate checks",
        )
        .expect("metric creation");
        registry
            .register(Box::new(votes_rejected_total.clone()))
            .expect("metric registration");

        let origins_blocked_total = IntCounter::new(
            "origins_blocked_total",
            "Requests refused because their origin was fraud-blocked",
        )
        .expect("metric creation");
        registry
            .register(Box::new(origins_blocked_total.clone()))
            .expect("metric registration");

        let rate_limited_total = IntCounter::new(
            "rate_limited_total",
            "Requests refused by the transport-layer rate limiter",
        )
        .expect("metric creation");
        registry
            .register(Box::new(rate_limited_total.clone()))
            .expect("metric registration");

        let registered_houses = IntGauge::new("registered_houses", "Registered voting households")
            .expect("metric creation");
        registry
            .register(Box::new(registered_houses.clone()))
            .expect("metric registration");

        let vote_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "vote_latency_seconds",
                "End-to-end vote request handling latency in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(vote_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            votes_accepted_total,
            votes_rejected_total,
            origins_blocked_total,
            rate_limited_total,
            registered_houses,
            vote_latency_seconds,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition
    /// format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<ServerMetrics>;

/// Axum handler rendering `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

// Prometheus metrics for the PotSplit gateway
// Tracks: request throughput and latency, session lifecycle, settlement outcomes

use prometheus::{
    register_counter_with_registry, register_histogram_with_registry,
    register_int_gauge_with_registry, Counter, Encoder, Histogram, HistogramOpts, IntGauge, Opts,
    Registry, TextEncoder,
};
use once_cell::sync::Lazy;
use std::sync::Arc;

pub struct Metrics {
    pub registry: Registry,

    // Request metrics
    pub http_requests_total: Counter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_in_flight: IntGauge,

    // Session metrics
    pub sessions_created_total: Counter,
    pub players_added_total: Counter,
    pub sessions_completed_total: Counter,

    // Settlement metrics
    pub settlements_total: Counter,
    pub settlement_failures_total: Counter,
    pub settlement_duration_seconds: Histogram,
    pub settlement_transactions_total: Counter,
    pub payment_links_total: Counter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let http_requests_total = register_counter_with_registry!(
            Opts::new("potsplit_http_requests_total", "Total HTTP requests processed"),
            registry
        )?;

        let http_request_duration_seconds = register_histogram_with_registry!(
            HistogramOpts::new(
                "potsplit_http_request_duration_seconds",
                "HTTP request duration in seconds"
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            registry
        )?;

        let http_requests_in_flight = register_int_gauge_with_registry!(
            Opts::new("potsplit_http_requests_in_flight", "Current HTTP requests being processed"),
            registry
        )?;

        let sessions_created_total = register_counter_with_registry!(
            Opts::new("potsplit_sessions_created_total", "Sessions created"),
            registry
        )?;

        let players_added_total = register_counter_with_registry!(
            Opts::new("potsplit_players_added_total", "Players added to sessions"),
            registry
        )?;

        let sessions_completed_total = register_counter_with_registry!(
            Opts::new("potsplit_sessions_completed_total", "Sessions marked settled"),
            registry
        )?;

        let settlements_total = register_counter_with_registry!(
            Opts::new("potsplit_settlements_total", "Settlement runs that produced a verified set"),
            registry
        )?;

        let settlement_failures_total = register_counter_with_registry!(
            Opts::new("potsplit_settlement_failures_total", "Settlement runs rejected or failed"),
            registry
        )?;

        let settlement_duration_seconds = register_histogram_with_registry!(
            HistogramOpts::new(
                "potsplit_settlement_duration_seconds",
                "Settlement generation and validation time in seconds"
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]),
            registry
        )?;

        let settlement_transactions_total = register_counter_with_registry!(
            Opts::new("potsplit_settlement_transactions_total", "Transactions produced by settlement runs"),
            registry
        )?;

        let payment_links_total = register_counter_with_registry!(
            Opts::new("potsplit_payment_links_total", "Payment link pairs generated"),
            registry
        )?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            sessions_created_total,
            players_added_total,
            sessions_completed_total,
            settlements_total,
            settlement_failures_total,
            settlement_duration_seconds,
            settlement_transactions_total,
            payment_links_total,
        })
    }

    /// Export all metrics in Prometheus text format
    pub fn export(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

// Global metrics instance
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

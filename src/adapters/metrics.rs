//! Prometheus Metrics Registry - Pipeline Observability
//!
//! Registers and exposes Prometheus metrics for the quote pipeline.
//! Covers fetch outcomes per venue, fetch latency, batch chunk counts,
//! real-vs-synthetic tick ratios, and the number of live series.
//!
//! All metrics follow the naming convention `quotefeed_*`.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Centralized Prometheus metrics for the quote pipeline.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Quotes successfully fetched, by venue class.
    pub quotes_ok: IntCounterVec,
    /// Fetches that produced no quote, by venue class and reason.
    pub quotes_absent: IntCounterVec,
    /// Upstream fetch latency in seconds, by venue class.
    pub fetch_latency: HistogramVec,
    /// Batch chunks dispatched.
    pub batch_chunks: IntCounter,
    /// Series ticks applied, by outcome (real | synthetic).
    pub series_ticks: IntCounterVec,
    /// Currently subscribed series.
    pub active_series: IntGauge,
}

impl MetricsRegistry {
    /// Create and register all pipeline metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let quotes_ok = IntCounterVec::new(
            Opts::new("quotefeed_quotes_ok_total", "Quotes successfully fetched"),
            &["class"],
        )?;

        let quotes_absent = IntCounterVec::new(
            Opts::new(
                "quotefeed_quotes_absent_total",
                "Fetches that produced no quote",
            ),
            &["class", "reason"],
        )?;

        let fetch_latency = HistogramVec::new(
            HistogramOpts::new(
                "quotefeed_fetch_latency_seconds",
                "Upstream fetch latency in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 8.0]),
            &["class"],
        )?;

        let batch_chunks = IntCounter::new(
            "quotefeed_batch_chunks_total",
            "Batch chunks dispatched upstream",
        )?;

        let series_ticks = IntCounterVec::new(
            Opts::new(
                "quotefeed_series_ticks_total",
                "Series points appended, by outcome",
            ),
            &["outcome"],
        )?;

        let active_series =
            IntGauge::new("quotefeed_active_series", "Currently subscribed series")?;

        registry.register(Box::new(quotes_ok.clone()))?;
        registry.register(Box::new(quotes_absent.clone()))?;
        registry.register(Box::new(fetch_latency.clone()))?;
        registry.register(Box::new(batch_chunks.clone()))?;
        registry.register(Box::new(series_ticks.clone()))?;
        registry.register(Box::new(active_series.clone()))?;

        Ok(Self {
            registry,
            quotes_ok,
            quotes_absent,
            fetch_latency,
            batch_chunks,
            series_ticks,
            active_series,
        })
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if encoder
            .encode(&self.registry.gather(), &mut buffer)
            .is_err()
        {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Axum router serving `/metrics`.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&self);
                async move { metrics.render() }
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_renders_registered_metrics() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.quotes_ok.with_label_values(&["crypto"]).inc();
        metrics
            .quotes_absent
            .with_label_values(&["index", "unmapped_symbol"])
            .inc();
        metrics.active_series.set(3);

        let text = metrics.render();
        assert!(text.contains("quotefeed_quotes_ok_total"));
        assert!(text.contains("unmapped_symbol"));
        assert!(text.contains("quotefeed_active_series 3"));
    }
}

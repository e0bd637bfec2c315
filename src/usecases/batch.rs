//! Batch Orchestrator - Chunked Multi-Symbol Fetch
//!
//! Fans N instrument lookups out across the venue adapters with bounded
//! concurrency and collects whatever succeeds. Input is split into fixed
//! chunks; each chunk is dispatched concurrently and awaited as a whole,
//! then a fixed delay passes before the next chunk goes out (not after the
//! final one). Free-tier upstreams rate-limit per window — firing hundreds
//! of parallel requests produces cascading 429s, so chunk size and delay
//! are the two tuning knobs and both come from config.
//!
//! A batch never fails: symbols whose fetch produced nothing are simply
//! omitted from the result map, and a batch with zero successes returns an
//! empty map.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::adapters::MetricsRegistry;
use crate::domain::{Instrument, InstrumentClass, Quote};
use crate::ports::{FeedError, QuoteSource};

/// Orchestrator tuning knobs.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Symbols per concurrently-dispatched chunk.
    pub chunk_size: usize,
    /// Pause between chunks. Not applied after the final chunk.
    pub inter_chunk_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 15,
            inter_chunk_delay: Duration::from_millis(200),
        }
    }
}

/// Cumulative fetch counters, readable at any time.
#[derive(Debug, Default)]
pub struct BatchStats {
    ok: AtomicU64,
    absent: AtomicU64,
}

impl BatchStats {
    /// Quotes fetched successfully since startup.
    pub fn ok(&self) -> u64 {
        self.ok.load(Ordering::Relaxed)
    }

    /// Fetches that produced no quote since startup.
    pub fn absent(&self) -> u64 {
        self.absent.load(Ordering::Relaxed)
    }
}

/// Batched quote fetch orchestrator over any `QuoteSource`.
pub struct BatchFetcher<S: QuoteSource> {
    /// Dispatching quote source.
    source: Arc<S>,
    /// Chunking configuration.
    config: BatchConfig,
    /// Cumulative success/failure counters.
    stats: BatchStats,
    /// Optional Prometheus mirror of the counters.
    metrics: Option<Arc<MetricsRegistry>>,
}

impl<S: QuoteSource> BatchFetcher<S> {
    /// Create an orchestrator over a quote source.
    pub fn new(source: Arc<S>, config: BatchConfig) -> Self {
        Self {
            source,
            config,
            stats: BatchStats::default(),
            metrics: None,
        }
    }

    /// Attach a Prometheus registry mirroring the fetch counters.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Cumulative fetch counters.
    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    /// Single-instrument convenience wrapper.
    ///
    /// Returns `None` for every failure kind; the reason is logged here
    /// and never propagates.
    pub async fn fetch_quote(&self, symbol: &str, class: InstrumentClass) -> Option<Quote> {
        let started = Instant::now();
        let result = self.source.fetch(symbol, class).await;
        self.record(symbol, class, started.elapsed(), &result);

        match result {
            Ok(quote) if quote.is_valid() => Some(quote),
            Ok(_) | Err(_) => None,
        }
    }

    /// Fetch a batch of instruments into a partial result map.
    ///
    /// The returned map's key set is always a subset of the requested
    /// symbols; absent symbols are omitted, never present with a zero
    /// placeholder.
    pub async fn fetch_batch(&self, items: &[Instrument]) -> HashMap<String, Quote> {
        let mut out = HashMap::with_capacity(items.len());
        if items.is_empty() {
            return out;
        }

        let chunk_size = self.config.chunk_size.max(1);
        let chunk_count = items.len().div_ceil(chunk_size);

        for (index, chunk) in items.chunks(chunk_size).enumerate() {
            if let Some(metrics) = &self.metrics {
                metrics.batch_chunks.inc();
            }

            let results = join_all(
                chunk
                    .iter()
                    .map(|inst| self.fetch_quote(&inst.symbol, inst.class)),
            )
            .await;

            for (inst, quote) in chunk.iter().zip(results) {
                if let Some(quote) = quote {
                    out.insert(inst.symbol.clone(), quote);
                }
            }

            if index + 1 < chunk_count {
                tokio::time::sleep(self.config.inter_chunk_delay).await;
            }
        }

        info!(
            requested = items.len(),
            resolved = out.len(),
            chunks = chunk_count,
            "batch fetch complete"
        );
        out
    }

    fn record(
        &self,
        symbol: &str,
        class: InstrumentClass,
        elapsed: Duration,
        result: &Result<Quote, FeedError>,
    ) {
        let class_label = class.to_string();
        if let Some(metrics) = &self.metrics {
            metrics
                .fetch_latency
                .with_label_values(&[&class_label])
                .observe(elapsed.as_secs_f64());
        }

        match result {
            Ok(quote) if quote.is_valid() => {
                self.stats.ok.fetch_add(1, Ordering::Relaxed);
                if let Some(metrics) = &self.metrics {
                    metrics.quotes_ok.with_label_values(&[&class_label]).inc();
                }
            }
            Ok(quote) => {
                self.absent(&class_label, "invalid_quote");
                debug!(symbol, price = quote.price, "fetch produced invalid quote");
            }
            Err(err @ FeedError::UnmappedSymbol(_)) => {
                self.absent(&class_label, err.reason());
                // Configuration gap, not a runtime fault: operators add the
                // missing mapping under [index_codes].
                warn!(symbol, "index symbol has no provider mapping; add it to config");
            }
            Err(err) => {
                self.absent(&class_label, err.reason());
                debug!(symbol, reason = err.reason(), error = %err, "fetch absent");
            }
        }
    }

    fn absent(&self, class_label: &str, reason: &str) {
        self.stats.absent.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics
                .quotes_absent
                .with_label_values(&[class_label, reason])
                .inc();
        }
    }
}

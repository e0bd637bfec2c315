//! Quote Pipeline Facade - Wiring and Public Surface
//!
//! Builds the whole acquisition pipeline from `AppConfig` — shared HTTP
//! client → venue adapters → class router → batch orchestrator → session
//! gate → series registry — and exposes the surface presentation-layer
//! collaborators consume. Callers never see adapter or transport detail;
//! every fetch resolves to "got a quote" or "didn't".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};

use crate::adapters::venues::{BinanceTickerSource, QuoteRouter, YahooChartSource, yahoo};
use crate::adapters::{FeedClient, FeedClientConfig, MetricsRegistry};
use crate::config::{AppConfig, SessionConfig};
use crate::domain::{Instrument, InstrumentClass, Quote, SeriesSnapshot, VolatilityBands};

use super::batch::{BatchConfig, BatchFetcher, BatchStats};
use super::registry::{SeriesHandle, SeriesRegistry};
use super::session::{GateIntervals, SessionCalendar, SessionStatus, TradingSessionGate};
use super::updater::UpdaterSettings;

fn calendar_from(name: &str, config: &SessionConfig) -> Result<SessionCalendar> {
    let open = NaiveTime::parse_from_str(&config.open, "%H:%M")
        .with_context(|| format!("sessions.{name}.open is not HH:MM"))?;
    let close = NaiveTime::parse_from_str(&config.close, "%H:%M")
        .with_context(|| format!("sessions.{name}.close is not HH:MM"))?;
    let holidays = config
        .holidays
        .iter()
        .map(|h| h.parse::<NaiveDate>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("sessions.{name}: holiday not YYYY-MM-DD"))?;
    SessionCalendar::new(config.utc_offset_hours, open, close, holidays)
}

/// The assembled market-data pipeline.
pub struct QuotePipeline {
    fetcher: Arc<BatchFetcher<QuoteRouter>>,
    gate: Arc<TradingSessionGate>,
    registry: SeriesRegistry<QuoteRouter>,
    metrics: Arc<MetricsRegistry>,
}

impl QuotePipeline {
    /// Wire the pipeline from a validated configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let metrics = Arc::new(MetricsRegistry::new().context("metrics registry")?);

        let client = Arc::new(
            FeedClient::new(&FeedClientConfig {
                timeout: Duration::from_millis(config.http.timeout_ms),
                max_concurrent: config.http.max_concurrent,
                user_agent: format!("{}/{}", config.service.name, env!("CARGO_PKG_VERSION")),
            })
            .context("feed HTTP client")?,
        );

        let crypto = Arc::new(BinanceTickerSource::with_base_url(
            Arc::clone(&client),
            config.http.binance_base_url.clone(),
        ));

        // Config entries are merged over the compiled-in index map, so an
        // operator can add or override codes without rebuilding.
        let mut index_codes = yahoo::default_index_codes();
        index_codes.extend(config.index_codes.clone());
        let charts = Arc::new(YahooChartSource::with_options(
            Arc::clone(&client),
            config.http.yahoo_base_url.clone(),
            index_codes,
        ));

        let router = Arc::new(QuoteRouter::new(crypto, charts));
        let fetcher = Arc::new(
            BatchFetcher::new(
                router,
                BatchConfig {
                    chunk_size: config.batch.chunk_size,
                    inter_chunk_delay: Duration::from_millis(config.batch.inter_chunk_delay_ms),
                },
            )
            .with_metrics(Arc::clone(&metrics)),
        );

        let index_session = config
            .sessions
            .index
            .as_ref()
            .unwrap_or(&config.sessions.equity);
        let gate = Arc::new(TradingSessionGate::new(
            calendar_from("equity", &config.sessions.equity)?,
            calendar_from("equity_br", &config.sessions.equity_br)?,
            calendar_from("index", index_session)?,
            GateIntervals {
                crypto: Duration::from_millis(config.intervals.crypto_ms),
                equity_open: Duration::from_millis(config.intervals.equity_open_ms),
                equity_closed: Duration::from_millis(config.intervals.equity_closed_ms),
                index_open: Duration::from_millis(config.intervals.index_open_ms),
                index_closed: Duration::from_millis(config.intervals.index_closed_ms),
            },
        ));

        let settings = UpdaterSettings {
            capacity: config.series.capacity,
            backfill_step: Duration::from_millis(config.series.backfill_step_ms),
            bands: VolatilityBands {
                crypto: config.series.bands.crypto,
                equity: config.series.bands.equity,
                equity_br: config.series.bands.equity_br,
                index: config.series.bands.index,
            },
            fallback_prices: config.series.fallback_prices.clone(),
            default_fallback_price: config.series.default_fallback_price,
        };
        let registry = SeriesRegistry::new(Arc::clone(&fetcher), Arc::clone(&gate), settings)
            .with_metrics(Arc::clone(&metrics));

        Ok(Self {
            fetcher,
            gate,
            registry,
            metrics,
        })
    }

    /// Fetch one quote. `None` for every failure kind.
    pub async fn fetch_quote(&self, symbol: &str, class: InstrumentClass) -> Option<Quote> {
        self.fetcher.fetch_quote(symbol, class).await
    }

    /// Fetch a batch of instruments. The result map may be smaller than
    /// the request list; callers must tolerate missing symbols.
    pub async fn fetch_batch(&self, items: &[Instrument]) -> HashMap<String, Quote> {
        self.fetcher.fetch_batch(items).await
    }

    /// Whether the market for `(class, symbol)` is currently trading.
    pub fn is_market_open(&self, class: InstrumentClass, symbol: &str) -> SessionStatus {
        self.gate.is_open(class, symbol)
    }

    /// Refresh interval appropriate for `(class, symbol)` right now.
    pub fn update_interval(&self, class: InstrumentClass, symbol: &str) -> Duration {
        self.gate.update_interval(class, symbol)
    }

    /// Minimum refresh interval across a watch-list.
    pub fn effective_interval(&self, items: &[Instrument]) -> Duration {
        self.gate.effective_interval(items)
    }

    /// Subscribe a chart series; spawns its polling loop.
    pub async fn subscribe(&self, symbol: &str, class: InstrumentClass) -> SeriesHandle {
        self.registry.subscribe(symbol, class).await
    }

    /// Tear down a subscription and abandon its in-flight work.
    pub async fn unsubscribe(&self, handle: &SeriesHandle) {
        self.registry.unsubscribe(handle).await;
    }

    /// Current point buffer plus derived price/change for a subscription.
    pub async fn snapshot(&self, handle: &SeriesHandle) -> Option<SeriesSnapshot> {
        self.registry.snapshot(handle).await
    }

    /// Session gate, for callers that schedule their own polling.
    pub fn gate(&self) -> &TradingSessionGate {
        &self.gate
    }

    /// Cumulative fetch success/failure counters.
    pub fn stats(&self) -> &BatchStats {
        self.fetcher.stats()
    }

    /// Shared Prometheus registry.
    pub fn metrics(&self) -> Arc<MetricsRegistry> {
        Arc::clone(&self.metrics)
    }

    /// Stop every series loop. Used for deterministic shutdown.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }
}

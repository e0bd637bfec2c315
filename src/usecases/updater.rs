//! Incremental Series Updater - Per-Chart Polling Loop
//!
//! Keeps one rolling price series coherent for one chart. Two states:
//!
//! - **Bootstrapping** (once, on subscribe): try one real quote; seed the
//!   buffer with a backfilled walk ending at the real price, or at a
//!   configured fallback anchor when the network yields nothing. Bootstrap
//!   never blocks on upstream beyond that single attempt.
//! - **Steady** (every tick): fetch a fresh quote when the instrument's
//!   market is open — crypto always is — and append it; otherwise append a
//!   synthetic continuation point. Strict evict-then-append keeps the
//!   buffer length constant.
//!
//! Every tick produces a tagged [`TickOutcome`], so tests and metrics can
//! tell "showing real data" from "showing a plausible guess". The loop is
//! strictly sequential (await the update, then sleep), so there is at most
//! one in-flight update per series and a tick can never land mid-update.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::adapters::MetricsRegistry;
use crate::domain::synthetic::{self, VolatilityBands};
use crate::domain::{Instrument, PricePoint, PriceSeries, Quote};
use crate::ports::QuoteSource;

use super::batch::BatchFetcher;
use super::session::TradingSessionGate;

/// What a single tick appended to the series.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// A real upstream quote was appended.
    Real(Quote),
    /// No quote was available; a walk point at this price was appended.
    Synthetic(f64),
}

impl TickOutcome {
    /// Metric/log label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Real(_) => "real",
            Self::Synthetic(_) => "synthetic",
        }
    }

    /// Price that ended up in the series.
    pub fn price(&self) -> f64 {
        match self {
            Self::Real(q) => q.price,
            Self::Synthetic(p) => *p,
        }
    }
}

/// Settings shared by every series updater.
#[derive(Debug, Clone)]
pub struct UpdaterSettings {
    /// Point capacity of each series.
    pub capacity: usize,
    /// Spacing of backfilled bootstrap points.
    pub backfill_step: Duration,
    /// Per-class synthetic walk bands.
    pub bands: VolatilityBands,
    /// Anchor prices for bootstrap when no real quote can be fetched.
    pub fallback_prices: HashMap<String, f64>,
    /// Anchor for symbols without a configured fallback price.
    pub default_fallback_price: f64,
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self {
            capacity: 60,
            backfill_step: Duration::from_secs(5),
            bands: VolatilityBands::default(),
            fallback_prices: HashMap::new(),
            default_fallback_price: 100.0,
        }
    }
}

/// Stateful updater owning one series' write side.
pub struct SeriesUpdater<S: QuoteSource> {
    instrument: Instrument,
    series: Arc<RwLock<PriceSeries>>,
    fetcher: Arc<BatchFetcher<S>>,
    gate: Arc<TradingSessionGate>,
    band: f64,
    fallback_anchor: f64,
    capacity: usize,
    backfill_step: Duration,
    rng: SmallRng,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl<S: QuoteSource> SeriesUpdater<S> {
    /// Create an updater for one instrument over a shared series buffer.
    pub fn new(
        instrument: Instrument,
        series: Arc<RwLock<PriceSeries>>,
        fetcher: Arc<BatchFetcher<S>>,
        gate: Arc<TradingSessionGate>,
        settings: &UpdaterSettings,
    ) -> Self {
        let band = settings.bands.for_class(instrument.class);
        let fallback_anchor = settings
            .fallback_prices
            .get(&instrument.symbol)
            .copied()
            .unwrap_or(settings.default_fallback_price);
        Self {
            instrument,
            series,
            fetcher,
            gate,
            band,
            fallback_anchor,
            capacity: settings.capacity,
            backfill_step: settings.backfill_step,
            rng: SmallRng::from_entropy(),
            metrics: None,
        }
    }

    /// Attach a Prometheus registry for tick outcome counters.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Seed the series and enter steady state.
    ///
    /// One real-quote attempt; on absence the walk is anchored at the
    /// configured fallback price instead of blocking on the network.
    pub async fn bootstrap(&mut self) -> TickOutcome {
        let fetched = self
            .fetcher
            .fetch_quote(&self.instrument.symbol, self.instrument.class)
            .await;

        let (anchor, outcome) = match fetched {
            Some(quote) => (quote.price, TickOutcome::Real(quote)),
            None => (self.fallback_anchor, TickOutcome::Synthetic(self.fallback_anchor)),
        };

        let mut points = synthetic::backfill(
            &mut self.rng,
            anchor,
            self.band,
            self.capacity,
            Utc::now(),
            self.backfill_step,
        );
        if let (TickOutcome::Real(quote), Some(last)) = (&outcome, points.last_mut()) {
            last.volume = quote.volume;
        }

        let mut series = self.series.write().await;
        series.seed(points);
        info!(
            symbol = %self.instrument.symbol,
            class = %self.instrument.class,
            anchor,
            source = outcome.label(),
            points = series.len(),
            "series bootstrapped"
        );
        drop(series);

        self.record(&outcome);
        outcome
    }

    /// One steady-state tick: fetch-or-synthesize, then evict-and-append.
    pub async fn step(&mut self) -> TickOutcome {
        let class = self.instrument.class;
        // The gate is consulted before any network call; crypto bypasses it
        // and is always fetched.
        let market_open = class.is_always_open()
            || self.gate.is_open(class, &self.instrument.symbol).is_open;

        let fetched = if market_open {
            self.fetcher
                .fetch_quote(&self.instrument.symbol, class)
                .await
        } else {
            None
        };

        let outcome = match fetched {
            Some(quote) => TickOutcome::Real(quote),
            None => {
                let last = {
                    let series = self.series.read().await;
                    series.current_price().unwrap_or(self.fallback_anchor)
                };
                TickOutcome::Synthetic(synthetic::next_price(&mut self.rng, last, self.band))
            }
        };

        let point = match &outcome {
            TickOutcome::Real(quote) => PricePoint {
                time: quote.timestamp,
                price: quote.price,
                volume: quote.volume,
            },
            TickOutcome::Synthetic(price) => PricePoint {
                time: Utc::now(),
                price: *price,
                volume: 0.0,
            },
        };

        let mut series = self.series.write().await;
        series.push(point);
        drop(series);

        self.record(&outcome);
        debug!(
            symbol = %self.instrument.symbol,
            outcome = outcome.label(),
            price = outcome.price(),
            "series tick"
        );
        outcome
    }

    /// Run bootstrap followed by the steady polling loop until cancelled.
    ///
    /// The interval is re-read from the gate every cycle, so open/close
    /// transitions change the cadence on the next tick.
    pub async fn run(mut self, cancel: CancellationToken) {
        self.bootstrap().await;

        loop {
            let interval = self
                .gate
                .update_interval(self.instrument.class, &self.instrument.symbol);
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {
                    self.step().await;
                }
            }
        }

        debug!(symbol = %self.instrument.symbol, "series loop stopped");
    }

    fn record(&self, outcome: &TickOutcome) {
        if let Some(metrics) = &self.metrics {
            metrics
                .series_ticks
                .with_label_values(&[outcome.label()])
                .inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::domain::InstrumentClass;
    use crate::ports::FeedError;
    use crate::usecases::batch::BatchConfig;

    struct AlwaysAbsent;

    #[async_trait]
    impl QuoteSource for AlwaysAbsent {
        async fn fetch(&self, _symbol: &str, _class: InstrumentClass) -> Result<Quote, FeedError> {
            Err(FeedError::Transport {
                message: "connection refused".to_string(),
                timed_out: false,
            })
        }
    }

    struct FixedPrice(f64);

    #[async_trait]
    impl QuoteSource for FixedPrice {
        async fn fetch(&self, symbol: &str, _class: InstrumentClass) -> Result<Quote, FeedError> {
            Ok(Quote {
                symbol: symbol.to_string(),
                price: self.0,
                change: 0.0,
                change_percent: 0.0,
                volume: 42.0,
                high_24h: self.0,
                low_24h: self.0,
                market_cap: None,
                timestamp: Utc::now(),
            })
        }
    }

    fn updater<S: QuoteSource>(source: S, settings: &UpdaterSettings) -> SeriesUpdater<S> {
        let instrument = Instrument::new("BINANCE:BTCUSDT", InstrumentClass::Crypto);
        let series = Arc::new(RwLock::new(PriceSeries::new(
            instrument.symbol.clone(),
            instrument.class,
            settings.capacity,
        )));
        let fetcher = Arc::new(BatchFetcher::new(Arc::new(source), BatchConfig::default()));
        let gate = Arc::new(TradingSessionGate::with_defaults().unwrap());
        SeriesUpdater::new(instrument, series, fetcher, gate, settings)
    }

    #[tokio::test]
    async fn test_bootstrap_without_network_uses_fallback_anchor() {
        let mut settings = UpdaterSettings::default();
        settings.capacity = 30;
        settings
            .fallback_prices
            .insert("BINANCE:BTCUSDT".to_string(), 97_000.0);

        let mut updater = updater(AlwaysAbsent, &settings);
        let outcome = updater.bootstrap().await;
        assert!(matches!(outcome, TickOutcome::Synthetic(_)));

        let series = updater.series.read().await;
        assert_eq!(series.len(), 30);
        assert_eq!(series.current_price(), Some(97_000.0));
    }

    #[tokio::test]
    async fn test_bootstrap_with_quote_anchors_on_real_price() {
        let settings = UpdaterSettings::default();
        let mut updater = updater(FixedPrice(64_250.0), &settings);
        let outcome = updater.bootstrap().await;
        assert!(matches!(outcome, TickOutcome::Real(_)));

        let series = updater.series.read().await;
        assert_eq!(series.len(), settings.capacity);
        assert_eq!(series.current_price(), Some(64_250.0));
        assert_eq!(series.last().unwrap().volume, 42.0);
    }

    #[tokio::test]
    async fn test_three_absent_ticks_stay_in_band_at_constant_len() {
        let mut settings = UpdaterSettings::default();
        settings.capacity = 20;
        let band = settings.bands.crypto;

        let mut updater = updater(AlwaysAbsent, &settings);
        updater.bootstrap().await;

        let mut last = updater.series.read().await.current_price().unwrap();
        for _ in 0..3 {
            let outcome = updater.step().await;
            assert!(matches!(outcome, TickOutcome::Synthetic(_)));

            let series = updater.series.read().await;
            assert_eq!(series.len(), 20);
            let current = series.current_price().unwrap();
            assert!(((current - last).abs() / last) <= band + 1e-12);
            last = current;
        }
    }

    #[tokio::test]
    async fn test_real_tick_appends_quote_price() {
        let settings = UpdaterSettings::default();
        let mut updater = updater(FixedPrice(101.5), &settings);
        updater.bootstrap().await;
        let outcome = updater.step().await;
        assert!(matches!(outcome, TickOutcome::Real(_)));

        let series = updater.series.read().await;
        assert_eq!(series.len(), settings.capacity);
        assert_eq!(series.current_price(), Some(101.5));
    }
}

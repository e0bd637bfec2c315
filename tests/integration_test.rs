//! Integration Tests - Pipeline Component Testing
//!
//! Tests the interaction between the batch orchestrator, the series
//! registry, and mocked venue adapters. Uses mockall for port mocking and
//! tokio's paused clock for deterministic pacing assertions.

use std::sync::Arc;
use std::time::Duration;

use mockall::mock;
use tokio::time::Instant;

use quotefeed::adapters::venues::YahooChartSource;
use quotefeed::adapters::{FeedClient, FeedClientConfig};
use quotefeed::domain::{Instrument, InstrumentClass, Quote};
use quotefeed::ports::{FeedError, QuoteSource};
use quotefeed::usecases::{BatchConfig, BatchFetcher, SeriesRegistry, TradingSessionGate, UpdaterSettings};

// ---- Mock Definitions ----

mock! {
    pub Source {}

    #[async_trait::async_trait]
    impl QuoteSource for Source {
        async fn fetch(
            &self,
            symbol: &str,
            class: InstrumentClass,
        ) -> Result<Quote, FeedError>;
    }
}

fn quote(symbol: &str, price: f64) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        price,
        change: 0.0,
        change_percent: 0.0,
        volume: 10.0,
        high_24h: price,
        low_24h: price,
        market_cap: None,
        timestamp: chrono::Utc::now(),
    }
}

fn transport_error() -> FeedError {
    FeedError::Transport {
        message: "connection reset".to_string(),
        timed_out: false,
    }
}

// ---- Batch Orchestrator ----

#[tokio::test]
async fn test_batch_tolerates_partial_failure() {
    let mut source = MockSource::new();
    source.expect_fetch().returning(|symbol, _| {
        if symbol.starts_with("BINANCE:") {
            Ok(quote(symbol, 97_000.0))
        } else {
            Err(transport_error())
        }
    });

    let fetcher = BatchFetcher::new(Arc::new(source), BatchConfig::default());
    let items = vec![
        Instrument::new("BINANCE:BTCUSDT", InstrumentClass::Crypto),
        Instrument::new("NASDAQ:AAPL", InstrumentClass::Equity),
        Instrument::new("B3:VALE3", InstrumentClass::EquityBr),
    ];

    let result = fetcher.fetch_batch(&items).await;

    assert_eq!(result.len(), 1);
    assert!(result.contains_key("BINANCE:BTCUSDT"));
    // Key set is a subset of the request; absent symbols are omitted,
    // never present with a placeholder.
    assert!(result.keys().all(|k| items.iter().any(|i| &i.symbol == k)));
    assert_eq!(fetcher.stats().ok(), 1);
    assert_eq!(fetcher.stats().absent(), 2);
}

#[tokio::test]
async fn test_batch_drops_non_positive_prices() {
    let mut source = MockSource::new();
    source
        .expect_fetch()
        .returning(|symbol, _| Ok(quote(symbol, 0.0)));

    let fetcher = BatchFetcher::new(Arc::new(source), BatchConfig::default());
    let items = vec![Instrument::new("NASDAQ:AAPL", InstrumentClass::Equity)];

    let result = fetcher.fetch_batch(&items).await;
    assert!(result.is_empty());
    assert_eq!(fetcher.stats().absent(), 1);
}

#[tokio::test]
async fn test_batch_with_zero_successes_returns_empty_map() {
    let mut source = MockSource::new();
    source.expect_fetch().returning(|_, _| Err(transport_error()));

    let fetcher = BatchFetcher::new(Arc::new(source), BatchConfig::default());
    let items: Vec<Instrument> = (0..5)
        .map(|i| Instrument::new(format!("NASDAQ:SYM{i}"), InstrumentClass::Equity))
        .collect();

    let result = fetcher.fetch_batch(&items).await;
    assert!(result.is_empty());
}

// Scenario: a mixed batch with an unmapped index never yields the index.
#[tokio::test]
async fn test_batch_mixed_with_unmapped_index() {
    let mut source = MockSource::new();
    source.expect_fetch().returning(|symbol, class| {
        if class == InstrumentClass::Index {
            Err(FeedError::UnmappedSymbol(symbol.to_string()))
        } else {
            Ok(quote(symbol, 97_000.0))
        }
    });

    let fetcher = BatchFetcher::new(Arc::new(source), BatchConfig::default());
    let items = vec![
        Instrument::new("BINANCE:BTCUSDT", InstrumentClass::Crypto),
        Instrument::new("INDEX:ZZZUNKNOWN", InstrumentClass::Index),
    ];

    let result = fetcher.fetch_batch(&items).await;
    assert_eq!(result.len(), 1);
    assert!(result.contains_key("BINANCE:BTCUSDT"));
    assert!(!result.contains_key("INDEX:ZZZUNKNOWN"));
}

// The real chart adapter rejects an unmapped index before any network
// call, so this runs hermetically.
#[tokio::test]
async fn test_unmapped_index_fails_closed_in_adapter() {
    let client = Arc::new(FeedClient::new(&FeedClientConfig::default()).unwrap());
    let source = YahooChartSource::new(client);

    let err = source
        .fetch("INDEX:ZZZUNKNOWN", InstrumentClass::Index)
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::UnmappedSymbol(_)));
}

// ---- Chunk pacing ----

#[tokio::test(start_paused = true)]
async fn test_inter_chunk_delay_between_chunks_only() {
    let mut source = MockSource::new();
    source
        .expect_fetch()
        .returning(|symbol, _| Ok(quote(symbol, 1.0)));

    let fetcher = BatchFetcher::new(
        Arc::new(source),
        BatchConfig {
            chunk_size: 15,
            inter_chunk_delay: Duration::from_millis(200),
        },
    );

    // 20 items → two chunks → exactly one inter-chunk delay.
    let items: Vec<Instrument> = (0..20)
        .map(|i| Instrument::new(format!("BINANCE:PAIR{i}"), InstrumentClass::Crypto))
        .collect();

    let started = Instant::now();
    let result = fetcher.fetch_batch(&items).await;
    let elapsed = started.elapsed();

    assert_eq!(result.len(), 20);
    assert!(elapsed >= Duration::from_millis(200), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(400), "elapsed {elapsed:?}");

    // A single chunk pays no delay at all.
    let started = Instant::now();
    let result = fetcher.fetch_batch(&items[..10]).await;
    assert_eq!(result.len(), 10);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

// ---- Series registry ----

fn registry_with(source: MockSource, capacity: usize) -> SeriesRegistry<MockSource> {
    let fetcher = Arc::new(BatchFetcher::new(Arc::new(source), BatchConfig::default()));
    let gate = Arc::new(TradingSessionGate::with_defaults().unwrap());
    let settings = UpdaterSettings {
        capacity,
        ..UpdaterSettings::default()
    };
    SeriesRegistry::new(fetcher, gate, settings)
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_bootstraps_to_capacity() {
    let mut source = MockSource::new();
    source
        .expect_fetch()
        .returning(|symbol, _| Ok(quote(symbol, 64_000.0)));

    let registry = registry_with(source, 40);
    let handle = registry.subscribe("BINANCE:BTCUSDT", InstrumentClass::Crypto).await;

    // Paused clock: yielding lets the spawned updater finish bootstrap.
    tokio::time::sleep(Duration::from_millis(1)).await;

    let snap = registry.snapshot(&handle).await.unwrap();
    assert_eq!(snap.points.len(), 40);
    assert_eq!(snap.current_price, 64_000.0);
    assert!(snap.points.windows(2).all(|w| w[0].time <= w[1].time));
    assert_eq!(registry.subscription_count().await, 1);

    registry.unsubscribe(&handle).await;
    assert_eq!(registry.subscription_count().await, 0);
    assert!(registry.snapshot(&handle).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_steady_ticks_keep_length_constant_through_outages() {
    // Bootstrap succeeds, then every steady fetch fails: the series must
    // keep exactly one appended point per tick, all within the walk band.
    let mut source = MockSource::new();
    source
        .expect_fetch()
        .times(1)
        .returning(|symbol, _| Ok(quote(symbol, 50_000.0)));
    source.expect_fetch().returning(|_, _| Err(transport_error()));

    let registry = registry_with(source, 25);
    let handle = registry.subscribe("BINANCE:BTCUSDT", InstrumentClass::Crypto).await;
    tokio::time::sleep(Duration::from_millis(1)).await;

    let before = registry.snapshot(&handle).await.unwrap();
    assert_eq!(before.points.len(), 25);

    // Three crypto poll intervals (5s each) under the paused clock.
    let band = 0.004;
    let mut last = before.current_price;
    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        let snap = registry.snapshot(&handle).await.unwrap();
        assert_eq!(snap.points.len(), 25);
        let current = snap.current_price;
        assert!(current > 0.0);
        assert!(
            ((current - last).abs() / last) <= band + 1e-12,
            "synthetic step left the volatility band: {last} -> {current}"
        );
        last = current;
    }

    registry.unsubscribe(&handle).await;
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_leaves_other_series_untouched() {
    let mut source = MockSource::new();
    source
        .expect_fetch()
        .returning(|symbol, _| Ok(quote(symbol, 100.0)));

    let registry = registry_with(source, 10);
    let a = registry.subscribe("BINANCE:BTCUSDT", InstrumentClass::Crypto).await;
    let b = registry.subscribe("BINANCE:ETHUSDT", InstrumentClass::Crypto).await;
    tokio::time::sleep(Duration::from_millis(1)).await;

    registry.unsubscribe(&a).await;

    assert!(registry.snapshot(&a).await.is_none());
    let snap_b = registry.snapshot(&b).await.unwrap();
    assert_eq!(snap_b.points.len(), 10);

    // The surviving series still ticks after its sibling is gone.
    tokio::time::sleep(Duration::from_millis(5_100)).await;
    let later_b = registry.snapshot(&b).await.unwrap();
    assert_eq!(later_b.points.len(), 10);
    assert!(later_b.points.last().unwrap().time >= snap_b.points.last().unwrap().time);

    registry.unsubscribe(&b).await;
}

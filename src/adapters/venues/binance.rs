//! Binance Ticker Source - Crypto Quote Adapter
//!
//! Pulls the 24-hour rolling ticker for a crypto pair over REST. The
//! canonical symbol is flattened to the exchange's native pair code
//! (`BINANCE:BTC-USDT` → `BTCUSDT`) before the call. Every request
//! disables caching: this endpoint is the pipeline's only source of
//! truth for "now".

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use crate::adapters::client::FeedClient;
use crate::domain::{InstrumentClass, Quote, crypto_pair_code};
use crate::ports::{FeedError, QuoteSource};

/// Default Binance REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Binance 24-hour ticker payload. Numeric fields arrive as strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    /// Pair symbol, e.g. "BTCUSDT".
    symbol: String,
    /// Last trade price.
    last_price: String,
    /// Absolute 24h change.
    price_change: Option<String>,
    /// Relative 24h change in percent.
    price_change_percent: Option<String>,
    /// Price 24 hours ago.
    open_price: Option<String>,
    /// 24h high.
    high_price: Option<String>,
    /// 24h low.
    low_price: Option<String>,
    /// 24h base-asset volume.
    volume: Option<String>,
}

fn parse_field(value: Option<&String>) -> Option<f64> {
    value.and_then(|s| s.parse::<f64>().ok())
}

/// Crypto quote source backed by the Binance 24h ticker endpoint.
pub struct BinanceTickerSource {
    /// Shared HTTP client.
    client: Arc<FeedClient>,
    /// REST base URL (overridable for tests/mirrors).
    base_url: String,
}

impl BinanceTickerSource {
    /// Create a source against the default endpoint.
    pub fn new(client: Arc<FeedClient>) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    /// Create a source against a specific endpoint.
    pub fn with_base_url(client: Arc<FeedClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn normalize(&self, symbol: &str, ticker: &Ticker24h) -> Result<Quote, FeedError> {
        let price = ticker
            .last_price
            .parse::<f64>()
            .map_err(|_| FeedError::Malformed(format!("unparseable lastPrice for {}", ticker.symbol)))?;
        if !(price.is_finite() && price > 0.0) {
            return Err(FeedError::InvalidQuote { symbol: symbol.to_string(), price });
        }

        let open = parse_field(ticker.open_price.as_ref());
        // Prefer the upstream's own percentage; derive from the open only
        // when it is absent.
        let change_percent = parse_field(ticker.price_change_percent.as_ref())
            .or_else(|| open.filter(|o| *o > 0.0).map(|o| (price - o) / o * 100.0))
            .unwrap_or(0.0);
        let change = parse_field(ticker.price_change.as_ref())
            .or_else(|| open.map(|o| price - o))
            .unwrap_or(0.0);

        Ok(Quote {
            symbol: symbol.to_string(),
            price,
            change,
            change_percent,
            volume: parse_field(ticker.volume.as_ref()).unwrap_or(0.0).max(0.0),
            high_24h: parse_field(ticker.high_price.as_ref()).unwrap_or(price),
            low_24h: parse_field(ticker.low_price.as_ref()).unwrap_or(price),
            market_cap: None,
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl QuoteSource for BinanceTickerSource {
    async fn fetch(&self, symbol: &str, _class: InstrumentClass) -> Result<Quote, FeedError> {
        let pair = crypto_pair_code(symbol);
        let url = format!("{}/api/v3/ticker/24hr?symbol={pair}", self.base_url);

        let body = self.client.get_json(&url, true).await?;
        let ticker: Ticker24h = serde_json::from_value(body)
            .map_err(|e| FeedError::Malformed(format!("ticker shape mismatch: {e}")))?;

        let quote = self.normalize(symbol, &ticker)?;
        debug!(
            symbol,
            pair,
            price = quote.price,
            change_pct = quote.change_percent,
            "crypto quote fetched"
        );
        Ok(quote)
    }
}

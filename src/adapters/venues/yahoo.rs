//! Yahoo Chart Source - Equity and Index Quote Adapter
//!
//! Pulls a short intraday chart window and reduces it to one quote.
//! Handles three classes with one endpoint:
//! - `Equity`: bare ticker after stripping the venue prefix
//! - `EquityBr`: bare ticker plus the `.SA` country suffix
//! - `Index`: explicit static map from canonical symbol to the provider's
//!   index code (`INDEX:SPX` → `^GSPC`); unmapped symbols fail closed —
//!   the pipeline does not guess index codes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use crate::adapters::client::FeedClient;
use crate::domain::{InstrumentClass, Quote, equity_ticker};
use crate::ports::{FeedError, QuoteSource};

/// Default Yahoo Finance chart endpoint.
pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Compiled-in index code map. Config entries are merged over these.
pub fn default_index_codes() -> HashMap<String, String> {
    [
        ("INDEX:SPX", "^GSPC"),
        ("INDEX:DJI", "^DJI"),
        ("INDEX:IXIC", "^IXIC"),
        ("INDEX:NDX", "^NDX"),
        ("INDEX:BVSP", "^BVSP"),
        ("INDEX:FTSE", "^FTSE"),
        ("INDEX:DAX", "^GDAXI"),
        ("INDEX:N225", "^N225"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

// ── Upstream response shape (adapter-internal, not part of any contract) ──

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    current_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
    regular_market_volume: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<IntradayArrays>,
}

#[derive(Debug, Default, Deserialize)]
struct IntradayArrays {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

fn last_non_null(values: &[Option<f64>]) -> Option<f64> {
    values.iter().rev().find_map(|v| *v).filter(|v| v.is_finite())
}

fn first_non_null(values: &[Option<f64>]) -> Option<f64> {
    values.iter().find_map(|v| *v).filter(|v| v.is_finite())
}

/// Equity/index quote source backed by the Yahoo chart endpoint.
pub struct YahooChartSource {
    /// Shared HTTP client.
    client: Arc<FeedClient>,
    /// Chart API base URL (overridable for tests/mirrors).
    base_url: String,
    /// Canonical index symbol → provider index code.
    index_codes: HashMap<String, String>,
}

impl YahooChartSource {
    /// Create a source with the compiled-in index map.
    pub fn new(client: Arc<FeedClient>) -> Self {
        Self::with_options(client, DEFAULT_BASE_URL, default_index_codes())
    }

    /// Create a source with an explicit endpoint and index map.
    pub fn with_options(
        client: Arc<FeedClient>,
        base_url: impl Into<String>,
        index_codes: HashMap<String, String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            index_codes,
        }
    }

    /// Resolve the ticker the upstream expects for a canonical symbol.
    ///
    /// Indices require an explicit mapping; everything else strips the
    /// venue prefix (plus `.SA` suffixing for B3 tickers).
    pub fn upstream_ticker(
        &self,
        symbol: &str,
        class: InstrumentClass,
    ) -> Result<String, FeedError> {
        match class {
            InstrumentClass::Index => self
                .index_codes
                .get(symbol)
                .cloned()
                .ok_or_else(|| FeedError::UnmappedSymbol(symbol.to_string())),
            _ => Ok(equity_ticker(symbol, class)),
        }
    }

    fn quote_from_result(&self, symbol: &str, result: &ChartResult) -> Result<Quote, FeedError> {
        let meta = &result.meta;
        let arrays = result.indicators.quote.first();
        let closes = arrays.map(|a| a.close.as_slice()).unwrap_or(&[]);

        let price = meta
            .regular_market_price
            .or(meta.current_price)
            .or(meta.previous_close)
            .or(meta.chart_previous_close)
            .or_else(|| last_non_null(closes))
            .ok_or_else(|| FeedError::Malformed(format!("no resolvable price for {symbol}")))?;
        if !(price.is_finite() && price > 0.0) {
            return Err(FeedError::InvalidQuote { symbol: symbol.to_string(), price });
        }

        // Delta reference: previous close when known, else the window's
        // first traded price.
        let reference = meta
            .chart_previous_close
            .or(meta.previous_close)
            .or_else(|| first_non_null(closes))
            .filter(|r| *r > 0.0);
        let (change, change_percent) = match reference {
            Some(r) => (price - r, (price - r) / r * 100.0),
            None => (0.0, 0.0),
        };

        let high = arrays
            .and_then(|a| last_non_null(&a.high))
            .or(meta.regular_market_day_high)
            .unwrap_or(price);
        let low = arrays
            .and_then(|a| last_non_null(&a.low))
            .or(meta.regular_market_day_low)
            .unwrap_or(price);
        let volume = arrays
            .and_then(|a| last_non_null(&a.volume))
            .or(meta.regular_market_volume)
            .unwrap_or(0.0)
            .max(0.0);

        Ok(Quote {
            symbol: symbol.to_string(),
            price,
            change,
            change_percent,
            volume,
            high_24h: high,
            low_24h: low,
            market_cap: None,
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl QuoteSource for YahooChartSource {
    async fn fetch(&self, symbol: &str, class: InstrumentClass) -> Result<Quote, FeedError> {
        let ticker = self.upstream_ticker(symbol, class)?;
        let url = format!(
            "{}/v8/finance/chart/{ticker}?interval=5m&range=1d",
            self.base_url
        );

        let body = self.client.get_json(&url, false).await?;
        let parsed: ChartResponse = serde_json::from_value(body)
            .map_err(|e| FeedError::Malformed(format!("chart shape mismatch: {e}")))?;

        if let Some(err) = parsed.chart.error {
            if !err.is_null() {
                return Err(FeedError::Malformed(format!("chart error for {ticker}: {err}")));
            }
        }
        let result = parsed
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| FeedError::Malformed(format!("empty chart result for {ticker}")))?;

        let quote = self.quote_from_result(symbol, &result)?;
        debug!(symbol, ticker, price = quote.price, "chart quote fetched");
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> YahooChartSource {
        let client = Arc::new(FeedClient::new(&Default::default()).unwrap());
        YahooChartSource::new(client)
    }

    fn result_from(value: serde_json::Value) -> ChartResult {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_br_ticker_gets_sa_suffix() {
        let ticker = source()
            .upstream_ticker("B3:VALE3", InstrumentClass::EquityBr)
            .unwrap();
        assert_eq!(ticker, "VALE3.SA");
    }

    #[test]
    fn test_unmapped_index_fails_closed() {
        let err = source()
            .upstream_ticker("INDEX:ZZZUNKNOWN", InstrumentClass::Index)
            .unwrap_err();
        assert!(matches!(err, FeedError::UnmappedSymbol(_)));
    }

    #[test]
    fn test_known_index_resolves() {
        let ticker = source()
            .upstream_ticker("INDEX:SPX", InstrumentClass::Index)
            .unwrap();
        assert_eq!(ticker, "^GSPC");
    }

    #[test]
    fn test_price_fallback_chain() {
        let src = source();

        // regularMarketPrice wins
        let r = result_from(json!({
            "meta": {"regularMarketPrice": 190.5, "previousClose": 188.0},
            "indicators": {"quote": [{"close": [187.0, 189.0]}]}
        }));
        let q = src.quote_from_result("NASDAQ:AAPL", &r).unwrap();
        assert_eq!(q.price, 190.5);
        assert!((q.change - 2.5).abs() < 1e-9);

        // falls through to previousClose
        let r = result_from(json!({
            "meta": {"previousClose": 188.0},
            "indicators": {"quote": []}
        }));
        let q = src.quote_from_result("NASDAQ:AAPL", &r).unwrap();
        assert_eq!(q.price, 188.0);
    }

    #[test]
    fn test_zero_price_rejected() {
        let r = result_from(json!({
            "meta": {"regularMarketPrice": 0.0},
            "indicators": {"quote": []}
        }));
        let err = source().quote_from_result("NASDAQ:AAPL", &r).unwrap_err();
        assert!(matches!(err, FeedError::InvalidQuote { .. }));
    }

    #[test]
    fn test_missing_price_rejected() {
        let r = result_from(json!({"meta": {}, "indicators": {"quote": []}}));
        let err = source().quote_from_result("NASDAQ:AAPL", &r).unwrap_err();
        assert!(matches!(err, FeedError::Malformed(_)));
    }

    #[test]
    fn test_intraday_arrays_preferred_for_bounds() {
        let r = result_from(json!({
            "meta": {
                "regularMarketPrice": 100.0,
                "regularMarketDayHigh": 999.0,
                "regularMarketDayLow": 1.0,
                "regularMarketVolume": 5.0
            },
            "indicators": {"quote": [{
                "close": [99.0, 100.0],
                "high": [101.0, null, 102.0],
                "low": [97.0, 96.5, null],
                "volume": [10.0, 20.0]
            }]}
        }));
        let q = source().quote_from_result("NASDAQ:AAPL", &r).unwrap();
        assert_eq!(q.high_24h, 102.0);
        assert_eq!(q.low_24h, 96.5);
        assert_eq!(q.volume, 20.0);
    }
}

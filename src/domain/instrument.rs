//! Core instrument and quote types.
//!
//! Defines the canonical symbol scheme (`VENUE:TICKER`), the closed set of
//! instrument classes that drives adapter dispatch and session rules, and
//! the single normalized `Quote` shape every venue adapter emits.
//!
//! The class is decided once at the system boundary and carried explicitly
//! through every call — downstream code never re-derives it from symbol
//! string contents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Instrument category driving adapter choice and trading-session rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentClass {
    /// Crypto pairs (e.g. `BINANCE:BTCUSDT`). No market-hours constraint.
    Crypto,
    /// International equities (e.g. `NASDAQ:AAPL`).
    Equity,
    /// Brazilian equities on B3 (e.g. `B3:VALE3`). Queried with a `.SA` suffix.
    EquityBr,
    /// Stock indices (e.g. `INDEX:SPX`). Require an explicit provider code map.
    Index,
}

impl InstrumentClass {
    /// Whether this class trades around the clock and bypasses the session gate.
    pub fn is_always_open(self) -> bool {
        matches!(self, Self::Crypto)
    }
}

impl std::fmt::Display for InstrumentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Crypto => write!(f, "crypto"),
            Self::Equity => write!(f, "equity"),
            Self::EquityBr => write!(f, "equity_br"),
            Self::Index => write!(f, "index"),
        }
    }
}

/// A watch-list entry: canonical symbol plus its class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    /// Canonical venue-prefixed symbol, e.g. `"BINANCE:BTCUSDT"`.
    pub symbol: String,
    /// Instrument class decided at the boundary.
    pub class: InstrumentClass,
}

impl Instrument {
    /// Create a new instrument from a canonical symbol and class.
    pub fn new(symbol: impl Into<String>, class: InstrumentClass) -> Self {
        Self {
            symbol: symbol.into(),
            class,
        }
    }
}

/// One normalized point-in-time price observation for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    /// Canonical venue-prefixed symbol.
    pub symbol: String,
    /// Last trade price. Always strictly positive once past the adapter boundary.
    pub price: f64,
    /// Absolute delta versus the reference price (session open or previous close).
    pub change: f64,
    /// Relative delta versus the reference price, in percent.
    pub change_percent: f64,
    /// Traded volume over the observation window; 0 when unavailable.
    pub volume: f64,
    /// Highest price observed over the window; falls back to `price`.
    pub high_24h: f64,
    /// Lowest price observed over the window; falls back to `price`.
    pub low_24h: f64,
    /// Market capitalization where the upstream provides one.
    pub market_cap: Option<f64>,
    /// Acquisition time.
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Whether this quote is publishable. A non-positive or non-finite price
    /// must never reach a caller.
    pub fn is_valid(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

/// Strip the `VENUE:` prefix from a canonical symbol.
///
/// Symbols without a prefix pass through unchanged.
pub fn strip_venue_prefix(symbol: &str) -> &str {
    match symbol.split_once(':') {
        Some((_, bare)) => bare,
        None => symbol,
    }
}

/// Flatten a canonical crypto symbol into the exchange's native pair code.
///
/// Strips the venue prefix and every pair separator: `"BINANCE:BTC-USDT"`
/// and `"BINANCE:BTC/USDT"` both become `"BTCUSDT"`.
pub fn crypto_pair_code(symbol: &str) -> String {
    strip_venue_prefix(symbol)
        .chars()
        .filter(|c| !matches!(c, '-' | '/' | '_'))
        .collect::<String>()
        .to_uppercase()
}

/// Country suffix appended to bare B3 tickers for the chart provider.
pub const BR_SUFFIX: &str = ".SA";

/// Resolve the bare ticker a chart provider expects for an equity symbol.
///
/// B3 tickers get the `.SA` country suffix unless the symbol already
/// carries a suffix.
pub fn equity_ticker(symbol: &str, class: InstrumentClass) -> String {
    let bare = strip_venue_prefix(symbol);
    if class == InstrumentClass::EquityBr && !bare.contains('.') {
        format!("{bare}{BR_SUFFIX}")
    } else {
        bare.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_venue_prefix() {
        assert_eq!(strip_venue_prefix("NASDAQ:AAPL"), "AAPL");
        assert_eq!(strip_venue_prefix("AAPL"), "AAPL");
        assert_eq!(strip_venue_prefix("INDEX:SPX"), "SPX");
    }

    #[test]
    fn test_crypto_pair_code_flattens_separators() {
        assert_eq!(crypto_pair_code("BINANCE:BTCUSDT"), "BTCUSDT");
        assert_eq!(crypto_pair_code("BINANCE:BTC-USDT"), "BTCUSDT");
        assert_eq!(crypto_pair_code("BINANCE:eth/usdt"), "ETHUSDT");
    }

    #[test]
    fn test_equity_ticker_appends_br_suffix() {
        assert_eq!(
            equity_ticker("B3:VALE3", InstrumentClass::EquityBr),
            "VALE3.SA"
        );
        assert_eq!(
            equity_ticker("B3:PETR4.SA", InstrumentClass::EquityBr),
            "PETR4.SA"
        );
        assert_eq!(equity_ticker("NASDAQ:AAPL", InstrumentClass::Equity), "AAPL");
    }

    #[test]
    fn test_quote_validity() {
        let mut q = Quote {
            symbol: "NASDAQ:AAPL".to_string(),
            price: 190.0,
            change: 1.2,
            change_percent: 0.63,
            volume: 1_000_000.0,
            high_24h: 192.0,
            low_24h: 188.0,
            market_cap: None,
            timestamp: Utc::now(),
        };
        assert!(q.is_valid());
        q.price = 0.0;
        assert!(!q.is_valid());
        q.price = -1.0;
        assert!(!q.is_valid());
        q.price = f64::NAN;
        assert!(!q.is_valid());
    }

    #[test]
    fn test_class_display_and_always_open() {
        assert_eq!(format!("{}", InstrumentClass::Crypto), "crypto");
        assert_eq!(format!("{}", InstrumentClass::EquityBr), "equity_br");
        assert!(InstrumentClass::Crypto.is_always_open());
        assert!(!InstrumentClass::Index.is_always_open());
    }
}

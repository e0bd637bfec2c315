//! Quote Router - Class-Based Adapter Dispatch
//!
//! Routes a fetch to the right venue adapter from the instrument class
//! alone. Dispatch is decided here, once — no layer below re-derives the
//! venue from symbol string contents.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{InstrumentClass, Quote};
use crate::ports::{FeedError, QuoteSource};

use super::binance::BinanceTickerSource;
use super::yahoo::YahooChartSource;

/// Dispatching quote source over all venue adapters.
pub struct QuoteRouter {
    /// Crypto pairs.
    crypto: Arc<BinanceTickerSource>,
    /// Equities, Brazilian equities, and indices.
    charts: Arc<YahooChartSource>,
}

impl QuoteRouter {
    /// Create a router over the two concrete venue adapters.
    pub fn new(crypto: Arc<BinanceTickerSource>, charts: Arc<YahooChartSource>) -> Self {
        Self { crypto, charts }
    }
}

#[async_trait]
impl QuoteSource for QuoteRouter {
    async fn fetch(&self, symbol: &str, class: InstrumentClass) -> Result<Quote, FeedError> {
        match class {
            InstrumentClass::Crypto => self.crypto.fetch(symbol, class).await,
            InstrumentClass::Equity | InstrumentClass::EquityBr | InstrumentClass::Index => {
                self.charts.fetch(symbol, class).await
            }
        }
    }
}

//! Venue Quote Adapters
//!
//! One adapter per upstream provider, plus the class router:
//! - Binance: crypto 24h ticker (REST)
//! - Yahoo: equity / Brazilian equity / index chart endpoint
//! - Router: `InstrumentClass` → adapter dispatch

pub mod binance;
pub mod router;
pub mod yahoo;

pub use binance::BinanceTickerSource;
pub use router::QuoteRouter;
pub use yahoo::YahooChartSource;

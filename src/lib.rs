//! quotefeed — Multi-Venue Quote Pipeline
//!
//! Ingests quotes for heterogeneous instruments (crypto pairs,
//! international and Brazilian equities, indices) from disjoint upstream
//! providers, normalizes them into one quote shape, and republishes them
//! on a polling cadence gated by each market's trading session. Charts
//! consume a rolling per-series buffer that degrades to a bounded
//! synthetic walk when upstreams fail, so a display never freezes or
//! goes blank.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;

pub use domain::{Instrument, InstrumentClass, PricePoint, Quote, SeriesSnapshot};
pub use ports::{FeedError, QuoteSource};
pub use usecases::{QuotePipeline, SeriesHandle, SessionStatus, TickOutcome};

//! Bounded random-walk price synthesis.
//!
//! When no real quote is available a chart keeps moving on a locally
//! generated walk instead of freezing or going blank. Each step multiplies
//! the previous price by `1 + noise` with `noise` drawn uniformly from a
//! class-specific volatility band — crypto widest, indices narrowest.
//!
//! The same walk, run backwards from an anchor price, seeds a freshly
//! subscribed series with a plausible history ending exactly at the anchor.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;

use super::instrument::InstrumentClass;
use super::series::PricePoint;

/// Per-class relative noise bands for one synthetic step.
#[derive(Debug, Clone, Copy)]
pub struct VolatilityBands {
    /// Band for crypto pairs.
    pub crypto: f64,
    /// Band for international equities.
    pub equity: f64,
    /// Band for Brazilian equities.
    pub equity_br: f64,
    /// Band for indices.
    pub index: f64,
}

impl Default for VolatilityBands {
    fn default() -> Self {
        Self {
            crypto: 0.004,
            equity: 0.0015,
            equity_br: 0.002,
            index: 0.0008,
        }
    }
}

impl VolatilityBands {
    /// Band for a given instrument class.
    pub fn for_class(&self, class: InstrumentClass) -> f64 {
        match class {
            InstrumentClass::Crypto => self.crypto,
            InstrumentClass::Equity => self.equity,
            InstrumentClass::EquityBr => self.equity_br,
            InstrumentClass::Index => self.index,
        }
    }
}

/// Draw the next synthetic price from the previous one.
///
/// The result stays within `last * (1 ± band)` and strictly positive.
pub fn next_price<R: Rng>(rng: &mut R, last: f64, band: f64) -> f64 {
    let band = band.abs().min(0.5);
    let noise = rng.gen_range(-band..=band);
    let next = last * (1.0 + noise);
    if next > 0.0 { next } else { last }
}

/// Build a backfilled history of `len` points ending exactly at
/// `(end_time, anchor)`.
///
/// The walk runs backwards from the anchor at `step` spacing, so the newest
/// point carries the real (or fallback) price and the history behind it
/// looks organically noisy.
pub fn backfill<R: Rng>(
    rng: &mut R,
    anchor: f64,
    band: f64,
    len: usize,
    end_time: DateTime<Utc>,
    step: std::time::Duration,
) -> Vec<PricePoint> {
    let step = ChronoDuration::from_std(step).unwrap_or_else(|_| ChronoDuration::seconds(5));
    let mut prices = Vec::with_capacity(len);
    let mut price = anchor;
    for _ in 0..len {
        prices.push(price);
        price = next_price(rng, price, band);
    }
    // Walked newest-to-oldest; flip so the series ends at the anchor.
    prices.reverse();

    prices
        .into_iter()
        .enumerate()
        .map(|(i, price)| PricePoint {
            time: end_time - step * (len - 1 - i) as i32,
            price,
            volume: 0.0,
        })
        .collect()
}

//! Fixed-capacity rolling price series.
//!
//! Each displayed chart owns exactly one `PriceSeries`. The buffer is seeded
//! to capacity on subscription and every subsequent update strictly evicts
//! the oldest point before appending the newest, so the length never changes
//! after bootstrap. Timestamps are clamped monotonic on insert.
//!
//! The displayed delta is "change over the visible window": it is computed
//! against the oldest retained point, not against the previous tick.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::instrument::InstrumentClass;

/// One `(time, price, volume)` point in a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Observation (or synthesis) time.
    pub time: DateTime<Utc>,
    /// Price at this point. Strictly positive.
    pub price: f64,
    /// Volume attributed to this point; 0 for synthetic points.
    pub volume: f64,
}

/// Ordered fixed-capacity sequence of price points for one chart.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    symbol: String,
    class: InstrumentClass,
    capacity: usize,
    points: VecDeque<PricePoint>,
}

impl PriceSeries {
    /// Create an empty series. Callers seed it to capacity before first read.
    pub fn new(symbol: impl Into<String>, class: InstrumentClass, capacity: usize) -> Self {
        Self {
            symbol: symbol.into(),
            class,
            capacity: capacity.max(2),
            points: VecDeque::with_capacity(capacity.max(2)),
        }
    }

    /// Canonical symbol this series tracks.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Instrument class of the tracked symbol.
    pub fn class(&self) -> InstrumentClass {
        self.class
    }

    /// Configured point capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of points currently held.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series holds no points yet.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Replace the buffer with a seed history. Excess points are dropped
    /// from the front so the newest `capacity` points survive.
    pub fn seed(&mut self, points: impl IntoIterator<Item = PricePoint>) {
        self.points.clear();
        for p in points {
            self.push(p);
        }
    }

    /// Append a point, evicting the oldest once at capacity.
    ///
    /// The inserted timestamp is clamped to the last point's time so the
    /// series stays monotonic even if a caller's clock steps backwards.
    pub fn push(&mut self, mut point: PricePoint) {
        if let Some(last) = self.points.back() {
            if point.time < last.time {
                point.time = last.time;
            }
        }
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// Oldest retained point.
    pub fn first(&self) -> Option<&PricePoint> {
        self.points.front()
    }

    /// Most recent point.
    pub fn last(&self) -> Option<&PricePoint> {
        self.points.back()
    }

    /// Most recent price, if any point exists.
    pub fn current_price(&self) -> Option<f64> {
        self.points.back().map(|p| p.price)
    }

    /// Window delta: `(change, change_percent)` of the newest point versus
    /// the oldest retained point.
    pub fn window_change(&self) -> (f64, f64) {
        match (self.points.front(), self.points.back()) {
            (Some(first), Some(last)) if first.price > 0.0 => {
                let change = last.price - first.price;
                (change, change / first.price * 100.0)
            }
            _ => (0.0, 0.0),
        }
    }

    /// Iterate points oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }

    /// Immutable snapshot for readers outside the updater loop.
    pub fn snapshot(&self) -> SeriesSnapshot {
        let (change, change_percent) = self.window_change();
        SeriesSnapshot {
            symbol: self.symbol.clone(),
            class: self.class,
            points: self.points.iter().copied().collect(),
            current_price: self.current_price().unwrap_or(0.0),
            change,
            change_percent,
        }
    }
}

/// Owned copy of a series handed to presentation-layer readers.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesSnapshot {
    /// Canonical symbol.
    pub symbol: String,
    /// Instrument class.
    pub class: InstrumentClass,
    /// Points oldest to newest.
    pub points: Vec<PricePoint>,
    /// Price of the newest point.
    pub current_price: f64,
    /// Delta of the newest point versus the oldest retained point.
    pub change: f64,
    /// Relative delta in percent over the visible window.
    pub change_percent: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn point(secs: i64, price: f64) -> PricePoint {
        PricePoint {
            time: Utc.timestamp_opt(secs, 0).unwrap(),
            price,
            volume: 0.0,
        }
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let mut s = PriceSeries::new("NASDAQ:AAPL", InstrumentClass::Equity, 3);
        for i in 0..10 {
            s.push(point(i, 100.0 + i as f64));
        }
        assert_eq!(s.len(), 3);
        assert_eq!(s.first().unwrap().price, 107.0);
        assert_eq!(s.last().unwrap().price, 109.0);
    }

    #[test]
    fn test_timestamps_clamped_monotonic() {
        let mut s = PriceSeries::new("NASDAQ:AAPL", InstrumentClass::Equity, 5);
        s.push(point(100, 1.0));
        s.push(point(50, 2.0));
        let times: Vec<_> = s.iter().map(|p| p.time).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(s.last().unwrap().time, s.first().unwrap().time);
    }

    #[test]
    fn test_window_change_uses_oldest_point() {
        let mut s = PriceSeries::new("NASDAQ:AAPL", InstrumentClass::Equity, 4);
        s.push(point(0, 100.0));
        s.push(point(1, 104.0));
        s.push(point(2, 98.0));
        s.push(point(3, 110.0));
        let (change, pct) = s.window_change();
        assert!((change - 10.0).abs() < 1e-9);
        assert!((pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_seed_trims_to_capacity() {
        let mut s = PriceSeries::new("NASDAQ:AAPL", InstrumentClass::Equity, 3);
        s.seed((0..8).map(|i| point(i, i as f64 + 1.0)));
        assert_eq!(s.len(), 3);
        assert_eq!(s.last().unwrap().price, 8.0);
    }

    #[test]
    fn test_snapshot_mirrors_buffer() {
        let mut s = PriceSeries::new("BINANCE:BTCUSDT", InstrumentClass::Crypto, 3);
        s.push(point(0, 50_000.0));
        s.push(point(1, 51_000.0));
        let snap = s.snapshot();
        assert_eq!(snap.points.len(), 2);
        assert_eq!(snap.current_price, 51_000.0);
        assert!((snap.change - 1_000.0).abs() < 1e-9);
        assert!((snap.change_percent - 2.0).abs() < 1e-9);
    }
}

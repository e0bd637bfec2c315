//! Trading-Session Gate - Market Hours and Poll Cadence
//!
//! Decides, per instrument class, whether the market is currently open and
//! how often it is worth polling. Crypto is always open and gets the
//! pipeline's shortest interval; traditional markets are gated by an
//! exchange-local calendar (weekday, holiday table, session window) and
//! polled slowly while closed.
//!
//! The calendar rules live behind this one type so a venue-specific
//! calendar can be swapped without touching callers. All queries are pure
//! functions of the instant — the `*_at` variants take it explicitly.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Utc, Weekday};

use crate::domain::{Instrument, InstrumentClass};

/// Gate verdict handed to callers: open flag plus a human message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Whether the market is currently trading.
    pub is_open: bool,
    /// Operator/user-facing explanation.
    pub message: String,
}

/// One exchange's trading calendar: local clock, session window, holidays.
#[derive(Debug, Clone)]
pub struct SessionCalendar {
    offset: FixedOffset,
    open: NaiveTime,
    close: NaiveTime,
    holidays: HashSet<NaiveDate>,
}

impl SessionCalendar {
    /// Build a calendar from a fixed UTC offset (hours), a session window,
    /// and a holiday list.
    pub fn new(
        utc_offset_hours: i32,
        open: NaiveTime,
        close: NaiveTime,
        holidays: impl IntoIterator<Item = NaiveDate>,
    ) -> Result<Self> {
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
            .with_context(|| format!("invalid UTC offset: {utc_offset_hours}h"))?;
        Ok(Self {
            offset,
            open,
            close,
            holidays: holidays.into_iter().collect(),
        })
    }

    /// Session verdict at an explicit instant.
    pub fn status_at(&self, now: DateTime<Utc>) -> SessionStatus {
        let local = now.with_timezone(&self.offset);

        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return SessionStatus {
                is_open: false,
                message: "market closed (weekend)".to_string(),
            };
        }
        if self.holidays.contains(&local.date_naive()) {
            return SessionStatus {
                is_open: false,
                message: "market closed (holiday)".to_string(),
            };
        }

        let t = local.time();
        if t >= self.open && t < self.close {
            SessionStatus {
                is_open: true,
                message: format!("market open until {} local", self.close.format("%H:%M")),
            }
        } else {
            SessionStatus {
                is_open: false,
                message: format!(
                    "market closed; session is {}–{} local",
                    self.open.format("%H:%M"),
                    self.close.format("%H:%M")
                ),
            }
        }
    }
}

/// Poll intervals per class and session state.
#[derive(Debug, Clone)]
pub struct GateIntervals {
    /// Crypto interval — the pipeline's effective floor.
    pub crypto: Duration,
    /// Equity interval while the market is open.
    pub equity_open: Duration,
    /// Equity interval while the market is closed.
    pub equity_closed: Duration,
    /// Index interval while the market is open.
    pub index_open: Duration,
    /// Index interval while the market is closed.
    pub index_closed: Duration,
}

impl Default for GateIntervals {
    fn default() -> Self {
        Self {
            crypto: Duration::from_secs(5),
            equity_open: Duration::from_secs(15),
            equity_closed: Duration::from_secs(120),
            index_open: Duration::from_secs(30),
            index_closed: Duration::from_secs(300),
        }
    }
}

/// Per-class market-hours and refresh-interval decisions.
pub struct TradingSessionGate {
    equity: SessionCalendar,
    equity_br: SessionCalendar,
    index: SessionCalendar,
    intervals: GateIntervals,
}

impl TradingSessionGate {
    /// Build a gate from per-exchange calendars and interval settings.
    /// Indices follow the `index` calendar (defaulting to the equity one
    /// at the config layer).
    pub fn new(
        equity: SessionCalendar,
        equity_br: SessionCalendar,
        index: SessionCalendar,
        intervals: GateIntervals,
    ) -> Self {
        Self {
            equity,
            equity_br,
            index,
            intervals,
        }
    }

    /// Gate with stock NYSE/B3 calendars and default intervals.
    pub fn with_defaults() -> Result<Self> {
        let equity = SessionCalendar::new(
            -5,
            NaiveTime::from_hms_opt(9, 30, 0).context("bad open time")?,
            NaiveTime::from_hms_opt(16, 0, 0).context("bad close time")?,
            [],
        )?;
        let equity_br = SessionCalendar::new(
            -3,
            NaiveTime::from_hms_opt(10, 0, 0).context("bad open time")?,
            NaiveTime::from_hms_opt(17, 30, 0).context("bad close time")?,
            [],
        )?;
        let index = equity.clone();
        Ok(Self::new(equity, equity_br, index, GateIntervals::default()))
    }

    fn calendar(&self, class: InstrumentClass) -> Option<&SessionCalendar> {
        match class {
            InstrumentClass::Crypto => None,
            InstrumentClass::Equity => Some(&self.equity),
            InstrumentClass::EquityBr => Some(&self.equity_br),
            InstrumentClass::Index => Some(&self.index),
        }
    }

    /// Whether the market for `(class, symbol)` is open right now.
    pub fn is_open(&self, class: InstrumentClass, symbol: &str) -> SessionStatus {
        self.is_open_at(class, symbol, Utc::now())
    }

    /// Deterministic variant of [`Self::is_open`] for an explicit instant.
    pub fn is_open_at(
        &self,
        class: InstrumentClass,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> SessionStatus {
        match self.calendar(class) {
            None => SessionStatus {
                is_open: true,
                message: format!("{symbol}: crypto trades around the clock"),
            },
            Some(calendar) => {
                let status = calendar.status_at(now);
                SessionStatus {
                    is_open: status.is_open,
                    message: format!("{symbol}: {}", status.message),
                }
            }
        }
    }

    /// Refresh interval appropriate for `(class, symbol)` right now.
    pub fn update_interval(&self, class: InstrumentClass, symbol: &str) -> Duration {
        self.interval_at(class, symbol, Utc::now())
    }

    /// Deterministic variant of [`Self::update_interval`].
    pub fn interval_at(
        &self,
        class: InstrumentClass,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Duration {
        match class {
            InstrumentClass::Crypto => self.intervals.crypto,
            InstrumentClass::Equity | InstrumentClass::EquityBr => {
                if self.is_open_at(class, symbol, now).is_open {
                    self.intervals.equity_open
                } else {
                    self.intervals.equity_closed
                }
            }
            InstrumentClass::Index => {
                if self.is_open_at(class, symbol, now).is_open {
                    self.intervals.index_open
                } else {
                    self.intervals.index_closed
                }
            }
        }
    }

    /// Effective poll interval for a mixed watch-list: the minimum across
    /// all instruments, so a crypto leg keeps its near-real-time cadence
    /// even when every traditional market is closed.
    pub fn effective_interval(&self, items: &[Instrument]) -> Duration {
        self.effective_interval_at(items, Utc::now())
    }

    /// Deterministic variant of [`Self::effective_interval`].
    pub fn effective_interval_at(&self, items: &[Instrument], now: DateTime<Utc>) -> Duration {
        items
            .iter()
            .map(|i| self.interval_at(i.class, &i.symbol, now))
            .min()
            .unwrap_or(self.intervals.crypto)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn gate() -> TradingSessionGate {
        TradingSessionGate::with_defaults().unwrap()
    }

    fn gate_with_holiday(date: &str) -> TradingSessionGate {
        let holiday = date.parse::<NaiveDate>().unwrap();
        let equity = SessionCalendar::new(
            -5,
            NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            [holiday],
        )
        .unwrap();
        let equity_br = SessionCalendar::new(
            -3,
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(17, 30, 0).unwrap(),
            [],
        )
        .unwrap();
        let index = equity.clone();
        TradingSessionGate::new(equity, equity_br, index, GateIntervals::default())
    }

    // Monday 2025-01-06 15:00 UTC = 10:00 New York (UTC-5), inside session.
    fn monday_open() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 15, 0, 0).unwrap()
    }

    // Saturday 2025-01-04 15:00 UTC.
    fn saturday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 4, 15, 0, 0).unwrap()
    }

    #[test]
    fn test_crypto_always_open() {
        let g = gate();
        assert!(g.is_open_at(InstrumentClass::Crypto, "BINANCE:BTCUSDT", saturday()).is_open);
        assert!(g.is_open_at(InstrumentClass::Crypto, "BINANCE:BTCUSDT", monday_open()).is_open);
    }

    #[test]
    fn test_equity_weekday_session() {
        let g = gate();
        assert!(g.is_open_at(InstrumentClass::Equity, "NASDAQ:AAPL", monday_open()).is_open);

        // 13:00 UTC Monday = 08:00 New York, before the bell.
        let pre_open = Utc.with_ymd_and_hms(2025, 1, 6, 13, 0, 0).unwrap();
        let status = g.is_open_at(InstrumentClass::Equity, "NASDAQ:AAPL", pre_open);
        assert!(!status.is_open);
        assert!(status.message.contains("09:30"));
    }

    #[test]
    fn test_weekend_and_holiday_closed() {
        let g = gate();
        let status = g.is_open_at(InstrumentClass::Equity, "NASDAQ:AAPL", saturday());
        assert!(!status.is_open);
        assert!(status.message.contains("weekend"));

        // Thursday 2025-12-25, 15:00 UTC, would otherwise be in session.
        let g = gate_with_holiday("2025-12-25");
        let christmas = Utc.with_ymd_and_hms(2025, 12, 25, 15, 0, 0).unwrap();
        let status = g.is_open_at(InstrumentClass::Equity, "NASDAQ:AAPL", christmas);
        assert!(!status.is_open);
        assert!(status.message.contains("holiday"));
    }

    #[test]
    fn test_b3_session_uses_local_clock() {
        let g = gate();
        // Monday 14:00 UTC = 11:00 São Paulo (UTC-3), inside 10:00–17:30.
        let now = Utc.with_ymd_and_hms(2025, 1, 6, 14, 0, 0).unwrap();
        assert!(g.is_open_at(InstrumentClass::EquityBr, "B3:VALE3", now).is_open);
        // Monday 12:30 UTC = 09:30 São Paulo, before open.
        let now = Utc.with_ymd_and_hms(2025, 1, 6, 12, 30, 0).unwrap();
        assert!(!g.is_open_at(InstrumentClass::EquityBr, "B3:VALE3", now).is_open);
    }

    #[test]
    fn test_intervals_slow_down_when_closed() {
        let g = gate();
        let open = g.interval_at(InstrumentClass::Equity, "NASDAQ:AAPL", monday_open());
        let closed = g.interval_at(InstrumentClass::Equity, "NASDAQ:AAPL", saturday());
        assert!(closed > open);
        assert_eq!(
            g.interval_at(InstrumentClass::Crypto, "BINANCE:BTCUSDT", saturday()),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_gate_is_idempotent_within_an_instant() {
        let g = gate();
        let now = monday_open();
        let a = g.is_open_at(InstrumentClass::Index, "INDEX:SPX", now);
        let b = g.is_open_at(InstrumentClass::Index, "INDEX:SPX", now);
        assert_eq!(a, b);
        assert_eq!(
            g.interval_at(InstrumentClass::Index, "INDEX:SPX", now),
            g.interval_at(InstrumentClass::Index, "INDEX:SPX", now)
        );
    }

    #[test]
    fn test_mixed_watchlist_takes_crypto_minimum() {
        let g = gate();
        let items = vec![
            Instrument::new("BINANCE:BTCUSDT", InstrumentClass::Crypto),
            Instrument::new("NASDAQ:AAPL", InstrumentClass::Equity),
        ];
        // Equity market closed on Saturday; crypto floor must win.
        assert_eq!(
            g.effective_interval_at(&items, saturday()),
            Duration::from_secs(5)
        );
    }
}

//! Configuration Module - TOML-based Pipeline Configuration
//!
//! Loads and validates configuration from `config.toml`. Everything an
//! operator may need to tune is externalized here — chunking knobs, poll
//! intervals, session calendars, volatility bands, fallback anchors, and
//! the index symbol map — nothing is hardcoded in the domain layer.
//! Compiled-in defaults keep a minimal config file valid.

pub mod loader;

use std::collections::HashMap;

use serde::Deserialize;

use crate::domain::Instrument;

/// Top-level pipeline configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the pipeline begins operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// Service identity and logging.
  pub service: ServiceConfig,
  /// Upstream HTTP client settings.
  pub http: HttpConfig,
  /// Batch orchestrator knobs.
  pub batch: BatchSettings,
  /// Per-class poll intervals.
  pub intervals: IntervalsConfig,
  /// Exchange trading calendars.
  pub sessions: SessionsConfig,
  /// Series capacity, bands, and fallback anchors.
  pub series: SeriesConfig,
  /// Canonical index symbol → provider code, merged over built-ins.
  pub index_codes: HashMap<String, String>,
  /// Metrics and health endpoints.
  pub metrics: MetricsConfig,
  /// Instruments the demo binary polls.
  pub watchlist: Vec<Instrument>,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      service: ServiceConfig::default(),
      http: HttpConfig::default(),
      batch: BatchSettings::default(),
      intervals: IntervalsConfig::default(),
      sessions: SessionsConfig::default(),
      series: SeriesConfig::default(),
      index_codes: HashMap::new(),
      metrics: MetricsConfig::default(),
      watchlist: Vec::new(),
    }
  }
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  pub log_level: String,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      name: "quotefeed".to_string(),
      log_level: "info".to_string(),
    }
  }
}

/// Upstream HTTP client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
  /// Per-request timeout in milliseconds.
  pub timeout_ms: u64,
  /// Maximum concurrent in-flight requests across all adapters.
  pub max_concurrent: usize,
  /// Crypto ticker REST base URL.
  pub binance_base_url: String,
  /// Chart API base URL.
  pub yahoo_base_url: String,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      timeout_ms: 8_000,
      max_concurrent: 16,
      binance_base_url: crate::adapters::venues::binance::DEFAULT_BASE_URL.to_string(),
      yahoo_base_url: crate::adapters::venues::yahoo::DEFAULT_BASE_URL.to_string(),
    }
  }
}

/// Batch orchestrator knobs — the two empirically tuned rate-limit levers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
  /// Symbols per concurrently-dispatched chunk.
  pub chunk_size: usize,
  /// Pause between chunks in milliseconds.
  pub inter_chunk_delay_ms: u64,
}

impl Default for BatchSettings {
  fn default() -> Self {
    Self {
      chunk_size: 15,
      inter_chunk_delay_ms: 200,
    }
  }
}

/// Poll interval configuration in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntervalsConfig {
  /// Crypto interval — the pipeline's effective floor.
  pub crypto_ms: u64,
  /// Equity interval while the market is open.
  pub equity_open_ms: u64,
  /// Equity interval while the market is closed.
  pub equity_closed_ms: u64,
  /// Index interval while the market is open.
  pub index_open_ms: u64,
  /// Index interval while the market is closed.
  pub index_closed_ms: u64,
}

impl Default for IntervalsConfig {
  fn default() -> Self {
    Self {
      crypto_ms: 5_000,
      equity_open_ms: 15_000,
      equity_closed_ms: 120_000,
      index_open_ms: 30_000,
      index_closed_ms: 300_000,
    }
  }
}

/// One exchange's calendar entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
  /// Fixed UTC offset of the exchange's local clock, in hours.
  pub utc_offset_hours: i32,
  /// Session open, local `HH:MM`.
  pub open: String,
  /// Session close, local `HH:MM`.
  pub close: String,
  /// Holiday dates, `YYYY-MM-DD`.
  pub holidays: Vec<String>,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      utc_offset_hours: -5,
      open: "09:30".to_string(),
      close: "16:00".to_string(),
      holidays: Vec::new(),
    }
  }
}

/// Trading calendars per instrument class.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
  /// International equities (NYSE/NASDAQ hours by default).
  pub equity: SessionConfig,
  /// Brazilian equities (B3 hours by default).
  pub equity_br: SessionConfig,
  /// Indices; falls back to the equity calendar when omitted.
  pub index: Option<SessionConfig>,
}

impl Default for SessionsConfig {
  fn default() -> Self {
    Self {
      equity: SessionConfig::default(),
      equity_br: SessionConfig {
        utc_offset_hours: -3,
        open: "10:00".to_string(),
        close: "17:30".to_string(),
        holidays: Vec::new(),
      },
      index: None,
    }
  }
}

/// Per-class synthetic walk bands (relative step bounds).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct BandsConfig {
  /// Crypto pairs — widest.
  pub crypto: f64,
  /// International equities.
  pub equity: f64,
  /// Brazilian equities.
  pub equity_br: f64,
  /// Indices — narrowest.
  pub index: f64,
}

impl Default for BandsConfig {
  fn default() -> Self {
    Self {
      crypto: 0.004,
      equity: 0.0015,
      equity_br: 0.002,
      index: 0.0008,
    }
  }
}

/// Series buffer and synthetic-walk configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
  /// Point capacity of each chart series.
  pub capacity: usize,
  /// Spacing of backfilled bootstrap points, in milliseconds.
  pub backfill_step_ms: u64,
  /// Per-class walk bands.
  pub bands: BandsConfig,
  /// Anchor prices for bootstrap when the network yields nothing.
  pub fallback_prices: HashMap<String, f64>,
  /// Anchor for symbols without a configured fallback price.
  pub default_fallback_price: f64,
}

impl Default for SeriesConfig {
  fn default() -> Self {
    Self {
      capacity: 60,
      backfill_step_ms: 5_000,
      bands: BandsConfig::default(),
      fallback_prices: HashMap::new(),
      default_fallback_price: 100.0,
    }
  }
}

/// Metrics and health endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
  /// Enable the metrics/health HTTP server.
  pub enabled: bool,
  /// Bind address for `/live`, `/ready`, and `/metrics`.
  pub bind_address: String,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: "0.0.0.0:9184".to_string(),
    }
  }
}

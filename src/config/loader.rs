//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters, and
//! providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use tracing::info;

use super::{AppConfig, SessionConfig};

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns a detailed error if the file can't be read, TOML parsing
/// fails, or a validation rule is violated.
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config: AppConfig = toml::from_str(&content)
    .with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;

  info!(
    watchlist = config.watchlist.len(),
    chunk_size = config.batch.chunk_size,
    inter_chunk_delay_ms = config.batch.inter_chunk_delay_ms,
    "Configuration loaded successfully"
  );

  Ok(config)
}

fn validate_session(name: &str, session: &SessionConfig) -> Result<()> {
  let open = NaiveTime::parse_from_str(&session.open, "%H:%M")
    .with_context(|| format!("sessions.{name}.open is not HH:MM: {}", session.open))?;
  let close = NaiveTime::parse_from_str(&session.close, "%H:%M")
    .with_context(|| format!("sessions.{name}.close is not HH:MM: {}", session.close))?;
  anyhow::ensure!(
    open < close,
    "sessions.{name}: open {} must precede close {}",
    session.open,
    session.close
  );
  anyhow::ensure!(
    (-12..=14).contains(&session.utc_offset_hours),
    "sessions.{name}: utc_offset_hours {} outside [-12, 14]",
    session.utc_offset_hours
  );
  for holiday in &session.holidays {
    holiday
      .parse::<NaiveDate>()
      .with_context(|| format!("sessions.{name}: holiday not YYYY-MM-DD: {holiday}"))?;
  }
  Ok(())
}

/// Validate all configuration parameters.
pub fn validate_config(config: &AppConfig) -> Result<()> {
  // HTTP validation
  anyhow::ensure!(config.http.timeout_ms > 0, "http.timeout_ms must be positive");
  anyhow::ensure!(
    config.http.max_concurrent > 0,
    "http.max_concurrent must be positive"
  );
  anyhow::ensure!(
    !config.http.binance_base_url.is_empty() && !config.http.yahoo_base_url.is_empty(),
    "upstream base URLs must not be empty"
  );

  // Batch validation
  anyhow::ensure!(
    (1..=100).contains(&config.batch.chunk_size),
    "batch.chunk_size must be in [1, 100], got {}",
    config.batch.chunk_size
  );
  anyhow::ensure!(
    config.batch.inter_chunk_delay_ms <= 10_000,
    "batch.inter_chunk_delay_ms must be at most 10000, got {}",
    config.batch.inter_chunk_delay_ms
  );

  // Interval validation
  let intervals = [
    config.intervals.crypto_ms,
    config.intervals.equity_open_ms,
    config.intervals.equity_closed_ms,
    config.intervals.index_open_ms,
    config.intervals.index_closed_ms,
  ];
  anyhow::ensure!(
    intervals.iter().all(|ms| *ms >= 1_000),
    "all poll intervals must be at least 1000 ms"
  );

  // Session validation
  validate_session("equity", &config.sessions.equity)?;
  validate_session("equity_br", &config.sessions.equity_br)?;
  if let Some(index) = &config.sessions.index {
    validate_session("index", index)?;
  }

  // Series validation
  anyhow::ensure!(
    config.series.capacity >= 2,
    "series.capacity must be at least 2, got {}",
    config.series.capacity
  );
  anyhow::ensure!(
    config.series.backfill_step_ms > 0,
    "series.backfill_step_ms must be positive"
  );
  for (name, band) in [
    ("crypto", config.series.bands.crypto),
    ("equity", config.series.bands.equity),
    ("equity_br", config.series.bands.equity_br),
    ("index", config.series.bands.index),
  ] {
    anyhow::ensure!(
      band > 0.0 && band <= 0.1,
      "series.bands.{name} must be in (0, 0.1], got {band}"
    );
  }
  anyhow::ensure!(
    config.series.default_fallback_price > 0.0,
    "series.default_fallback_price must be positive"
  );
  for (symbol, price) in &config.series.fallback_prices {
    anyhow::ensure!(
      *price > 0.0,
      "series.fallback_prices[{symbol}] must be positive, got {price}"
    );
  }

  // Index map validation
  for (symbol, code) in &config.index_codes {
    anyhow::ensure!(
      !symbol.is_empty() && !code.is_empty(),
      "index_codes entries must be non-empty"
    );
  }

  // Watchlist validation
  for (i, item) in config.watchlist.iter().enumerate() {
    anyhow::ensure!(
      !item.symbol.is_empty(),
      "watchlist[{i}] has an empty symbol"
    );
  }

  Ok(())
}

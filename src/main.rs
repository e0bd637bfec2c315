//! quotefeed — Entry Point
//!
//! Runs the pipeline as a standalone quotes-table service: polls the
//! configured watch-list at the session gate's effective interval and
//! keeps one demo chart series live. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Build the quote pipeline (HTTP client, adapters, router, gate)
//! 4. Spawn health/metrics server (/live, /ready, /metrics)
//! 5. Subscribe a demo chart series for the first watch-list entry
//! 6. Run the shared watch-list polling loop
//! 7. Wait for SIGINT → graceful shutdown (cancel→drain→exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod adapters;
mod config;
mod domain;
mod ports;
mod usecases;

use adapters::MetricsRegistry;
use domain::Instrument;
use usecases::QuotePipeline;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config =
        config::loader::load_config(&config_path).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        watchlist = config.watchlist.len(),
        "Starting quote pipeline"
    );

    // ── 3. Build the pipeline ───────────────────────────────
    let pipeline = Arc::new(QuotePipeline::from_config(&config).context("Failed to wire pipeline")?);

    // ── 4. Shutdown plumbing ────────────────────────────────
    let cancel = CancellationToken::new();
    let (health_tx, health_rx) = watch::channel(true);

    // ── 5. Spawn health/metrics server ──────────────────────
    let health_handle = if config.metrics.enabled {
        let metrics = pipeline.metrics();
        let bind = config.metrics.bind_address.clone();
        Some(tokio::spawn(serve_health(metrics, bind, health_rx)))
    } else {
        None
    };

    // ── 6. Subscribe a demo chart series ────────────────────
    let chart = match config.watchlist.first() {
        Some(item) => Some(pipeline.subscribe(&item.symbol, item.class).await),
        None => {
            warn!("Empty watchlist — no chart series subscribed");
            None
        }
    };

    // ── 7. Spawn the shared watch-list polling loop ─────────
    let table_cancel = cancel.clone();
    let table_pipeline = Arc::clone(&pipeline);
    let watchlist = config.watchlist.clone();
    let chart_handle = chart.clone();
    let table_handle = tokio::spawn(async move {
        run_table_loop(table_pipeline, watchlist, chart_handle, table_cancel).await;
    });

    info!("All tasks spawned — pipeline is running");

    // ── 8. Wait for SIGINT ──────────────────────────────────
    signal::ctrl_c().await.context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    // 1. Mark health as unhealthy (readiness probe → 503)
    let _ = health_tx.send(false);

    // 2. Cancel the polling loop and every series task
    cancel.cancel();
    if let Some(handle) = &chart {
        pipeline.unsubscribe(handle).await;
    }
    pipeline.shutdown().await;

    // 3. Wait for the table loop to finish (up to 10s)
    let _ = tokio::time::timeout(std::time::Duration::from_secs(10), table_handle).await;

    // 4. Stop health server
    if let Some(handle) = health_handle {
        handle.abort();
    }

    info!(
        fetched = pipeline.stats().ok(),
        absent = pipeline.stats().absent(),
        "Shutdown complete"
    );
    Ok(())
}

/// Shared list-view refresh loop.
///
/// Every cycle: take the gate's minimum interval across the watch-list,
/// fetch all instruments whose market is currently open (crypto always
/// is), and log the refreshed table. Closed instruments keep their stale
/// last-known values — they are not polled.
async fn run_table_loop(
    pipeline: Arc<QuotePipeline>,
    watchlist: Vec<Instrument>,
    chart: Option<usecases::SeriesHandle>,
    cancel: CancellationToken,
) {
    if watchlist.is_empty() {
        cancel.cancelled().await;
        return;
    }

    loop {
        let interval = pipeline.effective_interval(&watchlist);
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }

        let active: Vec<Instrument> = watchlist
            .iter()
            .filter(|item| {
                item.class.is_always_open()
                    || pipeline.is_market_open(item.class, &item.symbol).is_open
            })
            .cloned()
            .collect();

        if active.is_empty() {
            info!(
                watchlist = watchlist.len(),
                "All traditional markets closed — skipping refresh"
            );
            continue;
        }

        let quotes = pipeline.fetch_batch(&active).await;
        for item in &active {
            match quotes.get(&item.symbol) {
                Some(q) => info!(
                    symbol = %item.symbol,
                    price = q.price,
                    change_pct = q.change_percent,
                    volume = q.volume,
                    "quote"
                ),
                None => info!(symbol = %item.symbol, "quote unavailable — keeping last value"),
            }
        }

        if let Some(handle) = &chart {
            if let Some(snap) = pipeline.snapshot(handle).await {
                info!(
                    symbol = %snap.symbol,
                    points = snap.points.len(),
                    current = snap.current_price,
                    window_change_pct = snap.change_percent,
                    "chart series"
                );
            }
        }
    }

    info!("Table loop stopped");
}

/// Serve health and metrics endpoints.
///
/// - `/live`    — Liveness probe: 200 if process is running
/// - `/ready`   — Readiness probe: 503 during graceful shutdown
/// - `/metrics` — Prometheus text exposition
async fn serve_health(
    metrics: Arc<MetricsRegistry>,
    bind_address: String,
    health_rx: watch::Receiver<bool>,
) -> Result<()> {
    use axum::{Router, extract::State, http::StatusCode, routing::get};

    let app = Router::new()
        .route("/live", get(|| async { StatusCode::OK }))
        .route(
            "/ready",
            get(move |State(rx): State<watch::Receiver<bool>>| async move {
                if *rx.borrow() {
                    StatusCode::OK
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                }
            }),
        )
        .with_state(health_rx)
        .merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    info!(%bind_address, "Health server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

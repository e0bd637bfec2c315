//! Series Registry - Subscription Lifecycle Management
//!
//! Owns every live chart series: subscribing spawns a dedicated updater
//! task with its own cancellation token, unsubscribing cancels the token
//! and aborts the task so any in-flight request is abandoned. Series for
//! other subscribers are unaffected — there is no shared mutable state
//! between unrelated subscriptions, and two subscriptions to the same
//! symbol run independent walks by design.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::adapters::MetricsRegistry;
use crate::domain::{Instrument, InstrumentClass, PriceSeries, SeriesSnapshot};
use crate::ports::QuoteSource;

use super::batch::BatchFetcher;
use super::session::TradingSessionGate;
use super::updater::{SeriesUpdater, UpdaterSettings};

/// Opaque handle identifying one live series subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesHandle {
    id: Uuid,
    /// Canonical symbol the subscription tracks.
    pub symbol: String,
    /// Instrument class of the tracked symbol.
    pub class: InstrumentClass,
}

struct SeriesEntry {
    series: Arc<RwLock<PriceSeries>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Registry of live series, one updater task per subscription.
pub struct SeriesRegistry<S: QuoteSource> {
    fetcher: Arc<BatchFetcher<S>>,
    gate: Arc<TradingSessionGate>,
    settings: UpdaterSettings,
    metrics: Option<Arc<MetricsRegistry>>,
    entries: RwLock<HashMap<Uuid, SeriesEntry>>,
}

impl<S: QuoteSource> SeriesRegistry<S> {
    /// Create a registry over the shared orchestrator and gate.
    pub fn new(
        fetcher: Arc<BatchFetcher<S>>,
        gate: Arc<TradingSessionGate>,
        settings: UpdaterSettings,
    ) -> Self {
        Self {
            fetcher,
            gate,
            settings,
            metrics: None,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Attach a Prometheus registry for series gauges and tick counters.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Subscribe a chart to a symbol, spawning its polling loop.
    pub async fn subscribe(&self, symbol: &str, class: InstrumentClass) -> SeriesHandle {
        let instrument = Instrument::new(symbol, class);
        let series = Arc::new(RwLock::new(PriceSeries::new(
            symbol,
            class,
            self.settings.capacity,
        )));

        let mut updater = SeriesUpdater::new(
            instrument,
            Arc::clone(&series),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.gate),
            &self.settings,
        );
        if let Some(metrics) = &self.metrics {
            updater = updater.with_metrics(Arc::clone(metrics));
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(updater.run(cancel.clone()));

        let handle = SeriesHandle {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            class,
        };
        let entry = SeriesEntry { series, cancel, task };

        let mut entries = self.entries.write().await;
        entries.insert(handle.id, entry);
        if let Some(metrics) = &self.metrics {
            metrics.active_series.set(entries.len() as i64);
        }
        info!(symbol, %class, subscriptions = entries.len(), "series subscribed");
        handle
    }

    /// Tear down a subscription: cancel its loop and abandon any
    /// in-flight request. Unknown handles are a no-op.
    pub async fn unsubscribe(&self, handle: &SeriesHandle) {
        let removed = {
            let mut entries = self.entries.write().await;
            let removed = entries.remove(&handle.id);
            if let Some(metrics) = &self.metrics {
                metrics.active_series.set(entries.len() as i64);
            }
            removed
        };

        if let Some(entry) = removed {
            entry.cancel.cancel();
            entry.task.abort();
            debug!(symbol = %handle.symbol, "series unsubscribed");
        }
    }

    /// Current ordered point buffer plus derived price/change fields.
    ///
    /// `None` for unknown (already unsubscribed) handles.
    pub async fn snapshot(&self, handle: &SeriesHandle) -> Option<SeriesSnapshot> {
        let entries = self.entries.read().await;
        let entry = entries.get(&handle.id)?;
        let series = entry.series.read().await;
        Some(series.snapshot())
    }

    /// Number of live subscriptions.
    pub async fn subscription_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Cancel every subscription. Used for deterministic shutdown.
    pub async fn shutdown(&self) {
        let mut entries = self.entries.write().await;
        for (_, entry) in entries.drain() {
            entry.cancel.cancel();
            entry.task.abort();
        }
        if let Some(metrics) = &self.metrics {
            metrics.active_series.set(0);
        }
        info!("all series subscriptions stopped");
    }
}

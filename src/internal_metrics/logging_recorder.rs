//! A metrics recorder that periodically logs all captured metrics.

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use metrics_util::registry::{AtomicStorage, Registry};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A metrics recorder that periodically logs all captured metrics through `tracing`.
pub struct LoggingRecorder {
    registry: Arc<Registry<Key, AtomicStorage>>,
}

impl LoggingRecorder {
    /// Creates a new `LoggingRecorder` and starts a background task to log metrics.
    ///
    /// Counters whose name starts with `agg.` are reset after each report.
    pub fn new(
        report_interval: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let registry = Arc::new(Registry::new(AtomicStorage));
        let recorder = Self {
            registry: registry.clone(),
        };

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(report_interval);
            // The first tick completes immediately; skip the empty report.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => report(&registry, report_interval),
                    _ = shutdown_rx.changed() => {
                        report(&registry, report_interval);
                        tracing::info!("Metrics logging task received shutdown signal.");
                        break;
                    }
                }
            }
        });

        (recorder, handle)
    }
}

fn report(registry: &Registry<Key, AtomicStorage>, interval: Duration) {
    tracing::debug!("--- Metrics Snapshot ---");

    for (key, counter) in registry.get_counter_handles() {
        let value = counter.load(Ordering::Relaxed);
        if key.name().starts_with("agg.") {
            if value > 0 {
                let message = match key.name() {
                    "agg.snapshots_logged" => {
                        format!("Logged {} snapshots in the last {}s", value, interval.as_secs())
                    }
                    "agg.emails_queued" => {
                        format!("Queued {} emails in the last {}s", value, interval.as_secs())
                    }
                    _ => format!("[Agg. Counter] {}: {}", key, value),
                };
                tracing::debug!("{}", message);
                counter.store(0, Ordering::Relaxed);
            }
        } else {
            tracing::info!("[Counter] {}: {}", key, value);
        }
    }

    for (key, gauge) in registry.get_gauge_handles() {
        let value = f64::from_bits(gauge.load(Ordering::Relaxed));
        tracing::info!("[Gauge] {}: {:.1}", key, value);
    }
}

impl Recorder for LoggingRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        self.registry.get_or_create_counter(key, |c| c.clone()).into()
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        self.registry.get_or_create_gauge(key, |g| g.clone()).into()
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        self.registry.get_or_create_histogram(key, |h| h.clone()).into()
    }
}

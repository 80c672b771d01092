//! Run metrics and structured logging.
//!
//! Counters are atomic so statistics collectors can read them through a
//! shared reference while the update loop owns the population.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Metrics collector for one population.
pub struct Metrics {
    update_count: AtomicU64,
    organism_count: AtomicU64,
    slices: AtomicU64,
    pub counters: Mutex<HashMap<String, AtomicU64>>,
    start_time: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("update_count", &self.update_count())
            .field("organism_count", &self.organism_count())
            .finish()
    }
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            update_count: AtomicU64::new(0),
            organism_count: AtomicU64::new(0),
            slices: AtomicU64::new(0),
            counters: Mutex::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Records a completed update.
    pub fn record_update(&self, duration: Duration, organisms: usize, slices: u64, resources: f64) {
        self.update_count.fetch_add(1, Ordering::Relaxed);
        self.organism_count.store(organisms as u64, Ordering::Relaxed);
        self.slices.fetch_add(slices, Ordering::Relaxed);

        let update = self.update_count.load(Ordering::Relaxed);
        if update % 1000 == 0 {
            tracing::info!(
                update = update,
                organisms = organisms,
                slices = slices,
                resources = resources,
                duration_ms = duration.as_millis() as u64,
                "Simulation update"
            );
        }
    }

    pub fn increment_counter(&self, name: &str) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    #[must_use]
    pub fn update_count(&self) -> u64 {
        self.update_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn organism_count(&self) -> u64 {
        self.organism_count.load(Ordering::Relaxed)
    }

    /// Total execution slices granted since creation.
    #[must_use]
    pub fn slices(&self) -> u64 {
        self.slices.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn log_event(&self, event_type: &str, details: &str) {
        tracing::info!(event_type = event_type, details = details, "Simulation event");
    }
}

/// Initialize tracing subscriber for logging.
pub fn init_logging() {
    init_logging_with_level(tracing::Level::INFO);
}

pub fn init_logging_with_level(level: tracing::Level) {
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(level)
            .finish(),
    )
    .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.update_count(), 0);
        assert_eq!(metrics.slices(), 0);
    }

    #[test]
    fn test_record_update() {
        let metrics = Metrics::new();
        metrics.record_update(Duration::from_millis(3), 42, 900, 10.0);
        assert_eq!(metrics.update_count(), 1);
        assert_eq!(metrics.organism_count(), 42);
        assert_eq!(metrics.slices(), 900);
    }

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.increment_counter("births");
        metrics.increment_counter("births");
        assert_eq!(metrics.counter("births"), 2);
        assert_eq!(metrics.counter("deaths"), 0);
    }
}

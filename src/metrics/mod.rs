use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Inbound message outcomes and processing latency
// - Retry attempts and exhausted retry budgets (store + pipeline)
// - Cache hits, misses, evictions and size
//
// One instance is created in main and handed to every component; the HTTP
// layer exposes the registry on /metrics.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Ingestion Metrics
    pub orders_ingested: IntCounterVec,
    pub ingest_duration: Histogram,

    // Retry Metrics
    pub retry_attempts_total: IntCounterVec,
    pub retry_exhausted_total: IntCounterVec,

    // Cache Metrics
    pub cache_lookups: IntCounterVec,
    pub cache_evictions: IntCounter,
    pub cache_entries: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_ingested = IntCounterVec::new(
            Opts::new("orders_ingested_total", "Inbound order messages by terminal outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(orders_ingested.clone()))?;

        let ingest_duration = Histogram::with_opts(
            HistogramOpts::new("ingest_duration_seconds", "Time from receipt to terminal outcome")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        )?;
        registry.register(Box::new(ingest_duration.clone()))?;

        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Retried attempts (excluding the first)"),
            &["operation"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let retry_exhausted_total = IntCounterVec::new(
            Opts::new("retry_exhausted_total", "Operations that used up their retry budget"),
            &["operation"],
        )?;
        registry.register(Box::new(retry_exhausted_total.clone()))?;

        let cache_lookups = IntCounterVec::new(
            Opts::new("cache_lookups_total", "Read path cache lookups"),
            &["result"],
        )?;
        registry.register(Box::new(cache_lookups.clone()))?;

        let cache_evictions = IntCounter::new("cache_evictions_total", "Entries evicted from the cache")?;
        registry.register(Box::new(cache_evictions.clone()))?;

        let cache_entries = IntGauge::new("cache_entries", "Entries currently cached")?;
        registry.register(Box::new(cache_entries.clone()))?;

        Ok(Self {
            registry,
            orders_ingested,
            ingest_duration,
            retry_attempts_total,
            retry_exhausted_total,
            cache_lookups,
            cache_evictions,
            cache_entries,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_ingest(&self, outcome: &str, duration_secs: f64) {
        self.orders_ingested.with_label_values(&[outcome]).inc();
        self.ingest_duration.observe(duration_secs);
    }

    pub fn record_retry_attempt(&self, operation: &str) {
        self.retry_attempts_total.with_label_values(&[operation]).inc();
    }

    pub fn record_retry_exhausted(&self, operation: &str) {
        self.retry_exhausted_total.with_label_values(&[operation]).inc();
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups.with_label_values(&[result]).inc();
    }

    /// Records a cache write: the resulting size and whether it evicted.
    pub fn record_cache_write(&self, entries: usize, evicted: bool) {
        if evicted {
            self.cache_evictions.inc();
        }
        self.cache_entries.set(entries as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_value(metrics: &Metrics, name: &str) -> Vec<f64> {
        metrics
            .registry()
            .gather()
            .iter()
            .find(|m| m.name() == name)
            .map(|m| m.metric.iter().map(|s| s.counter.value.unwrap_or(0.0)).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_ingest("stored", 0.01);
        metrics.record_cache_lookup(true);
        assert!(metrics.registry().gather().len() >= 3);
    }

    #[test]
    fn test_record_ingest_by_outcome() {
        let metrics = Metrics::new().unwrap();
        metrics.record_ingest("stored", 0.05);
        metrics.record_ingest("stored", 0.02);
        metrics.record_ingest("duplicate", 0.01);

        let mut values = counter_value(&metrics, "orders_ingested_total");
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_record_retry() {
        let metrics = Metrics::new().unwrap();
        metrics.record_retry_attempt("save");
        metrics.record_retry_attempt("save");
        metrics.record_retry_exhausted("save");

        assert_eq!(counter_value(&metrics, "retry_attempts_total"), vec![2.0]);
        assert_eq!(counter_value(&metrics, "retry_exhausted_total"), vec![1.0]);
    }

    #[test]
    fn test_cache_write_tracks_size_and_evictions() {
        let metrics = Metrics::new().unwrap();
        metrics.record_cache_write(1, false);
        metrics.record_cache_write(1, true);

        assert_eq!(metrics.cache_evictions.get(), 1);
        assert_eq!(metrics.cache_entries.get(), 1);
    }
}

//! Metrics & Latency Aggregator (component C). The in-process counters
//! §4.C names and the Prometheus text export of §11 are updated from the
//! same call sites — grounded on the teacher's `DnsMetrics`, trimmed down
//! to what this forwarder's pipeline actually reports, with the global
//! counters the control plane reads kept as plain atomics rather than
//! prometheus types so `GetMetrics()` never has to scrape its own
//! exporter to answer a typed query.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use prometheus::{CounterVec, Encoder, HistogramVec, IntCounter, Opts, Registry, TextEncoder};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyAggregate {
    pub count: u64,
    pub sum_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for LatencyAggregate {
    fn default() -> Self {
        Self {
            count: 0,
            sum_ms: 0.0,
            min_ms: f64::INFINITY,
            max_ms: 0.0,
            last_updated: None,
        }
    }
}

impl LatencyAggregate {
    fn record(&mut self, latency_ms: f64) {
        self.count += 1;
        self.sum_ms += latency_ms;
        self.min_ms = self.min_ms.min(latency_ms);
        self.max_ms = self.max_ms.max(latency_ms);
        self.last_updated = Some(Utc::now());
    }

    pub fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_ms / self.count as f64
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub total_queries: u64,
    pub domestic_queries: u64,
    pub intl_queries: u64,
    pub ads_queries: u64,
    pub cache_queries: u64,
    pub global_latency: LatencyAggregate,
    pub per_route_latency: HashMap<String, LatencyAggregate>,
}

pub struct Metrics {
    total_queries: AtomicU64,
    domestic_queries: AtomicU64,
    intl_queries: AtomicU64,
    ads_queries: AtomicU64,
    cache_queries: AtomicU64,
    per_route_latency: DashMap<String, Mutex<LatencyAggregate>>,

    registry: Registry,
    prom_queries_total: CounterVec,
    prom_query_duration: HistogramVec,
    prom_cache_hits: IntCounter,
    prom_cache_misses: IntCounter,
    prom_cache_evictions: IntCounter,
    prom_subscription_success: IntCounter,
    prom_subscription_failure: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let prom_queries_total = CounterVec::new(
            Opts::new("dns_forwarder_queries_total", "Queries processed by route"),
            &["route"],
        )?;
        let prom_query_duration = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "dns_forwarder_query_duration_ms",
                "Per-query latency in milliseconds by route",
            ),
            &["route"],
        )?;
        let prom_cache_hits =
            IntCounter::new("dns_forwarder_cache_hits_total", "Cache hits")?;
        let prom_cache_misses =
            IntCounter::new("dns_forwarder_cache_misses_total", "Cache misses")?;
        let prom_cache_evictions =
            IntCounter::new("dns_forwarder_cache_evictions_total", "Cache evictions")?;
        let prom_subscription_success = IntCounter::new(
            "dns_forwarder_subscription_fetch_success_total",
            "Successful subscription fetches",
        )?;
        let prom_subscription_failure = IntCounter::new(
            "dns_forwarder_subscription_fetch_failure_total",
            "Failed subscription fetches",
        )?;

        registry.register(Box::new(prom_queries_total.clone()))?;
        registry.register(Box::new(prom_query_duration.clone()))?;
        registry.register(Box::new(prom_cache_hits.clone()))?;
        registry.register(Box::new(prom_cache_misses.clone()))?;
        registry.register(Box::new(prom_cache_evictions.clone()))?;
        registry.register(Box::new(prom_subscription_success.clone()))?;
        registry.register(Box::new(prom_subscription_failure.clone()))?;

        Ok(Self {
            total_queries: AtomicU64::new(0),
            domestic_queries: AtomicU64::new(0),
            intl_queries: AtomicU64::new(0),
            ads_queries: AtomicU64::new(0),
            cache_queries: AtomicU64::new(0),
            per_route_latency: DashMap::new(),
            registry,
            prom_queries_total,
            prom_query_duration,
            prom_cache_hits,
            prom_cache_misses,
            prom_cache_evictions,
            prom_subscription_success,
            prom_subscription_failure,
        })
    }

    /// Single update path for both the typed control-plane view and the
    /// Prometheus text export (§4.C, §11): never two sources of truth.
    pub fn record_query(&self, route: &str, latency_ms: f64) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
        match route {
            "china" => self.domestic_queries.fetch_add(1, Ordering::Relaxed),
            "intl" => self.intl_queries.fetch_add(1, Ordering::Relaxed),
            "adguard" => self.ads_queries.fetch_add(1, Ordering::Relaxed),
            "cache" => self.cache_queries.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };

        self.per_route_latency
            .entry(route.to_string())
            .or_insert_with(|| Mutex::new(LatencyAggregate::default()))
            .lock()
            .record(latency_ms);

        self.prom_queries_total.with_label_values(&[route]).inc();
        self.prom_query_duration
            .with_label_values(&[route])
            .observe(latency_ms);
    }

    pub fn record_cache_hit(&self) {
        self.prom_cache_hits.inc();
    }

    pub fn record_cache_miss(&self) {
        self.prom_cache_misses.inc();
    }

    pub fn record_cache_eviction(&self) {
        self.prom_cache_evictions.inc();
    }

    pub fn record_subscription_result(&self, success: bool) {
        if success {
            self.prom_subscription_success.inc();
        } else {
            self.prom_subscription_failure.inc();
        }
    }

    /// Clears every per-route latency aggregate; global counters are
    /// untouched (`ResetLatency()` in §4.C).
    pub fn reset_latency(&self) {
        self.per_route_latency.clear();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut global = LatencyAggregate::default();
        let mut per_route = HashMap::new();
        for entry in self.per_route_latency.iter() {
            let agg = *entry.value().lock();
            global.count += agg.count;
            global.sum_ms += agg.sum_ms;
            global.min_ms = global.min_ms.min(agg.min_ms);
            global.max_ms = global.max_ms.max(agg.max_ms);
            if agg.last_updated > global.last_updated {
                global.last_updated = agg.last_updated;
            }
            per_route.insert(entry.key().clone(), agg);
        }
        if global.count == 0 {
            global.min_ms = 0.0;
        }

        MetricsSnapshot {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            domestic_queries: self.domestic_queries.load(Ordering::Relaxed),
            intl_queries: self.intl_queries.load(Ordering::Relaxed),
            ads_queries: self.ads_queries.load(Ordering::Relaxed),
            cache_queries: self.cache_queries.load(Ordering::Relaxed),
            global_latency: global,
            per_route_latency: per_route,
        }
    }

    /// Prometheus exposition-format text for operator scraping (§11).
    pub fn export_text(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// JSON rendering of the typed snapshot, for the admin collaborator's
    /// control-plane `GetMetrics()` view.
    pub fn snapshot_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_query_updates_both_global_and_per_route_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.record_query("china", 12.5);
        metrics.record_query("china", 7.5);
        metrics.record_query("intl", 5.0);

        let snap = metrics.snapshot();
        assert_eq!(snap.total_queries, 3);
        assert_eq!(snap.domestic_queries, 2);
        assert_eq!(snap.intl_queries, 1);

        let china = snap.per_route_latency.get("china").unwrap();
        assert_eq!(china.count, 2);
        assert_eq!(china.min_ms, 7.5);
        assert_eq!(china.max_ms, 12.5);
    }

    #[test]
    fn reset_latency_clears_aggregates_not_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.record_query("china", 10.0);
        metrics.reset_latency();
        let snap = metrics.snapshot();
        assert_eq!(snap.total_queries, 1);
        assert!(snap.per_route_latency.is_empty());
    }

    #[test]
    fn export_text_contains_registered_metric_names() {
        let metrics = Metrics::new().unwrap();
        metrics.record_query("china", 1.0);
        let text = metrics.export_text().unwrap();
        assert!(text.contains("dns_forwarder_queries_total"));
    }

    #[test]
    fn snapshot_json_round_trips_through_serde() {
        let metrics = Metrics::new().unwrap();
        metrics.record_query("china", 3.0);
        let json = metrics.snapshot_json().unwrap();
        assert!(json.contains("\"total_queries\":1"));
    }
}

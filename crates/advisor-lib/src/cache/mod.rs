//! Cache-aside layer for upstream telemetry reads
//!
//! Only raw upstream results are cached, never computed recommendations.
//! The cache is an optimization: every failure inside it (backend errors,
//! undecodable entries, failed writes) is logged, counted and treated as a
//! miss, so analysis proceeds against upstream.

mod memory;

pub use memory::{MemoryCacheStore, DEFAULT_MAX_ENTRIES};

use async_trait::async_trait;
use crate::error::{CacheError, UpstreamError};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::telemetry::{DataClass, MetricQuery, WorkloadScope};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Version tag embedded in every key; bump when the encoded layout changes
pub const KEY_VERSION: &str = "v1";

/// Fresh-for duration of usage series
pub const USAGE_METRICS_TTL: Duration = Duration::from_secs(300);

/// Fresh-for duration of autoscaler recommendations
pub const AUTOSCALER_TTL: Duration = Duration::from_secs(1800);

/// Fresh-for duration of requests, pod counts and listings
pub const TOPOLOGY_TTL: Duration = Duration::from_secs(3600);

/// Key-value store with per-entry expiry
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
}

/// TTL per data class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub usage_metrics: Duration,
    pub autoscaler_recommendations: Duration,
    pub topology: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            usage_metrics: USAGE_METRICS_TTL,
            autoscaler_recommendations: AUTOSCALER_TTL,
            topology: TOPOLOGY_TTL,
        }
    }
}

impl CacheTtls {
    pub fn ttl_for(&self, class: DataClass) -> Duration {
        match class {
            DataClass::UsageMetrics => self.usage_metrics,
            DataClass::AutoscalerRecommendations => self.autoscaler_recommendations,
            DataClass::Topology => self.topology,
        }
    }
}

/// Key of a metric query: every component of its identity, window included
pub fn cache_key(query: &MetricQuery) -> String {
    format!(
        "wra:{}:{}:{}:{}:{}:{}:{}h",
        KEY_VERSION,
        query.project,
        query.cluster,
        query.namespace,
        query.workload,
        query.kind.as_str(),
        query.window.hours
    )
}

/// Key of a workload listing; `*` stands for an absent filter
pub fn listing_key(scope: &WorkloadScope) -> String {
    format!(
        "wra:{}:{}:{}:{}:{}:workloads",
        KEY_VERSION,
        scope.project,
        scope.cluster,
        scope.namespace.as_deref().unwrap_or("*"),
        scope.workload.as_deref().unwrap_or("*"),
    )
}

/// Cache-aside wrapper shared by all workload tasks
#[derive(Clone)]
pub struct CacheLayer {
    store: Option<Arc<dyn CacheStore>>,
    ttls: CacheTtls,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl CacheLayer {
    pub fn new(store: Arc<dyn CacheStore>, ttls: CacheTtls) -> Self {
        Self {
            store: Some(store),
            ttls,
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::new("cache"),
        }
    }

    /// A layer that never stores anything and always misses
    pub fn disabled() -> Self {
        Self {
            store: None,
            ttls: CacheTtls::default(),
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::new("cache"),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn ttls(&self) -> &CacheTtls {
        &self.ttls
    }

    /// Decoded entry for `key`, or `None` on miss or any cache failure
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let store = self.store.as_ref()?;

        let bytes = match store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                self.degraded("get", key, &e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                self.degraded("decode", key, &CacheError::from(e));
                None
            }
        }
    }

    /// Write `value` under `key`; failures are absorbed
    pub async fn store<T: Serialize>(&self, key: &str, value: &T, class: DataClass) {
        let Some(store) = self.store.as_ref() else {
            return;
        };

        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.degraded("encode", key, &CacheError::from(e));
                return;
            }
        };

        if let Err(e) = store.set(key, bytes, self.ttls.ttl_for(class)).await {
            self.degraded("set", key, &e);
        }
    }

    /// Serve `key` from cache, or run `fetch` and cache its successful result
    ///
    /// Upstream errors are returned as-is and never cached.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        key: &str,
        class: DataClass,
        fetch: F,
    ) -> Result<T, UpstreamError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        if let Some(hit) = self.lookup(key).await {
            debug!(key = %key, "cache hit");
            self.metrics.inc_cache_hits();
            return Ok(hit);
        }
        self.metrics.inc_cache_misses();

        let value = fetch().await?;
        self.store(key, &value, class).await;
        Ok(value)
    }

    fn degraded(&self, operation: &str, key: &str, error: &CacheError) {
        self.metrics.inc_cache_errors(operation);
        self.logger
            .log_cache_failure(operation, key, &error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabeledSeries, TimeSeriesPoint};
    use crate::telemetry::{MetricKind, TimeWindow};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingStore;

    #[async_trait]
    impl CacheStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }
    }

    fn query(kind: MetricKind, hours: u32) -> MetricQuery {
        MetricQuery {
            project: "acme".into(),
            cluster: "prod".into(),
            namespace: "shop".into(),
            workload: "web".into(),
            kind,
            window: TimeWindow::new(hours, Utc::now()),
        }
    }

    fn sample() -> Vec<LabeledSeries> {
        vec![LabeledSeries::for_container(
            "app",
            vec![TimeSeriesPoint::new(1, 0.25)],
        )]
    }

    #[test]
    fn test_cache_key_components() {
        assert_eq!(
            cache_key(&query(MetricKind::CpuUsage, 24)),
            "wra:v1:acme:prod:shop:web:cpu_usage:24h"
        );
        assert_ne!(
            cache_key(&query(MetricKind::CpuUsage, 24)),
            cache_key(&query(MetricKind::CpuUsage, 48))
        );
        assert_ne!(
            cache_key(&query(MetricKind::CpuUsage, 24)),
            cache_key(&query(MetricKind::MemoryUsage, 24))
        );
    }

    #[test]
    fn test_listing_key() {
        let scope = WorkloadScope {
            project: "acme".into(),
            cluster: "prod".into(),
            namespace: Some("shop".into()),
            workload: None,
        };
        assert_eq!(listing_key(&scope), "wra:v1:acme:prod:shop:*:workloads");
    }

    #[test]
    fn test_ttl_classes() {
        let ttls = CacheTtls::default();
        assert_eq!(ttls.ttl_for(DataClass::UsageMetrics), Duration::from_secs(300));
        assert_eq!(
            ttls.ttl_for(DataClass::AutoscalerRecommendations),
            Duration::from_secs(1800)
        );
        assert_eq!(ttls.ttl_for(DataClass::Topology), Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_second_read_served_from_cache() {
        let layer = CacheLayer::new(Arc::new(MemoryCacheStore::new()), CacheTtls::default());
        let calls = AtomicUsize::new(0);
        let key = cache_key(&query(MetricKind::CpuUsage, 24));

        for _ in 0..2 {
            let value: Vec<LabeledSeries> = layer
                .get_or_fetch(&key, DataClass::UsageMetrics, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(sample())
                })
                .await
                .unwrap();
            assert_eq!(value, sample());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upstream_error_not_cached() {
        let layer = CacheLayer::new(Arc::new(MemoryCacheStore::new()), CacheTtls::default());
        let key = "wra:v1:k";

        let first: Result<Vec<LabeledSeries>, _> = layer
            .get_or_fetch(key, DataClass::UsageMetrics, || async {
                Err(UpstreamError::Unavailable("503".into()))
            })
            .await;
        assert!(first.is_err());

        let second: Vec<LabeledSeries> = layer
            .get_or_fetch(key, DataClass::UsageMetrics, || async { Ok(sample()) })
            .await
            .unwrap();
        assert_eq!(second, sample());
    }

    #[tokio::test]
    async fn test_failing_store_falls_through() {
        let layer = CacheLayer::new(Arc::new(FailingStore), CacheTtls::default());
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value: Vec<LabeledSeries> = layer
                .get_or_fetch("k", DataClass::Topology, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(sample())
                })
                .await
                .unwrap();
            assert_eq!(value, sample());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let store = Arc::new(MemoryCacheStore::new());
        store
            .set("k", b"not json".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        let layer = CacheLayer::new(store, CacheTtls::default());

        assert!(layer.lookup::<Vec<LabeledSeries>>("k").await.is_none());
        let value: Vec<LabeledSeries> = layer
            .get_or_fetch("k", DataClass::Topology, || async { Ok(sample()) })
            .await
            .unwrap();
        assert_eq!(value, sample());
        // The fresh value replaced the corrupt one
        assert_eq!(layer.lookup::<Vec<LabeledSeries>>("k").await, Some(sample()));
    }

    #[tokio::test]
    async fn test_disabled_layer_always_fetches() {
        let layer = CacheLayer::disabled();
        assert!(!layer.is_enabled());
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let _: Vec<LabeledSeries> = layer
                .get_or_fetch("k", DataClass::UsageMetrics, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Vec::new())
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

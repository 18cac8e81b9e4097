//! Observability for the advisor engine
//!
//! Provides:
//! - Prometheus metrics (workload latency, upstream latency, cache effectiveness)
//! - Structured logging of domain events with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Histogram buckets for per-workload analysis (seconds)
const WORKLOAD_BUCKETS: &[f64] = &[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Histogram buckets for single upstream reads (seconds)
const UPSTREAM_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    workload_latency_seconds: Histogram,
    upstream_call_latency_seconds: Histogram,
    workloads_analyzed: IntCounter,
    workload_failures: IntCounterVec,
    upstream_timeouts: IntCounter,
    cache_hits: IntCounter,
    cache_misses: IntCounter,
    cache_errors: IntCounterVec,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            workload_latency_seconds: register_histogram!(
                "advisor_workload_latency_seconds",
                "Time spent analyzing a single workload",
                WORKLOAD_BUCKETS.to_vec()
            )
            .expect("Failed to register workload_latency_seconds"),

            upstream_call_latency_seconds: register_histogram!(
                "advisor_upstream_call_latency_seconds",
                "Latency of individual telemetry reads that reached upstream",
                UPSTREAM_BUCKETS.to_vec()
            )
            .expect("Failed to register upstream_call_latency_seconds"),

            workloads_analyzed: register_int_counter!(
                "advisor_workloads_analyzed_total",
                "Workloads for which a recommendation was produced"
            )
            .expect("Failed to register workloads_analyzed_total"),

            workload_failures: register_int_counter_vec!(
                "advisor_workload_failures_total",
                "Workloads that failed analysis, by error kind",
                &["kind"]
            )
            .expect("Failed to register workload_failures_total"),

            upstream_timeouts: register_int_counter!(
                "advisor_upstream_timeouts_total",
                "Telemetry reads abandoned after the call timeout"
            )
            .expect("Failed to register upstream_timeouts_total"),

            cache_hits: register_int_counter!(
                "advisor_cache_hits_total",
                "Telemetry reads served from cache"
            )
            .expect("Failed to register cache_hits_total"),

            cache_misses: register_int_counter!(
                "advisor_cache_misses_total",
                "Telemetry reads that went upstream"
            )
            .expect("Failed to register cache_misses_total"),

            cache_errors: register_int_counter_vec!(
                "advisor_cache_errors_total",
                "Cache failures absorbed as misses, by operation",
                &["operation"]
            )
            .expect("Failed to register cache_errors_total"),
        }
    }
}

/// Handle to the process-wide engine metrics
///
/// Clones share the same registered collectors.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EngineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EngineMetrics")
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn observe_workload_latency(&self, elapsed: Duration) {
        self.inner()
            .workload_latency_seconds
            .observe(elapsed.as_secs_f64());
    }

    pub fn observe_upstream_latency(&self, elapsed: Duration) {
        self.inner()
            .upstream_call_latency_seconds
            .observe(elapsed.as_secs_f64());
    }

    pub fn inc_workloads_analyzed(&self) {
        self.inner().workloads_analyzed.inc();
    }

    pub fn inc_workload_failures(&self, kind: &str) {
        self.inner()
            .workload_failures
            .with_label_values(&[kind])
            .inc();
    }

    pub fn inc_upstream_timeouts(&self) {
        self.inner().upstream_timeouts.inc();
    }

    pub fn inc_cache_hits(&self) {
        self.inner().cache_hits.inc();
    }

    pub fn inc_cache_misses(&self) {
        self.inner().cache_misses.inc();
    }

    /// `operation` is one of `get`, `set`, `decode`, `encode`
    pub fn inc_cache_errors(&self, operation: &str) {
        self.inner()
            .cache_errors
            .with_label_values(&[operation])
            .inc();
    }

    pub fn cache_hits(&self) -> u64 {
        self.inner().cache_hits.get()
    }

    pub fn cache_misses(&self) -> u64 {
        self.inner().cache_misses.get()
    }
}

/// Render the default registry in Prometheus text exposition format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Structured logger for engine events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a produced recommendation
    #[allow(clippy::too_many_arguments)]
    pub fn log_recommendation(
        &self,
        namespace: &str,
        workload: &str,
        source: &str,
        replicas: u32,
        cpu_millicores: u64,
        memory_bytes: u64,
        efficiency_score: u8,
        potential_monthly_savings: f64,
    ) {
        info!(
            event = "recommendation_generated",
            instance = %self.instance,
            namespace = %namespace,
            workload = %workload,
            source = %source,
            replicas = replicas,
            cpu_request_millicores = cpu_millicores,
            memory_request_bytes = memory_bytes,
            efficiency_score = efficiency_score,
            potential_monthly_savings = potential_monthly_savings,
            "Generated right-sizing recommendation"
        );
    }

    /// Log a workload that could not be analyzed
    pub fn log_workload_failure(&self, namespace: &str, workload: &str, kind: &str, error: &str) {
        warn!(
            event = "workload_failed",
            instance = %self.instance,
            namespace = %namespace,
            workload = %workload,
            kind = %kind,
            error = %error,
            "Workload analysis failed"
        );
    }

    /// Log a cache failure that was absorbed as a miss
    pub fn log_cache_failure(&self, operation: &str, key: &str, error: &str) {
        warn!(
            event = "cache_degraded",
            instance = %self.instance,
            operation = %operation,
            key = %key,
            error = %error,
            "Cache unavailable, falling through to upstream"
        );
    }

    /// Log the end of a batch
    pub fn log_batch_complete(&self, analyzed: usize, failed: usize, elapsed: Duration) {
        let elapsed_ms = elapsed.as_millis() as u64;
        if failed == 0 {
            info!(
                event = "batch_completed",
                instance = %self.instance,
                analyzed = analyzed,
                failed = failed,
                elapsed_ms = elapsed_ms,
                "Batch analysis completed"
            );
        } else {
            warn!(
                event = "batch_completed",
                instance = %self.instance,
                analyzed = analyzed,
                failed = failed,
                elapsed_ms = elapsed_ms,
                "Batch analysis completed with failures"
            );
        }
    }
}

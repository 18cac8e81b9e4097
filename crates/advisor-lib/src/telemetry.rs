//! Telemetry backend contract
//!
//! The engine does not execute metric queries itself. A `TelemetrySource`
//! returns already-evaluated labeled series for a query identity; results
//! may be empty, unlabeled, or out of order.

use crate::error::UpstreamError;
use crate::models::{LabeledSeries, WorkloadDescriptor};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

pub use async_trait::async_trait;

/// The metric a query asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// CPU usage in cores, per container
    CpuUsage,
    /// Memory working set in bytes, per container
    MemoryUsage,
    /// Declared CPU request in cores, per container
    CpuRequest,
    /// Declared memory request in bytes, per container
    MemoryRequest,
    /// Autoscaler CPU target in cores, per container
    AutoscalerCpu,
    /// Autoscaler memory target in bytes, per container
    AutoscalerMemory,
    /// Any per-pod series, used to count distinct pods
    PodCount,
    /// Replica count reported by the controller
    ReplicaCount,
}

impl MetricKind {
    pub const ALL: [MetricKind; 8] = [
        MetricKind::CpuUsage,
        MetricKind::MemoryUsage,
        MetricKind::CpuRequest,
        MetricKind::MemoryRequest,
        MetricKind::AutoscalerCpu,
        MetricKind::AutoscalerMemory,
        MetricKind::PodCount,
        MetricKind::ReplicaCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::CpuUsage => "cpu_usage",
            MetricKind::MemoryUsage => "memory_usage",
            MetricKind::CpuRequest => "cpu_request",
            MetricKind::MemoryRequest => "memory_request",
            MetricKind::AutoscalerCpu => "autoscaler_cpu",
            MetricKind::AutoscalerMemory => "autoscaler_memory",
            MetricKind::PodCount => "pod_count",
            MetricKind::ReplicaCount => "replica_count",
        }
    }

    /// Freshness class, used to pick a cache TTL
    pub fn data_class(&self) -> DataClass {
        match self {
            MetricKind::CpuUsage | MetricKind::MemoryUsage => DataClass::UsageMetrics,
            MetricKind::AutoscalerCpu | MetricKind::AutoscalerMemory => {
                DataClass::AutoscalerRecommendations
            }
            MetricKind::CpuRequest
            | MetricKind::MemoryRequest
            | MetricKind::PodCount
            | MetricKind::ReplicaCount => DataClass::Topology,
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How quickly a class of upstream data goes stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataClass {
    UsageMetrics,
    AutoscalerRecommendations,
    Topology,
}

/// Query time window, anchored at its end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub hours: u32,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(hours: u32, end: DateTime<Utc>) -> Self {
        Self { hours, end }
    }

    /// Window of `hours` ending now
    pub fn last_hours(hours: u32) -> Self {
        Self::new(hours, Utc::now())
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.end - ChronoDuration::hours(i64::from(self.hours))
    }
}

/// Full identity of an upstream metric query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricQuery {
    pub project: String,
    pub cluster: String,
    pub namespace: String,
    pub workload: String,
    pub kind: MetricKind,
    pub window: TimeWindow,
}

/// Scope for listing workloads in a cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadScope {
    pub project: String,
    pub cluster: String,
    pub namespace: Option<String>,
    pub workload: Option<String>,
}

impl WorkloadScope {
    /// Whether a workload falls inside this scope
    pub fn contains(&self, workload: &WorkloadDescriptor) -> bool {
        self.namespace
            .as_deref()
            .map_or(true, |ns| workload.namespace == ns)
            && self
                .workload
                .as_deref()
                .map_or(true, |name| workload.name == name)
    }
}

/// Source of evaluated metric series and workload listings
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Evaluate a metric query and return its labeled series
    async fn query(&self, query: &MetricQuery) -> Result<Vec<LabeledSeries>, UpstreamError>;

    /// List workloads in a cluster, optionally narrowed by namespace or name
    async fn list_workloads(
        &self,
        scope: &WorkloadScope,
    ) -> Result<Vec<WorkloadDescriptor>, UpstreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_classes() {
        assert_eq!(MetricKind::CpuUsage.data_class(), DataClass::UsageMetrics);
        assert_eq!(
            MetricKind::AutoscalerMemory.data_class(),
            DataClass::AutoscalerRecommendations
        );
        assert_eq!(MetricKind::PodCount.data_class(), DataClass::Topology);
    }

    #[test]
    fn test_metric_kind_names_unique() {
        let mut names: Vec<&str> = MetricKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), MetricKind::ALL.len());
    }

    #[test]
    fn test_window_start() {
        let end = DateTime::from_timestamp(10 * 3600, 0).unwrap();
        let window = TimeWindow::new(4, end);
        assert_eq!(window.start().timestamp(), 6 * 3600);
    }

    #[test]
    fn test_scope_contains() {
        let scope = WorkloadScope {
            project: "p".into(),
            cluster: "c".into(),
            namespace: Some("shop".into()),
            workload: None,
        };
        assert!(scope.contains(&WorkloadDescriptor::new("web", "shop")));
        assert!(!scope.contains(&WorkloadDescriptor::new("web", "billing")));
    }
}

//! Telemetry source backed by a JSON snapshot
//!
//! A snapshot lists workloads with already-evaluated series per metric kind:
//!
//! ```json
//! {
//!   "workloads": [{
//!     "name": "web", "namespace": "shop", "replicas": 2,
//!     "series": {
//!       "cpu_usage": [{"labels": {"container": "app", "pod": "web-1"},
//!                      "points": [{"timestamp": 1700000000, "value": 0.12}]}]
//!     },
//!     "fault": {"delay_ms": 50, "error": "unavailable", "metrics": ["memory_usage"]}
//!   }]
//! }
//! ```
//!
//! Faults simulate a slow or failing backend for selected metrics.

use advisor_lib::telemetry::async_trait;
use advisor_lib::{
    LabeledSeries, MetricKind, MetricQuery, TelemetrySource, UpstreamError, WorkloadDescriptor,
    WorkloadScope,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Error a fault injects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Unauthenticated,
    PermissionDenied,
    NotFound,
    Unavailable,
    Timeout,
    Malformed,
}

/// Simulated upstream misbehavior
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fault {
    /// Delay before answering
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub error: Option<FaultKind>,
    #[serde(default)]
    pub message: Option<String>,
    /// Metrics affected; empty means all of them
    #[serde(default)]
    pub metrics: Vec<MetricKind>,
}

impl Fault {
    fn applies_to(&self, kind: MetricKind) -> bool {
        self.metrics.is_empty() || self.metrics.contains(&kind)
    }

    async fn inject(&self) -> Result<(), UpstreamError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        let Some(kind) = self.error else {
            return Ok(());
        };
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| "simulated failure".to_string());
        Err(match kind {
            FaultKind::Unauthenticated => UpstreamError::Unauthenticated(message),
            FaultKind::PermissionDenied => UpstreamError::PermissionDenied(message),
            FaultKind::NotFound => UpstreamError::NotFound(message),
            FaultKind::Unavailable => UpstreamError::Unavailable(message),
            FaultKind::Timeout => UpstreamError::Timeout(Duration::from_millis(self.delay_ms)),
            FaultKind::Malformed => UpstreamError::Malformed(message),
        })
    }
}

/// One workload and its recorded series
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotWorkload {
    #[serde(flatten)]
    pub descriptor: WorkloadDescriptor,
    #[serde(default)]
    pub series: BTreeMap<MetricKind, Vec<LabeledSeries>>,
    #[serde(default)]
    pub fault: Option<Fault>,
}

/// Snapshot file contents
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub workloads: Vec<SnapshotWorkload>,
    /// Applied to workload listing
    #[serde(default)]
    pub listing_fault: Option<Fault>,
}

/// Serves queries from a `Snapshot`
pub struct SnapshotTelemetry {
    snapshot: Snapshot,
}

impl SnapshotTelemetry {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot =
            serde_json::from_str(json).context("Failed to parse telemetry snapshot")?;
        Ok(Self::new(snapshot))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn workload_count(&self) -> usize {
        self.snapshot.workloads.len()
    }

    fn find(&self, namespace: &str, name: &str) -> Option<&SnapshotWorkload> {
        self.snapshot
            .workloads
            .iter()
            .find(|w| w.descriptor.namespace == namespace && w.descriptor.name == name)
    }
}

#[async_trait]
impl TelemetrySource for SnapshotTelemetry {
    async fn query(&self, query: &MetricQuery) -> Result<Vec<LabeledSeries>, UpstreamError> {
        // Unknown workloads have no data, as with a real backend
        let Some(workload) = self.find(&query.namespace, &query.workload) else {
            debug!(
                namespace = %query.namespace,
                workload = %query.workload,
                "Workload not in snapshot"
            );
            return Ok(Vec::new());
        };

        if let Some(fault) = workload.fault.as_ref().filter(|f| f.applies_to(query.kind)) {
            fault.inject().await?;
        }

        Ok(workload.series.get(&query.kind).cloned().unwrap_or_default())
    }

    async fn list_workloads(
        &self,
        scope: &WorkloadScope,
    ) -> Result<Vec<WorkloadDescriptor>, UpstreamError> {
        if let Some(fault) = &self.snapshot.listing_fault {
            fault.inject().await?;
        }

        Ok(self
            .snapshot
            .workloads
            .iter()
            .map(|w| &w.descriptor)
            .filter(|d| scope.contains(d))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_lib::TimeWindow;

    const SNAPSHOT: &str = r#"{
        "workloads": [
            {
                "name": "web",
                "namespace": "shop",
                "replicas": 2,
                "series": {
                    "cpu_usage": [
                        {"labels": {"container": "app", "pod": "web-1"},
                         "points": [{"timestamp": 100, "value": 0.2}]}
                    ]
                }
            },
            {
                "name": "worker",
                "namespace": "jobs",
                "type": "StatefulSet",
                "fault": {"error": "permission_denied", "message": "no access", "metrics": ["memory_usage"]}
            }
        ]
    }"#;

    fn query(namespace: &str, workload: &str, kind: MetricKind) -> MetricQuery {
        MetricQuery {
            project: "p".into(),
            cluster: "c".into(),
            namespace: namespace.into(),
            workload: workload.into(),
            kind,
            window: TimeWindow::last_hours(24),
        }
    }

    fn scope(namespace: Option<&str>) -> WorkloadScope {
        WorkloadScope {
            project: "p".into(),
            cluster: "c".into(),
            namespace: namespace.map(String::from),
            workload: None,
        }
    }

    #[tokio::test]
    async fn test_query_returns_recorded_series() {
        let telemetry = SnapshotTelemetry::from_json(SNAPSHOT).unwrap();
        let series = telemetry
            .query(&query("shop", "web", MetricKind::CpuUsage))
            .await
            .unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].container(), Some("app"));

        let missing = telemetry
            .query(&query("shop", "web", MetricKind::MemoryUsage))
            .await
            .unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_workload_is_empty() {
        let telemetry = SnapshotTelemetry::from_json(SNAPSHOT).unwrap();
        let series = telemetry
            .query(&query("shop", "nope", MetricKind::CpuUsage))
            .await
            .unwrap();
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn test_fault_limited_to_listed_metrics() {
        let telemetry = SnapshotTelemetry::from_json(SNAPSHOT).unwrap();
        let err = telemetry
            .query(&query("jobs", "worker", MetricKind::MemoryUsage))
            .await
            .unwrap_err();
        assert_eq!(err, UpstreamError::PermissionDenied("no access".into()));

        assert!(telemetry
            .query(&query("jobs", "worker", MetricKind::CpuUsage))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_listing_honors_scope() {
        let telemetry = SnapshotTelemetry::from_json(SNAPSHOT).unwrap();
        assert_eq!(telemetry.list_workloads(&scope(None)).await.unwrap().len(), 2);

        let shop = telemetry.list_workloads(&scope(Some("shop"))).await.unwrap();
        assert_eq!(shop.len(), 1);
        assert_eq!(shop[0].name, "web");
        assert_eq!(shop[0].replicas, 2);

        let jobs = telemetry.list_workloads(&scope(Some("jobs"))).await.unwrap();
        assert_eq!(jobs[0].workload_type, "StatefulSet");
    }

    #[tokio::test]
    async fn test_listing_fault() {
        let mut snapshot: Snapshot = serde_json::from_str(SNAPSHOT).unwrap();
        snapshot.listing_fault = Some(Fault {
            error: Some(FaultKind::Unavailable),
            ..Fault::default()
        });
        let telemetry = SnapshotTelemetry::new(snapshot);
        let err = telemetry.list_workloads(&scope(None)).await.unwrap_err();
        assert_eq!(err.kind(), "unavailable");
    }

    #[test]
    fn test_rejects_malformed_snapshot() {
        assert!(SnapshotTelemetry::from_json("{\"workloads\": 3}").is_err());
        assert!(SnapshotTelemetry::from_json("{}").unwrap().workload_count() == 0);
    }

    #[test]
    fn test_delay_then_timeout() {
        let fault = Fault {
            delay_ms: 5,
            error: Some(FaultKind::Timeout),
            ..Fault::default()
        };
        let err = tokio_test::block_on(fault.inject()).unwrap_err();
        assert_eq!(err, UpstreamError::Timeout(Duration::from_millis(5)));
    }
}

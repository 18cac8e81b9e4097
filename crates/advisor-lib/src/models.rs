//! Core data models for the workload resource advisor

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bytes in one mebibyte
pub const MIB: u64 = 1024 * 1024;

/// Bytes in one gibibyte
pub const GIB: u64 = 1024 * MIB;

/// Millicores in one CPU core
pub const MILLICORES_PER_CORE: u64 = 1000;

/// Label carrying the container identifier on telemetry series
pub const CONTAINER_LABEL: &str = "container";

/// Label carrying the pod identifier on telemetry series
pub const POD_LABEL: &str = "pod";

/// A single sample of a time series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    /// Unix timestamp in seconds
    pub timestamp: i64,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A time series as returned by the telemetry backend, with its labels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabeledSeries {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub points: Vec<TimeSeriesPoint>,
}

impl LabeledSeries {
    pub fn new(points: Vec<TimeSeriesPoint>) -> Self {
        Self {
            labels: BTreeMap::new(),
            points,
        }
    }

    /// Series for a single container
    pub fn for_container(container: &str, points: Vec<TimeSeriesPoint>) -> Self {
        Self::new(points).with_label(CONTAINER_LABEL, container)
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn container(&self) -> Option<&str> {
        self.label(CONTAINER_LABEL)
    }
}

/// CPU and memory quantity used for all sizing computation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceAmount {
    pub cpu_millicores: u64,
    pub memory_bytes: u64,
}

impl ResourceAmount {
    pub const ZERO: ResourceAmount = ResourceAmount {
        cpu_millicores: 0,
        memory_bytes: 0,
    };

    pub fn new(cpu_millicores: u64, memory_bytes: u64) -> Self {
        Self {
            cpu_millicores,
            memory_bytes,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.cpu_millicores == 0 && self.memory_bytes == 0
    }

    pub fn cpu_cores(&self) -> f64 {
        self.cpu_millicores as f64 / MILLICORES_PER_CORE as f64
    }

    pub fn memory_gib(&self) -> f64 {
        self.memory_bytes as f64 / GIB as f64
    }

    pub fn memory_mib(&self) -> f64 {
        self.memory_bytes as f64 / MIB as f64
    }

    pub fn saturating_add(self, other: ResourceAmount) -> ResourceAmount {
        ResourceAmount {
            cpu_millicores: self.cpu_millicores.saturating_add(other.cpu_millicores),
            memory_bytes: self.memory_bytes.saturating_add(other.memory_bytes),
        }
    }
}

impl std::iter::Sum for ResourceAmount {
    fn sum<I: Iterator<Item = ResourceAmount>>(iter: I) -> Self {
        iter.fold(ResourceAmount::ZERO, ResourceAmount::saturating_add)
    }
}

/// Result of running the CPU:memory ratio check on a resource pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatioAdjustment {
    pub adjusted_amount: ResourceAmount,
    pub was_adjusted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RatioAdjustment {
    pub fn unchanged(amount: ResourceAmount) -> Self {
        Self {
            adjusted_amount: amount,
            was_adjusted: false,
            reason: None,
        }
    }
}

/// Per-container sizing signals from the vertical autoscaler
///
/// CPU and memory are tracked separately: either map may be populated
/// without the other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoscalerRecommendation {
    pub cpu_millicores: BTreeMap<String, u64>,
    pub memory_bytes: BTreeMap<String, u64>,
    pub available: bool,
}

impl AutoscalerRecommendation {
    pub fn new(cpu_millicores: BTreeMap<String, u64>, memory_bytes: BTreeMap<String, u64>) -> Self {
        let available = !cpu_millicores.is_empty() || !memory_bytes.is_empty();
        Self {
            cpu_millicores,
            memory_bytes,
            available,
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Union of containers that have at least one autoscaler signal
    pub fn containers(&self) -> impl Iterator<Item = &String> {
        let mut names: Vec<&String> = self
            .cpu_millicores
            .keys()
            .chain(self.memory_bytes.keys())
            .collect();
        names.sort();
        names.dedup();
        names.into_iter()
    }
}

/// A workload to analyze, as listed by the control plane or supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadDescriptor {
    pub name: String,
    pub namespace: String,
    #[serde(rename = "type", default = "default_workload_type")]
    pub workload_type: String,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<String>,
}

fn default_workload_type() -> String {
    "Deployment".to_string()
}

fn default_replicas() -> u32 {
    1
}

impl WorkloadDescriptor {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            workload_type: default_workload_type(),
            replicas: 1,
            cpu_limit: None,
            memory_limit: None,
        }
    }

    pub fn with_replicas(mut self, replicas: u32) -> Self {
        self.replicas = replicas;
        self
    }
}

/// Where a container's recommendation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    /// Both CPU and memory came from the autoscaler
    Autoscaler,
    /// Only one of CPU or memory came from the autoscaler
    PartialAutoscaler,
    /// Only workload-level usage data exists; no per-container sizing
    UsageFallback,
    /// Known from requests only, no autoscaler signal for this container
    RequestOnly,
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerStatus::Autoscaler => write!(f, "autoscaler"),
            ContainerStatus::PartialAutoscaler => write!(f, "partial_autoscaler"),
            ContainerStatus::UsageFallback => write!(f, "usage_fallback"),
            ContainerStatus::RequestOnly => write!(f, "request_only"),
        }
    }
}

/// Current and recommended sizing for one container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerDetail {
    pub current: Option<ResourceAmount>,
    pub recommended: Option<ResourceAmount>,
    pub status: ContainerStatus,
}

/// Which signal produced the workload-level recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    Autoscaler,
    UsageFallback,
    CurrentRequest,
    FloorDefault,
}

impl RecommendationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationSource::Autoscaler => "autoscaler",
            RecommendationSource::UsageFallback => "usage_fallback",
            RecommendationSource::CurrentRequest => "current_request",
            RecommendationSource::FloorDefault => "floor_default",
        }
    }
}

impl std::fmt::Display for RecommendationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Analysis result for a single workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadMetrics {
    pub name: String,
    pub namespace: String,
    #[serde(rename = "type")]
    pub workload_type: String,
    pub replica_count: u32,
    pub current_request: ResourceAmount,
    pub current_usage: ResourceAmount,
    pub recommended_request: ResourceAmount,
    pub efficiency_score: u8,
    pub monthly_cost: f64,
    pub recommended_monthly_cost: f64,
    pub potential_monthly_savings: f64,
    pub recommendation_text: Vec<String>,
    pub per_container_detail: BTreeMap<String, ContainerDetail>,
    pub ratio_adjustments: Vec<String>,
    pub source: RecommendationSource,
}

/// A workload whose pipeline failed; carries no numeric data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadFailure {
    pub name: String,
    pub namespace: String,
    pub error: String,
    pub kind: String,
}

/// Per-item result of a batch: either full metrics or an inline failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkloadOutcome {
    Analyzed(Box<WorkloadMetrics>),
    Failed(WorkloadFailure),
}

impl WorkloadOutcome {
    pub fn name(&self) -> &str {
        match self {
            WorkloadOutcome::Analyzed(m) => &m.name,
            WorkloadOutcome::Failed(f) => &f.name,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            WorkloadOutcome::Analyzed(m) => &m.namespace,
            WorkloadOutcome::Failed(f) => &f.namespace,
        }
    }

    pub fn metrics(&self) -> Option<&WorkloadMetrics> {
        match self {
            WorkloadOutcome::Analyzed(m) => Some(m.as_ref()),
            WorkloadOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&WorkloadFailure> {
        match self {
            WorkloadOutcome::Analyzed(_) => None,
            WorkloadOutcome::Failed(f) => Some(f),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, WorkloadOutcome::Failed(_))
    }
}

/// Response for a batch analysis request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub workloads: Vec<WorkloadOutcome>,
}

impl BatchResponse {
    pub fn failed_count(&self) -> usize {
        self.workloads.iter().filter(|w| w.is_failed()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_amount_sum() {
        let total: ResourceAmount = vec![
            ResourceAmount::new(80, 64 * MIB),
            ResourceAmount::new(320, 256 * MIB),
        ]
        .into_iter()
        .sum();
        assert_eq!(total, ResourceAmount::new(400, 320 * MIB));
    }

    #[test]
    fn test_autoscaler_availability() {
        assert!(!AutoscalerRecommendation::unavailable().available);

        let mut cpu = BTreeMap::new();
        cpu.insert("app".to_string(), 100);
        let rec = AutoscalerRecommendation::new(cpu, BTreeMap::new());
        assert!(rec.available);
    }

    #[test]
    fn test_autoscaler_containers_union() {
        let cpu = BTreeMap::from([("b".to_string(), 10), ("a".to_string(), 20)]);
        let mem = BTreeMap::from([("b".to_string(), MIB), ("c".to_string(), MIB)]);
        let rec = AutoscalerRecommendation::new(cpu, mem);
        let names: Vec<&String> = rec.containers().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_failed_outcome_serializes_without_numbers() {
        let outcome = WorkloadOutcome::Failed(WorkloadFailure {
            name: "api".to_string(),
            namespace: "default".to_string(),
            error: "upstream timed out".to_string(),
            kind: "timeout".to_string(),
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["name"], "api");
        assert_eq!(json["error"], "upstream timed out");
        assert!(json.get("efficiency_score").is_none());
        assert!(json.get("monthly_cost").is_none());
    }

    #[test]
    fn test_descriptor_defaults() {
        let d: WorkloadDescriptor =
            serde_json::from_str(r#"{"name": "web", "namespace": "shop"}"#).unwrap();
        assert_eq!(d.workload_type, "Deployment");
        assert_eq!(d.replicas, 1);
        assert!(d.cpu_limit.is_none());
    }
}

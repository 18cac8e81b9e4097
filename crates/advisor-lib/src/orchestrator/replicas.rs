//! Replica count heuristic
//!
//! Counting distinct pods that reported samples in a short recent window is
//! approximate: pods restarted inside the window are counted twice, and
//! pods that reported nothing are missed. Small counts are therefore cross
//! checked against the controller's replica metric.

use serde::{Deserialize, Serialize};

/// Below this many distinct pods the replica metric is consulted
pub const MIN_DISTINCT_PODS: usize = 3;

/// How a replica count was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaMethod {
    DistinctPods,
    ReplicaMetric,
    /// Fewer pods than the threshold and no usable replica metric
    SparsePods,
    /// Replica count from the workload descriptor
    Declared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaEstimate {
    pub count: u32,
    pub method: ReplicaMethod,
}

/// Pick a replica count from the available signals
///
/// `replica_metric` is the latest value of the controller's replica series,
/// `None` when it was not consulted or could not be read.
pub fn estimate(
    distinct_pods: usize,
    replica_metric: Option<f64>,
    declared: u32,
    min_distinct_pods: usize,
) -> ReplicaEstimate {
    let pods = u32::try_from(distinct_pods).unwrap_or(u32::MAX);

    if distinct_pods >= min_distinct_pods && distinct_pods > 0 {
        return ReplicaEstimate {
            count: pods,
            method: ReplicaMethod::DistinctPods,
        };
    }

    if let Some(value) = replica_metric.filter(|v| v.is_finite()) {
        let rounded = value.round();
        if rounded >= 1.0 {
            return ReplicaEstimate {
                count: rounded.min(f64::from(u32::MAX)) as u32,
                method: ReplicaMethod::ReplicaMetric,
            };
        }
    }

    if pods > 0 {
        ReplicaEstimate {
            count: pods,
            method: ReplicaMethod::SparsePods,
        }
    } else {
        ReplicaEstimate {
            count: declared,
            method: ReplicaMethod::Declared,
        }
    }
}

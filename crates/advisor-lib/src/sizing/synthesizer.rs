//! Merge autoscaler and usage signals into one sizing recommendation
//!
//! Each container with autoscaler data is sized from that data. Without any
//! autoscaler data the workload is sized from observed usage, then from its
//! current request, then from the floor. When the autoscaler reports only
//! one of CPU or memory, the other dimension goes through the same usage
//! chain and is split across containers by their requests. Every sized pair
//! is rounded and ratio-validated, and the summed total is validated once
//! more.

use super::ratio;
use super::rounding::{round_amount, round_cpu_millicores, round_memory_bytes, FLOOR};
use crate::extractor::{self, ResourceUnit, CPU_FALLBACK_PERCENTILE};
use crate::models::{
    AutoscalerRecommendation, ContainerDetail, ContainerStatus, LabeledSeries,
    RecommendationSource, ResourceAmount, CONTAINER_LABEL,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Headroom added on top of the CPU usage percentile
pub const CPU_USAGE_BUFFER: f64 = 1.15;

/// Headroom added on top of peak memory usage
pub const MEMORY_USAGE_BUFFER: f64 = 1.20;

/// Tunables for usage-based sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Percentile of CPU usage samples to size from (0.0 - 1.0)
    pub cpu_percentile: f64,
    /// Multiplier applied to the CPU percentile
    pub cpu_buffer: f64,
    /// Multiplier applied to peak memory usage
    pub memory_buffer: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            cpu_percentile: CPU_FALLBACK_PERCENTILE,
            cpu_buffer: CPU_USAGE_BUFFER,
            memory_buffer: MEMORY_USAGE_BUFFER,
        }
    }
}

/// Declared requests per container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerRequests {
    pub cpu_millicores: BTreeMap<String, u64>,
    pub memory_bytes: BTreeMap<String, u64>,
}

impl ContainerRequests {
    pub fn new(cpu_millicores: BTreeMap<String, u64>, memory_bytes: BTreeMap<String, u64>) -> Self {
        Self {
            cpu_millicores,
            memory_bytes,
        }
    }

    /// Current request of one container; a missing dimension reads as zero
    pub fn for_container(&self, name: &str) -> Option<ResourceAmount> {
        let cpu = self.cpu_millicores.get(name);
        let mem = self.memory_bytes.get(name);
        if cpu.is_none() && mem.is_none() {
            return None;
        }
        Some(ResourceAmount::new(
            cpu.copied().unwrap_or(0),
            mem.copied().unwrap_or(0),
        ))
    }

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

    /// Sum of all containers' requests, i.e. the per-pod request
    pub fn total(&self) -> ResourceAmount {
        ResourceAmount::new(
            saturating_sum(self.cpu_millicores.values()),
            saturating_sum(self.memory_bytes.values()),
        )
    }
}

/// Everything the synthesizer looks at for one workload
#[derive(Debug, Clone, Default)]
pub struct SizingInputs {
    pub requests: ContainerRequests,
    pub autoscaler: AutoscalerRecommendation,
    /// CPU usage series in cores
    pub cpu_usage: Vec<LabeledSeries>,
    /// Memory usage series in bytes
    pub memory_usage: Vec<LabeledSeries>,
}

/// Where in the pipeline a ratio adjustment happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "container")]
pub enum AdjustmentScope {
    CurrentRequest,
    Container(String),
    Aggregate,
}

/// A recorded ratio adjustment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentRecord {
    pub scope: AdjustmentScope,
    pub reason: String,
}

impl std::fmt::Display for AdjustmentRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.scope {
            AdjustmentScope::CurrentRequest => write!(f, "current request: {}", self.reason),
            AdjustmentScope::Container(name) => write!(f, "container {}: {}", name, self.reason),
            AdjustmentScope::Aggregate => write!(f, "total: {}", self.reason),
        }
    }
}

/// Sizing outcome for one workload
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    /// Final per-pod request after the aggregate ratio pass
    pub total: ResourceAmount,
    /// Recommended CPU per container (empty without per-container signals)
    pub container_cpu: BTreeMap<String, u64>,
    /// Recommended memory per container (empty without per-container signals)
    pub container_memory: BTreeMap<String, u64>,
    pub per_container: BTreeMap<String, ContainerDetail>,
    pub adjustments: Vec<AdjustmentRecord>,
    pub source: RecommendationSource,
    pub autoscaler_available: bool,
}

impl Recommendation {
    pub fn ratio_adjusted(&self) -> bool {
        !self.adjustments.is_empty()
    }

    /// True when sizing did not come from the autoscaler
    pub fn used_fallback(&self) -> bool {
        self.source != RecommendationSource::Autoscaler
    }
}

/// Produces recommendations from per-workload signals
#[derive(Debug, Clone, Default)]
pub struct RecommendationSynthesizer {
    config: SizingConfig,
}

impl RecommendationSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SizingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SizingConfig {
        &self.config
    }

    pub fn synthesize(&self, inputs: &SizingInputs) -> Recommendation {
        let mut adjustments = Vec::new();

        let current = ratio::validate(inputs.requests.total());
        if current.was_adjusted {
            if let Some(reason) = current.reason {
                adjustments.push(AdjustmentRecord {
                    scope: AdjustmentScope::CurrentRequest,
                    reason,
                });
            }
        }

        if inputs.autoscaler.available {
            self.from_autoscaler(inputs, adjustments)
        } else {
            self.from_usage(inputs, adjustments)
        }
    }

    fn from_autoscaler(
        &self,
        inputs: &SizingInputs,
        mut adjustments: Vec<AdjustmentRecord>,
    ) -> Recommendation {
        let autoscaler = &inputs.autoscaler;
        let mut per_container = BTreeMap::new();
        let mut container_cpu = BTreeMap::new();
        let mut container_memory = BTreeMap::new();

        // A signal map that is empty for every container is sized from usage
        let covered: BTreeSet<&String> = autoscaler.containers().collect();
        let missing_cpu = autoscaler.cpu_millicores.is_empty();
        let missing_memory = autoscaler.memory_bytes.is_empty();
        let fill = if missing_cpu || missing_memory {
            Some(self.covered_fallback(inputs, &covered))
        } else {
            None
        };
        let cpu_fill = fill.as_ref().filter(|_| missing_cpu).map(|(raw, weights)| {
            Apportion::new(raw.cpu_millicores, weights.cpu_millicores.clone())
        });
        let memory_fill = fill.as_ref().filter(|_| missing_memory).map(|(raw, weights)| {
            Apportion::new(raw.memory_bytes, weights.memory_bytes.clone())
        });

        for name in covered {
            let current = inputs.requests.for_container(name);
            let cpu_signal = autoscaler.cpu_millicores.get(name).copied();
            let mem_signal = autoscaler.memory_bytes.get(name).copied();

            let status = if cpu_signal.is_some() && mem_signal.is_some() {
                ContainerStatus::Autoscaler
            } else {
                ContainerStatus::PartialAutoscaler
            };

            let cpu = match (cpu_signal, &cpu_fill) {
                (Some(signal), _) => signal,
                (None, Some(fill)) => or_floor(Some(fill.share(name)), FLOOR.cpu_millicores),
                (None, None) => {
                    or_floor(current.map(|c| c.cpu_millicores), FLOOR.cpu_millicores)
                }
            };
            let memory = match (mem_signal, &memory_fill) {
                (Some(signal), _) => signal,
                (None, Some(fill)) => or_floor(Some(fill.share(name)), FLOOR.memory_bytes),
                (None, None) => or_floor(current.map(|c| c.memory_bytes), FLOOR.memory_bytes),
            };

            let (sized, reason) = size(ResourceAmount::new(cpu, memory));
            if let Some(reason) = reason {
                adjustments.push(AdjustmentRecord {
                    scope: AdjustmentScope::Container(name.clone()),
                    reason,
                });
            }

            container_cpu.insert(name.clone(), sized.cpu_millicores);
            container_memory.insert(name.clone(), sized.memory_bytes);
            per_container.insert(
                name.clone(),
                ContainerDetail {
                    current,
                    recommended: Some(sized),
                    status,
                },
            );
        }

        // Containers the autoscaler does not cover keep their current request
        for name in inputs.requests.containers() {
            if per_container.contains_key(name) {
                continue;
            }
            let current = inputs.requests.for_container(name);
            let raw = current.unwrap_or(FLOOR);
            let (sized, reason) = size(ResourceAmount::new(
                or_floor(Some(raw.cpu_millicores), FLOOR.cpu_millicores),
                or_floor(Some(raw.memory_bytes), FLOOR.memory_bytes),
            ));
            if let Some(reason) = reason {
                adjustments.push(AdjustmentRecord {
                    scope: AdjustmentScope::Container(name.clone()),
                    reason,
                });
            }
            container_cpu.insert(name.clone(), sized.cpu_millicores);
            container_memory.insert(name.clone(), sized.memory_bytes);
            per_container.insert(
                name.clone(),
                ContainerDetail {
                    current,
                    recommended: Some(sized),
                    status: ContainerStatus::RequestOnly,
                },
            );
        }

        let summed: ResourceAmount = per_container
            .values()
            .filter_map(|detail| detail.recommended)
            .sum();
        let (total, reason) = settle(summed);
        if let Some(reason) = reason {
            adjustments.push(AdjustmentRecord {
                scope: AdjustmentScope::Aggregate,
                reason,
            });
        }

        Recommendation {
            total,
            container_cpu,
            container_memory,
            per_container,
            adjustments,
            source: RecommendationSource::Autoscaler,
            autoscaler_available: true,
        }
    }

    /// Usage-derived pair for the covered containers, with their requests as weights
    ///
    /// Usage series labeled with an uncovered container are left out; unlabeled
    /// series count towards the covered ones.
    fn covered_fallback(
        &self,
        inputs: &SizingInputs,
        covered: &BTreeSet<&String>,
    ) -> (ResourceAmount, ContainerRequests) {
        let keep = |series: &&LabeledSeries| {
            series
                .label(CONTAINER_LABEL)
                .map_or(true, |c| covered.iter().any(|name| name.as_str() == c))
        };
        let cpu_usage: Vec<LabeledSeries> =
            inputs.cpu_usage.iter().filter(keep).cloned().collect();
        let memory_usage: Vec<LabeledSeries> =
            inputs.memory_usage.iter().filter(keep).cloned().collect();

        let weights = ContainerRequests::new(
            pick(&inputs.requests.cpu_millicores, covered),
            pick(&inputs.requests.memory_bytes, covered),
        );
        let demand = self.usage_demand(&cpu_usage, &memory_usage);
        (fallback_raw(demand, weights.total()), weights)
    }

    /// Buffered usage: CPU percentile and memory peak, zero where nothing was observed
    fn usage_demand(
        &self,
        cpu_usage: &[LabeledSeries],
        memory_usage: &[LabeledSeries],
    ) -> ResourceAmount {
        let cpu_cores = extractor::percentile(cpu_usage, self.config.cpu_percentile);
        let memory_peak = extractor::max_value(memory_usage);
        ResourceAmount::new(
            ResourceUnit::Cpu.convert(cpu_cores * self.config.cpu_buffer),
            ResourceUnit::Memory.convert(memory_peak * self.config.memory_buffer),
        )
    }

    fn from_usage(
        &self,
        inputs: &SizingInputs,
        mut adjustments: Vec<AdjustmentRecord>,
    ) -> Recommendation {
        let current = inputs.requests.total();
        let demand = self.usage_demand(&inputs.cpu_usage, &inputs.memory_usage);

        let source = if !demand.is_zero() {
            RecommendationSource::UsageFallback
        } else if !current.is_zero() {
            RecommendationSource::CurrentRequest
        } else {
            RecommendationSource::FloorDefault
        };

        let raw = fallback_raw(demand, current);
        let (total, reason) = size(raw);
        if let Some(reason) = reason {
            adjustments.push(AdjustmentRecord {
                scope: AdjustmentScope::Aggregate,
                reason,
            });
        }

        let per_container = inputs
            .requests
            .containers()
            .map(|name| {
                (
                    name.clone(),
                    ContainerDetail {
                        current: inputs.requests.for_container(name),
                        recommended: None,
                        status: ContainerStatus::UsageFallback,
                    },
                )
            })
            .collect();

        Recommendation {
            total,
            container_cpu: BTreeMap::new(),
            container_memory: BTreeMap::new(),
            per_container,
            adjustments,
            source,
            autoscaler_available: false,
        }
    }
}

fn or_floor(value: Option<u64>, floor: u64) -> u64 {
    value.filter(|v| *v > 0).unwrap_or(floor)
}

fn first_nonzero(candidates: &[u64], floor: u64) -> u64 {
    candidates.iter().copied().find(|v| *v > 0).unwrap_or(floor)
}

/// Usage demand per dimension, else the current request, else the floor
fn fallback_raw(demand: ResourceAmount, current: ResourceAmount) -> ResourceAmount {
    ResourceAmount::new(
        first_nonzero(&[demand.cpu_millicores, current.cpu_millicores], FLOOR.cpu_millicores),
        first_nonzero(&[demand.memory_bytes, current.memory_bytes], FLOOR.memory_bytes),
    )
}

fn pick(values: &BTreeMap<String, u64>, names: &BTreeSet<&String>) -> BTreeMap<String, u64> {
    values
        .iter()
        .filter(|(name, _)| names.contains(name))
        .map(|(name, v)| (name.clone(), *v))
        .collect()
}

fn saturating_sum<'a>(values: impl Iterator<Item = &'a u64>) -> u64 {
    values.fold(0u64, |acc, v| acc.saturating_add(*v))
}

/// Splits a workload-wide value across containers by weight, evenly when
/// every weight is zero; shares round up
struct Apportion {
    total: u64,
    weights: BTreeMap<String, u64>,
    weight_sum: u64,
}

impl Apportion {
    fn new(total: u64, weights: BTreeMap<String, u64>) -> Self {
        let weight_sum = saturating_sum(weights.values());
        Self {
            total,
            weights,
            weight_sum,
        }
    }

    fn share(&self, name: &str) -> u64 {
        if self.weight_sum == 0 {
            let count = self.weights.len().max(1) as u64;
            return self.total.div_ceil(count);
        }
        let weight = self.weights.get(name).copied().unwrap_or(0);
        // weight <= weight_sum, so the share never exceeds total
        (u128::from(self.total) * u128::from(weight)).div_ceil(u128::from(self.weight_sum)) as u64
    }
}

/// Round, then ratio-validate the rounded pair
fn size(raw: ResourceAmount) -> (ResourceAmount, Option<String>) {
    settle(round_amount(raw))
}

/// Ratio-validate an already rounded pair, re-rounding whatever was raised
///
/// Raising memory and rounding it up only moves the ratio up from 1:1;
/// raising CPU and rounding it up only moves it down from 1:6.5, so the
/// bound still holds after the second rounding.
fn settle(amount: ResourceAmount) -> (ResourceAmount, Option<String>) {
    let checked = ratio::validate(amount);
    if !checked.was_adjusted {
        return (amount, None);
    }
    let adjusted = checked.adjusted_amount;
    let rounded = ResourceAmount::new(
        round_cpu_millicores(adjusted.cpu_millicores),
        round_memory_bytes(adjusted.memory_bytes),
    );
    (rounded, checked.reason)
}

//! Reduction of raw telemetry series to scalars
//!
//! Extraction never fails. Empty or malformed input yields zero (or an
//! empty map), which callers must read as "no information" rather than as
//! a sizing target. Non-finite and negative samples are ignored.

use crate::models::{LabeledSeries, TimeSeriesPoint, MILLICORES_PER_CORE};
use std::collections::{BTreeMap, BTreeSet};

/// Percentile used for CPU sizing from usage
pub const CPU_FALLBACK_PERCENTILE: f64 = 0.90;

/// Unit conversion applied by `per_container_latest`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceUnit {
    /// Input in cores, output in millicores
    Cpu,
    /// Input in bytes, output in whole bytes
    Memory,
}

impl ResourceUnit {
    /// Convert a raw sample into the integer unit used for sizing
    pub fn convert(&self, raw: f64) -> u64 {
        let scaled = match self {
            ResourceUnit::Cpu => raw * MILLICORES_PER_CORE as f64,
            ResourceUnit::Memory => raw,
        };
        if scaled.is_finite() && scaled > 0.0 {
            scaled.round() as u64
        } else {
            0
        }
    }
}

fn usable(point: &TimeSeriesPoint) -> bool {
    point.value.is_finite() && point.value >= 0.0
}

/// Most recent usable point of a single series; later input wins ties
fn latest_point<'a>(
    points: impl Iterator<Item = &'a TimeSeriesPoint>,
) -> Option<&'a TimeSeriesPoint> {
    points
        .filter(|p| usable(p))
        .fold(None, |best: Option<&TimeSeriesPoint>, p| match best {
            Some(b) if b.timestamp > p.timestamp => Some(b),
            _ => Some(p),
        })
}

/// Value of the most recent point across all series, or 0.0
pub fn latest_value(series: &[LabeledSeries]) -> f64 {
    latest_point(series.iter().flat_map(|s| s.points.iter()))
        .map(|p| p.value)
        .unwrap_or(0.0)
}

/// Most recent value per container, converted to `unit`
///
/// Series without a container label are skipped. Containers that do not
/// appear in the input are absent from the result.
pub fn per_container_latest(series: &[LabeledSeries], unit: ResourceUnit) -> BTreeMap<String, u64> {
    let mut latest: BTreeMap<String, TimeSeriesPoint> = BTreeMap::new();

    for s in series {
        let Some(container) = s.container() else {
            continue;
        };
        let Some(point) = latest_point(s.points.iter()) else {
            continue;
        };
        match latest.get(container) {
            Some(existing) if existing.timestamp > point.timestamp => {}
            _ => {
                latest.insert(container.to_string(), *point);
            }
        }
    }

    latest
        .into_iter()
        .map(|(container, point)| (container, unit.convert(point.value)))
        .collect()
}

/// Value at index `floor(p * count)` of all samples sorted ascending
pub fn percentile(series: &[LabeledSeries], p: f64) -> f64 {
    let mut values: Vec<f64> = series
        .iter()
        .flat_map(|s| s.points.iter())
        .filter(|pt| usable(pt))
        .map(|pt| pt.value)
        .collect();

    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));
    let p = if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
    let idx = ((p * values.len() as f64).floor() as usize).min(values.len() - 1);
    values[idx]
}

/// Largest sample across all series, or 0.0
pub fn max_value(series: &[LabeledSeries]) -> f64 {
    series
        .iter()
        .flat_map(|s| s.points.iter())
        .filter(|p| usable(p))
        .map(|p| p.value)
        .fold(0.0, f64::max)
}

/// Distinct values of `label` among series that carry at least one sample
pub fn distinct_label_values(series: &[LabeledSeries], label: &str) -> BTreeSet<String> {
    series
        .iter()
        .filter(|s| s.points.iter().any(usable))
        .filter_map(|s| s.label(label))
        .map(str::to_string)
        .collect()
}

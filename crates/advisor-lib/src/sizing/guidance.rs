//! Human-readable guidance attached to each recommendation

use super::synthesizer::Recommendation;
use crate::models::{RecommendationSource, ResourceAmount, MIB};

/// Relative change (percent) beyond which a directional suggestion is made
pub const CHANGE_THRESHOLD_PERCENT: f64 = 20.0;

/// Utilization (percent of request) below which a reduction is advised
pub const LOW_UTILIZATION_PERCENT: f64 = 30.0;

/// Utilization (percent of request) above which an increase is advised
pub const HIGH_UTILIZATION_PERCENT: f64 = 80.0;

pub const RATIO_NOTE: &str =
    "Ratio validation applied: CPU:memory kept between 1:1 and 1:6.5 (GiB per vCPU)";
pub const AWAITING_AUTOSCALER_NOTE: &str =
    "No autoscaler data available yet; allow more time for autoscaler data collection";
pub const WELL_OPTIMIZED_NOTE: &str = "Resource requests appear well optimized for observed usage";
pub const ENABLE_AUTOSCALER_HINT: &str =
    "Enable the vertical pod autoscaler in recommendation mode for per-container guidance";

/// What the guidance is rendered from
pub struct GuidanceContext<'a> {
    pub recommendation: &'a Recommendation,
    /// Per-pod request currently declared
    pub current_request: ResourceAmount,
    /// Per-pod usage currently observed
    pub current_usage: ResourceAmount,
}

#[derive(Clone, Copy)]
enum Dimension {
    Cpu,
    Memory,
}

impl Dimension {
    fn label(self) -> &'static str {
        match self {
            Dimension::Cpu => "CPU",
            Dimension::Memory => "memory",
        }
    }

    fn pick(self, amount: ResourceAmount) -> u64 {
        match self {
            Dimension::Cpu => amount.cpu_millicores,
            Dimension::Memory => amount.memory_bytes,
        }
    }

    fn format(self, value: u64) -> String {
        match self {
            Dimension::Cpu => format!("{}m", value),
            Dimension::Memory => format!("{} MiB", value.div_ceil(MIB)),
        }
    }
}

impl GuidanceContext<'_> {
    /// Produce the guidance lines in their fixed order
    pub fn render(&self) -> Vec<String> {
        let rec = self.recommendation;
        let mut lines = Vec::new();

        if !rec.container_cpu.is_empty() {
            lines.push("CPU recommendations per container:".to_string());
            for (name, millicores) in &rec.container_cpu {
                lines.push(format!("  {}: {}", name, Dimension::Cpu.format(*millicores)));
            }
            lines.push(self.total_line(Dimension::Cpu));
        }

        if !rec.container_memory.is_empty() {
            lines.push("Memory recommendations per container:".to_string());
            for (name, bytes) in &rec.container_memory {
                lines.push(format!("  {}: {}", name, Dimension::Memory.format(*bytes)));
            }
            lines.push(self.total_line(Dimension::Memory));
        }

        for dim in [Dimension::Cpu, Dimension::Memory] {
            if let Some(line) = self.change_suggestion(dim) {
                lines.push(line);
            }
        }

        if rec.ratio_adjusted() {
            lines.push(RATIO_NOTE.to_string());
        }

        if !rec.autoscaler_available {
            lines.push(AWAITING_AUTOSCALER_NOTE.to_string());

            // Utilization is only judged when usage was actually observed
            if rec.source == RecommendationSource::UsageFallback {
                let advisories: Vec<String> = [Dimension::Cpu, Dimension::Memory]
                    .into_iter()
                    .filter_map(|dim| self.utilization_advisory(dim))
                    .collect();
                if advisories.is_empty() {
                    lines.push(WELL_OPTIMIZED_NOTE.to_string());
                } else {
                    lines.extend(advisories);
                }
            }

            lines.push(ENABLE_AUTOSCALER_HINT.to_string());
        }

        lines
    }

    fn total_line(&self, dim: Dimension) -> String {
        format!(
            "Total {}: {} (current: {})",
            dim.label(),
            dim.format(dim.pick(self.recommendation.total)),
            dim.format(dim.pick(self.current_request)),
        )
    }

    fn change_suggestion(&self, dim: Dimension) -> Option<String> {
        let current = dim.pick(self.current_request);
        if current == 0 {
            return None;
        }
        let recommended = dim.pick(self.recommendation.total);
        let delta = (recommended as f64 - current as f64) / current as f64 * 100.0;
        if delta.abs() <= CHANGE_THRESHOLD_PERCENT {
            return None;
        }
        let verb = if delta > 0.0 { "Increase" } else { "Reduce" };
        Some(format!(
            "{} {} request by {:.0}% ({} -> {})",
            verb,
            dim.label(),
            delta.abs(),
            dim.format(current),
            dim.format(recommended),
        ))
    }

    fn utilization_advisory(&self, dim: Dimension) -> Option<String> {
        let usage = dim.pick(self.current_usage);
        let request = dim.pick(self.current_request);
        if usage == 0 || request == 0 {
            return None;
        }
        let utilization = usage as f64 / request as f64 * 100.0;
        if utilization < LOW_UTILIZATION_PERCENT {
            Some(format!(
                "{} utilization is {:.0}% of request; consider reducing the {} request",
                capitalize(dim.label()),
                utilization,
                dim.label()
            ))
        } else if utilization > HIGH_UTILIZATION_PERCENT {
            Some(format!(
                "{} utilization is {:.0}% of request; consider increasing the {} request",
                capitalize(dim.label()),
                utilization,
                dim.label()
            ))
        } else {
            None
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

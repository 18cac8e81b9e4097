//! Efficiency score from current usage against current requests

use crate::models::ResourceAmount;

fn dimension_score(usage: u64, request: u64) -> f64 {
    // No request means nothing is reserved, so nothing is wasted
    if request == 0 {
        return 100.0;
    }
    (usage as f64 / request as f64 * 100.0).min(100.0)
}

/// Mean of CPU and memory utilization against request, capped at 100 each
pub fn efficiency_score(usage: ResourceAmount, request: ResourceAmount) -> u8 {
    let cpu = dimension_score(usage.cpu_millicores, request.cpu_millicores);
    let memory = dimension_score(usage.memory_bytes, request.memory_bytes);
    ((cpu + memory) / 2.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GIB, MIB};

    #[test]
    fn test_half_utilized() {
        let score = efficiency_score(
            ResourceAmount::new(250, 512 * MIB),
            ResourceAmount::new(500, GIB),
        );
        assert_eq!(score, 50);
    }

    #[test]
    fn test_over_request_capped() {
        let score = efficiency_score(
            ResourceAmount::new(2000, 4 * GIB),
            ResourceAmount::new(500, GIB),
        );
        assert_eq!(score, 100);
    }

    #[test]
    fn test_zero_request_counts_as_efficient() {
        assert_eq!(efficiency_score(ResourceAmount::ZERO, ResourceAmount::ZERO), 100);
        // CPU unrequested, memory 10% used
        let score = efficiency_score(
            ResourceAmount::new(300, 100 * MIB),
            ResourceAmount::new(0, 1000 * MIB),
        );
        assert_eq!(score, 55);
    }

    #[test]
    fn test_idle_workload() {
        assert_eq!(
            efficiency_score(ResourceAmount::ZERO, ResourceAmount::new(1000, GIB)),
            0
        );
    }

    #[test]
    fn test_score_bounds() {
        for usage in [0, 1, 50, 999, 10_000] {
            for request in [0, 1, 50, 999, 10_000] {
                let score = efficiency_score(
                    ResourceAmount::new(usage, usage * MIB),
                    ResourceAmount::new(request, request * MIB),
                );
                assert!(score <= 100);
            }
        }
    }
}

//! CPU:memory provisioning ratio enforcement
//!
//! Memory per vCPU must stay within 1 GiB to 6.5 GiB. Comparisons are done
//! in integer arithmetic so a pair accepted here is accepted again on a
//! second pass.

use crate::models::{RatioAdjustment, ResourceAmount, GIB, MILLICORES_PER_CORE};

/// Lowest accepted memory per vCPU, in GiB
pub const MIN_GIB_PER_CORE: f64 = 1.0;

/// Highest accepted memory per vCPU, in GiB
pub const MAX_GIB_PER_CORE: f64 = 6.5;

pub const MEMORY_RAISED_REASON: &str = "memory increased to maintain minimum 1:1 ratio";
pub const CPU_RAISED_REASON: &str = "cpu increased to maintain maximum 1:6.5 ratio";

// 6.5 expressed as a fraction so the upper bound can be checked exactly
const MAX_RATIO_NUM: u128 = 13;
const MAX_RATIO_DEN: u128 = 2;

/// Memory GiB per vCPU, or `None` when there is no CPU to divide by
pub fn gib_per_core(amount: ResourceAmount) -> Option<f64> {
    if amount.cpu_millicores == 0 {
        return None;
    }
    Some(amount.memory_gib() / amount.cpu_cores())
}

/// Bring a (cpu, memory) pair inside the ratio bounds
///
/// Memory is raised when there is less than 1 GiB per vCPU, CPU is raised
/// when there is more than 6.5 GiB per vCPU. Nothing is ever lowered. A
/// pair with zero CPU carries no ratio information and is returned as-is.
pub fn validate(amount: ResourceAmount) -> RatioAdjustment {
    let cpu = u128::from(amount.cpu_millicores);
    let mem = u128::from(amount.memory_bytes);
    let gib = u128::from(GIB);
    let per_core = u128::from(MILLICORES_PER_CORE);

    if cpu == 0 {
        return RatioAdjustment::unchanged(amount);
    }

    // mem/GiB / (cpu/1000) < 1
    if mem * per_core < gib * cpu {
        let memory_bytes = (cpu * gib).div_ceil(per_core);
        return RatioAdjustment {
            adjusted_amount: ResourceAmount::new(amount.cpu_millicores, saturate(memory_bytes)),
            was_adjusted: true,
            reason: Some(MEMORY_RAISED_REASON.to_string()),
        };
    }

    // mem/GiB / (cpu/1000) > 13/2
    if mem * per_core * MAX_RATIO_DEN > MAX_RATIO_NUM * gib * cpu {
        let cpu_millicores = (mem * per_core * MAX_RATIO_DEN).div_ceil(MAX_RATIO_NUM * gib);
        return RatioAdjustment {
            adjusted_amount: ResourceAmount::new(saturate(cpu_millicores), amount.memory_bytes),
            was_adjusted: true,
            reason: Some(CPU_RAISED_REASON.to_string()),
        };
    }

    RatioAdjustment::unchanged(amount)
}

fn saturate(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

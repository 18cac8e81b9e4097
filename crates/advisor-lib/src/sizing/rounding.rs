//! Granularity applied to every recommended request

use crate::models::{ResourceAmount, MIB};

/// CPU requests are recommended in 10m steps
pub const CPU_STEP_MILLICORES: u64 = 10;

/// Memory requests are recommended in 16 MiB steps
pub const MEMORY_STEP_BYTES: u64 = 16 * MIB;

/// Smallest request ever recommended
pub const FLOOR: ResourceAmount = ResourceAmount {
    cpu_millicores: CPU_STEP_MILLICORES,
    memory_bytes: MEMORY_STEP_BYTES,
};

fn round_up(value: u64, step: u64) -> u64 {
    value.div_ceil(step).saturating_mul(step)
}

/// Round up to the next 10m, never below 10m
pub fn round_cpu_millicores(millicores: u64) -> u64 {
    round_up(millicores, CPU_STEP_MILLICORES).max(CPU_STEP_MILLICORES)
}

/// Round up to the next 16 MiB, never below 16 MiB
pub fn round_memory_bytes(bytes: u64) -> u64 {
    round_up(bytes, MEMORY_STEP_BYTES).max(MEMORY_STEP_BYTES)
}

pub fn round_amount(amount: ResourceAmount) -> ResourceAmount {
    ResourceAmount::new(
        round_cpu_millicores(amount.cpu_millicores),
        round_memory_bytes(amount.memory_bytes),
    )
}

//! Right-sizing: ratio bounds, granularity and recommendation synthesis

mod guidance;
mod ratio;
mod rounding;
mod synthesizer;

pub use guidance::{
    GuidanceContext, AWAITING_AUTOSCALER_NOTE, CHANGE_THRESHOLD_PERCENT, ENABLE_AUTOSCALER_HINT,
    HIGH_UTILIZATION_PERCENT, LOW_UTILIZATION_PERCENT, RATIO_NOTE, WELL_OPTIMIZED_NOTE,
};
pub use ratio::{
    gib_per_core, validate as validate_ratio, CPU_RAISED_REASON, MAX_GIB_PER_CORE,
    MEMORY_RAISED_REASON, MIN_GIB_PER_CORE,
};
pub use rounding::{
    round_amount, round_cpu_millicores, round_memory_bytes, CPU_STEP_MILLICORES, FLOOR,
    MEMORY_STEP_BYTES,
};
pub use synthesizer::{
    AdjustmentRecord, AdjustmentScope, ContainerRequests, Recommendation,
    RecommendationSynthesizer, SizingConfig, SizingInputs, CPU_USAGE_BUFFER, MEMORY_USAGE_BUFFER,
};

//! Efficiency and cost scoring

mod cost;
mod efficiency;

pub use cost::{
    CostEstimator, RateTable, DEFAULT_CPU_CORE_HOUR, DEFAULT_MEMORY_GIB_HOUR, HOURS_PER_MONTH,
};
pub use efficiency::efficiency_score;

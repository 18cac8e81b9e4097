//! Monthly cost projection from per-pod requests

use crate::models::ResourceAmount;
use serde::{Deserialize, Serialize};

/// Billing month used for projections: 24 hours x 30 days
pub const HOURS_PER_MONTH: f64 = 24.0 * 30.0;

/// On-demand price per vCPU-hour (USD)
pub const DEFAULT_CPU_CORE_HOUR: f64 = 0.031611;

/// On-demand price per GiB-hour (USD)
pub const DEFAULT_MEMORY_GIB_HOUR: f64 = 0.004237;

/// Prices applied to requested resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateTable {
    /// Price of one vCPU for one hour
    pub cpu_core_hour: f64,
    /// Price of one GiB of memory for one hour
    pub memory_gib_hour: f64,
    /// Currency code shown next to amounts
    pub currency: String,
    /// Decimal places costs are rounded to
    pub currency_decimals: u32,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            cpu_core_hour: DEFAULT_CPU_CORE_HOUR,
            memory_gib_hour: DEFAULT_MEMORY_GIB_HOUR,
            currency: "USD".to_string(),
            currency_decimals: 2,
        }
    }
}

/// Projects monthly cost and savings from a rate table
#[derive(Debug, Clone, Default)]
pub struct CostEstimator {
    rates: RateTable,
}

impl CostEstimator {
    pub fn new(rates: RateTable) -> Self {
        Self { rates }
    }

    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    fn hourly(&self, amount: ResourceAmount) -> f64 {
        amount.cpu_cores() * self.rates.cpu_core_hour
            + amount.memory_gib() * self.rates.memory_gib_hour
    }

    fn round(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.rates.currency_decimals.min(9) as i32);
        (value * factor).round() / factor
    }

    /// Cost of running `replicas` pods at `amount` each for a month
    pub fn monthly_cost(&self, amount: ResourceAmount, replicas: u32) -> f64 {
        self.round(self.hourly(amount) * f64::from(replicas) * HOURS_PER_MONTH)
    }

    /// Per-replica monthly savings of moving from `current` to `recommended`,
    /// never negative
    pub fn potential_savings(&self, current: ResourceAmount, recommended: ResourceAmount) -> f64 {
        let delta = self.monthly_cost(current, 1) - self.monthly_cost(recommended, 1);
        self.round(delta.max(0.0))
    }

    /// Scale a per-replica figure to the whole workload
    pub fn scale(&self, per_replica: f64, replicas: u32) -> f64 {
        self.round(per_replica * f64::from(replicas)).max(0.0)
    }
}

//! Cost estimation command

use advisor_lib::{CostEstimator, RateTable, ResourceAmount};
use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use crate::output::{format_bytes, format_cpu, format_currency, print_json, OutputFormat};
use crate::quantity::{parse_cpu, parse_memory};

/// Monthly cost of one resource request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostReport {
    pub cpu_millicores: u64,
    pub memory_bytes: u64,
    pub replicas: u32,
    pub monthly_cost_per_replica: f64,
    pub monthly_cost: f64,
    pub currency: String,
    pub cpu_core_hour: f64,
    pub memory_gib_hour: f64,
}

/// Price a request of `cpu` and `memory` per replica
pub fn estimate(cpu: &str, memory: &str, replicas: u32, rates: &RateTable) -> Result<CostReport> {
    let cpu_millicores = parse_cpu(cpu).context("Invalid --cpu")?;
    let memory_bytes = parse_memory(memory).context("Invalid --memory")?;
    let amount = ResourceAmount::new(cpu_millicores, memory_bytes);

    let estimator = CostEstimator::new(rates.clone());
    Ok(CostReport {
        cpu_millicores,
        memory_bytes,
        replicas,
        monthly_cost_per_replica: estimator.monthly_cost(amount, 1),
        monthly_cost: estimator.monthly_cost(amount, replicas),
        currency: rates.currency.clone(),
        cpu_core_hour: rates.cpu_core_hour,
        memory_gib_hour: rates.memory_gib_hour,
    })
}

/// Show the monthly cost of a request
pub fn show_costs(
    cpu: &str,
    memory: &str,
    replicas: u32,
    rates: &RateTable,
    format: OutputFormat,
) -> Result<()> {
    let report = estimate(cpu, memory, replicas, rates)?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            println!("{}", "Cost Estimate".bold());
            println!("{}", "=".repeat(50));
            println!(
                "Request:                {} CPU / {}",
                format_cpu(report.cpu_millicores).cyan(),
                format_bytes(report.memory_bytes).cyan()
            );
            println!("Replicas:               {}", report.replicas);
            println!(
                "Rates:                  {} per vCPU-hour, {} per GiB-hour",
                report.cpu_core_hour, report.memory_gib_hour
            );
            println!();

            println!("{}", "Monthly Costs".bold());
            println!("{}", "-".repeat(50));
            println!(
                "Per replica:            {}",
                format_currency(report.monthly_cost_per_replica, &report.currency)
            );
            println!(
                "{}                 {}",
                "Total:".bold(),
                format_currency(report.monthly_cost, &report.currency)
                    .green()
                    .bold()
            );
        }
    }

    Ok(())
}

//! Batch analysis command

use advisor_lib::{
    BatchRequest, BatchResponse, CacheLayer, ResourceAmount, WorkloadFailure, WorkloadMetrics,
    WorkloadOrchestrator,
};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

use crate::config::AdvisorConfig;
use crate::output::{
    color_efficiency, color_source, format_bytes, format_cpu, format_currency, print_info,
    print_json, print_success, print_warning, OutputFormat,
};
use crate::snapshot::SnapshotTelemetry;

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Project the cluster belongs to
    #[arg(long, short)]
    pub project: String,

    /// Cluster name
    #[arg(long, short)]
    pub cluster: String,

    /// Only analyze workloads in this namespace
    #[arg(long, short)]
    pub namespace: Option<String>,

    /// Only analyze the workload with this name
    #[arg(long, short)]
    pub workload: Option<String>,

    /// Analysis window in hours (1-168)
    #[arg(long, default_value_t = 24)]
    pub time_range: u32,

    /// JSON telemetry snapshot to analyze
    #[arg(long, short)]
    pub snapshot: PathBuf,

    /// Read every metric from the snapshot, bypassing the cache
    #[arg(long)]
    pub no_cache: bool,
}

impl AnalyzeArgs {
    fn request(&self) -> BatchRequest {
        let mut request = BatchRequest::new(&self.project, &self.cluster, self.time_range);
        if let Some(ns) = &self.namespace {
            request = request.with_namespace(ns);
        }
        if let Some(name) = &self.workload {
            request = request.with_workload_name(name);
        }
        request
    }
}

/// Row for the workload summary table
#[derive(Tabled)]
struct WorkloadRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Workload")]
    workload: String,
    #[tabled(rename = "Replicas")]
    replicas: u32,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Efficiency")]
    efficiency: String,
    #[tabled(rename = "Monthly Cost")]
    monthly_cost: String,
    #[tabled(rename = "Savings")]
    savings: String,
    #[tabled(rename = "Source")]
    source: String,
}

/// Row for the per-container table
#[derive(Tabled)]
struct ContainerRow {
    #[tabled(rename = "Container")]
    container: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Recommended")]
    recommended: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Row for the failed workloads table
#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Workload")]
    workload: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Error")]
    error: String,
}

/// Run a batch analysis over a snapshot and print the result
pub async fn analyze(
    args: &AnalyzeArgs,
    config: &AdvisorConfig,
    format: OutputFormat,
) -> Result<BatchResponse> {
    let telemetry = SnapshotTelemetry::load(&args.snapshot)?;
    info!(
        snapshot = %args.snapshot.display(),
        workloads = telemetry.workload_count(),
        "Loaded telemetry snapshot"
    );

    let cache = if args.no_cache {
        CacheLayer::disabled()
    } else {
        config.cache.layer()
    };

    let orchestrator = Arc::new(
        WorkloadOrchestrator::builder()
            .telemetry(Arc::new(telemetry))
            .cache(cache)
            .sizing(config.sizing.clone())
            .rates(config.rates.clone())
            .config(config.orchestrator.to_config())
            .instance(args.cluster.clone())
            .build()?,
    );

    let request = args.request();
    let response = orchestrator
        .analyze_batch(&request)
        .await
        .context("Batch analysis failed")?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => print_report(&request, &response, &config.rates.currency),
    }

    Ok(response)
}

fn print_report(request: &BatchRequest, response: &BatchResponse, currency: &str) {
    println!("{}", "Workload Analysis".bold());
    println!("{}", "=".repeat(60));
    println!("Project:                {}", request.project_id.cyan());
    println!("Cluster:                {}", request.cluster_name.cyan());
    if let Some(ns) = &request.namespace {
        println!("Namespace:              {}", ns.cyan());
    }
    println!("Window:                 {}h", request.time_range_hours);
    println!(
        "Generated:              {}",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed()
    );
    println!();

    let analyzed: Vec<&WorkloadMetrics> =
        response.workloads.iter().filter_map(|w| w.metrics()).collect();
    let failed: Vec<&WorkloadFailure> =
        response.workloads.iter().filter_map(|w| w.failure()).collect();

    if analyzed.is_empty() && failed.is_empty() {
        print_warning("No workloads matched the request");
        return;
    }

    if !analyzed.is_empty() {
        print_summary(&analyzed, currency);
        for metrics in &analyzed {
            print_detail(metrics);
        }
    }

    if !failed.is_empty() {
        print_failures(&failed);
    }

    println!();
    if failed.is_empty() {
        print_success(&format!("Analyzed {} workloads", analyzed.len()));
    } else {
        print_warning(&format!(
            "Analyzed {} workloads, {} failed",
            analyzed.len(),
            failed.len()
        ));
    }
}

fn print_summary(analyzed: &[&WorkloadMetrics], currency: &str) {
    let rows: Vec<WorkloadRow> = analyzed
        .iter()
        .map(|m| WorkloadRow {
            namespace: m.namespace.clone(),
            workload: m.name.clone(),
            replicas: m.replica_count,
            cpu: format!(
                "{} -> {}",
                format_cpu(m.current_request.cpu_millicores),
                format_cpu(m.recommended_request.cpu_millicores)
            ),
            memory: format!(
                "{} -> {}",
                format_bytes(m.current_request.memory_bytes),
                format_bytes(m.recommended_request.memory_bytes)
            ),
            efficiency: color_efficiency(m.efficiency_score),
            monthly_cost: format!(
                "{} -> {}",
                format_currency(m.monthly_cost, currency),
                format_currency(m.recommended_monthly_cost, currency)
            ),
            savings: format_currency(m.potential_monthly_savings, currency)
                .green()
                .to_string(),
            source: color_source(m.source.as_str()),
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()));

    let current: f64 = analyzed.iter().map(|m| m.monthly_cost).sum();
    let recommended: f64 = analyzed.iter().map(|m| m.recommended_monthly_cost).sum();
    let savings: f64 = analyzed.iter().map(|m| m.potential_monthly_savings).sum();

    println!();
    println!("{}", "Monthly Costs".bold());
    println!("{}", "-".repeat(60));
    println!("Current:                {}", format_currency(current, currency));
    println!(
        "Recommended:            {}",
        format_currency(recommended, currency).green()
    );
    println!(
        "{}      {}",
        "Potential Savings:".bold(),
        format_currency(savings, currency).green().bold()
    );
}

fn print_detail(metrics: &WorkloadMetrics) {
    println!();
    println!(
        "{} {}",
        format!("{}/{}", metrics.namespace, metrics.name).bold(),
        format!("({})", metrics.workload_type).dimmed()
    );

    if !metrics.per_container_detail.is_empty() {
        let rows: Vec<ContainerRow> = metrics
            .per_container_detail
            .iter()
            .map(|(name, detail)| ContainerRow {
                container: name.clone(),
                current: format_amount(detail.current),
                recommended: format_amount(detail.recommended),
                status: color_source(&detail.status.to_string()),
            })
            .collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    for line in &metrics.recommendation_text {
        print_info(line);
    }
    for adjustment in &metrics.ratio_adjustments {
        print_warning(adjustment);
    }
}

fn format_amount(amount: Option<ResourceAmount>) -> String {
    match amount {
        Some(a) => format!("{} / {}", format_cpu(a.cpu_millicores), format_bytes(a.memory_bytes)),
        None => "-".to_string(),
    }
}

fn print_failures(failed: &[&WorkloadFailure]) {
    println!();
    println!("{}", "Failed Workloads".red().bold());
    println!("{}", "-".repeat(60).red());

    let rows: Vec<FailureRow> = failed
        .iter()
        .map(|f| FailureRow {
            namespace: f.namespace.clone(),
            workload: f.name.clone(),
            kind: f.kind.red().to_string(),
            error: f.error.clone(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(namespace: Option<&str>, workload: Option<&str>) -> AnalyzeArgs {
        AnalyzeArgs {
            project: "proj".into(),
            cluster: "prod".into(),
            namespace: namespace.map(String::from),
            workload: workload.map(String::from),
            time_range: 12,
            snapshot: PathBuf::from("snapshot.json"),
            no_cache: false,
        }
    }

    #[test]
    fn test_request_from_args() {
        let req = args(Some("shop"), None).request();
        assert_eq!(req.project_id, "proj");
        assert_eq!(req.cluster_name, "prod");
        assert_eq!(req.namespace.as_deref(), Some("shop"));
        assert!(req.workload_name.is_none());
        assert_eq!(req.time_range_hours, 12);
        assert!(req.workloads.is_none());
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_an_error() {
        let err = analyze(
            &args(None, None),
            &AdvisorConfig::default(),
            OutputFormat::Json,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("snapshot"));
    }
}

//! Workload Resource Advisor CLI
//!
//! Runs the right-sizing engine against a telemetry snapshot and prices
//! resource requests.

mod commands;
mod config;
mod output;
mod quantity;
mod snapshot;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{analyze, costs};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Workload Resource Advisor CLI
#[derive(Parser)]
#[command(name = "wra")]
#[command(author, version, about = "CLI for the Workload Resource Advisor", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Configuration file (default: ~/.config/wra/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Print engine metrics in Prometheus text format to stderr when done
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze workloads in a telemetry snapshot and recommend requests
    Analyze(analyze::AnalyzeArgs),

    /// Estimate the monthly cost of a resource request
    Costs {
        /// CPU request (e.g. 500m, 2)
        #[arg(long)]
        cpu: String,

        /// Memory request (e.g. 512Mi, 1Gi)
        #[arg(long)]
        memory: String,

        /// Number of replicas
        #[arg(long, default_value_t = 1)]
        replicas: u32,
    },
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose { "debug" } else { "info" };
    let json = cli.log_json;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn run(cli: &Cli) -> Result<()> {
    let config = config::AdvisorConfig::load(cli.config.as_deref())?;
    debug!(?config, "Configuration loaded");

    match &cli.command {
        Commands::Analyze(args) => {
            analyze::analyze(args, &config, cli.format).await?;
        }
        Commands::Costs {
            cpu,
            memory,
            replicas,
        } => {
            costs::show_costs(cpu, memory, *replicas, &config.rates, cli.format)?;
        }
    }

    if cli.metrics {
        eprintln!("{}", advisor_lib::render_metrics()?);
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(err) = run(&cli).await {
        output::print_error(&format!("{:#}", err));
        std::process::exit(1);
    }
}
